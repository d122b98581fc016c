//! Semantic-role sub-verifiers
//!
//! Each verifier adds passes, warnings and errors for one artifact and may
//! record evidence for the deferred checks. Collaborator failures become
//! errors on the artifact.

use crate::classification::{self, DiagnosticEntry, IGNORED};
use crate::execution::engine::WalkOptions;
use crate::execution::evidence::Evidence;
use crate::guid::Guid;
use crate::results::Report;
use crate::strategies::{ArchiveStatus, CapsuleGuidStatus, Collaborators, CollaboratorError, GuidLookupResult};
use regex::Regex;
use sr_config::logging::codes;
use sr_config::tree::SemanticRole;
use sr_config::{log_debug, log_info, log_success, log_warning};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Relative to the directory holding result.md
pub const SCT_SUMMARY_EKL: &str = "sct_results/Overall/Summary.ekl";

static FW_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+FwClass\s+- ([0-9A-F-]+)").expect("FwClass pattern is valid"));
static ESP_DEVICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\S[0-9a-fA-F]+: DevicePath\([^\)]+\) +(/\S+) BlockIO\([^\)]+\).* EFISystemPartition\([^\)]+\)",
    )
    .expect("ESP pattern is valid")
});
static SHELL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(\S+)$").expect("device path pattern is valid"));
static REPORT_FIELDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(r"^- (Total number of network controllers): (\d+)")
        .expect("report field pattern is valid")]
});
static ARCHIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(tar|tar\.gz|tgz)$").expect("archive pattern is valid"));

/// Everything a sub-verifier may touch
pub struct RoleContext<'w> {
    pub collaborators: &'w Collaborators,
    pub options: &'w WalkOptions,
    pub evidence: &'w mut Evidence,
    pub report: &'w mut Report,
}

impl RoleContext<'_> {
    fn collaborator_failed(&mut self, what: &str, path: &Path, error: &CollaboratorError) {
        self.report.error(
            codes::role::COLLABORATOR_FAILURE,
            format!("{} failed on `{}': {}", what, path.display(), error),
        );
    }
}

/// Run the verifier of a role that inspects a non-empty file
pub fn verify_role(role: &SemanticRole, path: &Path, lines: Option<&[String]>, ctx: &mut RoleContext) {
    match role {
        // Handled before the existence check
        SemanticRole::SctSummary { .. } => {}
        SemanticRole::EsrtTable => with_lines(lines, |l| check_esrt(l, path, ctx)),
        SemanticRole::UefiCapsule => check_capsule(path, ctx),
        SemanticRole::DevicetreeBlob => check_devicetree(path, ctx),
        SemanticRole::EthernetLog => {
            log_debug!("Recording for deferred ethernet check", "path" => path.display());
            ctx.evidence.ethernet_logs.push(path.to_path_buf());
        }
        SemanticRole::BootSourcesLog => {
            log_debug!("Recording for deferred boot sources check", "path" => path.display());
            ctx.evidence.boot_logs.push(path.to_path_buf());
        }
        SemanticRole::UefiSniff => with_lines(lines, |l| check_uefi_sniff(l, path, ctx)),
        SemanticRole::MustHaveEsp => with_lines(lines, |l| check_must_have_esp(l, path, ctx)),
        SemanticRole::ReportTxt => with_lines(lines, |l| check_report_txt(l, path, ctx)),
    }
}

// An unreadable file was already reported
fn with_lines(lines: Option<&[String]>, check: impl FnOnce(&[String])) {
    if let Some(lines) = lines {
        check(lines)
    }
}

pub fn is_archive(path: &Path) -> bool {
    ARCHIVE.is_match(&path.to_string_lossy())
}

pub fn check_archive(path: &Path, ctx: &mut RoleContext) {
    log_debug!("Checking archive", "path" => path.display());
    match ctx.collaborators.archive.verify(path) {
        Ok(ArchiveStatus::Ok) => ctx.report.pass(format!("Archive `{}' is sound", path.display())),
        Ok(ArchiveStatus::Corrupt(reason)) => ctx.report.error(
            codes::content::ARCHIVE_CORRUPT,
            format!("Bad archive `{}': {}", path.display(), reason),
        ),
        Err(e) => ctx.collaborator_failed("Archive check", path, &e),
    }
}

/// Look up a GUID: unknown passes, known warns
fn identify_guid(guid: &Guid, known_code: sr_config::logging::Code, path: &Path, ctx: &mut RoleContext) {
    match ctx.collaborators.guid_lookup.lookup(guid) {
        Ok(GuidLookupResult::Unknown) => {
            ctx.report.pass(format!("GUID `{}' unknown, in `{}'", guid, path.display()))
        }
        Ok(GuidLookupResult::Known(description)) => ctx.report.warning(
            known_code,
            format!("GUID `{}' is known: \"{}\", in `{}'", guid, description, path.display()),
        ),
        Err(e) => ctx.report.error(
            codes::role::GUID_LOOKUP_FAILED,
            format!("GUID lookup of `{}' failed, in `{}': {}", guid, path.display(), e),
        ),
    }
}

pub fn check_esrt(lines: &[String], path: &Path, ctx: &mut RoleContext) {
    let mut count = 0;

    for line in lines {
        let Some(caps) = FW_CLASS.captures(line) else {
            continue;
        };
        let text = &caps[1];
        match text.parse::<Guid>() {
            Ok(guid) => {
                identify_guid(&guid, codes::role::KNOWN_ESRT_GUID, path, ctx);
                ctx.evidence.esrt_guids.insert(guid);
                count += 1;
            }
            Err(e) => ctx.report.error(
                codes::role::GUID_LOOKUP_FAILED,
                format!("{} in `{}'", e, path.display()),
            ),
        }
    }

    if count > 0 {
        ctx.report
            .pass(format!("{} GUID(s) found in `{}'", count, path.display()));
    } else {
        ctx.report.error(
            codes::role::ESRT_WITHOUT_GUID,
            format!("No GUID found in `{}'", path.display()),
        );
    }
}

pub fn check_capsule(path: &Path, ctx: &mut RoleContext) {
    let capsule = match ctx.collaborators.capsule.validate(path) {
        Ok(report) => report,
        Err(e) => return ctx.collaborator_failed("Capsule validation", path, &e),
    };

    // Nothing else is trusted in a capsule that does not parse as valid
    if !(capsule.valid && capsule.authenticated) {
        let mut reasons = capsule.warnings.clone();
        if capsule.valid {
            reasons.push("not authenticated".to_string());
        }
        ctx.report.error(
            codes::role::CAPSULE_INVALID,
            format!("Invalid capsule `{}': {}", path.display(), reasons.join("; ")),
        );
        return;
    }

    ctx.report.pass(format!("Valid capsule `{}'", path.display()));
    for warning in &capsule.warnings {
        ctx.report.warning(
            codes::role::CAPSULE_WARNING,
            format!("{}, in `{}'", warning, path.display()),
        );
    }

    match capsule.image_type_guid {
        Some(guid) => {
            log_debug!("Capsule image type GUID", "guid" => guid, "path" => path.display());
            ctx.evidence.capsule_guids.push((guid, path.to_path_buf()));
        }
        None => ctx.report.error(
            codes::role::CAPSULE_INVALID,
            format!("No image type GUID from `{}'", path.display()),
        ),
    }

    match capsule.guid_status {
        CapsuleGuidStatus::Unknown => ctx
            .report
            .pass(format!("Capsule GUID is unknown, in `{}'", path.display())),
        CapsuleGuidStatus::Known(description) => ctx.report.warning(
            codes::role::KNOWN_CAPSULE_GUID,
            format!("Capsule GUID is known: \"{}\", in `{}'", description, path.display()),
        ),
        CapsuleGuidStatus::Inconclusive(reason) => ctx.report.error(
            codes::role::GUID_LOOKUP_FAILED,
            format!("Bad capsule GUID search in `{}': {}", path.display(), reason),
        ),
    }
}

/// Classify, dedupe and filter raw diagnostics per the walk options
pub fn process_diagnostics(mut entries: Vec<DiagnosticEntry>, options: &WalkOptions) -> Vec<DiagnosticEntry> {
    classification::classify(&mut entries, &options.rules);
    if options.dedupe {
        entries = classification::dedupe(entries);
    }
    match &options.filter {
        Some(filter) => filter.apply(entries),
        None => entries,
    }
}

pub fn check_devicetree(path: &Path, ctx: &mut RoleContext) {
    let parsed = match ctx.collaborators.devicetree.compile_and_validate(path) {
        Ok(parsed) => parsed,
        Err(e) => {
            return ctx.report.error(
                codes::role::DEVICETREE_FAILURE,
                format!("Devicetree tools failed on `{}': {}", path.display(), e),
            )
        }
    };

    if !parsed.unparsed.is_empty() {
        ctx.report.warning(
            codes::role::DEVICETREE_UNPARSED,
            format!(
                "{} unparsed devicetree log line(s) for `{}'",
                parsed.unparsed.len(),
                path.display()
            ),
        );
    }

    let entries = process_diagnostics(parsed.entries, ctx.options);

    for (node, kind, message) in classification::non_ignored(&entries) {
        log_debug!("Devicetree entry", "node" => node, "type" => kind, "message" => message);
    }

    for (kind, count) in classification::summarize(&entries) {
        if kind.contains("error") {
            ctx.report.error(
                codes::role::DEVICETREE_DIAGNOSTIC,
                format!("{} devicetree {} with `{}'", count, kind, path.display()),
            );
        } else if kind.contains("warning") {
            log_debug!("Devicetree warnings", "count" => count, "type" => kind, "path" => path.display());
        } else if kind == IGNORED {
            ctx.report
                .pass(format!("{} devicetree {} with `{}'", count, kind, path.display()));
        } else {
            ctx.report.error(
                codes::role::DEVICETREE_DIAGNOSTIC,
                format!(
                    "{} unknown devicetree type `{}' with `{}'",
                    count,
                    kind,
                    path.display()
                ),
            );
        }
    }
}

pub fn check_uefi_sniff(lines: &[String], path: &Path, ctx: &mut RoleContext) {
    let mut count = 0;

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = ESP_DEVICE.captures(line) {
            let dev_path = caps[1].to_string();
            let esp = dev_path.rsplit('/').next().unwrap_or(&dev_path).to_string();
            log_info!("Found ESP", "esp" => esp, "line" => i + 1);
            ctx.evidence.esp_dev_paths.insert(dev_path);
            count += 1;
        }
    }

    if count > 0 {
        ctx.report
            .pass(format!("Found {} ESP(s) in `{}'", count, path.display()));
    } else {
        ctx.report.error(
            codes::role::SNIFF_WITHOUT_ESP,
            format!("Could not find an ESP in `{}'", path.display()),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShellState {
    AwaitShell,
    AwaitEdk2,
    AwaitUefi,
    AwaitMap,
    AwaitAlias,
    AwaitPath,
}

/// Device paths listed in the mapping tables printed after shell banners
pub fn shell_device_paths(lines: &[String]) -> Vec<String> {
    let mut state = ShellState::AwaitShell;
    let mut paths: Vec<String> = Vec::new();

    for line in lines {
        state = match state {
            ShellState::AwaitShell if line.starts_with("UEFI Interactive Shell v") => {
                ShellState::AwaitEdk2
            }
            ShellState::AwaitShell => ShellState::AwaitShell,
            ShellState::AwaitEdk2 if line.starts_with("EDK II") => ShellState::AwaitUefi,
            ShellState::AwaitUefi if line.starts_with("UEFI v") => ShellState::AwaitMap,
            ShellState::AwaitMap if line.starts_with("Mapping table") => ShellState::AwaitAlias,
            ShellState::AwaitAlias if line.contains("Alias(s):") => ShellState::AwaitPath,
            ShellState::AwaitPath => match SHELL_PATH.captures(line) {
                Some(caps) => {
                    let path = caps[1].to_string();
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                    ShellState::AwaitAlias
                }
                None => ShellState::AwaitShell,
            },
            _ => ShellState::AwaitShell,
        };
    }
    paths
}

pub fn check_must_have_esp(lines: &[String], path: &Path, ctx: &mut RoleContext) {
    let paths = shell_device_paths(lines);

    if paths.is_empty() {
        ctx.report.error(
            codes::role::SHELL_WITHOUT_ESP,
            format!("Could not find a device path in `{}'", path.display()),
        );
        return;
    }

    ctx.report.pass(format!(
        "Found {} device path(s) in `{}'",
        paths.len(),
        path.display()
    ));
    for dev_path in paths {
        ctx.evidence.dev_paths.push((dev_path, path.to_path_buf()));
    }
}

pub fn check_report_txt(lines: &[String], path: &Path, ctx: &mut RoleContext) {
    let mut extracted = HashSet::new();

    for line in lines {
        for pattern in REPORT_FIELDS.iter() {
            if let Some(caps) = pattern.captures(line) {
                let (field, value) = (caps[1].to_string(), caps[2].to_string());
                log_info!("Report field", "field" => field, "value" => value);
                ctx.report.pass(format!("Matched `{}'", line));
                ctx.evidence
                    .report_txt
                    .entry(field.clone())
                    .or_insert(value);
                extracted.insert(field);
            }
        }
    }

    if extracted.len() != REPORT_FIELDS.len() {
        ctx.report.error(
            codes::role::REPORT_FIELD_MISSING,
            format!("Could not extract all patterns from `{}'", path.display()),
        );
    }
}

/// Rebuild an SCT result.md when its inputs are newer
///
/// Failing to regenerate is not counted: the checks on the file itself
/// judge whatever is there.
pub fn regenerate_sct_summary(seq_file: &str, path: &Path, ctx: &mut RoleContext) {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let sequence = dir.join(seq_file);
    let summary = dir.join(SCT_SUMMARY_EKL);

    let mut deps: Vec<PathBuf> = vec![sequence.clone(), summary.clone()];
    deps.extend(ctx.collaborators.sct_parser.dependencies());
    if !ctx.options.regen.need_regen(path, &deps) {
        return;
    }

    match ctx.collaborators.sct_parser.parse(&sequence, &summary) {
        Ok(markdown) => match std::fs::write(path, markdown) {
            Ok(()) => log_success!(
                codes::success::ARTIFACT_REGENERATED,
                "Created SCT summary",
                "path" => path.display()
            ),
            Err(e) => log_warning!(
                code = codes::role::SCT_REGEN_FAILED,
                "Cannot write SCT summary",
                "path" => path.display(),
                "error" => e
            ),
        },
        Err(CollaboratorError::Unavailable(what)) => {
            log_debug!("No SCT regeneration", "reason" => what)
        }
        Err(e) => log_warning!(
            code = codes::role::SCT_REGEN_FAILED,
            "SCT parser failed",
            "path" => path.display(),
            "error" => e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::ParsedLog;
    use crate::strategies::{CapsuleReport, DevicetreeToolchain, GuidLookup};
    use std::str::FromStr;

    struct Lookup;

    impl GuidLookup for Lookup {
        fn lookup(&self, guid: &Guid) -> Result<GuidLookupResult, CollaboratorError> {
            if guid.to_string().starts_with("00000000") {
                Ok(GuidLookupResult::Known("Null-ish".to_string()))
            } else {
                Ok(GuidLookupResult::Unknown)
            }
        }
    }

    struct Toolchain(ParsedLog);

    impl DevicetreeToolchain for Toolchain {
        fn compile_and_validate(&self, _: &Path) -> Result<ParsedLog, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn run<F: FnOnce(&mut RoleContext)>(collaborators: &Collaborators, f: F) -> (Report, Evidence) {
        let options = WalkOptions::default();
        let mut evidence = Evidence::new();
        let mut report = Report::quiet();
        let mut ctx = RoleContext {
            collaborators,
            options: &options,
            evidence: &mut evidence,
            report: &mut report,
        };
        f(&mut ctx);
        (report, evidence)
    }

    #[test]
    fn test_esrt_guids() {
        let collaborators = Collaborators::unavailable().with_guid_lookup(Lookup);
        let log = lines(
            "ESRT\n  FwClass           - 6DCBD5ED-E82D-4C44-BDA1-7194199AD92A\n  FwClass  - 00000000-0000-0000-0000-000000000001\n",
        );
        let (report, evidence) = run(&collaborators, |ctx| check_esrt(&log, Path::new("esrt.log"), ctx));
        assert_eq!(report.stats().warning, 1);
        assert_eq!(report.stats().pass, 2);
        assert_eq!(report.stats().error, 0);
        assert_eq!(evidence.esrt_guids.len(), 2);
    }

    #[test]
    fn test_esrt_without_guid() {
        let collaborators = Collaborators::unavailable();
        let (report, _) = run(&collaborators, |ctx| check_esrt(&lines("empty\n"), Path::new("esrt.log"), ctx));
        assert_eq!(report.stats().error, 1);
        assert_eq!(report.findings()[0].code, codes::role::ESRT_WITHOUT_GUID.as_str());
    }

    #[test]
    fn test_capsule_outcomes() {
        struct Capsule;
        impl crate::strategies::CapsuleValidator for Capsule {
            fn validate(&self, _: &Path) -> Result<CapsuleReport, CollaboratorError> {
                Ok(CapsuleReport {
                    valid: true,
                    authenticated: true,
                    image_type_guid: Some(Guid::from_str("6dcbd5ed-e82d-4c44-bda1-7194199ad92a").unwrap()),
                    guid_status: CapsuleGuidStatus::Known("Test firmware".to_string()),
                    warnings: Vec::new(),
                })
            }
        }
        let collaborators = Collaborators::unavailable().with_capsule(Capsule);
        let (report, evidence) = run(&collaborators, |ctx| check_capsule(Path::new("fw.bin"), ctx));
        assert_eq!(report.stats().pass, 1);
        assert_eq!(report.stats().warning, 1);
        assert_eq!(evidence.capsule_guids.len(), 1);

        let (report, _) = run(&Collaborators::unavailable(), |ctx| check_capsule(Path::new("fw.bin"), ctx));
        assert_eq!(report.stats().error, 1);
    }

    #[test]
    fn test_devicetree_summary() {
        let parsed = crate::classification::parse_devicetree_log(&[
            "a.dts: Warning (w): /x: m1",
            "a.dts: Warning (w): /y: m2",
            "junk",
        ]);
        let collaborators = Collaborators::unavailable().with_devicetree(Toolchain(parsed));
        let mut options = WalkOptions::default();
        options.rules = sr_config::RuleSet::from_str(
            "rules",
            "- rule: ignore x\n  criteria:\n    devicetree_node: /x\n  update:\n    type: ignored\n\
             - rule: y is bad\n  criteria:\n    devicetree_node: /y\n  update:\n    type: dtc error\n",
        )
        .unwrap();

        let mut evidence = Evidence::new();
        let mut report = Report::quiet();
        let mut ctx = RoleContext {
            collaborators: &collaborators,
            options: &options,
            evidence: &mut evidence,
            report: &mut report,
        };
        check_devicetree(Path::new("dt.dtb"), &mut ctx);

        // One unparsed warning, one error type, one ignored pass
        assert_eq!(report.stats().warning, 1);
        assert_eq!(report.stats().error, 1);
        assert_eq!(report.stats().pass, 1);
    }

    #[test]
    fn test_uefi_sniff() {
        let log = lines(
            " 1A: DevicePath(..) /VenHw(1)/SD(0)/HD(1,GPT) BlockIO(..) EFISystemPartition(..)\nother\n",
        );
        let collaborators = Collaborators::unavailable();
        let (report, evidence) = run(&collaborators, |ctx| check_uefi_sniff(&log, Path::new("sniff.log"), ctx));
        assert_eq!(report.stats().error, 1);
        assert!(evidence.esp_dev_paths.is_empty());

        let log = lines("X1A: DevicePath(..) /VenHw(1)/SD(0)/HD(1,GPT) BlockIO(..) FS EFISystemPartition(..)\n");
        let (report, evidence) = run(&collaborators, |ctx| check_uefi_sniff(&log, Path::new("sniff.log"), ctx));
        assert_eq!(report.stats().pass, 1);
        assert!(evidence.esp_dev_paths.contains("/VenHw(1)/SD(0)/HD(1,GPT)"));
    }

    const SHELL_LOG: &str = concat!(
        "noise\n",
        "UEFI Interactive Shell v2.2\n",
        "EDK II\n",
        "UEFI v2.80 (Das U-Boot, 0x20211000)\n",
        "Mapping table\n",
        "      FS0: Alias(s):HD0b:;BLK1:\n",
        "          /VenHw(e61d73b9)/SD(1)/HD(1,GPT)\n",
        "     BLK0: Alias(s):\n",
        "          /VenHw(e61d73b9)/SD(1)\n",
        "Press ESC in 5 seconds\n",
    );

    #[test]
    fn test_shell_device_paths() {
        assert_eq!(
            shell_device_paths(&lines(SHELL_LOG)),
            vec!["/VenHw(e61d73b9)/SD(1)/HD(1,GPT)", "/VenHw(e61d73b9)/SD(1)"]
        );
        // Banner broken by an unexpected line
        assert!(shell_device_paths(&lines("UEFI Interactive Shell v2.2\nfoo\nEDK II\n")).is_empty());
    }

    #[test]
    fn test_must_have_esp_records_paths() {
        let collaborators = Collaborators::unavailable();
        let log = lines(SHELL_LOG);
        let (report, evidence) = run(&collaborators, |ctx| check_must_have_esp(&log, Path::new("uefi.log"), ctx));
        assert_eq!(report.stats().pass, 1);
        assert_eq!(evidence.dev_paths.len(), 2);
    }

    #[test]
    fn test_report_txt() {
        let collaborators = Collaborators::unavailable();
        let log = lines("# Report\n- Total number of network controllers: 2\n");
        let (report, evidence) = run(&collaborators, |ctx| check_report_txt(&log, Path::new("report.txt"), ctx));
        assert_eq!(report.stats().pass, 1);
        assert_eq!(evidence.reported_network_controllers(), Some(2));

        let (report, _) = run(&collaborators, |ctx| check_report_txt(&lines("nothing\n"), Path::new("report.txt"), ctx));
        assert_eq!(report.stats().error, 1);
    }

    #[test]
    fn test_archive_names() {
        assert!(is_archive(Path::new("logs.tar")));
        assert!(is_archive(Path::new("logs.tar.gz")));
        assert!(is_archive(Path::new("logs.tgz")));
        assert!(!is_archive(Path::new("logs.tar.xz")));
    }
}
