//! Checks that run once the whole tree has been visited
//!
//! Sub-verifiers only gather evidence. The walker queues these descriptors
//! and runs them in order against the final evidence.

use crate::execution::roles::RoleContext;
use sr_config::logging::codes;
use sr_config::tree::TreeNode;
use sr_config::{log_debug, log_info};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Ethernet,
    BlockDevices,
}

impl DeviceClass {
    fn noun(&self) -> &'static str {
        match self {
            DeviceClass::Ethernet => "ethernet",
            DeviceClass::BlockDevices => "block",
        }
    }

    fn log_noun(&self) -> &'static str {
        match self {
            DeviceClass::Ethernet => "ethernet log",
            DeviceClass::BlockDevices => "boot sources log",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredCheck {
    /// Every capsule image type GUID shows up in some ESRT dump
    CapsuleGuidsInEsrt,
    /// Every UEFI shell log maps at least one device with an ESP
    UefiLogsEsp,
    /// A configuration path matched often enough across the tree
    MinOccurrences { confpath: String, minimum: u32 },
    /// Device test logs score well for the expected device count
    DeviceLogs(DeviceClass),
}

/// Min-occurrence checks for every node that sets one, in tree order
pub fn min_occurrence_checks(tree: &[TreeNode], confpath: &str) -> Vec<DeferredCheck> {
    let mut checks = Vec::new();
    for node in tree {
        let path = format!("{}/{}", confpath, node.pattern());
        if let Some(minimum) = node.min_occurrences() {
            checks.push(DeferredCheck::MinOccurrences {
                confpath: path.clone(),
                minimum,
            });
        }
        if let TreeNode::Dir(dir) = node {
            if let Some(sub) = &dir.tree {
                checks.extend(min_occurrence_checks(sub, &path));
            }
        }
    }
    checks
}

/// The queue run after every walk
pub fn standard_queue(tree: &[TreeNode]) -> Vec<DeferredCheck> {
    let mut queue = vec![DeferredCheck::CapsuleGuidsInEsrt, DeferredCheck::UefiLogsEsp];
    queue.extend(min_occurrence_checks(tree, ""));
    queue.push(DeferredCheck::DeviceLogs(DeviceClass::Ethernet));
    queue.push(DeferredCheck::DeviceLogs(DeviceClass::BlockDevices));
    queue
}

pub fn execute_all(queue: &[DeferredCheck], ctx: &mut RoleContext) {
    log_debug!("Running deferred checks", "count" => queue.len());
    for check in queue {
        execute(check, ctx);
    }
}

pub fn execute(check: &DeferredCheck, ctx: &mut RoleContext) {
    match check {
        DeferredCheck::CapsuleGuidsInEsrt => capsule_guids_in_esrt(ctx),
        DeferredCheck::UefiLogsEsp => uefi_logs_esp(ctx),
        DeferredCheck::MinOccurrences { confpath, minimum } => {
            min_occurrences(confpath, *minimum, ctx)
        }
        DeferredCheck::DeviceLogs(class) => device_logs(*class, ctx),
    }
}

fn capsule_guids_in_esrt(ctx: &mut RoleContext) {
    for (guid, path) in &ctx.evidence.capsule_guids {
        if ctx.evidence.esrt_guids.contains(guid) {
            ctx.report
                .pass(format!("Capsule GUID `{}' found in ESRT", guid));
        } else {
            ctx.report.error(
                codes::deferred::CAPSULE_GUID_NOT_IN_ESRT,
                format!(
                    "Capsule GUID `{}' from `{}' not found in ESRT",
                    guid,
                    path.display()
                ),
            );
        }
    }
}

fn uefi_logs_esp(ctx: &mut RoleContext) {
    // Group by log in first-seen order
    let mut order: Vec<&PathBuf> = Vec::new();
    let mut found: BTreeMap<&PathBuf, usize> = BTreeMap::new();

    for (dev_path, log) in &ctx.evidence.dev_paths {
        if !found.contains_key(log) {
            order.push(log);
            found.insert(log, 0);
        }
        if ctx.evidence.esp_dev_paths.contains(dev_path) {
            ctx.report
                .pass(format!("ESP `{}' found in `{}'", dev_path, log.display()));
            *found.entry(log).or_default() += 1;
        }
    }

    for log in order {
        if found.get(log).copied().unwrap_or(0) == 0 {
            ctx.report.error(
                codes::deferred::UEFI_LOG_WITHOUT_ESP,
                format!("No ESP found in `{}'", log.display()),
            );
        }
    }
}

fn min_occurrences(confpath: &str, minimum: u32, ctx: &mut RoleContext) {
    let count = ctx.evidence.occurrence_count(confpath);
    log_debug!("Occurrences", "confpath" => confpath, "count" => count, "minimum" => minimum);

    if count >= minimum as usize {
        ctx.report.pass(format!(
            "`{}' occurs {} time(s), >= {}",
            confpath, count, minimum
        ));
    } else {
        ctx.report.error(
            codes::artifact::TOO_FEW_OCCURRENCES,
            format!(
                "`{}' occurs too few times: {} < {}",
                confpath, count, minimum
            ),
        );
    }
}

fn device_logs(class: DeviceClass, ctx: &mut RoleContext) {
    let (expected, logs, scorer) = match class {
        DeviceClass::Ethernet => (
            ctx.options
                .ethernet_devices
                .or_else(|| ctx.evidence.reported_network_controllers())
                .unwrap_or(0),
            ctx.evidence.ethernet_logs.clone(),
            &ctx.collaborators.ethernet,
        ),
        DeviceClass::BlockDevices => (
            ctx.options.block_devices.unwrap_or(0),
            ctx.evidence.boot_logs.clone(),
            &ctx.collaborators.block_devices,
        ),
    };
    log_info!("Expected devices", "class" => class.noun(), "count" => expected, "logs" => logs.len());

    if expected == 0 {
        if !logs.is_empty() {
            ctx.report.warning(
                codes::deferred::UNEXPECTED_DEVICE_LOGS,
                format!(
                    "Found {} {}(s) but no {} device is expected",
                    logs.len(),
                    class.log_noun(),
                    class.noun()
                ),
            );
        }
        return;
    }

    if logs.is_empty() {
        ctx.report.error(
            codes::deferred::DEVICE_LOGS_MISSING,
            format!(
                "Expected {} {} device(s) but no {}",
                expected,
                class.noun(),
                class.log_noun()
            ),
        );
        return;
    }

    for log in &logs {
        match scorer.score(log, expected) {
            Ok(outcome) if outcome.passed => ctx
                .report
                .pass(format!("{} `{}' passed", class.log_noun(), log.display())),
            Ok(outcome) => ctx.report.error(
                codes::deferred::DEVICE_SCORE_FAILED,
                format!(
                    "{} `{}' failed: {}",
                    class.log_noun(),
                    log.display(),
                    outcome.details.join("; ")
                ),
            ),
            Err(e) => ctx.report.error(
                codes::deferred::DEVICE_SCORE_FAILED,
                format!("Cannot score `{}': {}", log.display(), e),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::engine::WalkOptions;
    use crate::execution::evidence::Evidence;
    use crate::guid::Guid;
    use crate::results::Report;
    use crate::strategies::{CollaboratorError, Collaborators, DeviceScorer, ScoreOutcome};
    use std::path::Path;

    struct Threshold;

    impl DeviceScorer for Threshold {
        fn score(&self, log: &Path, expected: u32) -> Result<ScoreOutcome, CollaboratorError> {
            let found: u32 = log
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            Ok(ScoreOutcome {
                passed: found >= expected,
                details: vec![format!("{} < {}", found, expected)],
            })
        }
    }

    fn run(queue: &[DeferredCheck], evidence: &mut Evidence, options: &WalkOptions) -> Report {
        let collaborators = Collaborators::unavailable()
            .with_ethernet(Threshold)
            .with_block_devices(Threshold);
        let mut report = Report::quiet();
        let mut ctx = RoleContext {
            collaborators: &collaborators,
            options,
            evidence,
            report: &mut report,
        };
        execute_all(queue, &mut ctx);
        report
    }

    #[test]
    fn test_min_occurrence_queue_uses_node_paths() {
        let config = sr_config::tree::load_str(
            "t",
            "check-sr-results-configuration:\ntree:\n  - dir: a\n    tree:\n      - file: b\n        min-occurrences: 2\n  - file: c\n    min-occurrences: 1\n",
        )
        .unwrap();
        let queue = standard_queue(&config.tree);
        assert_eq!(queue.len(), 6);
        assert_eq!(
            queue[2],
            DeferredCheck::MinOccurrences {
                confpath: "/a/b".to_string(),
                minimum: 2
            }
        );
        assert_eq!(
            queue[3],
            DeferredCheck::MinOccurrences {
                confpath: "/c".to_string(),
                minimum: 1
            }
        );
    }

    #[test]
    fn test_capsule_guid_in_esrt() {
        let guid: Guid = "6dcbd5ed-e82d-4c44-bda1-7194199ad92a".parse().unwrap();
        let other: Guid = "4aafd29d-68df-49ee-8aa9-347d375665a7".parse().unwrap();
        let mut evidence = Evidence::new();
        evidence.esrt_guids.insert(guid);
        evidence.capsule_guids.push((guid, "a.bin".into()));
        evidence.capsule_guids.push((other, "b.bin".into()));

        let report = run(&[DeferredCheck::CapsuleGuidsInEsrt], &mut evidence, &WalkOptions::default());
        assert_eq!(report.stats().pass, 1);
        assert_eq!(report.stats().error, 1);
    }

    #[test]
    fn test_uefi_logs_esp() {
        let mut evidence = Evidence::new();
        evidence.esp_dev_paths.insert("/HD(1)".to_string());
        evidence.dev_paths.push(("/HD(1)".to_string(), "one.log".into()));
        evidence.dev_paths.push(("/HD(2)".to_string(), "one.log".into()));
        evidence.dev_paths.push(("/HD(3)".to_string(), "two.log".into()));

        let report = run(&[DeferredCheck::UefiLogsEsp], &mut evidence, &WalkOptions::default());
        assert_eq!(report.stats().pass, 1);
        assert_eq!(report.stats().error, 1);
        assert!(report.findings()[0].message.contains("two.log"));
    }

    #[test]
    fn test_min_occurrences() {
        let mut evidence = Evidence::new();
        evidence.add_occurrence("/a", Path::new("x/a"));
        let queue = vec![
            DeferredCheck::MinOccurrences { confpath: "/a".to_string(), minimum: 1 },
            DeferredCheck::MinOccurrences { confpath: "/b".to_string(), minimum: 1 },
        ];
        let report = run(&queue, &mut evidence, &WalkOptions::default());
        assert_eq!(report.stats().pass, 1);
        assert_eq!(report.stats().error, 1);
    }

    #[test]
    fn test_ethernet_expectations() {
        let queue = [DeferredCheck::DeviceLogs(DeviceClass::Ethernet)];

        // Nothing expected, nothing found
        let report = run(&queue, &mut Evidence::new(), &WalkOptions::default());
        assert_eq!(report.stats().check, 0);

        // Logs but nothing expected
        let mut evidence = Evidence::new();
        evidence.ethernet_logs.push("2.log".into());
        let report = run(&queue, &mut evidence, &WalkOptions::default());
        assert_eq!(report.stats().warning, 1);

        // Expected from report.txt but no log
        let mut evidence = Evidence::new();
        evidence
            .report_txt
            .insert(crate::execution::evidence::NETWORK_CONTROLLERS.to_string(), "2".to_string());
        let report = run(&queue, &mut evidence, &WalkOptions::default());
        assert_eq!(report.stats().error, 1);
        assert!(report.findings()[0].message.contains("Expected 2 ethernet device(s)"));

        // Command line wins over report.txt, every log is scored
        evidence.ethernet_logs.push("1.log".into());
        evidence.ethernet_logs.push("3.log".into());
        let options = WalkOptions {
            ethernet_devices: Some(3),
            ..WalkOptions::default()
        };
        let report = run(&queue, &mut evidence, &options);
        assert_eq!(report.stats().error, 1);
        assert_eq!(report.stats().pass, 1);
    }

    #[test]
    fn test_boot_sources_expectations() {
        let queue = [DeferredCheck::DeviceLogs(DeviceClass::BlockDevices)];
        let mut evidence = Evidence::new();
        evidence.boot_logs.push("2.log".into());
        let options = WalkOptions {
            block_devices: Some(2),
            ..WalkOptions::default()
        };
        let report = run(&queue, &mut evidence, &options);
        assert_eq!(report.stats().pass, 1);
        assert_eq!(report.stats().error, 0);
    }
}
