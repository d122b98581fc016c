//! Devicetree tool log parsing and summary
//!
//! Logs interleave dtc and dt-validate output with `+ ` shell trace lines.
//! Multi-line dt-validate warnings continue with tab-indented lines and are
//! flushed on the first line that does not continue them.

use crate::classification::entry::{DiagnosticEntry, DTC_WARNING, DT_VALIDATE_WARNING, IGNORED};
use regex::Regex;
use sr_config::config::compile_time::devicetree::MAX_MESSAGE_LENGTH;
use sr_config::logging::events::truncate_message;
use sr_config::{log_debug, log_warning};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static SCHEMA_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\tFrom schema: (.*)").expect("schema pattern is valid"));
static CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\t(.*)").expect("continuation pattern is valid"));
static SHELL_TRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+ .*").expect("trace pattern is valid"));
static DTC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]+):(?:[\d\.]+-[\d\.]+:)? Warning \(([^\)]+)\): (.+): (.*)")
        .expect("dtc pattern is valid")
});
static DT_VALIDATE_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]+):\d+:\d+: ([^:]+): (.*)").expect("single-line pattern is valid")
});
static DT_VALIDATE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(/[^:]+): ([^:]+): (.*)").expect("start pattern is valid"));
static TABS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t+").expect("tab pattern is valid"));

/// Entries parsed from one log plus the lines nothing recognised
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLog {
    pub entries: Vec<DiagnosticEntry>,
    pub unparsed: Vec<(usize, String)>,
}

struct Pending {
    entry: DiagnosticEntry,
    lines: Vec<String>,
}

impl Pending {
    fn finish(mut self) -> DiagnosticEntry {
        self.entry.line = self.lines.concat();
        self.entry
    }
}

fn group(caps: &regex::Captures<'_>, i: usize) -> String {
    caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default()
}

pub fn parse_devicetree_log<S: AsRef<str>>(lines: &[S]) -> ParsedLog {
    let mut parsed = ParsedLog::default();
    let mut pending: Option<Pending> = None;

    for (i, raw) in lines.iter().enumerate() {
        let line = raw.as_ref().trim_end();

        if let Some(current) = pending.as_mut() {
            if let Some(caps) = SCHEMA_CONTINUATION.captures(line) {
                current.lines.push(line.to_string());
                current.entry.dt_validate_schema = Some(group(&caps, 1));
                continue;
            }
            if CONTINUATION.is_match(line) {
                current.lines.push(line.to_string());
                current
                    .entry
                    .warning_message
                    .push_str(&TABS.replace_all(line, " "));
                continue;
            }
        }
        if let Some(done) = pending.take() {
            parsed.entries.push(done.finish());
        }

        if SHELL_TRACE.is_match(line) {
            continue;
        }

        if let Some(caps) = DTC.captures(line) {
            parsed.entries.push(DiagnosticEntry {
                file: group(&caps, 1),
                linenum: i + 1,
                line: line.to_string(),
                devicetree_node: group(&caps, 3),
                warning_message: group(&caps, 4),
                kind: DTC_WARNING.to_string(),
                dtc_warning_name: Some(group(&caps, 2)),
                ..Default::default()
            });
            continue;
        }

        if let Some(caps) = DT_VALIDATE_SINGLE.captures(line) {
            parsed.entries.push(DiagnosticEntry {
                file: group(&caps, 1),
                linenum: i + 1,
                line: line.to_string(),
                devicetree_node: group(&caps, 2),
                warning_message: group(&caps, 3),
                kind: DT_VALIDATE_WARNING.to_string(),
                ..Default::default()
            });
            continue;
        }

        if let Some(caps) = DT_VALIDATE_START.captures(line) {
            pending = Some(Pending {
                entry: DiagnosticEntry {
                    file: group(&caps, 1),
                    linenum: i + 1,
                    devicetree_node: group(&caps, 2),
                    warning_message: group(&caps, 3),
                    kind: DT_VALIDATE_WARNING.to_string(),
                    ..Default::default()
                },
                lines: vec![line.to_string()],
            });
            continue;
        }

        log_warning!("Unparsed line", "line" => i + 1, "text" => line);
        parsed.unparsed.push((i + 1, line.to_string()));
    }

    if let Some(done) = pending.take() {
        parsed.entries.push(done.finish());
    }

    log_debug!(
        "Parsed devicetree log",
        "entries" => parsed.entries.len(),
        "unparsed" => parsed.unparsed.len()
    );
    parsed
}

/// Entry count per type, in type order
pub fn summarize(entries: &[DiagnosticEntry]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.kind.clone()).or_insert(0) += 1;
    }
    counts
}

/// `(node, type, message)` rows for the entries not classified as ignored
pub fn non_ignored(entries: &[DiagnosticEntry]) -> Vec<(String, String, String)> {
    entries
        .iter()
        .filter(|e| e.kind != IGNORED)
        .map(|e| {
            (
                e.devicetree_node.clone(),
                e.kind.clone(),
                truncate_message(&e.warning_message, MAX_MESSAGE_LENGTH),
            )
        })
        .collect()
}

/// Render rows under a title, first column right-justified
pub fn render_table(title: &str, rows: &[Vec<String>]) -> String {
    let columns = rows.first().map(Vec::len).unwrap_or(0);
    let mut widths = vec![0; columns.saturating_sub(1)];
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = format!("{}\n{}\n", title, "-".repeat(title.chars().count()));
    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            match widths.get(i) {
                Some(&w) if i == 0 => line.push_str(&format!("{:>w$}", cell, w = w)),
                Some(&w) => line.push_str(&format!("  {:<w$}", cell, w = w)),
                None if i == 0 => line.push_str(cell),
                None => line.push_str(&format!("  {}", cell)),
            }
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "+ DTC\n\
dump.dts:147.3-28: Warning (clocks_property): /pl011@9040000:clocks: cell 0 is not a phandle reference\n\
dump.dts: Warning (avoid_unnecessary_addr_size): /gpio-keys: unnecessary #address-cells\n\
+ DT-VALIDATE\n\
qemu.dtb:0:0: /platform@c000000: failed to match any schema with compatible: ['qemu,platform']\n\
/home/u/dump.dtb: pl061@9030000: $nodename:0: 'pl061@9030000' does not match\n\
\t'arm,armv8-timer' is not one of\n\
\tFrom schema: /schemas/gpio.yaml\n\
garbage here\n\
+ END\n";

    fn lines() -> Vec<String> {
        LOG.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_log_kinds() {
        let parsed = parse_devicetree_log(&lines());
        assert_eq!(parsed.entries.len(), 4);

        let dtc = &parsed.entries[0];
        assert_eq!(dtc.kind, DTC_WARNING);
        assert_eq!(dtc.file, "dump.dts");
        assert_eq!(dtc.dtc_warning_name.as_deref(), Some("clocks_property"));
        assert_eq!(dtc.devicetree_node, "/pl011@9040000:clocks");
        assert_eq!(dtc.warning_message, "cell 0 is not a phandle reference");
        assert_eq!(dtc.linenum, 2);

        assert_eq!(parsed.entries[1].devicetree_node, "/gpio-keys");

        let single = &parsed.entries[2];
        assert_eq!(single.kind, DT_VALIDATE_WARNING);
        assert_eq!(single.file, "qemu.dtb");
        assert_eq!(single.devicetree_node, "/platform@c000000");
    }

    #[test]
    fn test_multi_line_entry() {
        let parsed = parse_devicetree_log(&lines());
        let multi = &parsed.entries[3];
        assert_eq!(multi.file, "/home/u/dump.dtb");
        assert_eq!(multi.devicetree_node, "pl061@9030000");
        assert_eq!(multi.linenum, 6);
        assert_eq!(
            multi.warning_message,
            "$nodename:0: 'pl061@9030000' does not match 'arm,armv8-timer' is not one of"
        );
        assert_eq!(multi.dt_validate_schema.as_deref(), Some("/schemas/gpio.yaml"));
        assert!(multi.line.starts_with("/home/u/dump.dtb"));
        assert!(multi.line.ends_with("/schemas/gpio.yaml"));

        assert_eq!(parsed.unparsed, vec![(9, "garbage here".to_string())]);
    }

    #[test]
    fn test_pending_entry_flushed_at_end() {
        let parsed = parse_devicetree_log(&["/a.dtb: node: msg", "\tmore"]);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].warning_message, "msg more");
        assert!(parsed.unparsed.is_empty());
    }

    #[test]
    fn test_summary_and_truncation() {
        let mut entries = parse_devicetree_log(&lines()).entries;
        entries[0].kind = IGNORED.to_string();
        entries[1].warning_message = "x".repeat(MAX_MESSAGE_LENGTH + 10);

        let summary = summarize(&entries);
        assert_eq!(
            summary.into_iter().collect::<Vec<_>>(),
            vec![
                (DT_VALIDATE_WARNING.to_string(), 2),
                (DTC_WARNING.to_string(), 1),
                (IGNORED.to_string(), 1),
            ]
        );

        let rows = non_ignored(&entries);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].2.chars().count(), MAX_MESSAGE_LENGTH);
        assert!(rows[0].2.ends_with("..."));
    }

    #[test]
    fn test_render_table() {
        let rows = vec![
            vec!["1".to_string(), "ignored".to_string()],
            vec!["12".to_string(), "dtc warning".to_string()],
        ];
        assert_eq!(
            render_table("Summary", &rows),
            "Summary\n-------\n 1  ignored\n12  dtc warning\n"
        );
    }
}
