//! Ordered first-match classification
//!
//! Each entry is tested against the rules in file order. The first rule
//! whose criteria all match rewrites the entry and stamps it with the rule
//! name; no later rule is ever tried on that entry.

use crate::classification::entry::DiagnosticEntry;
use sr_config::dt_rules::{ClassificationRule, RuleSet};
use sr_config::log_debug;
use std::collections::HashSet;

/// Index of the first matching rule, if any
pub fn first_match<'a>(
    entry: &DiagnosticEntry,
    rules: &'a [ClassificationRule],
) -> Option<(usize, &'a ClassificationRule)> {
    rules
        .iter()
        .enumerate()
        .find(|(_, rule)| entry.matches(&rule.criteria))
}

/// Apply the first matching rule to one entry; returns whether one matched
pub fn classify_entry(entry: &mut DiagnosticEntry, rules: &RuleSet) -> bool {
    let Some((index, rule)) = first_match(entry, &rules.rules) else {
        return false;
    };

    log_debug!(
        "Applying rule",
        "index" => index,
        "rule" => rule.name,
        "node" => entry.devicetree_node
    );
    for (key, value) in &rule.update {
        entry.set(key, value);
    }
    entry.updated_by_rule = Some(rule.name.clone());
    true
}

/// Classify every entry independently; returns the number updated
pub fn classify(entries: &mut [DiagnosticEntry], rules: &RuleSet) -> usize {
    let updated = entries
        .iter_mut()
        .map(|entry| classify_entry(entry, rules))
        .filter(|matched| *matched)
        .count();
    log_debug!("Updated entries with rules", "updated" => updated, "total" => entries.len());
    updated
}

/// Keep the first of entries with the same file, node and message
pub fn dedupe(entries: Vec<DiagnosticEntry>) -> Vec<DiagnosticEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| {
            seen.insert((
                e.file.clone(),
                e.devicetree_node.clone(),
                e.warning_message.clone(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::entry::{DTC_WARNING, IGNORED};

    fn rules(yaml: &str) -> RuleSet {
        RuleSet::from_str("rules", yaml).unwrap()
    }

    fn entry(node: &str, message: &str) -> DiagnosticEntry {
        DiagnosticEntry {
            file: "f.dts".into(),
            linenum: 1,
            devicetree_node: node.into(),
            warning_message: message.into(),
            kind: DTC_WARNING.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_match_wins() {
        let set = rules(
            "- rule: first\n  criteria:\n    devicetree_node: /cpus\n  update:\n    type: ignored\n\
             - rule: second\n  criteria:\n    devicetree_node: /cpus\n  update:\n    type: error\n    extra_key: second\n",
        );
        let mut entries = vec![entry("/cpus/cpu@0", "m")];
        assert_eq!(classify(&mut entries, &set), 1);
        assert_eq!(entries[0].kind, IGNORED);
        assert_eq!(entries[0].updated_by_rule.as_deref(), Some("first"));
        assert!(entries[0].extra.is_empty());
    }

    #[test]
    fn test_empty_criteria_matches_everything() {
        let set = rules("- rule: all\n  update:\n    type: error\n");
        let mut entries = vec![entry("/a", "m"), entry("/b", "n")];
        assert_eq!(classify(&mut entries, &set), 2);
        assert!(entries.iter().all(|e| e.kind == "error"));
    }

    #[test]
    fn test_no_match_keeps_type() {
        let set = rules("- rule: other\n  criteria:\n    warning_message: zzz\n  update:\n    type: error\n");
        let mut entries = vec![entry("/a", "m")];
        assert_eq!(classify(&mut entries, &set), 0);
        assert_eq!(entries[0].kind, DTC_WARNING);
        assert_eq!(entries[0].updated_by_rule, None);
    }

    #[test]
    fn test_single_pass() {
        // A second pass sees the rewritten type and may match differently
        let set = rules(
            "- rule: by-type\n  criteria:\n    type: error\n  update:\n    type: ignored\n\
             - rule: to-error\n  criteria:\n    type: warning\n  update:\n    type: error\n",
        );
        let mut entries = vec![entry("/a", "m")];
        classify(&mut entries, &set);
        assert_eq!(entries[0].kind, "error");
        classify(&mut entries, &set);
        assert_eq!(entries[0].kind, IGNORED);
    }

    #[test]
    fn test_dedupe() {
        let mut other_line = entry("/a", "m");
        other_line.linenum = 9;
        let entries = vec![entry("/a", "m"), other_line, entry("/a", "n")];
        let kept = dedupe(entries);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].linenum, 1);
    }
}
