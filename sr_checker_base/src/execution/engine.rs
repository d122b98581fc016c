//! Tree walker
//!
//! Visits the result tree depth-first in tree specification order, verifies
//! every matched artifact and hands the gathered evidence to the deferred
//! checks. Glob matches are visited in sorted order so that two runs over
//! the same tree report the same findings in the same order.

use crate::cache::RegenPolicy;
use crate::classification::EntryFilter;
use crate::execution::content_checks::{self, ContainsAction};
use crate::execution::deferred_ops;
use crate::execution::evidence::Evidence;
use crate::execution::roles::{self, RoleContext};
use crate::log_reader::{read_log, LogReaderOptions};
use crate::results::Report;
use crate::strategies::Collaborators;
use glob::{MatchOptions, Pattern};
use sr_config::logging::codes;
use sr_config::tree::{DirNode, FileNode, SemanticRole, TreeNode};
use sr_config::{log_debug, log_success, RuleSet};
use std::path::{Path, PathBuf};

/// Knobs of one walk
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Report every warn-once occurrence
    pub all: bool,
    /// Drop duplicate devicetree diagnostics
    pub dedupe: bool,
    pub filter: Option<EntryFilter>,
    pub rules: RuleSet,
    /// Overrides the count from report.txt
    pub ethernet_devices: Option<u32>,
    pub block_devices: Option<u32>,
    pub regen: RegenPolicy,
    pub reader: LogReaderOptions,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            all: false,
            dedupe: true,
            filter: None,
            rules: RuleSet::default(),
            ethernet_devices: None,
            block_devices: None,
            regen: RegenPolicy::default(),
            reader: LogReaderOptions::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("Cannot read result root '{path}': {reason}")]
    RootUnreadable { path: PathBuf, reason: String },
}

#[derive(Debug)]
pub struct WalkOutcome {
    pub report: Report,
    pub evidence: Evidence,
}

pub struct TreeWalker<'a> {
    tree: &'a [TreeNode],
    collaborators: &'a Collaborators,
    options: &'a WalkOptions,
    report: Report,
    evidence: Evidence,
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

impl<'a> TreeWalker<'a> {
    pub fn new(tree: &'a [TreeNode], collaborators: &'a Collaborators, options: &'a WalkOptions) -> Self {
        Self {
            tree,
            collaborators,
            options,
            report: Report::new(),
            evidence: Evidence::new(),
        }
    }

    /// Replace the report, e.g. with [`Report::quiet`]
    pub fn with_report(mut self, report: Report) -> Self {
        self.report = report;
        self
    }

    pub fn run(mut self, root: &Path) -> Result<WalkOutcome, WalkError> {
        std::fs::read_dir(root).map_err(|e| WalkError::RootUnreadable {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        log_debug!("Walking result tree", "root" => root.display(), "nodes" => self.tree.len());

        let tree = self.tree;
        self.check_tree(tree, "", root);

        let queue = deferred_ops::standard_queue(tree);
        {
            let mut ctx = RoleContext {
                collaborators: self.collaborators,
                options: self.options,
                evidence: &mut self.evidence,
                report: &mut self.report,
            };
            deferred_ops::execute_all(&queue, &mut ctx);
        }

        for path in &self.evidence.not_checked {
            log_debug!("Not checked", "path" => path.display());
        }
        log_success!(
            codes::success::WALK_COMPLETE,
            "Result tree walked",
            "root" => root.display(),
            "stats" => self.report.stats()
        );

        Ok(WalkOutcome {
            report: self.report,
            evidence: self.evidence,
        })
    }

    fn ctx(&mut self) -> RoleContext<'_> {
        RoleContext {
            collaborators: self.collaborators,
            options: self.options,
            evidence: &mut self.evidence,
            report: &mut self.report,
        }
    }

    fn check_tree(&mut self, tree: &'a [TreeNode], confpath: &str, dir: &Path) {
        for node in tree {
            let pattern = node.pattern();
            let pathname = dir.join(pattern);
            let confpath = format!("{}/{}", confpath, pattern);

            let paths = if is_glob(pattern) {
                let matches = self.expand(dir, pattern);
                if matches.is_empty() {
                    if node.is_optional() {
                        log_debug!("No match for optional pattern", "path" => pathname.display());
                    } else {
                        self.report.error(
                            codes::artifact::MISSING,
                            format!("`{}' missing", pathname.display()),
                        );
                    }
                }
                matches
            } else {
                vec![pathname]
            };

            for path in paths {
                self.evidence.mark_checked(&path);
                match node {
                    TreeNode::File(file) => self.check_file(file, &confpath, &path),
                    TreeNode::Dir(sub) => self.check_dir(sub, &confpath, &path),
                }
            }
        }
    }

    // Sorted matches of a pattern relative to `dir`
    fn expand(&mut self, dir: &Path, pattern: &str) -> Vec<PathBuf> {
        let full = format!("{}/{}", Pattern::escape(&dir.to_string_lossy()), pattern);
        let paths = match glob::glob_with(&full, MATCH_OPTIONS) {
            Ok(paths) => paths,
            Err(e) => {
                self.report.error(
                    codes::configuration::MALFORMED_NODE,
                    format!("Bad pattern `{}': {}", pattern, e),
                );
                return Vec::new();
            }
        };

        let mut matches: Vec<PathBuf> = paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    log_debug!("Skipping unreadable match", "error" => e);
                    None
                }
            })
            .collect();
        matches.sort();
        matches
    }

    fn check_file(&mut self, node: &'a FileNode, confpath: &str, path: &Path) {
        for role in &node.roles {
            if let SemanticRole::SctSummary { seq_file } = role {
                roles::regenerate_sct_summary(seq_file, path, &mut self.ctx());
            }
        }

        if !path.is_file() {
            if node.optional {
                log_debug!("Optional file missing", "path" => path.display());
            } else {
                self.report.error(
                    codes::artifact::MISSING,
                    format!("`{}' missing", path.display()),
                );
            }
            return;
        }

        self.report.pass(format!("`{}' exists", path.display()));
        if let Some(name) = &node.warn_if_not_named {
            content_checks::warn_if_not_named(path, name, &mut self.report);
        }
        if node.min_occurrences.is_some() {
            self.evidence.add_occurrence(confpath, path);
        }

        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            if node.can_be_empty {
                log_debug!("File empty, as allowed", "path" => path.display());
            } else {
                self.report.error(
                    codes::artifact::EMPTY,
                    format!("`{}' empty", path.display()),
                );
            }
            return;
        }
        self.report.pass(format!("`{}' not empty", path.display()));

        let lines = if needs_lines(node) {
            match read_log(path, &self.options.reader) {
                Ok(lines) => Some(lines),
                Err(e) => {
                    self.report
                        .error(codes::artifact::UNREADABLE, e.to_string());
                    None
                }
            }
        } else {
            None
        };

        if let Some(lines) = &lines {
            self.check_content(node, path, lines);
        }

        if roles::is_archive(path) {
            roles::check_archive(path, &mut self.ctx());
        }

        for role in &node.roles {
            roles::verify_role(role, path, lines.as_deref(), &mut self.ctx());
        }
    }

    fn check_content(&mut self, node: &FileNode, path: &Path, lines: &[String]) {
        let all = self.options.all;

        if let Some(patterns) = &node.must_contain {
            content_checks::check_contains(lines, patterns, path, true, &mut self.report);
        }
        if let Some(patterns) = &node.should_contain {
            content_checks::check_contains(lines, patterns, path, false, &mut self.report);
        }

        let forbidden = [
            (&node.warn_if_contains, ContainsAction::Warn),
            (&node.warn_once_if_contains, ContainsAction::WarnOnce),
            (&node.error_if_contains, ContainsAction::Error),
        ];
        for (patterns, action) in forbidden {
            if let Some(patterns) = patterns {
                content_checks::check_if_contains(
                    lines,
                    patterns,
                    path,
                    action,
                    &mut self.evidence.warned_once,
                    all,
                    &mut self.report,
                );
            }
        }
    }

    fn check_dir(&mut self, node: &'a DirNode, confpath: &str, path: &Path) {
        if !path.is_dir() {
            if node.optional {
                log_debug!("Optional directory missing", "path" => path.display());
            } else {
                self.report.error(
                    codes::artifact::MISSING,
                    format!("`{}' missing", path.display()),
                );
            }
            return;
        }

        self.report.pass(format!("`{}' exists", path.display()));
        if let Some(name) = &node.warn_if_not_named {
            content_checks::warn_if_not_named(path, name, &mut self.report);
        }
        if node.min_occurrences.is_some() {
            self.evidence.add_occurrence(confpath, path);
        }

        let entries: Vec<PathBuf> = match std::fs::read_dir(path) {
            Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
            Err(e) => {
                self.report.error(
                    codes::artifact::UNREADABLE,
                    format!("Cannot list `{}': {}", path.display(), e),
                );
                return;
            }
        };
        let count = entries.len() as u32;
        self.evidence.not_checked.extend(entries);

        if count >= node.min_entries {
            self.report.pass(format!(
                "`{}' has {} entries, >= {}",
                path.display(),
                count,
                node.min_entries
            ));
        } else {
            self.report.error(
                codes::artifact::TOO_FEW_ENTRIES,
                format!(
                    "`{}' has too few entries: {} < {}",
                    path.display(),
                    count,
                    node.min_entries
                ),
            );
        }

        if let Some(max) = node.max_entries {
            if count <= max {
                self.report.pass(format!(
                    "`{}' has {} entries, <= {}",
                    path.display(),
                    count,
                    max
                ));
            } else {
                self.report.error(
                    codes::artifact::TOO_MANY_ENTRIES,
                    format!(
                        "`{}' has too many entries: {} > {}",
                        path.display(),
                        count,
                        max
                    ),
                );
            }
        }

        if count > 0 {
            if let Some(tree) = &node.tree {
                self.check_tree(tree, confpath, path);
            }
        }
    }
}

fn needs_lines(node: &FileNode) -> bool {
    node.must_contain.is_some()
        || node.should_contain.is_some()
        || node.warn_if_contains.is_some()
        || node.warn_once_if_contains.is_some()
        || node.error_if_contains.is_some()
        || node.roles.iter().any(|role| {
            matches!(
                role,
                SemanticRole::EsrtTable
                    | SemanticRole::UefiSniff
                    | SemanticRole::MustHaveEsp
                    | SemanticRole::ReportTxt
            )
        })
}

/// Walk `root` against `tree` with the given collaborators
pub fn walk(
    root: &Path,
    tree: &[TreeNode],
    collaborators: &Collaborators,
    options: &WalkOptions,
) -> Result<WalkOutcome, WalkError> {
    TreeWalker::new(tree, collaborators, options).run(root)
}
