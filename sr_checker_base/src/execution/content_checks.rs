//! Line-based content constraints

use crate::results::Report;
use glob::Pattern;
use sr_config::logging::codes;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainsAction {
    Warn,
    WarnOnce,
    Error,
}

/// Position just past a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    line: usize,
    column: usize,
}

fn find_from<S: AsRef<str>>(lines: &[S], from: Cursor, pattern: &str) -> Option<(usize, usize)> {
    lines
        .iter()
        .enumerate()
        .skip(from.line)
        .find_map(|(i, line)| {
            let line = line.as_ref();
            let start = if i == from.line { from.column.min(line.len()) } else { 0 };
            line.get(start..)
                .and_then(|rest| rest.find(pattern))
                .map(|col| (i, start + col))
        })
}

/// Look for `patterns` in order, each after the end of the previous match
///
/// Every found pattern counts a pass; the first one missing is an error
/// when `required`, a warning otherwise, and stops the search.
pub fn check_contains<S: AsRef<str>>(
    lines: &[S],
    patterns: &[String],
    path: &Path,
    required: bool,
    report: &mut Report,
) {
    let mut cursor = Cursor { line: 0, column: 0 };

    for pattern in patterns {
        match find_from(lines, cursor, pattern) {
            Some((line, column)) => {
                report.pass(format!(
                    "`{}' found at line {} in `{}'",
                    pattern,
                    line + 1,
                    path.display()
                ));
                cursor = Cursor {
                    line,
                    column: column + pattern.len(),
                };
            }
            None => {
                let message = format!("Could not find `{}' in `{}'", pattern, path.display());
                if required {
                    report.error(codes::content::REQUIRED_TEXT_MISSING, message);
                } else {
                    report.warning(codes::content::SUGGESTED_TEXT_MISSING, message);
                }
                return;
            }
        }
    }
}

/// Report every occurrence of any of `patterns`
///
/// With `WarnOnce` a pattern is reported the first time it is met during
/// the run only, unless `all` is set. A pass is counted when no pattern
/// occurs at all.
pub fn check_if_contains<S: AsRef<str>>(
    lines: &[S],
    patterns: &[String],
    path: &Path,
    action: ContainsAction,
    warned_once: &mut HashSet<String>,
    all: bool,
    report: &mut Report,
) {
    let mut found = false;

    for (i, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        for pattern in patterns.iter().filter(|p| !p.is_empty()) {
            for (column, _) in line.match_indices(pattern.as_str()) {
                found = true;
                let message = format!(
                    "`{}' found in `{}' at line {}, column {}: `{}'",
                    pattern,
                    path.display(),
                    i + 1,
                    column + 1,
                    line
                );
                match action {
                    ContainsAction::Error => {
                        report.error(codes::content::FORBIDDEN_TEXT_FOUND, message)
                    }
                    ContainsAction::Warn => {
                        report.warning(codes::content::DISCOURAGED_TEXT_FOUND, message)
                    }
                    ContainsAction::WarnOnce => {
                        let first = warned_once.insert(pattern.clone());
                        if all {
                            report.warning(codes::content::DISCOURAGED_TEXT_FOUND, message);
                        } else if first {
                            report.warning(
                                codes::content::DISCOURAGED_TEXT_FOUND,
                                format!("{} (warning once)", message),
                            );
                        }
                    }
                }
            }
        }
    }

    if !found && !patterns.is_empty() {
        report.pass(format!("No pattern in `{}'", path.display()));
    }
}

/// Warn when the base name of `path` does not match the glob `pattern`
pub fn warn_if_not_named(path: &Path, pattern: &str, report: &mut Report) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let named = match Pattern::new(pattern) {
        Ok(glob) => glob.matches(&name),
        Err(_) => name == pattern,
    };

    if named {
        report.pass(format!("`{}' named in `{}'", path.display(), pattern));
    } else {
        report.warning(
            codes::artifact::NOT_NAMED,
            format!("`{}' not named in `{}'", path.display(), pattern),
        );
    }
}
