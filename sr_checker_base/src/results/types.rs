//! # Verification report types
//!
//! The report counts every check and keeps the warnings and errors in the
//! order they were found. Findings are forwarded to the global logger as
//! they are recorded, so console output follows traversal order.

use serde::Serialize;
use sr_config::logging::{self, Code, LogEvent};
use sr_config::log_debug;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One recorded warning or error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

/// Singular for counts below two and for words ending in `d` or `s`
pub fn maybe_plural(n: u32, word: &str) -> String {
    if n < 2 || word.ends_with(['d', 's', 'D', 'S']) {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

fn counted(n: u32, word: &str) -> String {
    format!("{} {}", n, maybe_plural(n, word))
}

/// Check counters; every pass, warning and error is also a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub check: u32,
    pub pass: u32,
    pub warning: u32,
    pub error: u32,
}

impl Stats {
    pub fn inc_pass(&mut self) {
        self.pass += 1;
        self.check += 1;
    }

    pub fn inc_warning(&mut self) {
        self.warning += 1;
        self.check += 1;
    }

    pub fn inc_error(&mut self) {
        self.error += 1;
        self.check += 1;
    }

    pub fn add(&mut self, other: &Stats) {
        self.check += other.check;
        self.pass += other.pass;
        self.warning += other.warning;
        self.error += other.error;
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            counted(self.check, "check"),
            counted(self.pass, "pass"),
            counted(self.warning, "warning"),
            counted(self.error, "error"),
        )
    }
}

/// Accumulator owned by the walker for one run
#[derive(Debug, Default)]
pub struct Report {
    stats: Stats,
    findings: Vec<Finding>,
    quiet: bool,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record without forwarding anything to the logger
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }

    pub fn pass(&mut self, message: impl AsRef<str>) {
        self.stats.inc_pass();
        if !self.quiet {
            log_debug!(message.as_ref());
        }
    }

    pub fn warning(&mut self, code: Code, message: impl Into<String>) {
        self.stats.inc_warning();
        self.record(Severity::Warning, code, message.into());
    }

    pub fn error(&mut self, code: Code, message: impl Into<String>) {
        self.stats.inc_error();
        self.record(Severity::Error, code, message.into());
    }

    fn record(&mut self, severity: Severity, code: Code, message: String) {
        if !self.quiet {
            let event = match severity {
                Severity::Warning => LogEvent::warning_with_code(code, &message),
                Severity::Error => LogEvent::error(code, &message),
            };
            logging::log_event(event);
        }
        self.findings.push(Finding {
            severity,
            code: code.as_str(),
            message,
        });
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }

    /// `<identification>, N warning, M error`
    pub fn summary_line(&self, identification: &str) -> String {
        format!(
            "{}, {}, {}",
            identification,
            counted(self.stats.warning, "warning"),
            counted(self.stats.error, "error"),
        )
    }

    /// Zero exactly when no error was recorded
    pub fn exit_code(&self) -> i32 {
        if self.stats.error == 0 {
            0
        } else {
            1
        }
    }
}
