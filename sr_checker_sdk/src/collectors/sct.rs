//! # SCT summary regeneration
//!
//! The external parser writes `result.md` into its working directory; it is
//! run inside a scratch directory and the summary read back from there.

use sr_checker_base::strategies::{which, CollaboratorError, SctParser, SystemCommandExecutor};
use sr_config::log_debug;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const PARSER_OUTPUT: &str = "result.md";

pub struct ExternalSctParser {
    parser: String,
    executor: SystemCommandExecutor,
}

impl ExternalSctParser {
    pub fn new(parser: impl Into<String>, executor: SystemCommandExecutor) -> Self {
        Self {
            parser: parser.into(),
            executor,
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf, CollaboratorError> {
    std::path::absolute(path).map_err(|e| CollaboratorError::io(path, e))
}

impl SctParser for ExternalSctParser {
    fn parse(&self, sequence_file: &Path, results_file: &Path) -> Result<String, CollaboratorError> {
        let scratch = tempfile::tempdir().map_err(|e| CollaboratorError::io(Path::new("."), e))?;
        let args: Vec<OsString> = vec![
            absolute(results_file)?.into_os_string(),
            absolute(sequence_file)?.into_os_string(),
        ];

        let output = self
            .executor
            .execute_in(&self.parser, &args, Some(scratch.path()))?;
        log_debug!(
            "SCT parser finished",
            "exit_code" => output.exit_code,
            "duration_ms" => output.duration.as_millis()
        );

        if !output.success() {
            return Err(CollaboratorError::ToolFailed {
                tool: self.parser.clone(),
                reason: output
                    .stderr
                    .lines()
                    .last()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("exit code {}", output.exit_code)),
            });
        }

        let produced = scratch.path().join(PARSER_OUTPUT);
        fs::read_to_string(&produced).map_err(|e| CollaboratorError::UnexpectedOutput {
            tool: self.parser.clone(),
            reason: format!("no {}: {}", PARSER_OUTPUT, e),
        })
    }

    fn dependencies(&self) -> Vec<PathBuf> {
        which(&self.parser).into_iter().collect()
    }
}
