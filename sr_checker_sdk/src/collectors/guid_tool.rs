//! # External GUID tool
//!
//! Prints `Unknown` or the description of a known GUID.

use sr_checker_base::guid::Guid;
use sr_checker_base::strategies::{
    CollaboratorError, GuidLookup, GuidLookupResult, SystemCommandExecutor,
};
use sr_config::log_debug;

pub struct ExternalGuidTool {
    tool: String,
    executor: SystemCommandExecutor,
}

impl ExternalGuidTool {
    pub fn new(tool: impl Into<String>, executor: SystemCommandExecutor) -> Self {
        Self {
            tool: tool.into(),
            executor,
        }
    }
}

pub fn interpret_output(stdout: &str) -> Option<GuidLookupResult> {
    match stdout.trim() {
        "" => None,
        "Unknown" => Some(GuidLookupResult::Unknown),
        description => Some(GuidLookupResult::Known(description.to_string())),
    }
}

impl GuidLookup for ExternalGuidTool {
    fn lookup(&self, guid: &Guid) -> Result<GuidLookupResult, CollaboratorError> {
        let output = self.executor.execute(&self.tool, &[guid.to_string()])?;
        log_debug!("GUID tool finished", "guid" => guid, "exit_code" => output.exit_code);

        if !output.success() {
            return Err(CollaboratorError::ToolFailed {
                tool: self.tool.clone(),
                reason: format!("exit code {}", output.exit_code),
            });
        }

        interpret_output(&output.stdout).ok_or_else(|| CollaboratorError::UnexpectedOutput {
            tool: self.tool.clone(),
            reason: "empty output".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_output() {
        assert_eq!(interpret_output("Unknown\n"), Some(GuidLookupResult::Unknown));
        assert_eq!(
            interpret_output("EFI System Resource Table\n"),
            Some(GuidLookupResult::Known("EFI System Resource Table".to_string()))
        );
        assert_eq!(interpret_output("\n"), None);
    }
}
