//! Command executor for the result checker's external tools

use sr_checker_base::strategies::SystemCommandExecutor;
use std::time::Duration;

/// Names or paths of the external tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub tar: String,
    pub dtc: String,
    pub dt_validate: String,
    /// External capsule tool; the built-in FMP validator is used when unset
    pub capsule_tool: Option<String>,
    /// External GUID tool; the GUID database is used when unset
    pub guid_tool: Option<String>,
    pub sct_parser: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            tar: "tar".to_string(),
            dtc: "dtc".to_string(),
            dt_validate: "dt-validate".to_string(),
            capsule_tool: None,
            guid_tool: None,
            sct_parser: "parser.py".to_string(),
        }
    }
}

impl ToolPaths {
    pub fn all(&self) -> Vec<&str> {
        let mut tools = vec![
            self.tar.as_str(),
            self.dtc.as_str(),
            self.dt_validate.as_str(),
            self.sct_parser.as_str(),
        ];
        tools.extend(self.capsule_tool.as_deref());
        tools.extend(self.guid_tool.as_deref());
        tools
    }
}

/// Create the command executor allowed to run exactly the configured tools
///
/// Whitelist includes:
/// - tar: archive integrity
/// - dtc, dt-validate: devicetree compilation and schema validation
/// - the SCT parser, and the capsule and GUID tools when configured
pub fn create_tool_command_executor(
    tools: &ToolPaths,
    timeout: Option<Duration>,
) -> SystemCommandExecutor {
    let mut executor = SystemCommandExecutor::with_timeout(timeout);
    executor.allow_commands(&tools.all());
    executor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_executor_whitelist() {
        let executor = create_tool_command_executor(&ToolPaths::default(), None);

        assert!(executor.is_allowed("tar"));
        assert!(executor.is_allowed("dtc"));
        assert!(executor.is_allowed("dt-validate"));
        assert!(executor.is_allowed("parser.py"));

        assert!(!executor.is_allowed("rm"));
        assert!(!executor.is_allowed("curl"));
        assert!(!executor.is_allowed("capsule-tool"));
    }

    #[test]
    fn test_optional_tools() {
        let tools = ToolPaths {
            capsule_tool: Some("/opt/sr/capsule-tool.py".to_string()),
            guid_tool: Some("guid-tool.py".to_string()),
            ..ToolPaths::default()
        };
        let executor = create_tool_command_executor(&tools, Some(Duration::from_secs(5)));

        assert!(executor.is_allowed("/opt/sr/capsule-tool.py"));
        assert!(executor.is_allowed("guid-tool.py"));
    }
}
