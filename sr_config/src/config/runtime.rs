// RUNTIME PREFERENCES (User Experience)

use super::compile_time;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingPreferences {
    /// Whether to use structured JSON logging
    pub use_structured_logging: bool,

    /// Minimum level printed to the console
    pub min_log_level: LogLevel,
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            use_structured_logging: env::var(env_vars::LOGGING_USE_STRUCTURED)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            min_log_level: env::var(env_vars::LOGGING_MIN_LEVEL)
                .ok()
                .and_then(|v| parse_log_level(&v))
                .unwrap_or(LogLevel::Info),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPreferences {
    /// Timeout applied to external tools, in seconds (0 disables it)
    pub timeout_seconds: u64,
}

impl ToolPreferences {
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for ToolPreferences {
    fn default() -> Self {
        Self {
            timeout_seconds: env::var(env_vars::TOOL_TIMEOUT_SECS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(compile_time::tools::DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePreferences {
    /// Directory holding regenerated artifacts; `None` keeps them next to their inputs
    pub cache_dir: Option<PathBuf>,
}

impl Default for CachePreferences {
    fn default() -> Self {
        Self {
            cache_dir: env::var(env_vars::CACHE_DIR)
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Convert to events::LogLevel for compatibility
    pub fn to_events_log_level(&self) -> crate::logging::events::LogLevel {
        match self {
            LogLevel::Error => crate::logging::events::LogLevel::Error,
            LogLevel::Warning => crate::logging::events::LogLevel::Warning,
            LogLevel::Info => crate::logging::events::LogLevel::Info,
            LogLevel::Debug => crate::logging::events::LogLevel::Debug,
        }
    }
}

/// Parse log level from string (used for environment variables)
pub fn parse_log_level(level: &str) -> Option<LogLevel> {
    match level.to_lowercase().as_str() {
        "error" | "0" => Some(LogLevel::Error),
        "warning" | "warn" | "1" => Some(LogLevel::Warning),
        "info" | "2" => Some(LogLevel::Info),
        "debug" | "3" => Some(LogLevel::Debug),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub logging: LoggingPreferences,
    pub tools: ToolPreferences,
    pub cache: CachePreferences,
}

/// Environment variable names for configuration
pub mod env_vars {
    // Logging
    pub const LOGGING_USE_STRUCTURED: &str = "SR_LOGGING_USE_STRUCTURED";
    pub const LOGGING_MIN_LEVEL: &str = "SR_LOGGING_MIN_LEVEL";

    // Tools
    pub const TOOL_TIMEOUT_SECS: &str = "SR_TOOL_TIMEOUT_SECS";

    // Cache
    pub const CACHE_DIR: &str = "SR_CACHE_DIR";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("error"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("ERROR"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("0"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("warn"), Some(LogLevel::Warning));
        assert_eq!(parse_log_level("warning"), Some(LogLevel::Warning));
        assert_eq!(parse_log_level("info"), Some(LogLevel::Info));
        assert_eq!(parse_log_level("debug"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level("3"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level("invalid"), None);
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let prefs = ToolPreferences { timeout_seconds: 0 };
        assert_eq!(prefs.timeout(), None);

        let prefs = ToolPreferences { timeout_seconds: 7 };
        assert_eq!(prefs.timeout(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_env_var_names_exist() {
        assert!(env_vars::LOGGING_MIN_LEVEL.starts_with("SR_"));
        assert!(env_vars::TOOL_TIMEOUT_SECS.starts_with("SR_"));
        assert!(env_vars::CACHE_DIR.starts_with("SR_"));
    }
}
