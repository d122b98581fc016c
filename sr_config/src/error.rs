//! Fatal configuration errors
//!
//! Everything in here aborts a run before the walk starts.

use crate::logging::codes;
use crate::logging::Code;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read `{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in `{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error("Malformed tree node at {location}: {reason}")]
    MalformedNode { location: String, reason: String },

    #[error("`{path}' has no `{marker}' marker")]
    MissingMarker { path: String, marker: &'static str },

    #[error("Invalid overlay {index}: {reason}")]
    InvalidOverlay { index: usize, reason: String },

    #[error("DELETE for `{key}' outside an overlay at {location}")]
    DeleteOutsideOverlay { key: String, location: String },

    #[error("Duplicate {kind} `{name}' in `{path}'")]
    Duplicate {
        kind: &'static str,
        name: String,
        path: String,
    },

    #[error("Rule `{rule}' uses unknown field `{field}'")]
    UnknownField { rule: String, field: String },

    #[error("Invalid filter `{expression}': {reason}")]
    InvalidFilter { expression: String, reason: String },
}

impl ConfigError {
    /// Logging code for this error
    pub fn error_code(&self) -> Code {
        match self {
            ConfigError::Unreadable { .. } => codes::configuration::FILE_NOT_READABLE,
            ConfigError::Parse { .. } => codes::configuration::PARSE_ERROR,
            ConfigError::MalformedNode { .. } => codes::configuration::MALFORMED_NODE,
            ConfigError::MissingMarker { .. } => codes::configuration::MISSING_MARKER,
            ConfigError::InvalidOverlay { .. } => codes::configuration::INVALID_OVERLAY,
            ConfigError::DeleteOutsideOverlay { .. } => {
                codes::configuration::DELETE_OUTSIDE_OVERLAY
            }
            ConfigError::Duplicate { .. } => codes::configuration::DUPLICATE_RULE,
            ConfigError::UnknownField { .. } => codes::configuration::UNKNOWN_FIELD,
            ConfigError::InvalidFilter { .. } => codes::configuration::INVALID_FILTER,
        }
    }
}

/// Read a configuration file, mapping I/O failures to `ConfigError`
pub fn read_config_file(path: &std::path::Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse YAML text into a generic value, treating an empty document as null
pub fn parse_yaml(path: &str, text: &str) -> Result<serde_yaml::Value, ConfigError> {
    if text.trim().is_empty() {
        return Ok(serde_yaml::Value::Null);
    }
    serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ConfigError::MalformedNode {
            location: "tree[0]".to_string(),
            reason: "both file and dir".to_string(),
        };
        assert_eq!(err.error_code().as_str(), "E003");
        assert!(err.to_string().contains("tree[0]"));
    }

    #[test]
    fn test_empty_yaml_is_null() {
        assert_eq!(parse_yaml("x", "  \n").unwrap(), serde_yaml::Value::Null);
        assert!(parse_yaml("x", "a: [").is_err());
    }
}
