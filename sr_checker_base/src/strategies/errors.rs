// src/strategies/errors.rs
//! Collaborator failures
//!
//! Every variant ends up as a report error on the artifact being verified;
//! none of them stops the walk.

use crate::strategies::command_executor::CommandError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Unexpected output from {tool}: {reason}")]
    UnexpectedOutput { tool: String, reason: String },

    #[error("Cannot access '{path}': {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Invalid data in '{path}': {reason}")]
    InvalidData { path: PathBuf, reason: String },

    #[error("No {0} configured")]
    Unavailable(&'static str),
}

impl CollaboratorError {
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason: error.to_string(),
        }
    }
}
