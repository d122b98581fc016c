//! Command execution configuration
//!
//! Provides the whitelisted command executor the tool collaborators share.

pub mod tools;

pub use tools::{create_tool_command_executor, ToolPaths};
