//! # Results Module
//!
//! Verification report accumulation, run meta-data and the JSON output.

pub mod generator;
pub mod meta;
pub mod types;

pub use generator::{ResultGenerator, RunResult};
pub use meta::{HostContext, MetaData};
pub use types::{maybe_plural, Finding, Report, Severity, Stats};
