// src/strategies/traits.rs
//! Collaborator interfaces consumed by the role sub-verifiers
//!
//! Each trait is a narrow request/response seam. Implementations live in
//! the SDK crate and may wrap an external tool or work in-process; tests
//! substitute fakes.

use crate::classification::devicetree_log::ParsedLog;
use crate::guid::Guid;
use crate::strategies::errors::CollaboratorError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveStatus {
    Ok,
    Corrupt(String),
}

/// Integrity check of an archive file
pub trait ArchiveChecker: Send + Sync {
    fn verify(&self, path: &Path) -> Result<ArchiveStatus, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuidLookupResult {
    Known(String),
    Unknown,
}

pub trait GuidLookup: Send + Sync {
    fn lookup(&self, guid: &Guid) -> Result<GuidLookupResult, CollaboratorError>;
}

/// One database may serve both the ESRT check and the capsule validator
impl<T: GuidLookup + ?Sized> GuidLookup for Arc<T> {
    fn lookup(&self, guid: &Guid) -> Result<GuidLookupResult, CollaboratorError> {
        (**self).lookup(guid)
    }
}

/// Known/unknown verdict on a capsule's image type GUID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapsuleGuidStatus {
    Known(String),
    Unknown,
    /// Lookup output was contradictory or missing
    Inconclusive(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsuleReport {
    /// Authenticated capsule in FMP format
    pub valid: bool,
    pub authenticated: bool,
    pub image_type_guid: Option<Guid>,
    pub guid_status: CapsuleGuidStatus,
    /// Problems in check order; mere remarks when the capsule is valid
    pub warnings: Vec<String>,
}

pub trait CapsuleValidator: Send + Sync {
    fn validate(&self, path: &Path) -> Result<CapsuleReport, CollaboratorError>;
}

/// Compiles a devicetree blob, validates it against the bindings and
/// returns the raw diagnostics of both tools
pub trait DevicetreeToolchain: Send + Sync {
    fn compile_and_validate(&self, blob: &Path) -> Result<ParsedLog, CollaboratorError>;
}

/// Regenerates the SCT `result.md` summary
pub trait SctParser: Send + Sync {
    fn parse(&self, sequence_file: &Path, results_file: &Path)
        -> Result<String, CollaboratorError>;

    /// Inputs beyond the two files whose modification makes a summary stale
    fn dependencies(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub passed: bool,
    pub details: Vec<String>,
}

/// Pass/fail scoring of a device test log (ethernet, block devices)
pub trait DeviceScorer: Send + Sync {
    fn score(&self, log: &Path, expected: u32) -> Result<ScoreOutcome, CollaboratorError>;
}
