// src/strategies/registry.rs
//! Collaborator registry handed to the walker
//!
//! Every slot starts out with an implementation that fails with
//! `CollaboratorError::Unavailable`, so a role whose tool was never
//! configured is reported as an error on the artifact instead of aborting.

use crate::classification::devicetree_log::ParsedLog;
use crate::guid::Guid;
use crate::strategies::errors::CollaboratorError;
use crate::strategies::traits::{
    ArchiveChecker, ArchiveStatus, CapsuleReport, CapsuleValidator, DeviceScorer,
    DevicetreeToolchain, GuidLookup, GuidLookupResult, SctParser, ScoreOutcome,
};
use std::path::Path;

pub struct Collaborators {
    pub archive: Box<dyn ArchiveChecker>,
    pub capsule: Box<dyn CapsuleValidator>,
    pub guid_lookup: Box<dyn GuidLookup>,
    pub devicetree: Box<dyn DevicetreeToolchain>,
    pub sct_parser: Box<dyn SctParser>,
    pub ethernet: Box<dyn DeviceScorer>,
    pub block_devices: Box<dyn DeviceScorer>,
}

struct Unavailable(&'static str);

impl ArchiveChecker for Unavailable {
    fn verify(&self, _: &Path) -> Result<ArchiveStatus, CollaboratorError> {
        Err(CollaboratorError::Unavailable(self.0))
    }
}

impl CapsuleValidator for Unavailable {
    fn validate(&self, _: &Path) -> Result<CapsuleReport, CollaboratorError> {
        Err(CollaboratorError::Unavailable(self.0))
    }
}

impl GuidLookup for Unavailable {
    fn lookup(&self, _: &Guid) -> Result<GuidLookupResult, CollaboratorError> {
        Err(CollaboratorError::Unavailable(self.0))
    }
}

impl DevicetreeToolchain for Unavailable {
    fn compile_and_validate(&self, _: &Path) -> Result<ParsedLog, CollaboratorError> {
        Err(CollaboratorError::Unavailable(self.0))
    }
}

impl SctParser for Unavailable {
    fn parse(&self, _: &Path, _: &Path) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable(self.0))
    }
}

impl DeviceScorer for Unavailable {
    fn score(&self, _: &Path, _: u32) -> Result<ScoreOutcome, CollaboratorError> {
        Err(CollaboratorError::Unavailable(self.0))
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::unavailable()
    }
}

impl Collaborators {
    pub fn unavailable() -> Self {
        Self {
            archive: Box::new(Unavailable("archive checker")),
            capsule: Box::new(Unavailable("capsule validator")),
            guid_lookup: Box::new(Unavailable("GUID lookup")),
            devicetree: Box::new(Unavailable("devicetree toolchain")),
            sct_parser: Box::new(Unavailable("SCT parser")),
            ethernet: Box::new(Unavailable("ethernet scorer")),
            block_devices: Box::new(Unavailable("block device scorer")),
        }
    }

    pub fn with_archive(mut self, archive: impl ArchiveChecker + 'static) -> Self {
        self.archive = Box::new(archive);
        self
    }

    pub fn with_capsule(mut self, capsule: impl CapsuleValidator + 'static) -> Self {
        self.capsule = Box::new(capsule);
        self
    }

    pub fn with_guid_lookup(mut self, lookup: impl GuidLookup + 'static) -> Self {
        self.guid_lookup = Box::new(lookup);
        self
    }

    pub fn with_devicetree(mut self, toolchain: impl DevicetreeToolchain + 'static) -> Self {
        self.devicetree = Box::new(toolchain);
        self
    }

    pub fn with_sct_parser(mut self, parser: impl SctParser + 'static) -> Self {
        self.sct_parser = Box::new(parser);
        self
    }

    pub fn with_ethernet(mut self, scorer: impl DeviceScorer + 'static) -> Self {
        self.ethernet = Box::new(scorer);
        self
    }

    pub fn with_block_devices(mut self, scorer: impl DeviceScorer + 'static) -> Self {
        self.block_devices = Box::new(scorer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct AlwaysOk;

    impl ArchiveChecker for AlwaysOk {
        fn verify(&self, _: &Path) -> Result<ArchiveStatus, CollaboratorError> {
            Ok(ArchiveStatus::Ok)
        }
    }

    #[test]
    fn test_unavailable_defaults() {
        let c = Collaborators::default();
        assert_matches!(
            c.archive.verify(Path::new("x.tar")),
            Err(CollaboratorError::Unavailable("archive checker"))
        );
        assert_matches!(
            c.ethernet.score(Path::new("eth.log"), 1),
            Err(CollaboratorError::Unavailable(_))
        );
    }

    #[test]
    fn test_builder_replaces_slot() {
        let c = Collaborators::unavailable().with_archive(AlwaysOk);
        assert_eq!(c.archive.verify(Path::new("x.tar")).unwrap(), ArchiveStatus::Ok);
    }
}
