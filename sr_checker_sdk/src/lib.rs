//! # SystemReady result checker SDK
//!
//! Concrete collaborators for the verification engine and the run pipeline
//! behind the `check-sr-results` binary.

pub mod collectors;
pub mod commands;
pub mod executors;
pub mod pipeline;

pub use pipeline::{run_check, RunError, RunOptions, RunSummary};

use commands::{create_tool_command_executor, ToolPaths};
use executors::criteria::CriteriaDatabase;
use sr_checker_base::cache::RegenPolicy;
use sr_checker_base::log_reader::LogReaderOptions;
use sr_checker_base::results::MetaData;
use sr_checker_base::strategies::{Collaborators, GuidLookup};
use sr_config::{log_debug, ConfigError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to build the collaborators of one run
#[derive(Debug, Clone, Default)]
pub struct CollaboratorSettings {
    pub tools: ToolPaths,
    pub timeout: Option<Duration>,
    /// Derived devicetree logs go here; next to the blob when unset
    pub cache_dir: Option<PathBuf>,
    /// Schema directory for `dt-validate`
    pub bindings: Option<PathBuf>,
    pub regen: RegenPolicy,
    pub reader: LogReaderOptions,
    pub meta: MetaData,
    pub guid_database: Option<PathBuf>,
    pub ethernet_criteria: Option<PathBuf>,
    pub block_device_criteria: Option<PathBuf>,
}

/// Create the collaborators for a run
///
/// Includes:
/// - tar archive integrity checks
/// - GUID lookup through the external GUID tool, or the GUID database
/// - capsule validation through the external capsule tool, or in-process
/// - dtc and dt-validate, with cached logs
/// - the external SCT parser
/// - ethernet and block device scorers with their criteria databases
pub fn create_collaborators(settings: &CollaboratorSettings) -> Result<Collaborators, ConfigError> {
    let tools = &settings.tools;
    let executor = create_tool_command_executor(tools, settings.timeout);

    let guids: Arc<dyn GuidLookup> = match &tools.guid_tool {
        Some(tool) => Arc::new(collectors::ExternalGuidTool::new(tool.as_str(), executor.clone())),
        None => Arc::new(match &settings.guid_database {
            Some(path) => executors::GuidDatabase::load(path)?,
            None => executors::GuidDatabase::builtin()?,
        }),
    };

    let mut collaborators = Collaborators::unavailable()
        .with_archive(collectors::TarArchiveChecker::new(tools.tar.as_str(), executor.clone()))
        .with_guid_lookup(guids.clone())
        .with_devicetree(
            collectors::DevicetreeTools::new(
                tools.dtc.as_str(),
                tools.dt_validate.as_str(),
                executor.clone(),
            )
            .with_bindings(settings.bindings.clone())
            .with_cache_dir(settings.cache_dir.clone())
            .with_regen(settings.regen)
            .with_reader(settings.reader)
            .with_meta(settings.meta.clone()),
        )
        .with_sct_parser(collectors::ExternalSctParser::new(
            tools.sct_parser.as_str(),
            executor.clone(),
        ));

    collaborators = match &tools.capsule_tool {
        Some(tool) => collaborators.with_capsule(collectors::ExternalCapsuleTool::new(
            tool.as_str(),
            executor.clone(),
        )),
        None => collaborators.with_capsule(executors::FmpCapsuleValidator::new(guids)),
    };

    let ethernet = match &settings.ethernet_criteria {
        Some(path) => executors::EthernetScorer::new(CriteriaDatabase::load(path)?, settings.reader),
        None => executors::EthernetScorer::builtin(settings.reader)?,
    };
    let block_devices = match &settings.block_device_criteria {
        Some(path) => {
            executors::BlockDeviceScorer::new(CriteriaDatabase::load(path)?, settings.reader)
        }
        None => executors::BlockDeviceScorer::builtin(settings.reader)?,
    };

    log_debug!(
        "Collaborators ready",
        "capsule" => tools.capsule_tool.as_deref().unwrap_or("built-in"),
        "guid_lookup" => tools.guid_tool.as_deref().unwrap_or("database")
    );
    Ok(collaborators
        .with_ethernet(ethernet)
        .with_block_devices(block_devices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sr_checker_base::guid::Guid;
    use sr_checker_base::strategies::{CollaboratorError, GuidLookupResult};
    use std::path::Path;

    #[test]
    fn test_default_collaborators() {
        let collaborators = create_collaborators(&CollaboratorSettings::default()).unwrap();

        let esrt: Guid = "b122a263-3661-4f68-9929-78f8b0ce7a9a".parse().unwrap();
        assert_matches!(
            collaborators.guid_lookup.lookup(&esrt),
            Ok(GuidLookupResult::Known(_))
        );
        assert_matches!(
            collaborators.capsule.validate(Path::new("/nonexistent/capsule.bin")),
            Err(CollaboratorError::Io { .. })
        );
    }

    #[test]
    fn test_bad_database_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("guids.yaml");
        std::fs::write(&db, "known-guids: []\n").unwrap();

        let settings = CollaboratorSettings {
            guid_database: Some(db),
            ..CollaboratorSettings::default()
        };
        assert_matches!(
            create_collaborators(&settings).err(),
            Some(ConfigError::MissingMarker { .. })
        );
    }
}
