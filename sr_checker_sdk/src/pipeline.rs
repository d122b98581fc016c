//! # Run pipeline
//!
//! Configuration, identification, overlay resolution, walk and report
//! output for one result tree. Only configuration problems, an unreadable
//! root and output files that cannot be written end a run early.

use crate::{create_collaborators, CollaboratorSettings};
use chrono::{DateTime, Utc};
use sr_checker_base::classification::EntryFilter;
use sr_checker_base::identify::{identify, Identification};
use sr_checker_base::results::{MetaData, Report, ResultGenerator};
use sr_checker_base::{walk, WalkError, WalkOptions};
use sr_config::logging::{codes, Code};
use sr_config::tree::{dump_config_yaml, CheckerConfig};
use sr_config::{log_info, log_success, ConfigError, IdentifyDatabase, RuleSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = include_str!("../data/check-sr-results.yaml");
pub const DEFAULT_IDENTIFY_DATABASE: &str = include_str!("../data/identify.yaml");
pub const DEFAULT_DT_RULES: &str = include_str!("../data/dt-rules.yaml");

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error("Cannot write `{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

impl RunError {
    pub fn error_code(&self) -> Code {
        match self {
            RunError::Config(e) => e.error_code(),
            RunError::Walk(_) => codes::system::RESULT_ROOT_UNREADABLE,
            RunError::Write { .. } | RunError::Json(_) => codes::system::INTERNAL_ERROR,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub root: PathBuf,
    /// Built-in tree when unset
    pub config: Option<PathBuf>,
    pub identify_database: Option<PathBuf>,
    pub dt_rules: Option<PathBuf>,
    /// Skips the resolver
    pub identification: Option<String>,
    pub all: bool,
    pub no_dedupe: bool,
    pub filter: Option<String>,
    pub ethernet_devices: Option<u32>,
    pub block_devices: Option<u32>,
    pub dump_config: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub collaborators: CollaboratorSettings,
}

#[derive(Debug)]
pub struct RunSummary {
    pub identification: Identification,
    pub report: Report,
}

impl RunSummary {
    pub fn summary_line(&self) -> String {
        self.report.summary_line(&self.identification.label)
    }

    pub fn exit_code(&self) -> i32 {
        self.report.exit_code()
    }
}

fn load_config(path: Option<&Path>) -> Result<CheckerConfig, ConfigError> {
    match path {
        Some(path) => sr_config::tree::load(path),
        None => sr_config::tree::load_str("<builtin configuration>", DEFAULT_CONFIG),
    }
}

fn load_identify_database(path: Option<&Path>) -> Result<IdentifyDatabase, ConfigError> {
    match path {
        Some(path) => IdentifyDatabase::load(path),
        None => IdentifyDatabase::from_str("<builtin identify database>", DEFAULT_IDENTIFY_DATABASE),
    }
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet, ConfigError> {
    match path {
        Some(path) => RuleSet::load(path),
        None => RuleSet::from_str("<builtin devicetree rules>", DEFAULT_DT_RULES),
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), RunError> {
    std::fs::write(path, contents).map_err(|source| RunError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Merged tree as YAML, then the meta-data as comments
pub fn render_dumped_config(
    tree: &[sr_config::TreeNode],
    meta: &MetaData,
) -> Result<String, ConfigError> {
    Ok(format!("{}{}", dump_config_yaml(tree)?, meta.render("# ")))
}

pub fn run_check(options: &RunOptions, started: DateTime<Utc>) -> Result<RunSummary, RunError> {
    let settings = &options.collaborators;

    // Phase 1: configuration
    let config = load_config(options.config.as_deref())?;
    let rules = load_rules(options.dt_rules.as_deref())?;
    let filter = options
        .filter
        .as_deref()
        .map(EntryFilter::parse)
        .transpose()?;

    // Phase 2: identification
    let identification = match &options.identification {
        Some(label) => {
            log_info!("Identification forced", "as" => label);
            Identification::forced(label.as_str())
        }
        None => {
            let db = load_identify_database(options.identify_database.as_deref())?;
            identify(&options.root, &db, &settings.reader)
        }
    };
    log_success!(
        codes::success::IDENTIFICATION_COMPLETE,
        "Identification complete",
        "identification" => &identification.label
    );

    // Phase 3: tree resolution
    let tree = config.resolve(&identification.context());
    if let Some(path) = &options.dump_config {
        write_file(path, &render_dumped_config(&tree, &settings.meta)?)?;
        log_info!("Dumped configuration", "path" => path.display());
    }

    // Phase 4: walk
    let collaborators = create_collaborators(settings)?;
    let walk_options = WalkOptions {
        all: options.all,
        dedupe: !options.no_dedupe,
        filter,
        rules,
        ethernet_devices: options.ethernet_devices,
        block_devices: options.block_devices,
        regen: settings.regen,
        reader: settings.reader,
    };
    let outcome = walk(&options.root, &tree, &collaborators, &walk_options)?;
    log_info!("Checks done", "stats" => outcome.report.stats());

    // Phase 5: reports
    if let Some(path) = &options.json {
        let result = ResultGenerator::generate(
            &outcome.report,
            &identification.label,
            &settings.meta,
            started,
        );
        write_file(path, &result.to_json()?)?;
        log_info!("Wrote JSON report", "path" => path.display());
    }

    Ok(RunSummary {
        identification,
        report: outcome.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;

    const CONFIG: &str = r#"
check-sr-results-configuration:
tree:
  - dir: acs_results
    tree:
      - file: BsaResults.log
        must-contain: ["Total Tests run"]
      - file: capsule.bin
        optional:
overlays:
  - when-any: ["IR v2."]
    tree:
      - dir: acs_results
        tree:
          - file: capsule.bin
            optional: DELETE
"#;

    fn fixture() -> (tempfile::TempDir, RunOptions) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("results");
        fs::create_dir_all(root.join("acs_results")).unwrap();
        fs::write(
            root.join("acs_results/BsaResults.log"),
            "BSA ACS\nTotal Tests run = 42\n",
        )
        .unwrap();
        let config = dir.path().join("config.yaml");
        fs::write(&config, CONFIG).unwrap();

        let options = RunOptions {
            root,
            config: Some(config),
            ..RunOptions::default()
        };
        (dir, options)
    }

    #[test]
    fn test_clean_run() {
        let (_dir, options) = fixture();
        let summary = run_check(&options, Utc::now()).unwrap();

        assert_eq!(summary.identification.label, "Unknown");
        assert_eq!(summary.summary_line(), "Unknown, 0 warning, 0 error");
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_forced_identification_applies_overlay() {
        let (_dir, mut options) = fixture();
        options.identification = Some("IR v2.0".to_string());

        let summary = run_check(&options, Utc::now()).unwrap();
        assert_eq!(summary.summary_line(), "IR v2.0, 0 warning, 1 error");
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_outputs_written() {
        let (dir, mut options) = fixture();
        options.dump_config = Some(dir.path().join("dump.yaml"));
        options.json = Some(dir.path().join("report.json"));
        options.collaborators.meta.insert("checker-version", "test");

        run_check(&options, Utc::now()).unwrap();

        let dumped = fs::read_to_string(dir.path().join("dump.yaml")).unwrap();
        assert!(dumped.contains("BsaResults.log"));
        assert!(dumped.contains("# checker-version: test"));
        assert!(sr_config::tree::load_str("dump", &dumped).is_ok());

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("report.json")).unwrap())
                .unwrap();
        assert_eq!(json["identification"], "Unknown");
        assert_eq!(json["passed"], true);
    }

    #[test]
    fn test_fatal_errors() {
        let (dir, mut options) = fixture();
        options.root = dir.path().join("missing");
        assert_matches!(run_check(&options, Utc::now()), Err(RunError::Walk(_)));

        let (dir, mut options) = fixture();
        let bad = dir.path().join("bad.yaml");
        fs::write(&bad, "tree: []\n").unwrap();
        options.config = Some(bad);
        assert_matches!(
            run_check(&options, Utc::now()),
            Err(RunError::Config(ConfigError::MissingMarker { .. }))
        );
    }

    #[test]
    fn test_builtin_data_loads() {
        assert!(load_config(None).is_ok());
        assert!(load_identify_database(None).is_ok());
        assert!(load_rules(None).is_ok());
    }
}
