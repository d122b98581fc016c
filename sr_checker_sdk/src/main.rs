//! # check-sr-results
//!
//! Checks a SystemReady result tree against its expected layout and
//! contents. Exits with 0 when no error was found.

use chrono::Utc;
use clap::Parser;
use sr_checker_base::cache::RegenPolicy;
use sr_checker_base::log_reader::LogReaderOptions;
use sr_checker_base::results::MetaData;
use sr_checker_sdk::collectors::{probe_tool_versions, version_probes};
use sr_checker_sdk::commands::{create_tool_command_executor, ToolPaths};
use sr_checker_sdk::{run_check, CollaboratorSettings, RunOptions};
use sr_config::config::runtime::{CachePreferences, LogLevel, LoggingPreferences, ToolPreferences};
use sr_config::{log_error, log_info, logging};
use std::path::PathBuf;
use std::time::Duration;

const CACHE_DIR_NAME: &str = ".check-sr-results";

#[derive(Debug, Parser)]
#[command(name = "check-sr-results", version, about = "Perform a number of verifications on a SystemReady results tree.")]
struct Cli {
    /// Result tree root
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Tree configuration; the built-in one when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identification database
    #[arg(long = "identify-db")]
    identify_db: Option<PathBuf>,

    /// Force identification instead of resolving it
    #[arg(long)]
    identification: Option<String>,

    /// Devicetree classification rules
    #[arg(long = "dt-rules")]
    dt_rules: Option<PathBuf>,

    /// Report every occurrence of warn-once patterns
    #[arg(long)]
    all: bool,

    /// Keep duplicate devicetree diagnostics
    #[arg(long = "no-dedupe")]
    no_dedupe: bool,

    /// Only keep devicetree diagnostics matching this expression
    #[arg(long)]
    filter: Option<String>,

    /// Expected ethernet devices; read from report.txt when omitted
    #[arg(long = "ethernet-devices")]
    ethernet_devices: Option<u32>,

    /// Expected block devices
    #[arg(long = "block-devices")]
    block_devices: Option<u32>,

    /// Cache directory for derived artifacts
    #[arg(long = "cache-dir")]
    cache_dir: Option<PathBuf>,

    /// Regenerate derived artifacts even when fresh
    #[arg(long = "force-regen")]
    force_regen: bool,

    /// Lines examined when detecting a log's encoding
    #[arg(long = "detect-file-encoding-limit")]
    detect_file_encoding_limit: Option<usize>,

    /// Carriage return and backspace steps replayed per line
    #[arg(long = "cleanup-line-limit")]
    cleanup_line_limit: Option<usize>,

    #[arg(long, default_value = "tar")]
    tar: String,

    #[arg(long, default_value = "dtc")]
    dtc: String,

    #[arg(long = "dt-validate", default_value = "dt-validate")]
    dt_validate: String,

    /// Devicetree bindings schema directory for dt-validate
    #[arg(long)]
    bindings: Option<PathBuf>,

    /// SCT results parser
    #[arg(long, default_value = "parser.py")]
    parser: String,

    /// External capsule tool; capsules are checked in-process when omitted
    #[arg(long = "capsule-tool")]
    capsule_tool: Option<String>,

    /// External GUID tool; the GUID database is used when omitted
    #[arg(long = "guid-tool")]
    guid_tool: Option<String>,

    #[arg(long = "guids-db")]
    guids_db: Option<PathBuf>,

    #[arg(long = "ethernet-db")]
    ethernet_db: Option<PathBuf>,

    #[arg(long = "block-db")]
    block_db: Option<PathBuf>,

    /// Timeout for each external tool in seconds, 0 for none
    #[arg(long)]
    timeout: Option<u64>,

    /// Write the merged configuration to this file
    #[arg(long = "dump-config")]
    dump_config: Option<PathBuf>,

    /// Write a JSON report to this file
    #[arg(long)]
    json: Option<PathBuf>,

    /// Print meta-data at the end
    #[arg(long = "print-meta")]
    print_meta: bool,

    /// Turn on debug messages
    #[arg(long)]
    debug: bool,
}

fn default_cache_dir() -> Option<PathBuf> {
    CachePreferences::default()
        .cache_dir
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CACHE_DIR_NAME)))
}

fn reader_options(cli: &Cli) -> LogReaderOptions {
    let defaults = LogReaderOptions::default();
    LogReaderOptions {
        detect_file_encoding_limit: cli
            .detect_file_encoding_limit
            .unwrap_or(defaults.detect_file_encoding_limit),
        cleanup_line_limit: cli.cleanup_line_limit.unwrap_or(defaults.cleanup_line_limit),
        ..defaults
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let started = Utc::now();
    let args: Vec<String> = std::env::args().collect();
    let cli = Cli::parse();

    let mut preferences = LoggingPreferences::default();
    if cli.debug {
        preferences.min_log_level = LogLevel::Debug;
    }
    logging::config::init_runtime_preferences(preferences)?;
    logging::init_global_logging()?;

    let tools = ToolPaths {
        tar: cli.tar.clone(),
        dtc: cli.dtc.clone(),
        dt_validate: cli.dt_validate.clone(),
        capsule_tool: cli.capsule_tool.clone(),
        guid_tool: cli.guid_tool.clone(),
        sct_parser: cli.parser.clone(),
    };
    let timeout = match cli.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => ToolPreferences::default().timeout(),
    };

    let mut meta = MetaData::for_run(&args, started);
    let executor = create_tool_command_executor(&tools, timeout);
    probe_tool_versions(
        &executor,
        &version_probes(&tools.tar, &tools.dtc, &tools.dt_validate),
        &mut meta,
    );

    let cache_dir = cli.cache_dir.clone().or_else(default_cache_dir);
    log_info!(
        "Checking result tree",
        "dir" => cli.dir.display(),
        "cache_dir" => cache_dir.as_deref().map(|d| d.display().to_string()).unwrap_or_default()
    );

    let options = RunOptions {
        root: cli.dir.clone(),
        config: cli.config.clone(),
        identify_database: cli.identify_db.clone(),
        dt_rules: cli.dt_rules.clone(),
        identification: cli.identification.clone(),
        all: cli.all,
        no_dedupe: cli.no_dedupe,
        filter: cli.filter.clone(),
        ethernet_devices: cli.ethernet_devices,
        block_devices: cli.block_devices,
        dump_config: cli.dump_config.clone(),
        json: cli.json.clone(),
        collaborators: CollaboratorSettings {
            tools,
            timeout,
            cache_dir,
            bindings: cli.bindings.clone(),
            regen: if cli.force_regen {
                RegenPolicy::forced()
            } else {
                RegenPolicy::default()
            },
            reader: reader_options(&cli),
            meta: meta.clone(),
            guid_database: cli.guids_db.clone(),
            ethernet_criteria: cli.ethernet_db.clone(),
            block_device_criteria: cli.block_db.clone(),
        },
    };

    let summary = match run_check(&options, started) {
        Ok(summary) => summary,
        Err(e) => {
            log_error!(e.error_code(), "Check aborted", "error" => &e);
            std::process::exit(1);
        }
    };

    if cli.print_meta {
        println!();
        print!("{}", meta.render(""));
    }

    println!("{}", summary.summary_line());
    std::process::exit(summary.exit_code());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "check-sr-results",
            "--dir",
            "results",
            "--ethernet-devices",
            "2",
            "--cleanup-line-limit",
            "5",
            "--no-dedupe",
        ]);
        assert_eq!(cli.dir, PathBuf::from("results"));
        assert_eq!(cli.ethernet_devices, Some(2));
        assert!(cli.no_dedupe);
        assert_eq!(cli.parser, "parser.py");

        let reader = reader_options(&cli);
        assert_eq!(reader.cleanup_line_limit, 5);
        assert_eq!(
            reader.detect_file_encoding_limit,
            LogReaderOptions::default().detect_file_encoding_limit
        );
    }
}
