//! # Tool versions
//!
//! Records the version of each external tool into the run meta-data. A tool
//! that cannot be run is noted and left out; its checks fail later on their
//! own.

use sr_checker_base::results::MetaData;
use sr_checker_base::strategies::SystemCommandExecutor;
use sr_config::logging::codes;
use sr_config::{log_success, log_warning};

/// Meta-data key, tool, and prefix stripped from its first output line
pub fn version_probes<'a>(tar: &'a str, dtc: &'a str, dt_validate: &'a str) -> [(&'static str, &'a str, &'static str); 3] {
    [
        ("tar-version", tar, ""),
        ("dtc-version", dtc, "Version: "),
        ("dt-validate-version", dt_validate, ""),
    ]
}

/// First line of a version banner, without its prefix
pub fn first_line_version(output: &str, prefix: &str) -> Option<String> {
    let line = output.lines().next()?.trim();
    let version = line.strip_prefix(prefix).unwrap_or(line).trim();
    (!version.is_empty()).then(|| version.to_string())
}

pub fn probe_tool_versions(
    executor: &SystemCommandExecutor,
    probes: &[(&'static str, &str, &'static str)],
    meta: &mut MetaData,
) {
    for (key, tool, prefix) in probes {
        let version = match executor.execute(tool, &["--version"]) {
            Ok(output) if output.success() => first_line_version(&output.combined(), prefix),
            Ok(output) => {
                log_warning!("Tool version probe failed", "tool" => tool, "exit_code" => output.exit_code);
                None
            }
            Err(e) => {
                log_warning!("Tool not available", "tool" => tool, "error" => e);
                None
            }
        };

        if let Some(version) = version {
            log_success!(codes::success::TOOL_PROBED, "Tool found", "tool" => tool, "version" => &version);
            meta.insert(*key, version);
        }
    }
}
