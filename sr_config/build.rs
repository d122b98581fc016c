// build.rs - TOML-driven constant generation
use std::env;
use std::fs;
use std::path::Path;

#[derive(serde::Deserialize)]
struct CompileTimeConfig {
    log_reader: LogReaderLimits,
    devicetree: DevicetreeLimits,
    tools: ToolLimits,
    logging: LoggingLimits,
}

#[derive(serde::Deserialize)]
struct LogReaderLimits {
    detect_file_encoding_limit: usize,
    cleanup_line_limit: usize,
    encoding_probe_bytes: usize,
}

#[derive(serde::Deserialize)]
struct DevicetreeLimits {
    max_message_length: usize,
}

#[derive(serde::Deserialize)]
struct ToolLimits {
    default_timeout_seconds: u64,
    regen_mtime_margin_seconds: u64,
}

#[derive(serde::Deserialize)]
struct LoggingLimits {
    log_buffer_size: usize,
    max_log_message_length: usize,
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SR_BUILD_PROFILE");
    println!("cargo:rerun-if-env-changed=SR_CONFIG_DIR");

    let profile = env::var("SR_BUILD_PROFILE").unwrap_or_else(|_| "development".to_string());
    let config_dir = env::var("SR_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

    // Workspace root is the parent of the sr_config directory
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = Path::new(&manifest_dir)
        .parent()
        .expect("Could not find workspace root (parent directory)");

    let config_path = workspace_root
        .join(&config_dir)
        .join(format!("{}.toml", profile));

    println!("cargo:rerun-if-changed={}", config_path.display());

    if !config_path.exists() {
        panic!(
            "Configuration file not found: {}\nWorkspace root: {}\nLooking for: {}/{}/{}.toml",
            config_path.display(),
            workspace_root.display(),
            workspace_root.display(),
            config_dir,
            profile
        );
    }

    let config_content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", config_path.display(), e));

    let config: CompileTimeConfig = toml::from_str(&config_content)
        .unwrap_or_else(|e| panic!("Invalid TOML in {}: {}", config_path.display(), e));

    validate_constraints(&config, &profile);
    generate_constants(&config, &profile);
}

fn validate_constraints(config: &CompileTimeConfig, profile: &str) {
    const ABSOLUTE_MAX_TOOL_TIMEOUT: u64 = 86_400;

    if config.log_reader.detect_file_encoding_limit == 0 {
        panic!("LIMITS: detect_file_encoding_limit must be at least 1");
    }

    if config.log_reader.cleanup_line_limit == 0 {
        panic!("LIMITS: cleanup_line_limit must be at least 1");
    }

    if config.log_reader.encoding_probe_bytes < 2 {
        panic!("LIMITS: encoding_probe_bytes must hold at least one UTF-16 unit");
    }

    if config.devicetree.max_message_length < 4 {
        panic!("LIMITS: max_message_length too small to hold an ellipsis");
    }

    if config.tools.default_timeout_seconds > ABSOLUTE_MAX_TOOL_TIMEOUT {
        panic!("LIMITS: default_timeout_seconds exceeds absolute maximum");
    }

    if config.logging.log_buffer_size < 100 {
        panic!("LIMITS: log_buffer_size too small (min: 100)");
    }

    if profile == "production" && config.tools.default_timeout_seconds == 0 {
        panic!("PRODUCTION: external tools must run with a timeout");
    }
}

fn generate_constants(config: &CompileTimeConfig, profile: &str) {
    let out_dir = env::var("OUT_DIR").unwrap();
    let output_path = Path::new(&out_dir).join("constants.rs");

    let constants_code = format!(
        r#"
// Generated compile-time constants from TOML configuration
// Profile: {}
// DO NOT EDIT - Generated by build.rs

pub mod compile_time {{
    pub mod log_reader {{
        pub const DETECT_FILE_ENCODING_LIMIT: usize = {};
        pub const CLEANUP_LINE_LIMIT: usize = {};
        pub const ENCODING_PROBE_BYTES: usize = {};
    }}

    pub mod devicetree {{
        pub const MAX_MESSAGE_LENGTH: usize = {};
    }}

    pub mod tools {{
        pub const DEFAULT_TIMEOUT_SECONDS: u64 = {};
        pub const REGEN_MTIME_MARGIN_SECONDS: u64 = {};
    }}

    pub mod logging {{
        pub const LOG_BUFFER_SIZE: usize = {};
        pub const MAX_LOG_MESSAGE_LENGTH: usize = {};
    }}
}}
"#,
        profile,
        config.log_reader.detect_file_encoding_limit,
        config.log_reader.cleanup_line_limit,
        config.log_reader.encoding_probe_bytes,
        config.devicetree.max_message_length,
        config.tools.default_timeout_seconds,
        config.tools.regen_mtime_margin_seconds,
        config.logging.log_buffer_size,
        config.logging.max_log_message_length,
    );

    fs::write(output_path, constants_code).unwrap();
}
