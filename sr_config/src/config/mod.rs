//! Configuration module for the result checker
//! Automatically uses generated constants from TOML configuration

// Include generated constants from build.rs
include!(concat!(env!("OUT_DIR"), "/constants.rs"));

pub mod runtime;

/// Build information and configuration metadata
pub mod build_info {
    /// Returns the configuration profile used during build
    pub fn profile() -> &'static str {
        option_env!("SR_BUILD_PROFILE").unwrap_or("development")
    }

    /// Returns the configuration directory used during build
    pub fn config_dir() -> &'static str {
        option_env!("SR_CONFIG_DIR").unwrap_or("config")
    }

    /// Returns configuration source information
    pub fn source_info() -> String {
        format!("Generated from {}/{}.toml", config_dir(), profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_constants_within_bounds() {
        assert!(compile_time::log_reader::DETECT_FILE_ENCODING_LIMIT > 0);
        assert!(compile_time::log_reader::CLEANUP_LINE_LIMIT > 0);
        assert!(compile_time::devicetree::MAX_MESSAGE_LENGTH >= 4);
        assert!(compile_time::logging::LOG_BUFFER_SIZE >= 100);
    }

    #[test]
    fn test_source_info_names_profile() {
        assert!(build_info::source_info().contains(build_info::profile()));
    }
}
