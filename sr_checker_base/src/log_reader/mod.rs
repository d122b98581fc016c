//! Log reader
//!
//! Returns the cleaned lines of a result log whatever encoding the tool
//! that produced it used.

pub mod cleanup;
pub mod encoding;

pub use cleanup::cleanup_line;
pub use encoding::{decode, detect_encoding, TextEncoding};

use sr_config::config::compile_time::log_reader as limits;
use sr_config::log_debug;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogReaderOptions {
    /// Lines examined for encoding detection
    pub detect_file_encoding_limit: usize,
    /// Carriage return / backspace steps replayed per line
    pub cleanup_line_limit: usize,
    pub probe_bytes: usize,
}

impl Default for LogReaderOptions {
    fn default() -> Self {
        Self {
            detect_file_encoding_limit: limits::DETECT_FILE_ENCODING_LIMIT,
            cleanup_line_limit: limits::CLEANUP_LINE_LIMIT,
            probe_bytes: limits::ENCODING_PROBE_BYTES,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Cannot read `{path}': {source}")]
pub struct LogReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Decode and clean every line of a log held in memory
pub fn decode_lines(bytes: &[u8], options: &LogReaderOptions) -> Vec<String> {
    let (encoding, skip) = detect_encoding(
        bytes,
        options.detect_file_encoding_limit,
        options.probe_bytes,
    );
    let text = decode(&bytes[skip..], encoding);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    text.split_inclusive('\n')
        .map(|line| cleanup_line(line, options.cleanup_line_limit))
        .collect()
}

pub fn read_log(path: &Path, options: &LogReaderOptions) -> Result<Vec<String>, LogReadError> {
    let bytes = std::fs::read(path).map_err(|source| LogReadError {
        path: path.to_path_buf(),
        source,
    })?;
    log_debug!("Reading log", "path" => path.display(), "bytes" => bytes.len());
    Ok(decode_lines(&bytes, options))
}
