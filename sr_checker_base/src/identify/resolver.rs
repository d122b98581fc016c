//! Identification of a result tree
//!
//! Known files from the database are recognised by digest or content; the
//! first version entry whose file requirements hold names the tree.

use crate::identify::hashing::DigestCache;
use crate::log_reader::{read_log, LogReaderOptions};
use sr_config::identify_db::{IdentifyDatabase, KnownFile};
use sr_config::logging::codes;
use sr_config::tree::IdentificationContext;
use sr_config::{log_debug, log_info, log_warning};
use std::path::Path;

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedFile {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub label: String,
    pub version: Option<String>,
    pub recognized: Vec<RecognizedFile>,
}

impl Identification {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN.to_string(),
            version: None,
            recognized: Vec::new(),
        }
    }

    /// Label supplied on the command line instead of resolved
    pub fn forced(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            version: Some(label.clone()),
            label,
            recognized: Vec::new(),
        }
    }

    pub fn is_identified(&self) -> bool {
        self.version.is_some()
    }

    /// `[label, "path: name"...]` when identified, empty otherwise
    pub fn context(&self) -> IdentificationContext {
        if !self.is_identified() {
            return IdentificationContext::default();
        }
        let mut entries = vec![self.label.clone()];
        entries.extend(
            self.recognized
                .iter()
                .map(|f| format!("{}: {}", f.path, f.name)),
        );
        IdentificationContext::new(entries)
    }
}

/// All search strings occur somewhere in the file, each within one line
fn contains_all(path: &Path, search: &[String], options: &LogReaderOptions) -> bool {
    let lines = match read_log(path, options) {
        Ok(lines) => lines,
        Err(e) => {
            log_debug!("Cannot search file", "path" => path.display(), "error" => e);
            return false;
        }
    };
    search
        .iter()
        .all(|s| lines.iter().any(|line| line.contains(s.as_str())))
}

fn recognize(
    root: &Path,
    known: &KnownFile,
    digests: &mut DigestCache,
    options: &LogReaderOptions,
) -> Option<RecognizedFile> {
    let path = root.join(&known.path);
    if !path.is_file() {
        return None;
    }

    let by_digest = match &known.sha256 {
        Some(expected) => match digests.sha256(&path) {
            Ok(digest) => digest.eq_ignore_ascii_case(expected),
            Err(e) => {
                log_warning!(
                    code = codes::artifact::UNREADABLE,
                    "Cannot hash known file",
                    "path" => path.display(),
                    "error" => e
                );
                false
            }
        },
        None => false,
    };
    let by_content =
        !by_digest && !known.search.is_empty() && contains_all(&path, &known.search, options);

    if by_digest || by_content {
        log_debug!("Identified file", "path" => path.display(), "name" => known.name);
        Some(RecognizedFile {
            path: known.path.clone(),
            name: known.name.clone(),
        })
    } else {
        None
    }
}

/// Recognise known files under `root` and pick the first matching version
pub fn identify(root: &Path, db: &IdentifyDatabase, options: &LogReaderOptions) -> Identification {
    let mut digests = DigestCache::new();
    let recognized: Vec<RecognizedFile> = db
        .known_files
        .iter()
        .filter_map(|known| recognize(root, known, &mut digests, options))
        .collect();

    let names: Vec<String> = recognized.iter().map(|f| f.name.clone()).collect();
    match db.select_version(&names) {
        Some(entry) => {
            let label = format!("SystemReady {}", entry.version);
            log_info!("Identified", "as" => label, "files" => recognized.len());
            Identification {
                label,
                version: Some(entry.version.clone()),
                recognized,
            }
        }
        None => {
            log_warning!("Could not identify", "recognized" => recognized.len());
            Identification {
                recognized,
                ..Identification::unknown()
            }
        }
    }
}
