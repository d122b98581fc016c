//! Identification database
//!
//! Known files are recognised by SHA-256 digest or by content search;
//! versions list the recognised names they require (or forbid, with a `!`
//! or `~` prefix). The first version whose requirements hold wins.

use crate::error::{parse_yaml, read_config_file, ConfigError};
use crate::logging::codes;
use crate::{log_debug, log_warning};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::Path;

pub const IDENTIFY_MARKER: &str = "identify-database";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KnownFile {
    pub name: String,
    /// Relative to the result tree root
    pub path: String,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub search: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequirement {
    pub name: String,
    pub negated: bool,
}

impl FileRequirement {
    pub fn parse(text: &str) -> Self {
        match text.strip_prefix('!').or_else(|| text.strip_prefix('~')) {
            Some(rest) => Self {
                name: rest.to_string(),
                negated: true,
            },
            None => Self {
                name: text.to_string(),
                negated: false,
            },
        }
    }

    /// Requirement holds when some found name contains ours, or none does if negated
    pub fn holds(&self, found: &[String]) -> bool {
        let present = found.iter().any(|name| name.contains(self.name.as_str()));
        present != self.negated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: String,
    pub files: Vec<FileRequirement>,
}

impl VersionEntry {
    pub fn matches(&self, found: &[String]) -> bool {
        self.files.iter().all(|req| req.holds(found))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVersion {
    #[serde(deserialize_with = "scalar_string")]
    version: String,
    #[serde(default)]
    files: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawDatabase {
    #[serde(rename = "identify-database", default)]
    _marker: serde_yaml::Value,
    #[serde(default)]
    known_files: Vec<KnownFile>,
    #[serde(default)]
    versions: Vec<RawVersion>,
}

// Versions may be written as bare numbers
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde::de::Error as _;
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a scalar version, got {:?}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifyDatabase {
    pub known_files: Vec<KnownFile>,
    pub versions: Vec<VersionEntry>,
}

impl IdentifyDatabase {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read_config_file(path)?;
        Self::from_str(&path.display().to_string(), &text)
    }

    pub fn from_str(source: &str, text: &str) -> Result<Self, ConfigError> {
        let value = parse_yaml(source, text)?;
        if value.is_null() {
            log_debug!("Empty identify database", "source" => source);
            return Ok(Self::default());
        }
        let has_marker = value
            .as_mapping()
            .map(|m| m.contains_key(IDENTIFY_MARKER))
            .unwrap_or(false);
        if !has_marker {
            return Err(ConfigError::MissingMarker {
                path: source.to_string(),
                marker: IDENTIFY_MARKER,
            });
        }

        let raw = RawDatabase::deserialize(value).map_err(|e| ConfigError::Parse {
            path: source.to_string(),
            reason: e.to_string(),
        })?;

        let mut seen = HashSet::new();
        for known in &raw.known_files {
            if !seen.insert((known.name.as_str(), known.path.as_str())) {
                log_warning!(
                    code = codes::configuration::DUPLICATE_DATABASE_ENTRY,
                    "Known file listed twice",
                    "name" => known.name,
                    "path" => known.path
                );
            }
        }

        let versions = raw
            .versions
            .into_iter()
            .map(|v| VersionEntry {
                version: v.version,
                files: v.files.iter().map(|f| FileRequirement::parse(f)).collect(),
            })
            .collect();

        Ok(Self {
            known_files: raw.known_files,
            versions,
        })
    }

    /// First version whose requirements hold for the found names
    pub fn select_version(&self, found: &[String]) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.matches(found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const DB: &str = r#"
identify-database:
known-files:
  - name: ir1-seq
    path: acs_results/sct_results/Sequence/EBBR.seq
    sha256: 0123abcd
  - name: ir2-bsa
    path: acs_results/uefi/BsaResults.log
    search: ["BSA ACS", "Version 1.0"]
versions:
  - version: IR v2.0
    files: [ir2-bsa, "!ir1-seq"]
  - version: 1.0
    files: [ir1-seq]
"#;

    #[test]
    fn test_parse_database() {
        let db = IdentifyDatabase::from_str("db", DB).unwrap();
        assert_eq!(db.known_files.len(), 2);
        assert_eq!(db.known_files[0].sha256.as_deref(), Some("0123abcd"));
        assert_eq!(db.known_files[1].search.len(), 2);
        assert_eq!(db.versions[1].version, "1.0");
        assert_eq!(
            db.versions[0].files[1],
            FileRequirement {
                name: "ir1-seq".to_string(),
                negated: true
            }
        );
    }

    #[test]
    fn test_negation_and_order() {
        let db = IdentifyDatabase::from_str("db", DB).unwrap();
        let found = vec!["ir2-bsa".to_string()];
        assert_eq!(db.select_version(&found).unwrap().version, "IR v2.0");

        let found = vec!["ir2-bsa".to_string(), "ir1-seq".to_string()];
        assert_eq!(db.select_version(&found).unwrap().version, "1.0");

        assert!(db.select_version(&[]).is_none());
    }

    #[test]
    fn test_first_match_not_most_specific() {
        let text = "identify-database:\nversions:\n  - version: A\n    files: [x]\n  - version: B\n    files: [x, y]\n";
        let db = IdentifyDatabase::from_str("db", text).unwrap();
        let found = vec!["x".to_string(), "y".to_string()];
        assert_eq!(db.select_version(&found).unwrap().version, "A");
    }

    #[test]
    fn test_requirement_substring() {
        let req = FileRequirement::parse("~seq");
        assert!(req.negated);
        assert!(!req.holds(&["ir1-seq".to_string()]));
        assert!(FileRequirement::parse("seq").holds(&["ir1-seq".to_string()]));
    }

    #[test]
    fn test_empty_and_marker() {
        assert_eq!(
            IdentifyDatabase::from_str("db", "").unwrap(),
            IdentifyDatabase::default()
        );
        assert_matches!(
            IdentifyDatabase::from_str("db", "versions: []\n"),
            Err(ConfigError::MissingMarker { .. })
        );
    }
}
