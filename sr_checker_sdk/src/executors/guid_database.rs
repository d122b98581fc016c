//! # GUID database
//!
//! Descriptions of well-known GUIDs, loaded from a marked YAML file. Both
//! GUIDs and descriptions must be unique.

use serde::Deserialize;
use sr_checker_base::guid::Guid;
use sr_checker_base::strategies::{CollaboratorError, GuidLookup, GuidLookupResult};
use sr_config::error::{parse_yaml, read_config_file};
use sr_config::{log_debug, ConfigError};
use std::collections::HashMap;
use std::path::Path;

pub const GUID_DATABASE_MARKER: &str = "guid-tool-database";

/// Database shipped with the checker
pub const DEFAULT_GUID_DATABASE: &str = include_str!("../../data/guid-database.yaml");

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    guid: String,
    description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawDatabase {
    #[serde(rename = "guid-tool-database", default)]
    _marker: serde_yaml::Value,
    #[serde(default)]
    known_guids: Vec<RawEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuidDatabase {
    known: HashMap<Guid, String>,
}

impl GuidDatabase {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read_config_file(path)?;
        Self::from_str(&path.display().to_string(), &text)
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_str("<builtin guid database>", DEFAULT_GUID_DATABASE)
    }

    pub fn from_str(source: &str, text: &str) -> Result<Self, ConfigError> {
        let value = parse_yaml(source, text)?;
        if value.is_null() {
            log_debug!("Empty GUID database", "source" => source);
            return Ok(Self::default());
        }
        if !value
            .as_mapping()
            .is_some_and(|m| m.contains_key(GUID_DATABASE_MARKER))
        {
            return Err(ConfigError::MissingMarker {
                path: source.to_string(),
                marker: GUID_DATABASE_MARKER,
            });
        }

        let parse_error = |reason: String| ConfigError::Parse {
            path: source.to_string(),
            reason,
        };
        let raw = RawDatabase::deserialize(value).map_err(|e| parse_error(e.to_string()))?;

        let mut known = HashMap::new();
        let mut descriptions = HashMap::new();
        for entry in raw.known_guids {
            let guid: Guid = entry.guid.parse().map_err(|e| parse_error(format!("{}", e)))?;
            if let Some(previous) = descriptions.insert(entry.description.clone(), guid) {
                return Err(ConfigError::Duplicate {
                    kind: "description",
                    name: format!("{} (guids {} and {})", entry.description, previous, guid),
                    path: source.to_string(),
                });
            }
            if known.insert(guid, entry.description).is_some() {
                return Err(ConfigError::Duplicate {
                    kind: "guid",
                    name: guid.to_string(),
                    path: source.to_string(),
                });
            }
        }

        log_debug!("Loaded GUID database", "source" => source, "entries" => known.len());
        Ok(Self { known })
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn describe(&self, guid: &Guid) -> Option<&str> {
        self.known.get(guid).map(String::as_str)
    }
}

impl GuidLookup for GuidDatabase {
    fn lookup(&self, guid: &Guid) -> Result<GuidLookupResult, CollaboratorError> {
        Ok(match self.describe(guid) {
            Some(description) => GuidLookupResult::Known(description.to_string()),
            None => GuidLookupResult::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const DB: &str = r#"
guid-tool-database:
known-guids:
  - guid: 6DCBD5ED-E82D-4C44-BDA1-7194199AD92A
    description: EFI_FIRMWARE_MANAGEMENT_CAPSULE_ID_GUID
  - guid: b122a263-3661-4f68-9929-78f8b0ce7a9a
    description: EFI_SYSTEM_RESOURCE_TABLE_GUID
"#;

    #[test]
    fn test_lookup() {
        let db = GuidDatabase::from_str("db", DB).unwrap();
        assert_eq!(db.len(), 2);

        let fmp: Guid = "6dcbd5ed-e82d-4c44-bda1-7194199ad92a".parse().unwrap();
        assert_eq!(
            db.lookup(&fmp).unwrap(),
            GuidLookupResult::Known("EFI_FIRMWARE_MANAGEMENT_CAPSULE_ID_GUID".to_string())
        );

        let other: Guid = "00000000-0000-0000-0000-000000000001".parse().unwrap();
        assert_eq!(db.lookup(&other).unwrap(), GuidLookupResult::Unknown);
    }

    #[test]
    fn test_duplicates_rejected() {
        let dup_guid = format!(
            "{}  - guid: b122a263-3661-4f68-9929-78f8b0ce7a9a\n    description: other\n",
            DB
        );
        assert_matches!(
            GuidDatabase::from_str("db", &dup_guid),
            Err(ConfigError::Duplicate { kind: "guid", .. })
        );

        let dup_description = format!(
            "{}  - guid: 00000000-0000-0000-0000-000000000001\n    description: EFI_SYSTEM_RESOURCE_TABLE_GUID\n",
            DB
        );
        assert_matches!(
            GuidDatabase::from_str("db", &dup_description),
            Err(ConfigError::Duplicate { kind: "description", .. })
        );
    }

    #[test]
    fn test_empty_and_unmarked() {
        assert!(GuidDatabase::from_str("db", "").unwrap().is_empty());
        assert_matches!(
            GuidDatabase::from_str("db", "known-guids: []\n"),
            Err(ConfigError::MissingMarker { .. })
        );
    }

    #[test]
    fn test_builtin_database_loads() {
        assert!(!GuidDatabase::builtin().unwrap().is_empty());
    }
}
