//! Raw configuration entries as they appear in YAML
//!
//! Every key may hold the `DELETE` sentinel. The loader rejects it in the
//! base tree; overlays use it to remove keys from the node they patch.

use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Sentinel value removing a key during an overlay merge
pub const DELETE: &str = "DELETE";

/// A key's value, or the instruction to delete it
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Delete,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_delete(&self) -> bool {
        matches!(self, Patch::Delete)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Delete => None,
            Patch::Set(value) => Some(value),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        if value.as_str() == Some(DELETE) {
            return Ok(Patch::Delete);
        }
        T::deserialize(value)
            .map(Patch::Set)
            .map_err(D::Error::custom)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Delete => serializer.serialize_str(DELETE),
            Patch::Set(value) => value.serialize(serializer),
        }
    }
}

/// Presence flag: `optional:` and `optional: true` set it, `false` clears it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flag(pub bool);

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<bool>::deserialize(deserializer).map(|value| Flag(value.unwrap_or(true)))
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 {
            serializer.serialize_unit()
        } else {
            serializer.serialize_bool(false)
        }
    }
}

// A null value still counts as the key being present
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Parameters of the SCT summary regeneration role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SctSummaryParams {
    pub seq_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileEntry {
    pub file: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub optional: Option<Patch<Flag>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub can_be_empty: Option<Patch<Flag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_occurrences: Option<Patch<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_if_not_named: Option<Patch<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_contain: Option<Patch<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_contain: Option<Patch<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_if_contains: Option<Patch<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_once_if_contains: Option<Patch<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_if_contains: Option<Patch<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sct_parser_result_md: Option<Patch<SctSummaryParams>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub capsuleapp_esrt: Option<Patch<Flag>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub uefi_capsule: Option<Patch<Flag>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub devicetree: Option<Patch<Flag>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<Patch<Flag>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub boot_sources: Option<Patch<Flag>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub uefi_sniff: Option<Patch<Flag>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub must_have_esp: Option<Patch<Flag>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub report_txt: Option<Patch<Flag>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DirEntry {
    pub dir: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub optional: Option<Patch<Flag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_entries: Option<Patch<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<Patch<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_occurrences: Option<Patch<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_if_not_named: Option<Patch<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<Patch<Vec<NodeEntry>>>,
}

/// One `file:` or `dir:` mapping of a tree list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeEntry {
    File(FileEntry),
    Dir(DirEntry),
}

impl NodeEntry {
    pub fn pattern(&self) -> &str {
        match self {
            NodeEntry::File(entry) => &entry.file,
            NodeEntry::Dir(entry) => &entry.dir,
        }
    }
}

/// Checks that a YAML value is a mapping with exactly one of `file` and `dir`
pub fn node_shape_problem(value: &serde_yaml::Value) -> Option<&'static str> {
    let Some(mapping) = value.as_mapping() else {
        return Some("tree node must be a mapping");
    };
    match (mapping.contains_key("file"), mapping.contains_key("dir")) {
        (true, false) | (false, true) => None,
        (true, true) => Some("node has both `file' and `dir'"),
        (false, false) => Some("node has neither `file' nor `dir'"),
    }
}

impl<'de> Deserialize<'de> for NodeEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        if let Some(problem) = node_shape_problem(&value) {
            return Err(D::Error::custom(problem));
        }
        let is_file = value
            .as_mapping()
            .map(|mapping| mapping.contains_key("file"))
            .unwrap_or(false);
        if is_file {
            FileEntry::deserialize(value)
                .map(NodeEntry::File)
                .map_err(D::Error::custom)
        } else {
            DirEntry::deserialize(value)
                .map(NodeEntry::Dir)
                .map_err(D::Error::custom)
        }
    }
}

/// One element of `overlays:`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OverlayEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_any: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_all: Option<Vec<String>>,
    #[serde(default)]
    pub tree: Vec<NodeEntry>,
}

/// Whole configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDocument {
    #[serde(rename = "check-sr-results-configuration", default)]
    pub marker: serde_yaml::Value,
    #[serde(default)]
    pub tree: Vec<NodeEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlays: Vec<OverlayEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_flag_presence() {
        let entry: FileEntry = serde_yaml::from_str("file: a\noptional:\ncan-be-empty: false\n").unwrap();
        assert_eq!(entry.optional, Some(Patch::Set(Flag(true))));
        assert_eq!(entry.can_be_empty, Some(Patch::Set(Flag(false))));
        assert_eq!(entry.devicetree, None);
    }

    #[test]
    fn test_delete_sentinel() {
        let entry: FileEntry =
            serde_yaml::from_str("file: a\nmust-contain: DELETE\noptional: DELETE\n").unwrap();
        assert_matches!(entry.must_contain, Some(Patch::Delete));
        assert_matches!(entry.optional, Some(Patch::Delete));
    }

    #[test]
    fn test_node_shape() {
        let nodes: Vec<NodeEntry> =
            serde_yaml::from_str("- file: a\n- dir: b\n  tree:\n    - file: c\n").unwrap();
        assert_matches!(&nodes[0], NodeEntry::File(f) if f.file == "a");
        assert_matches!(&nodes[1], NodeEntry::Dir(d) if d.tree.is_some());

        assert!(serde_yaml::from_str::<Vec<NodeEntry>>("- file: a\n  dir: b\n").is_err());
        assert!(serde_yaml::from_str::<Vec<NodeEntry>>("- optional:\n").is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(serde_yaml::from_str::<FileEntry>("file: a\nmust-contains: [x]\n").is_err());
    }

    #[test]
    fn test_flag_serializes_as_null() {
        let entry = FileEntry {
            file: "a".to_string(),
            optional: Some(Patch::Set(Flag(true))),
            ..Default::default()
        };
        let text = serde_yaml::to_string(&entry).unwrap();
        assert!(text.contains("optional: null"));
        assert!(!text.contains("can-be-empty"));
    }
}
