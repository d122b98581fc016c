//! Configuration file loading and dumping

use super::entry::{node_shape_problem, ConfigDocument};
use super::node::TreeNode;
use super::overlay::{resolve_overlays, IdentificationContext, Overlay};
use crate::error::{parse_yaml, read_config_file, ConfigError};
use crate::logging::codes;
use crate::{log_debug, log_success};
use serde::Deserialize;
use serde_yaml::Value;
use std::path::Path;

/// Top-level key every configuration file must carry
pub const CONFIG_MARKER: &str = "check-sr-results-configuration";

/// Base tree plus the overlays not yet resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckerConfig {
    pub tree: Vec<TreeNode>,
    pub overlays: Vec<Overlay>,
}

impl CheckerConfig {
    /// Tree to walk once identification is known
    pub fn resolve(&self, context: &IdentificationContext) -> Vec<TreeNode> {
        resolve_overlays(&self.tree, &self.overlays, context)
    }
}

pub fn load(path: &Path) -> Result<CheckerConfig, ConfigError> {
    let text = read_config_file(path)?;
    let config = load_str(&path.display().to_string(), &text)?;

    log_success!(
        codes::success::CONFIGURATION_LOADED,
        "Configuration loaded",
        "path" => path.display(),
        "nodes" => config.tree.len(),
        "overlays" => config.overlays.len()
    );
    Ok(config)
}

/// Parse configuration text; `source` names it in errors
pub fn load_str(source: &str, text: &str) -> Result<CheckerConfig, ConfigError> {
    let value = parse_yaml(source, text)?;
    if value.is_null() {
        log_debug!("Empty configuration", "source" => source);
        return Ok(CheckerConfig::default());
    }

    let Some(mapping) = value.as_mapping() else {
        return Err(ConfigError::Parse {
            path: source.to_string(),
            reason: "top level must be a mapping".to_string(),
        });
    };
    if !mapping.contains_key(CONFIG_MARKER) {
        return Err(ConfigError::MissingMarker {
            path: source.to_string(),
            marker: CONFIG_MARKER,
        });
    }

    check_shapes(value.get("tree"), "tree")?;
    if let Some(overlays) = value.get("overlays").and_then(Value::as_sequence) {
        for (i, overlay) in overlays.iter().enumerate() {
            check_shapes(overlay.get("tree"), &format!("overlays[{}].tree", i))?;
        }
    }

    let document = ConfigDocument::deserialize(value).map_err(|e| ConfigError::Parse {
        path: source.to_string(),
        reason: e.to_string(),
    })?;

    let tree = document
        .tree
        .iter()
        .enumerate()
        .map(|(i, entry)| TreeNode::from_base_entry(entry, &format!("tree[{}]", i)))
        .collect::<Result<Vec<_>, _>>()?;
    let overlays = document
        .overlays
        .iter()
        .enumerate()
        .map(|(i, entry)| Overlay::from_entry(entry, i))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CheckerConfig { tree, overlays })
}

// Locate a malformed node before typed parsing loses the position
fn check_shapes(list: Option<&Value>, location: &str) -> Result<(), ConfigError> {
    let Some(nodes) = list.and_then(Value::as_sequence) else {
        return Ok(());
    };
    for (i, node) in nodes.iter().enumerate() {
        let here = format!("{}[{}]", location, i);
        if let Some(problem) = node_shape_problem(node) {
            return Err(ConfigError::MalformedNode {
                location: here,
                reason: problem.to_string(),
            });
        }
        check_shapes(node.get("tree"), &format!("{}.tree", here))?;
    }
    Ok(())
}

/// Merged tree as a configuration document, overlays removed
pub fn dump_config_yaml(tree: &[TreeNode]) -> Result<String, ConfigError> {
    let document = ConfigDocument {
        marker: Value::Null,
        tree: tree.iter().map(TreeNode::to_entry).collect(),
        overlays: Vec::new(),
    };
    serde_yaml::to_string(&document).map_err(|e| ConfigError::Parse {
        path: "<dump>".to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::SemanticRole;
    use assert_matches::assert_matches;
    use std::io::Write;

    const SAMPLE: &str = r#"
check-sr-results-configuration:
tree:
  - dir: acs_results
    tree:
      - file: uefi/BsaResults.log
        must-contain:
          - "Total Tests run"
      - dir: fdt
        optional:
        tree:
          - file: "*.dtb"
            devicetree:
overlays:
  - when-any: ["IR v2."]
    tree:
      - dir: acs_results
        tree:
          - dir: fdt
            optional: DELETE
"#;

    #[test]
    fn test_load_sample() {
        let config = load_str("sample", SAMPLE).unwrap();
        assert_eq!(config.tree.len(), 1);
        assert_eq!(config.overlays.len(), 1);

        let TreeNode::Dir(results) = &config.tree[0] else {
            panic!("expected dir");
        };
        let children = results.tree.as_ref().unwrap();
        assert_matches!(&children[1], TreeNode::Dir(fdt) if fdt.optional);

        let resolved = config.resolve(&IdentificationContext::new(vec!["SystemReady IR v2.0".into()]));
        let TreeNode::Dir(results) = &resolved[0] else {
            panic!("expected dir");
        };
        let TreeNode::Dir(fdt) = &results.tree.as_ref().unwrap()[1] else {
            panic!("expected dir");
        };
        assert!(!fdt.optional);
        assert_matches!(
            &fdt.tree.as_ref().unwrap()[0],
            TreeNode::File(f) if f.roles == vec![SemanticRole::DevicetreeBlob]
        );
    }

    #[test]
    fn test_empty_file_is_empty_tree() {
        let config = load_str("empty", "").unwrap();
        assert!(config.tree.is_empty());
        assert!(config.overlays.is_empty());
    }

    #[test]
    fn test_missing_marker() {
        assert_matches!(
            load_str("x", "tree: []\n"),
            Err(ConfigError::MissingMarker { .. })
        );
    }

    #[test]
    fn test_malformed_node_located() {
        let text = "check-sr-results-configuration:\ntree:\n  - dir: a\n    tree:\n      - optional:\n";
        assert_matches!(
            load_str("x", text),
            Err(ConfigError::MalformedNode { ref location, .. }) if location == "tree[0].tree[0]"
        );

        let text = "check-sr-results-configuration:\ntree:\n  - file: a\n    dir: b\n";
        assert_matches!(load_str("x", text), Err(ConfigError::MalformedNode { .. }));
    }

    #[test]
    fn test_delete_outside_overlay() {
        let text = "check-sr-results-configuration:\ntree:\n  - file: a\n    optional: DELETE\n";
        assert_matches!(
            load_str("x", text),
            Err(ConfigError::DeleteOutsideOverlay { .. })
        );
    }

    #[test]
    fn test_unknown_key_is_parse_error() {
        let text = "check-sr-results-configuration:\ntree:\n  - file: a\n    must-contian: [x]\n";
        assert_matches!(load_str("x", text), Err(ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = load(file.path()).unwrap();
        assert_eq!(config.tree.len(), 1);

        assert_matches!(
            load(Path::new("/nonexistent/config.yaml")),
            Err(ConfigError::Unreadable { .. })
        );
    }

    #[test]
    fn test_dump_reloads() {
        let config = load_str("sample", SAMPLE).unwrap();
        let dumped = dump_config_yaml(&config.tree).unwrap();
        assert!(dumped.starts_with("check-sr-results-configuration: null"));
        assert!(!dumped.contains("overlays"));

        let again = load_str("dump", &dumped).unwrap();
        assert_eq!(again.tree, config.tree);
    }
}
