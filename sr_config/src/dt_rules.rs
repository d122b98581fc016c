//! Devicetree diagnostic classification rules
//!
//! A rule file is an ordered YAML list of `{rule, criteria, update}`.
//! Criteria are substring tests on the fixed diagnostic fields; updates may
//! set any field.

use crate::error::{parse_yaml, read_config_file, ConfigError};
use crate::log_debug;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Fixed fields of a parsed devicetree diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticField {
    DevicetreeNode,
    DtcWarningName,
    DtValidateSchema,
    File,
    Line,
    Linenum,
    Type,
    WarningMessage,
}

impl DiagnosticField {
    pub const ALL: [DiagnosticField; 8] = [
        DiagnosticField::DevicetreeNode,
        DiagnosticField::DtcWarningName,
        DiagnosticField::DtValidateSchema,
        DiagnosticField::File,
        DiagnosticField::Line,
        DiagnosticField::Linenum,
        DiagnosticField::Type,
        DiagnosticField::WarningMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticField::DevicetreeNode => "devicetree_node",
            DiagnosticField::DtcWarningName => "dtc_warning_name",
            DiagnosticField::DtValidateSchema => "dt_validate_schema",
            DiagnosticField::File => "file",
            DiagnosticField::Line => "line",
            DiagnosticField::Linenum => "linenum",
            DiagnosticField::Type => "type",
            DiagnosticField::WarningMessage => "warning_message",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl std::fmt::Display for DiagnosticField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub name: String,
    /// All must be substrings of the entry's field values
    pub criteria: Vec<(DiagnosticField, String)>,
    /// Field name to new value; unknown names land in the entry's extras
    pub update: Vec<(String, String)>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    rule: String,
    #[serde(default)]
    criteria: BTreeMap<String, Scalar>,
    #[serde(default)]
    update: BTreeMap<String, Scalar>,
}

// Rule values may be written as numbers
struct Scalar(String);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;
        match serde_yaml::Value::deserialize(deserializer)? {
            serde_yaml::Value::String(s) => Ok(Scalar(s)),
            serde_yaml::Value::Number(n) => Ok(Scalar(n.to_string())),
            serde_yaml::Value::Bool(b) => Ok(Scalar(b.to_string())),
            other => Err(D::Error::custom(format!(
                "expected a scalar, got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub rules: Vec<ClassificationRule>,
}

impl RuleSet {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read_config_file(path)?;
        Self::from_str(&path.display().to_string(), &text)
    }

    pub fn from_str(source: &str, text: &str) -> Result<Self, ConfigError> {
        let value = parse_yaml(source, text)?;
        if value.is_null() {
            log_debug!("Empty rule file", "source" => source);
            return Ok(Self::default());
        }
        let raw = Vec::<RawRule>::deserialize(value).map_err(|e| ConfigError::Parse {
            path: source.to_string(),
            reason: e.to_string(),
        })?;

        let mut names = HashSet::new();
        let mut rules = Vec::with_capacity(raw.len());
        for rule in raw {
            if !names.insert(rule.rule.clone()) {
                return Err(ConfigError::Duplicate {
                    kind: "rule",
                    name: rule.rule,
                    path: source.to_string(),
                });
            }

            let mut criteria = Vec::with_capacity(rule.criteria.len());
            for (key, Scalar(value)) in rule.criteria {
                let field = DiagnosticField::parse(&key).ok_or_else(|| ConfigError::UnknownField {
                    rule: rule.rule.clone(),
                    field: key.clone(),
                })?;
                criteria.push((field, value));
            }
            let update = rule
                .update
                .into_iter()
                .map(|(key, Scalar(value))| (key, value))
                .collect();

            rules.push(ClassificationRule {
                name: rule.rule,
                criteria,
                update,
            });
        }

        log_debug!("Loaded classification rules", "source" => source, "rules" => rules.len());
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const RULES: &str = r#"
- rule: Ignore memory node unit address
  criteria:
    dtc_warning_name: unit_address_vs_reg
    devicetree_node: /memory
  update:
    type: ignored
- rule: Linenum as number
  criteria:
    linenum: 12
  update:
    type: error
    reason: known bad
"#;

    #[test]
    fn test_load_rules() {
        let rules = RuleSet::from_str("rules", RULES).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules.rules[0].criteria,
            vec![
                (DiagnosticField::DevicetreeNode, "/memory".to_string()),
                (DiagnosticField::DtcWarningName, "unit_address_vs_reg".to_string()),
            ]
        );
        assert_eq!(
            rules.rules[1].criteria,
            vec![(DiagnosticField::Linenum, "12".to_string())]
        );
        assert_eq!(rules.rules[1].update[0], ("reason".to_string(), "known bad".to_string()));
    }

    #[test]
    fn test_duplicate_rule_name() {
        let text = "- rule: a\n- rule: a\n";
        assert_matches!(
            RuleSet::from_str("rules", text),
            Err(ConfigError::Duplicate { kind: "rule", .. })
        );
    }

    #[test]
    fn test_unknown_criteria_field() {
        let text = "- rule: a\n  criteria:\n    colour: red\n";
        assert_matches!(
            RuleSet::from_str("rules", text),
            Err(ConfigError::UnknownField { ref field, .. }) if field == "colour"
        );
    }

    #[test]
    fn test_empty_rule_file() {
        assert!(RuleSet::from_str("rules", "").unwrap().is_empty());
    }

    #[test]
    fn test_field_names() {
        for field in DiagnosticField::ALL {
            assert_eq!(DiagnosticField::parse(field.as_str()), Some(field));
        }
        assert_eq!(DiagnosticField::parse("updated_by_rule"), None);
    }
}
