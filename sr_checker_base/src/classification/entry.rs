//! Parsed devicetree diagnostic

use serde::Serialize;
use sr_config::dt_rules::DiagnosticField;
use std::borrow::Cow;
use std::collections::BTreeMap;

pub const DTC_WARNING: &str = "dtc warning";
pub const DT_VALIDATE_WARNING: &str = "dt-validate warning";
pub const IGNORED: &str = "ignored";

/// One diagnostic from a devicetree log
///
/// The fixed fields are the ones rules may test. Updates naming any other
/// key land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticEntry {
    pub file: String,
    pub linenum: usize,
    pub line: String,
    pub devicetree_node: String,
    pub warning_message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtc_warning_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt_validate_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by_rule: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl DiagnosticEntry {
    pub fn field(&self, field: DiagnosticField) -> Option<Cow<'_, str>> {
        match field {
            DiagnosticField::DevicetreeNode => Some(Cow::Borrowed(&self.devicetree_node)),
            DiagnosticField::DtcWarningName => self.dtc_warning_name.as_deref().map(Cow::Borrowed),
            DiagnosticField::DtValidateSchema => {
                self.dt_validate_schema.as_deref().map(Cow::Borrowed)
            }
            DiagnosticField::File => Some(Cow::Borrowed(&self.file)),
            DiagnosticField::Line => Some(Cow::Borrowed(&self.line)),
            DiagnosticField::Linenum => Some(Cow::Owned(self.linenum.to_string())),
            DiagnosticField::Type => Some(Cow::Borrowed(&self.kind)),
            DiagnosticField::WarningMessage => Some(Cow::Borrowed(&self.warning_message)),
        }
    }

    /// Value of a fixed field, `updated_by_rule` or an extra key
    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        match DiagnosticField::parse(key) {
            Some(field) => self.field(field),
            None if key == "updated_by_rule" => self.updated_by_rule.as_deref().map(Cow::Borrowed),
            None => self.extra.get(key).map(|v| Cow::Borrowed(v.as_str())),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match DiagnosticField::parse(key) {
            Some(DiagnosticField::DevicetreeNode) => self.devicetree_node = value.to_string(),
            Some(DiagnosticField::DtcWarningName) => self.dtc_warning_name = Some(value.to_string()),
            Some(DiagnosticField::DtValidateSchema) => {
                self.dt_validate_schema = Some(value.to_string())
            }
            Some(DiagnosticField::File) => self.file = value.to_string(),
            Some(DiagnosticField::Line) => self.line = value.to_string(),
            Some(DiagnosticField::Linenum) => match value.parse() {
                Ok(n) => self.linenum = n,
                Err(_) => {
                    self.extra.insert(key.to_string(), value.to_string());
                }
            },
            Some(DiagnosticField::Type) => self.kind = value.to_string(),
            Some(DiagnosticField::WarningMessage) => self.warning_message = value.to_string(),
            None if key == "updated_by_rule" => self.updated_by_rule = Some(value.to_string()),
            None => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Every criterion value occurs inside the entry's field value
    pub fn matches(&self, criteria: &[(DiagnosticField, String)]) -> bool {
        criteria.iter().all(|(field, wanted)| {
            self.field(*field)
                .map(|value| value.contains(wanted.as_str()))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> DiagnosticEntry {
        DiagnosticEntry {
            file: "fdt.dts".into(),
            linenum: 42,
            line: "x".into(),
            devicetree_node: "/soc/serial@1000".into(),
            warning_message: "unit address mismatch".into(),
            kind: DTC_WARNING.into(),
            dtc_warning_name: Some("unit_address_vs_reg".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_substring_match() {
        let e = entry();
        assert!(e.matches(&[(DiagnosticField::DevicetreeNode, "serial".into())]));
        assert!(e.matches(&[(DiagnosticField::Linenum, "4".into())]));
        assert!(e.matches(&[]));
        assert!(!e.matches(&[(DiagnosticField::DevicetreeNode, "Serial".into())]));
        assert!(!e.matches(&[(DiagnosticField::DtValidateSchema, "".into())]));
    }

    #[test]
    fn test_set_and_get() {
        let mut e = entry();
        e.set("type", "ignored");
        e.set("reason", "known");
        e.set("linenum", "7");
        assert_eq!(e.kind, IGNORED);
        assert_eq!(e.get("reason").as_deref(), Some("known"));
        assert_eq!(e.get("linenum").as_deref(), Some("7"));
        assert_eq!(e.get("missing"), None);
    }
}
