//! Cross-file evidence gathered during the walk
//!
//! Sub-verifiers only append here; the deferred checks read it once the
//! whole tree has been visited.

use crate::guid::Guid;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

pub const NETWORK_CONTROLLERS: &str = "Total number of network controllers";

#[derive(Debug, Default)]
pub struct Evidence {
    /// FwClass GUIDs listed by ESRT dumps
    pub esrt_guids: BTreeSet<Guid>,
    /// Image type GUID of each capsule, with the capsule path
    pub capsule_guids: Vec<(Guid, PathBuf)>,
    /// Device paths the UEFI sniff test flagged as EFI system partitions
    pub esp_dev_paths: BTreeSet<String>,
    /// Device paths mapped by UEFI shell logs that must show an ESP
    pub dev_paths: Vec<(String, PathBuf)>,
    pub ethernet_logs: Vec<PathBuf>,
    pub boot_logs: Vec<PathBuf>,
    /// Matched entries per configuration path
    pub occurrences: BTreeMap<String, Vec<PathBuf>>,
    /// Fields extracted from report.txt templates
    pub report_txt: BTreeMap<String, String>,
    /// Directory entries seen but never matched by a node
    pub not_checked: BTreeSet<PathBuf>,
    /// Patterns already reported by warn-once checks
    pub warned_once: HashSet<String>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_occurrence(&mut self, confpath: &str, path: &Path) {
        self.occurrences
            .entry(confpath.to_string())
            .or_default()
            .push(path.to_path_buf());
    }

    pub fn occurrence_count(&self, confpath: &str) -> usize {
        self.occurrences.get(confpath).map(Vec::len).unwrap_or(0)
    }

    pub fn mark_checked(&mut self, path: &Path) {
        self.not_checked.remove(path);
    }

    /// Network controller count from report.txt, if it was a number
    pub fn reported_network_controllers(&self) -> Option<u32> {
        self.report_txt
            .get(NETWORK_CONTROLLERS)
            .and_then(|v| v.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurrences() {
        let mut evidence = Evidence::new();
        evidence.add_occurrence("/a/b", Path::new("r/a/b"));
        evidence.add_occurrence("/a/b", Path::new("r/a2/b"));
        assert_eq!(evidence.occurrence_count("/a/b"), 2);
        assert_eq!(evidence.occurrence_count("/a/c"), 0);
    }

    #[test]
    fn test_reported_controllers() {
        let mut evidence = Evidence::new();
        assert_eq!(evidence.reported_network_controllers(), None);
        evidence
            .report_txt
            .insert(NETWORK_CONTROLLERS.to_string(), "2".to_string());
        assert_eq!(evidence.reported_network_controllers(), Some(2));
    }
}
