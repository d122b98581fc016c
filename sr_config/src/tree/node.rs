//! Typed tree specification nodes
//!
//! The walker only ever sees these. Raw entries are converted once at load
//! time and patched in place by overlays.

use super::entry::{DirEntry, FileEntry, Flag, NodeEntry, Patch, SctSummaryParams};
use super::overlay::overlay_tree;
use crate::error::ConfigError;
use std::mem::discriminant;

/// Specialized sub-verifier attached to a file node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticRole {
    /// `result.md` regenerated from the SCT sequence file and summary
    SctSummary { seq_file: String },
    EsrtTable,
    UefiCapsule,
    DevicetreeBlob,
    EthernetLog,
    BootSourcesLog,
    UefiSniff,
    MustHaveEsp,
    ReportTxt,
}

impl SemanticRole {
    /// Configuration key carrying this role
    pub fn key(&self) -> &'static str {
        match self {
            SemanticRole::SctSummary { .. } => "sct-parser-result-md",
            SemanticRole::EsrtTable => "capsuleapp-esrt",
            SemanticRole::UefiCapsule => "uefi-capsule",
            SemanticRole::DevicetreeBlob => "devicetree",
            SemanticRole::EthernetLog => "ethernet",
            SemanticRole::BootSourcesLog => "boot-sources",
            SemanticRole::UefiSniff => "uefi-sniff",
            SemanticRole::MustHaveEsp => "must-have-esp",
            SemanticRole::ReportTxt => "report-txt",
        }
    }

    // Dispatch order on a matched file
    fn rank(&self) -> u8 {
        match self {
            SemanticRole::SctSummary { .. } => 0,
            SemanticRole::EsrtTable => 1,
            SemanticRole::UefiCapsule => 2,
            SemanticRole::DevicetreeBlob => 3,
            SemanticRole::EthernetLog => 4,
            SemanticRole::BootSourcesLog => 5,
            SemanticRole::UefiSniff => 6,
            SemanticRole::MustHaveEsp => 7,
            SemanticRole::ReportTxt => 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileNode {
    pub pattern: String,
    pub optional: bool,
    pub can_be_empty: bool,
    pub min_occurrences: Option<u32>,
    pub warn_if_not_named: Option<String>,
    pub must_contain: Option<Vec<String>>,
    pub should_contain: Option<Vec<String>>,
    pub warn_if_contains: Option<Vec<String>>,
    pub warn_once_if_contains: Option<Vec<String>>,
    pub error_if_contains: Option<Vec<String>>,
    /// Kept sorted in dispatch order
    pub roles: Vec<SemanticRole>,
}

impl FileNode {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    pub fn has_role(&self, role: &SemanticRole) -> bool {
        self.roles.iter().any(|r| discriminant(r) == discriminant(role))
    }

    pub fn with_role(mut self, role: SemanticRole) -> Self {
        set_role(&mut self.roles, role);
        self
    }

    fn apply(&mut self, entry: &FileEntry) {
        apply_flag(&mut self.optional, &entry.optional);
        apply_flag(&mut self.can_be_empty, &entry.can_be_empty);
        apply_value(&mut self.min_occurrences, &entry.min_occurrences);
        apply_value(&mut self.warn_if_not_named, &entry.warn_if_not_named);
        apply_value(&mut self.must_contain, &entry.must_contain);
        apply_value(&mut self.should_contain, &entry.should_contain);
        apply_value(&mut self.warn_if_contains, &entry.warn_if_contains);
        apply_value(&mut self.warn_once_if_contains, &entry.warn_once_if_contains);
        apply_value(&mut self.error_if_contains, &entry.error_if_contains);

        match &entry.sct_parser_result_md {
            None => {}
            Some(Patch::Delete) => clear_role(&mut self.roles, &sct_marker()),
            Some(Patch::Set(params)) => set_role(
                &mut self.roles,
                SemanticRole::SctSummary {
                    seq_file: params.seq_file.clone(),
                },
            ),
        }
        for (patch, role) in role_flags(entry) {
            apply_role(&mut self.roles, patch, role);
        }
    }

    fn to_entry(&self) -> FileEntry {
        let mut entry = FileEntry {
            file: self.pattern.clone(),
            optional: flag_entry(self.optional),
            can_be_empty: flag_entry(self.can_be_empty),
            min_occurrences: self.min_occurrences.map(Patch::Set),
            warn_if_not_named: self.warn_if_not_named.clone().map(Patch::Set),
            must_contain: self.must_contain.clone().map(Patch::Set),
            should_contain: self.should_contain.clone().map(Patch::Set),
            warn_if_contains: self.warn_if_contains.clone().map(Patch::Set),
            warn_once_if_contains: self.warn_once_if_contains.clone().map(Patch::Set),
            error_if_contains: self.error_if_contains.clone().map(Patch::Set),
            ..Default::default()
        };
        for role in &self.roles {
            let set = Some(Patch::Set(Flag(true)));
            match role {
                SemanticRole::SctSummary { seq_file } => {
                    entry.sct_parser_result_md = Some(Patch::Set(SctSummaryParams {
                        seq_file: seq_file.clone(),
                    }))
                }
                SemanticRole::EsrtTable => entry.capsuleapp_esrt = set,
                SemanticRole::UefiCapsule => entry.uefi_capsule = set,
                SemanticRole::DevicetreeBlob => entry.devicetree = set,
                SemanticRole::EthernetLog => entry.ethernet = set,
                SemanticRole::BootSourcesLog => entry.boot_sources = set,
                SemanticRole::UefiSniff => entry.uefi_sniff = set,
                SemanticRole::MustHaveEsp => entry.must_have_esp = set,
                SemanticRole::ReportTxt => entry.report_txt = set,
            }
        }
        entry
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirNode {
    pub pattern: String,
    pub optional: bool,
    pub min_entries: u32,
    pub max_entries: Option<u32>,
    pub min_occurrences: Option<u32>,
    pub warn_if_not_named: Option<String>,
    pub tree: Option<Vec<TreeNode>>,
}

/// A directory must hold at least one entry unless told otherwise
pub const DEFAULT_MIN_ENTRIES: u32 = 1;

impl DirNode {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            optional: false,
            min_entries: DEFAULT_MIN_ENTRIES,
            max_entries: None,
            min_occurrences: None,
            warn_if_not_named: None,
            tree: None,
        }
    }

    pub fn with_tree(mut self, tree: Vec<TreeNode>) -> Self {
        self.tree = Some(tree);
        self
    }

    fn apply(&mut self, entry: &DirEntry) {
        apply_flag(&mut self.optional, &entry.optional);
        match &entry.min_entries {
            None => {}
            Some(Patch::Delete) => self.min_entries = DEFAULT_MIN_ENTRIES,
            Some(Patch::Set(n)) => self.min_entries = *n,
        }
        apply_value(&mut self.max_entries, &entry.max_entries);
        apply_value(&mut self.min_occurrences, &entry.min_occurrences);
        apply_value(&mut self.warn_if_not_named, &entry.warn_if_not_named);

        match &entry.tree {
            None => {}
            Some(Patch::Delete) => self.tree = None,
            Some(Patch::Set(patches)) => match &mut self.tree {
                Some(children) => overlay_tree(children, patches),
                None => {
                    self.tree = Some(patches.iter().map(TreeNode::from_overlay_entry).collect())
                }
            },
        }
    }

    fn to_entry(&self) -> DirEntry {
        DirEntry {
            dir: self.pattern.clone(),
            optional: flag_entry(self.optional),
            min_entries: (self.min_entries != DEFAULT_MIN_ENTRIES)
                .then_some(Patch::Set(self.min_entries)),
            max_entries: self.max_entries.map(Patch::Set),
            min_occurrences: self.min_occurrences.map(Patch::Set),
            warn_if_not_named: self.warn_if_not_named.clone().map(Patch::Set),
            tree: self
                .tree
                .as_ref()
                .map(|children| Patch::Set(children.iter().map(TreeNode::to_entry).collect())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    File(FileNode),
    Dir(DirNode),
}

impl TreeNode {
    pub fn pattern(&self) -> &str {
        match self {
            TreeNode::File(node) => &node.pattern,
            TreeNode::Dir(node) => &node.pattern,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            TreeNode::File(_) => NodeKind::File,
            TreeNode::Dir(_) => NodeKind::Dir,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            TreeNode::File(node) => node.optional,
            TreeNode::Dir(node) => node.optional,
        }
    }

    pub fn min_occurrences(&self) -> Option<u32> {
        match self {
            TreeNode::File(node) => node.min_occurrences,
            TreeNode::Dir(node) => node.min_occurrences,
        }
    }

    pub fn to_entry(&self) -> NodeEntry {
        match self {
            TreeNode::File(node) => NodeEntry::File(node.to_entry()),
            TreeNode::Dir(node) => NodeEntry::Dir(node.to_entry()),
        }
    }

    /// Convert a base-tree entry, rejecting any `DELETE`
    pub fn from_base_entry(entry: &NodeEntry, location: &str) -> Result<Self, ConfigError> {
        if let Some(key) = deleted_key(entry) {
            return Err(ConfigError::DeleteOutsideOverlay {
                key: key.to_string(),
                location: location.to_string(),
            });
        }
        if let NodeEntry::Dir(DirEntry {
            tree: Some(Patch::Set(children)),
            ..
        }) = entry
        {
            for (i, child) in children.iter().enumerate() {
                Self::from_base_entry(child, &format!("{}.tree[{}]", location, i))?;
            }
        }
        Ok(Self::from_overlay_entry(entry))
    }

    /// Convert an entry appended by an overlay; deletions have nothing to remove
    pub fn from_overlay_entry(entry: &NodeEntry) -> Self {
        let mut node = match entry {
            NodeEntry::File(e) => TreeNode::File(FileNode::new(e.file.clone())),
            NodeEntry::Dir(e) => TreeNode::Dir(DirNode::new(e.dir.clone())),
        };
        node.apply(entry);
        node
    }

    /// Patch this node with an entry of the same kind
    pub fn apply(&mut self, entry: &NodeEntry) {
        match (self, entry) {
            (TreeNode::File(node), NodeEntry::File(e)) => node.apply(e),
            (TreeNode::Dir(node), NodeEntry::Dir(e)) => node.apply(e),
            _ => {}
        }
    }

    pub fn matches_entry(&self, entry: &NodeEntry) -> bool {
        let same_kind = matches!(
            (self, entry),
            (TreeNode::File(_), NodeEntry::File(_)) | (TreeNode::Dir(_), NodeEntry::Dir(_))
        );
        same_kind && self.pattern() == entry.pattern()
    }
}

fn apply_flag(target: &mut bool, patch: &Option<Patch<Flag>>) {
    match patch {
        None => {}
        Some(Patch::Delete) => *target = false,
        Some(Patch::Set(Flag(value))) => *target = *value,
    }
}

fn apply_value<T: Clone>(target: &mut Option<T>, patch: &Option<Patch<T>>) {
    match patch {
        None => {}
        Some(Patch::Delete) => *target = None,
        Some(Patch::Set(value)) => *target = Some(value.clone()),
    }
}

fn apply_role(roles: &mut Vec<SemanticRole>, patch: &Option<Patch<Flag>>, role: SemanticRole) {
    match patch {
        None => {}
        Some(Patch::Set(Flag(true))) => set_role(roles, role),
        Some(_) => clear_role(roles, &role),
    }
}

fn set_role(roles: &mut Vec<SemanticRole>, role: SemanticRole) {
    clear_role(roles, &role);
    roles.push(role);
    roles.sort_by_key(SemanticRole::rank);
}

fn clear_role(roles: &mut Vec<SemanticRole>, role: &SemanticRole) {
    roles.retain(|r| discriminant(r) != discriminant(role));
}

fn sct_marker() -> SemanticRole {
    SemanticRole::SctSummary {
        seq_file: String::new(),
    }
}

fn role_flags(entry: &FileEntry) -> [(&Option<Patch<Flag>>, SemanticRole); 8] {
    [
        (&entry.capsuleapp_esrt, SemanticRole::EsrtTable),
        (&entry.uefi_capsule, SemanticRole::UefiCapsule),
        (&entry.devicetree, SemanticRole::DevicetreeBlob),
        (&entry.ethernet, SemanticRole::EthernetLog),
        (&entry.boot_sources, SemanticRole::BootSourcesLog),
        (&entry.uefi_sniff, SemanticRole::UefiSniff),
        (&entry.must_have_esp, SemanticRole::MustHaveEsp),
        (&entry.report_txt, SemanticRole::ReportTxt),
    ]
}

fn flag_entry(value: bool) -> Option<Patch<Flag>> {
    value.then_some(Patch::Set(Flag(true)))
}

// First key of this entry (not its children) holding DELETE
fn deleted_key(entry: &NodeEntry) -> Option<&'static str> {
    fn is_del<T>(patch: &Option<Patch<T>>) -> bool {
        patch.as_ref().map(Patch::is_delete).unwrap_or(false)
    }

    match entry {
        NodeEntry::File(e) => {
            let keyed: [(&'static str, bool); 10] = [
                ("optional", is_del(&e.optional)),
                ("can-be-empty", is_del(&e.can_be_empty)),
                ("min-occurrences", is_del(&e.min_occurrences)),
                ("warn-if-not-named", is_del(&e.warn_if_not_named)),
                ("must-contain", is_del(&e.must_contain)),
                ("should-contain", is_del(&e.should_contain)),
                ("warn-if-contains", is_del(&e.warn_if_contains)),
                ("warn-once-if-contains", is_del(&e.warn_once_if_contains)),
                ("error-if-contains", is_del(&e.error_if_contains)),
                ("sct-parser-result-md", is_del(&e.sct_parser_result_md)),
            ];
            keyed
                .into_iter()
                .find(|(_, deleted)| *deleted)
                .map(|(key, _)| key)
                .or_else(|| {
                    role_flags(e)
                        .into_iter()
                        .find(|(patch, _)| is_del(*patch))
                        .map(|(_, role)| role.key())
                })
        }
        NodeEntry::Dir(e) => [
            ("optional", is_del(&e.optional)),
            ("min-entries", is_del(&e.min_entries)),
            ("max-entries", is_del(&e.max_entries)),
            ("min-occurrences", is_del(&e.min_occurrences)),
            ("warn-if-not-named", is_del(&e.warn_if_not_named)),
            ("tree", is_del(&e.tree)),
        ]
        .into_iter()
        .find(|(_, deleted)| *deleted)
        .map(|(key, _)| key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn entries(yaml: &str) -> Vec<NodeEntry> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_roles_sorted_in_dispatch_order() {
        let nodes = entries("- file: a\n  report-txt:\n  capsuleapp-esrt:\n  sct-parser-result-md:\n    seq-file: x.seq\n");
        let node = TreeNode::from_base_entry(&nodes[0], "tree[0]").unwrap();
        let TreeNode::File(file) = node else {
            panic!("expected file node");
        };
        assert_eq!(
            file.roles,
            vec![
                SemanticRole::SctSummary {
                    seq_file: "x.seq".to_string()
                },
                SemanticRole::EsrtTable,
                SemanticRole::ReportTxt,
            ]
        );
    }

    #[test]
    fn test_delete_in_base_rejected() {
        let nodes = entries("- dir: d\n  tree:\n    - file: a\n      must-contain: DELETE\n");
        let err = TreeNode::from_base_entry(&nodes[0], "tree[0]").unwrap_err();
        assert_matches!(
            err,
            ConfigError::DeleteOutsideOverlay { ref key, ref location }
                if key == "must-contain" && location == "tree[0].tree[0]"
        );
    }

    #[test]
    fn test_dir_defaults() {
        let nodes = entries("- dir: d\n");
        let node = TreeNode::from_base_entry(&nodes[0], "tree[0]").unwrap();
        assert_matches!(node, TreeNode::Dir(ref d) if d.min_entries == 1 && d.tree.is_none());
    }

    #[test]
    fn test_role_cleared_by_false() {
        let mut node = TreeNode::File(FileNode::new("a").with_role(SemanticRole::DevicetreeBlob));
        node.apply(&entries("- file: a\n  devicetree: false\n")[0]);
        assert_matches!(node, TreeNode::File(ref f) if f.roles.is_empty());
    }

    #[test]
    fn test_to_entry_preserves_node() {
        let nodes = entries(
            "- dir: d\n  min-entries: 0\n  tree:\n    - file: a\n      optional:\n      must-contain: [x, y]\n      uefi-sniff:\n",
        );
        let node = TreeNode::from_base_entry(&nodes[0], "tree[0]").unwrap();
        let again = TreeNode::from_base_entry(&node.to_entry(), "tree[0]").unwrap();
        assert_eq!(node, again);
    }
}
