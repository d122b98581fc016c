//! Conditional overlays and the merge that applies them
//!
//! Overlays patch the base tree in declared order. A patch node matches the
//! base node of the same kind with the same pattern text; unmatched patch
//! nodes are appended as new siblings.

use super::entry::{NodeEntry, OverlayEntry};
use super::node::TreeNode;
use crate::error::ConfigError;
use crate::logging::codes;
use crate::{log_debug, log_success, log_warning};

/// Strings known about the result tree: version label and recognised files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentificationContext {
    entries: Vec<String>,
}

impl IdentificationContext {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when `condition` occurs inside any context entry
    pub fn contains(&self, condition: &str) -> bool {
        self.entries.iter().any(|entry| entry.contains(condition))
    }

    /// False for an empty condition list
    pub fn satisfies_any(&self, conditions: &[String]) -> bool {
        conditions.iter().any(|c| self.contains(c))
    }

    /// True for an empty condition list
    pub fn satisfies_all(&self, conditions: &[String]) -> bool {
        conditions.iter().all(|c| self.contains(c))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayGuard {
    WhenAny(Vec<String>),
    WhenAll(Vec<String>),
}

impl OverlayGuard {
    pub fn evaluate(&self, context: &IdentificationContext) -> bool {
        match self {
            OverlayGuard::WhenAny(conditions) => context.satisfies_any(conditions),
            OverlayGuard::WhenAll(conditions) => context.satisfies_all(conditions),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub guard: OverlayGuard,
    pub tree: Vec<NodeEntry>,
}

impl Overlay {
    pub fn from_entry(entry: &OverlayEntry, index: usize) -> Result<Self, ConfigError> {
        let guard = match (&entry.when_any, &entry.when_all) {
            (Some(any), None) => OverlayGuard::WhenAny(any.clone()),
            (None, Some(all)) => OverlayGuard::WhenAll(all.clone()),
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidOverlay {
                    index,
                    reason: "both `when-any' and `when-all' given".to_string(),
                })
            }
            (None, None) => {
                return Err(ConfigError::InvalidOverlay {
                    index,
                    reason: "no `when-any' or `when-all' guard".to_string(),
                })
            }
        };
        Ok(Self {
            guard,
            tree: entry.tree.clone(),
        })
    }
}

/// Patch `dst` in place with the nodes of `src`
pub fn overlay_tree(dst: &mut Vec<TreeNode>, src: &[NodeEntry]) {
    // Only nodes present before this merge are candidates
    let original = dst.len();

    for patch in src {
        let mut candidates = (0..original).filter(|&i| dst[i].matches_entry(patch));
        match candidates.next() {
            Some(first) => {
                if candidates.next().is_some() {
                    log_warning!(
                        code = codes::configuration::DUPLICATE_PATTERN,
                        "Several nodes share a pattern; patching the first",
                        "pattern" => patch.pattern()
                    );
                }
                log_debug!("Overlay patches node", "pattern" => patch.pattern());
                dst[first].apply(patch);
            }
            None => {
                log_debug!("Overlay appends node", "pattern" => patch.pattern());
                dst.push(TreeNode::from_overlay_entry(patch));
            }
        }
    }
}

/// Merge one overlay tree onto a base tree
pub fn merge_overlay(base: &[TreeNode], overlay: &[NodeEntry]) -> Vec<TreeNode> {
    let mut merged = base.to_vec();
    overlay_tree(&mut merged, overlay);
    merged
}

/// Apply every overlay whose guard holds, in declared order
pub fn resolve_overlays(
    base: &[TreeNode],
    overlays: &[Overlay],
    context: &IdentificationContext,
) -> Vec<TreeNode> {
    let mut tree = base.to_vec();

    for (index, overlay) in overlays.iter().enumerate() {
        if overlay.guard.evaluate(context) {
            log_success!(
                codes::success::OVERLAY_APPLIED,
                "Applying overlay",
                "index" => index
            );
            overlay_tree(&mut tree, &overlay.tree);
        } else {
            log_debug!("Skipping overlay", "index" => index);
        }
    }

    tree
}
