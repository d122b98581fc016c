//! Tree specification model
//!
//! A configuration file declares the expected result tree (`tree:`) and
//! conditional patches to it (`overlays:`). Loading yields typed
//! [`TreeNode`]s; [`merge_overlay`] and [`resolve_overlays`] produce the tree
//! the walker verifies.

pub mod entry;
pub mod loader;
pub mod node;
pub mod overlay;

pub use entry::{NodeEntry, Patch, DELETE};
pub use loader::{dump_config_yaml, load, load_str, CheckerConfig, CONFIG_MARKER};
pub use node::{DirNode, FileNode, NodeKind, SemanticRole, TreeNode, DEFAULT_MIN_ENTRIES};
pub use overlay::{merge_overlay, resolve_overlays, IdentificationContext, Overlay, OverlayGuard};
