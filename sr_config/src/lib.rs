//! Configuration front end of the SystemReady result checker
//!
//! Loads the tree specification and its overlays, the identification
//! database and the devicetree classification rules. Also hosts the
//! build-time constants, runtime preferences and the logging framework
//! shared by the whole workspace.

pub mod config;
#[macro_use]
pub mod logging;
pub mod dt_rules;
pub mod error;
pub mod identify_db;
pub mod tree;

pub use dt_rules::{ClassificationRule, DiagnosticField, RuleSet};
pub use error::ConfigError;
pub use identify_db::{FileRequirement, IdentifyDatabase, KnownFile, VersionEntry};
pub use tree::{
    dump_config_yaml, merge_overlay, resolve_overlays, CheckerConfig, DirNode, FileNode,
    IdentificationContext, Overlay, OverlayGuard, SemanticRole, TreeNode,
};
