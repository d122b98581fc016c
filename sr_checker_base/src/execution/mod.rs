//! Result tree verification
//!
//! The walker drives content checks and role sub-verifiers over the result
//! tree, then runs the deferred cross-file checks.

pub mod content_checks;
pub mod deferred_ops;
pub mod engine;
pub mod evidence;
pub mod roles;

pub use content_checks::ContainsAction;
pub use deferred_ops::{DeferredCheck, DeviceClass};
pub use engine::{walk, TreeWalker, WalkError, WalkOptions, WalkOutcome};
pub use evidence::Evidence;
