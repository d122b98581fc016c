//! # External tool adapters
//!
//! Collaborators that delegate to a program on the host.

pub mod archive;
pub mod capsule_tool;
pub mod devicetree;
pub mod guid_tool;
pub mod probe;
pub mod sct;

pub use archive::TarArchiveChecker;
pub use capsule_tool::ExternalCapsuleTool;
pub use devicetree::DevicetreeTools;
pub use guid_tool::ExternalGuidTool;
pub use probe::{probe_tool_versions, version_probes};
pub use sct::ExternalSctParser;
