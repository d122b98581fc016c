//! External collaborators of the verification engine
//!
//! The walker only sees the traits in [`traits`]; concrete tools are
//! plugged in through [`Collaborators`].

pub mod command_executor;
pub mod errors;
pub mod registry;
pub mod traits;

pub use command_executor::{which, CommandError, CommandOutput, SystemCommandExecutor};
pub use errors::CollaboratorError;
pub use registry::Collaborators;
pub use traits::{
    ArchiveChecker, ArchiveStatus, CapsuleGuidStatus, CapsuleReport, CapsuleValidator,
    DeviceScorer, DevicetreeToolchain, GuidLookup, GuidLookupResult, SctParser, ScoreOutcome,
};
