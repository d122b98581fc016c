//! # SystemReady result checker engine
//!
//! Identifies a result tree, walks it against the resolved tree
//! specification and accumulates passes, warnings and errors.

pub mod cache;
pub mod classification;
pub mod execution;
pub mod guid;
pub mod identify;
pub mod log_reader;
pub mod results;
pub mod strategies;

// Convenience re-exports
pub use execution::{walk, TreeWalker, WalkError, WalkOptions, WalkOutcome};
pub use identify::{identify, Identification};
pub use results::{Report, Stats};

pub mod prelude {
    pub use crate::cache::RegenPolicy;
    pub use crate::classification::{DiagnosticEntry, EntryFilter, ParsedLog};
    pub use crate::execution::{Evidence, TreeWalker, WalkError, WalkOptions, WalkOutcome};
    pub use crate::guid::Guid;
    pub use crate::identify::{identify, Identification};
    pub use crate::log_reader::{read_log, LogReaderOptions};
    pub use crate::results::{Finding, Report, ResultGenerator, RunResult, Severity, Stats};

    pub use crate::strategies::{
        ArchiveChecker, ArchiveStatus, CapsuleGuidStatus, CapsuleReport, CapsuleValidator,
        CollaboratorError, Collaborators, DeviceScorer, DevicetreeToolchain, GuidLookup,
        GuidLookupResult, SctParser, ScoreOutcome, SystemCommandExecutor,
    };
}
