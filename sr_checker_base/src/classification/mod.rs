//! Devicetree diagnostic classification

pub mod devicetree_log;
pub mod engine;
pub mod entry;
pub mod filter;

pub use devicetree_log::{non_ignored, parse_devicetree_log, render_table, summarize, ParsedLog};
pub use engine::{classify, classify_entry, dedupe, first_match};
pub use entry::{DiagnosticEntry, DTC_WARNING, DT_VALIDATE_WARNING, IGNORED};
pub use filter::{EntryFilter, FilterOp};
