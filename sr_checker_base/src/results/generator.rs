//! # Result Generator
//!
//! Converts a finished run into the JSON report written by `--json`.

use crate::results::meta::{HostContext, MetaData};
use crate::results::types::{Finding, Report, Stats};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Serializable outcome of one checker run
#[derive(Debug, Serialize)]
pub struct RunResult {
    /// Unique identifier for this run
    pub run_id: String,
    pub identification: String,
    pub host: HostContext,
    pub timestamp: TimestampInfo,
    pub stats: Stats,
    pub passed: bool,
    pub findings: Vec<Finding>,
    pub meta_data: MetaData,
}

#[derive(Debug, Serialize)]
pub struct TimestampInfo {
    pub run_start: DateTime<Utc>,
    pub run_end: DateTime<Utc>,
    pub duration_ms: u64,
}

pub struct ResultGenerator;

impl ResultGenerator {
    pub fn generate(
        report: &Report,
        identification: &str,
        meta_data: &MetaData,
        run_start: DateTime<Utc>,
    ) -> RunResult {
        let run_end = Utc::now();
        RunResult {
            run_id: format!("run_{}", uuid::Uuid::new_v4()),
            identification: identification.to_string(),
            host: HostContext::from_system(),
            timestamp: TimestampInfo {
                run_start,
                run_end,
                duration_ms: (run_end - run_start).num_milliseconds().max(0) as u64,
            },
            stats: report.stats(),
            passed: report.exit_code() == 0,
            findings: report.findings().to_vec(),
            meta_data: meta_data.clone(),
        }
    }
}

impl RunResult {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_config::logging::codes;

    #[test]
    fn test_json_report() {
        let mut report = Report::quiet();
        report.pass("ok");
        report.error(codes::artifact::MISSING, "`x' missing");

        let result = ResultGenerator::generate(&report, "Unknown", &MetaData::new(), Utc::now());
        assert!(!result.passed);
        assert!(result.run_id.starts_with("run_"));

        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["identification"], "Unknown");
        assert_eq!(json["stats"]["error"], 1);
        assert_eq!(json["findings"][0]["severity"], "error");
        assert_eq!(json["findings"][0]["code"], "E010");
    }
}
