//! # Block device diagnostics scorer
//!
//! The log holds one section per device. A criterion matches when every
//! field it names has the same value in the device results. The log passes
//! when at least the expected number of devices pass.

use crate::executors::criteria::{CriteriaDatabase, Verdict};
use regex::Regex;
use sr_checker_base::log_reader::{read_log, LogReaderOptions};
use sr_checker_base::strategies::{CollaboratorError, DeviceScorer, ScoreOutcome};
use sr_config::{log_debug, log_info, ConfigError};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_BLOCK_DEVICE_CRITERIA: &str =
    include_str!("../../data/block-devices-criteria.yaml");

static DEVICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"INFO: Block device : /dev/\w+").expect("device pattern is valid"));
static PARTITION_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"INFO: Partition table type : (GPT|MBR)").expect("partition pattern is valid")
});
static INVALID_PARTITION_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"INFO: Invalid partition table").expect("invalid partition pattern is valid")
});
static READ_OK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"INFO: Block read on /dev/\w+.*successful").expect("read pattern is valid")
});
static READ_FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"INFO: Block read on /dev/\w+.*failed").expect("read pattern is valid")
});
static WRITE_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Do you want to perform a write check on /dev/\w+\?")
        .expect("prompt pattern is valid")
});
static WRITE_OK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"INFO: write check passed on /dev/\w+").expect("write pattern is valid")
});
static WRITE_FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"INFO: write check failed on /dev/\w+").expect("write pattern is valid")
});

pub const PARTITION_TABLE_FIELD: &str = "partition_table";
pub const READ_FIELD: &str = "read";
pub const WRITE_FIELD: &str = "write";

pub type DeviceResults = BTreeMap<String, Verdict>;

/// Criteria rows list their results as a one-element sequence
pub type CriteriaResults = Vec<DeviceResults>;

#[derive(Default)]
struct Section {
    results: DeviceResults,
    awaiting_write: bool,
}

impl Section {
    fn set(&mut self, field: &str, verdict: Verdict) {
        self.results.insert(field.to_string(), verdict);
    }

    fn finish(mut self, devices: &mut Vec<DeviceResults>) {
        if self.results.is_empty() {
            return;
        }
        self.results
            .entry(READ_FIELD.to_string())
            .or_insert(Verdict::Fail);
        if self.awaiting_write {
            self.set(WRITE_FIELD, Verdict::Skipped);
        }
        devices.push(self.results);
    }
}

pub fn parse_block_device_log<S: AsRef<str>>(lines: &[S]) -> Vec<DeviceResults> {
    let mut devices = Vec::new();
    let mut section = Section::default();

    for line in lines {
        let line = line.as_ref();

        if DEVICE.is_match(line) {
            log_debug!("Block device", "line" => line.trim());
            std::mem::take(&mut section).finish(&mut devices);
        }

        if PARTITION_TABLE.is_match(line) {
            section.set(PARTITION_TABLE_FIELD, Verdict::Pass);
        } else if INVALID_PARTITION_TABLE.is_match(line) {
            section.set(PARTITION_TABLE_FIELD, Verdict::Fail);
        }

        if READ_OK.is_match(line) {
            section.set(READ_FIELD, Verdict::Pass);
        } else if READ_FAILED.is_match(line) {
            section.set(READ_FIELD, Verdict::Fail);
        }

        if WRITE_PROMPT.is_match(line) {
            section.awaiting_write = true;
        }

        if WRITE_OK.is_match(line) {
            section.set(WRITE_FIELD, Verdict::Pass);
            section.awaiting_write = false;
        } else if WRITE_FAILED.is_match(line) {
            section.set(WRITE_FIELD, Verdict::Fail);
            section.awaiting_write = false;
        }
    }

    section.finish(&mut devices);
    devices
}

fn describe(results: &DeviceResults) -> String {
    results
        .iter()
        .map(|(k, v)| format!("{} {}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct BlockDeviceScorer {
    criteria: CriteriaDatabase<CriteriaResults>,
    reader: LogReaderOptions,
}

impl BlockDeviceScorer {
    pub fn new(criteria: CriteriaDatabase<CriteriaResults>, reader: LogReaderOptions) -> Self {
        Self { criteria, reader }
    }

    pub fn builtin(reader: LogReaderOptions) -> Result<Self, ConfigError> {
        let criteria = CriteriaDatabase::from_str(
            "<builtin block device criteria>",
            DEFAULT_BLOCK_DEVICE_CRITERIA,
        )?;
        Ok(Self::new(criteria, reader))
    }

    pub fn score_devices(&self, devices: &[DeviceResults], expected: u32) -> ScoreOutcome {
        let mut pass_count = 0u32;
        let mut details = Vec::new();

        for (i, results) in devices.iter().enumerate() {
            let found = self.criteria.find(|rows| {
                rows.first().is_some_and(|row| {
                    row.iter().all(|(field, verdict)| results.get(field) == Some(verdict))
                })
            });

            match found {
                Some(criterion) => {
                    if criterion.criteria == Verdict::Pass {
                        pass_count += 1;
                    }
                    details.push(format!(
                        "device {}: {} -> {} ({}): {}",
                        i + 1,
                        describe(results),
                        criterion.criteria,
                        criterion.quality,
                        criterion.recommendation
                    ));
                }
                None => details.push(format!(
                    "device {}: {} -> no matching criteria",
                    i + 1,
                    describe(results)
                )),
            }
        }

        log_info!(
            "Block device diagnostics scored",
            "passed" => pass_count,
            "expected" => expected
        );
        ScoreOutcome {
            passed: pass_count >= expected,
            details,
        }
    }
}

impl DeviceScorer for BlockDeviceScorer {
    fn score(&self, log: &Path, expected: u32) -> Result<ScoreOutcome, CollaboratorError> {
        let lines = read_log(log, &self.reader).map_err(|e| CollaboratorError::Io {
            path: log.to_path_buf(),
            reason: e.source.to_string(),
        })?;
        Ok(self.score_devices(&parse_block_device_log(&lines), expected))
    }
}
