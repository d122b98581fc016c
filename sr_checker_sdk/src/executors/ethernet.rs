//! # Ethernet diagnostics scorer
//!
//! Each ethtool self-test result starts a new device; the next ping result
//! belongs to it. Per-device results are matched exactly against the
//! criteria database. One bad device fails the log; a device no criterion
//! matches is only logged.

use crate::executors::criteria::{CriteriaDatabase, Quality, Verdict};
use regex::Regex;
use sr_checker_base::log_reader::{read_log, LogReaderOptions};
use sr_checker_base::strategies::{CollaboratorError, DeviceScorer, ScoreOutcome};
use sr_config::{log_debug, log_warning, ConfigError};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_ETHERNET_CRITERIA: &str = include_str!("../../data/ethernet-criteria.yaml");

static ETHTOOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"The test result is (PASS|FAIL)").expect("ethtool pattern is valid")
});
static PING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Ping to www\.arm\.com is (successful|failed)").expect("ping pattern is valid")
});

/// Ordered single-entry maps, e.g. `[{ethtool: PASS}, {ping: FAIL}]`
pub type DeviceResults = Vec<BTreeMap<String, Verdict>>;

fn step(name: &str, verdict: Verdict) -> BTreeMap<String, Verdict> {
    BTreeMap::from([(name.to_string(), verdict)])
}

/// Per-device results in log order
pub fn parse_ethernet_log<S: AsRef<str>>(lines: &[S]) -> Vec<DeviceResults> {
    let mut devices: Vec<DeviceResults> = Vec::new();
    let mut awaiting_ping = false;

    for line in lines {
        let line = line.as_ref();

        if !awaiting_ping {
            if let Some(caps) = ETHTOOL.captures(line) {
                let verdict = if &caps[1] == "PASS" {
                    Verdict::Pass
                } else {
                    Verdict::Fail
                };
                devices.push(vec![step("ethtool", verdict)]);
                log_debug!("ethtool result", "device" => devices.len(), "result" => verdict);
                awaiting_ping = true;
            }
        }

        if awaiting_ping {
            if let Some(caps) = PING.captures(line) {
                let verdict = if &caps[1] == "successful" {
                    Verdict::Pass
                } else {
                    Verdict::Fail
                };
                log_debug!("ping result", "device" => devices.len(), "result" => verdict);
                if let Some(device) = devices.last_mut() {
                    device.push(step("ping", verdict));
                }
                awaiting_ping = false;
            }
        }
    }

    devices
}

fn describe(results: &DeviceResults) -> String {
    if results.is_empty() {
        return "no result".to_string();
    }
    results
        .iter()
        .flat_map(|m| m.iter().map(|(k, v)| format!("{} {}", k, v)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct EthernetScorer {
    criteria: CriteriaDatabase<DeviceResults>,
    reader: LogReaderOptions,
}

impl EthernetScorer {
    pub fn new(criteria: CriteriaDatabase<DeviceResults>, reader: LogReaderOptions) -> Self {
        Self { criteria, reader }
    }

    pub fn builtin(reader: LogReaderOptions) -> Result<Self, ConfigError> {
        let criteria =
            CriteriaDatabase::from_str("<builtin ethernet criteria>", DEFAULT_ETHERNET_CRITERIA)?;
        Ok(Self::new(criteria, reader))
    }

    pub fn score_devices(&self, devices: &[DeviceResults], expected: u32) -> ScoreOutcome {
        let mut passed = true;
        let mut details = Vec::new();

        for (i, results) in devices.iter().enumerate() {
            match self.criteria.find(|r| r == results) {
                Some(criterion) => {
                    if criterion.quality == Quality::Bad {
                        passed = false;
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
                None => {
                    log_warning!(
                        "No criteria matches the device results",
                        "device" => i + 1,
                        "results" => describe(results)
                    );
                    details.push(format!(
                        "device {}: {} -> no matching criteria",
                        i + 1,
                        describe(results)
                    ));
                }
            }
        }

        if devices.len() < expected as usize {
            details.push(format!(
                "found {} of {} expected device(s)",
                devices.len(),
                expected
            ));
        }

        ScoreOutcome { passed, details }
    }
}

impl DeviceScorer for EthernetScorer {
    fn score(&self, log: &Path, expected: u32) -> Result<ScoreOutcome, CollaboratorError> {
        let lines = read_log(log, &self.reader).map_err(|e| CollaboratorError::Io {
            path: log.to_path_buf(),
            reason: e.source.to_string(),
        })?;
        Ok(self.score_devices(&parse_ethernet_log(&lines), expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
Running ethtool on eth0
INFO: The test result is PASS
INFO: Ping to www.arm.com is successful
Running ethtool on eth1
INFO: The test result is FAIL
INFO: Ping to www.arm.com is failed
";

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    fn scorer() -> EthernetScorer {
        EthernetScorer::builtin(LogReaderOptions::default()).unwrap()
    }

    #[test]
    fn test_parse_devices() {
        let devices = parse_ethernet_log(&lines(LOG));
        assert_eq!(
            devices,
            vec![
                vec![step("ethtool", Verdict::Pass), step("ping", Verdict::Pass)],
                vec![step("ethtool", Verdict::Fail), step("ping", Verdict::Fail)],
            ]
        );
    }

    #[test]
    fn test_devices_follow_the_log_not_the_count() {
        assert_eq!(parse_ethernet_log(&lines(LOG)).len(), 2);
        assert!(parse_ethernet_log(&lines("nothing to see\n")).is_empty());
    }

    #[test]
    fn test_ethtool_ignored_while_awaiting_ping() {
        let log = "The test result is PASS\nThe test result is FAIL\nPing to www.arm.com is successful\n";
        let devices = parse_ethernet_log(&lines(log));
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0][1], step("ping", Verdict::Pass));
    }

    #[test]
    fn test_scoring() {
        let s = scorer();

        let good = s.score_devices(&parse_ethernet_log(&lines(LOG)[..3]), 1);
        assert!(good.passed);
        assert_eq!(good.details.len(), 1);
        assert!(good.details[0].contains("GOOD"));

        let bad = s.score_devices(&parse_ethernet_log(&lines(LOG)), 2);
        assert!(!bad.passed);
        assert!(bad.details[1].contains("BAD"));
    }

    #[test]
    fn test_unmatched_and_missing_devices_keep_the_verdict() {
        let criteria = CriteriaDatabase::from_str(
            "good only",
            "criterias:\n  - results: [{ethtool: PASS}, {ping: PASS}]\n    criteria: PASS\n    quality: GOOD\n    recomendation: none\n",
        )
        .unwrap();
        let s = EthernetScorer::new(criteria, LogReaderOptions::default());

        let unmatched = s.score_devices(&parse_ethernet_log(&lines(LOG)), 2);
        assert!(unmatched.passed);
        assert!(unmatched.details[0].contains("GOOD"));
        assert!(unmatched.details[1].ends_with("no matching criteria"));

        let missing = s.score_devices(&parse_ethernet_log(&lines(LOG)[..3]), u32::MAX);
        assert!(missing.passed);
        assert_eq!(missing.details.len(), 2);
        assert_eq!(missing.details[1], format!("found 1 of {} expected device(s)", u32::MAX));
    }

    #[test]
    fn test_score_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ethtool-test.log");
        std::fs::write(&path, LOG).unwrap();

        let outcome = scorer().score(&path, 2).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.details.len(), 2);
    }
}
