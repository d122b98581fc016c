//! Pass/fail criteria databases shared by the device log scorers

use serde::de::DeserializeOwned;
use serde::Deserialize;
use sr_config::error::{parse_yaml, read_config_file};
use sr_config::{log_debug, ConfigError};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Skipped,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Skipped => "SKIPPED",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quality {
    Good,
    Poor,
    Bad,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quality::Good => "GOOD",
            Quality::Poor => "POOR",
            Quality::Bad => "BAD",
        })
    }
}

/// One row: the results it applies to and what they mean
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Criterion<R> {
    pub results: R,
    pub criteria: Verdict,
    pub quality: Quality,
    #[serde(alias = "recomendation", default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(bound(deserialize = "R: DeserializeOwned"))]
pub struct CriteriaDatabase<R> {
    #[serde(default = "Vec::new")]
    pub criterias: Vec<Criterion<R>>,
}

impl<R: DeserializeOwned> CriteriaDatabase<R> {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read_config_file(path)?;
        Self::from_str(&path.display().to_string(), &text)
    }

    pub fn from_str(source: &str, text: &str) -> Result<Self, ConfigError> {
        let value = parse_yaml(source, text)?;
        if value.is_null() {
            log_debug!("Empty criteria database", "source" => source);
            return Ok(Self {
                criterias: Vec::new(),
            });
        }
        let db: Self = serde_yaml::from_value(value).map_err(|e| ConfigError::Parse {
            path: source.to_string(),
            reason: e.to_string(),
        })?;
        log_debug!("Loaded criteria database", "source" => source, "criterias" => db.criterias.len());
        Ok(db)
    }

    /// First criterion accepted by `matches`
    pub fn find(&self, mut matches: impl FnMut(&R) -> bool) -> Option<&Criterion<R>> {
        self.criterias.iter().find(|c| matches(&c.results))
    }
}
