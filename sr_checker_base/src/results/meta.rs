//! Run meta-data: command line, date and the versions of external tools

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetaData {
    entries: BTreeMap<String, String>,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command line, date and crate version of this run
    pub fn for_run(args: &[String], started: DateTime<Utc>) -> Self {
        let mut meta = Self::new();
        meta.insert("command-line", args.join(" "));
        meta.insert("date", started.format("%a %b %e %H:%M:%S %Y UTC").to_string());
        meta.insert("checker-version", env!("CARGO_PKG_VERSION"));
        meta
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sorted `key: value` block, each line starting with `prefix`
    pub fn render(&self, prefix: &str) -> String {
        let mut out = format!("{prefix}meta-data\n{prefix}---------\n");
        for (key, value) in self.iter() {
            out.push_str(&format!("{prefix}{key}: {value}\n"));
        }
        out
    }
}

/// Host the checker ran on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostContext {
    pub hostname: String,
    pub os_info: String,
}

impl HostContext {
    pub fn from_system() -> Self {
        Self {
            hostname: hostname::get()
                .unwrap_or_else(|_| std::ffi::OsString::from("unknown"))
                .to_string_lossy()
                .to_string(),
            os_info: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}
