//! Regeneration policy for derived artifacts
//!
//! Slow tool outputs (devicetree logs, SCT summaries) are rebuilt only when
//! one of their inputs is newer than the output.

use sr_config::config::compile_time::tools::REGEN_MTIME_MARGIN_SECONDS;
use sr_config::log_debug;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegenPolicy {
    pub force: bool,
    /// Dependencies must be newer by more than this to count
    pub margin: Duration,
}

impl Default for RegenPolicy {
    fn default() -> Self {
        Self {
            force: false,
            margin: Duration::from_secs(REGEN_MTIME_MARGIN_SECONDS),
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl RegenPolicy {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    /// True when `output` is missing or older than any dependency
    ///
    /// An unreadable dependency also triggers regeneration, so that the
    /// regenerating tool reports the problem.
    pub fn need_regen(&self, output: &Path, deps: &[PathBuf]) -> bool {
        if self.force {
            log_debug!("Forcing regeneration", "output" => output.display());
            return true;
        }

        let Some(output_time) = modified(output).filter(|_| output.is_file()) else {
            log_debug!("Derived file does not exist", "output" => output.display());
            return true;
        };

        for dep in deps {
            match modified(dep) {
                Some(dep_time) if dep_time > output_time + self.margin => {
                    log_debug!(
                        "Dependency more recent than output",
                        "dependency" => dep.display(),
                        "output" => output.display()
                    );
                    return true;
                }
                Some(_) => {}
                None => {
                    log_debug!("Dependency unreadable", "dependency" => dep.display());
                    return true;
                }
            }
        }

        log_debug!("No need to regenerate", "output" => output.display());
        false
    }
}

/// Location of a derived artifact inside the cache directory
///
/// The source path is flattened so that artifacts of different result
/// trees never collide.
pub fn cache_path(cache_dir: &Path, source: &Path, suffix: &str) -> PathBuf {
    let flat: String = source
        .to_string_lossy()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    cache_dir.join(format!("{}{}", flat.trim_start_matches('_'), suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_missing_output_needs_regen() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RegenPolicy::default();
        assert!(policy.need_regen(&dir.path().join("out.log"), &[]));
    }

    #[test]
    fn test_mtime_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.dtb");
        let output = dir.path().join("out.log");
        fs::write(&input, b"x").unwrap();
        fs::write(&output, b"y").unwrap();

        let now = SystemTime::now();
        set_mtime(&input, now - Duration::from_secs(100));
        set_mtime(&output, now);
        let policy = RegenPolicy::default();
        assert!(!policy.need_regen(&output, &[input.clone()]));
        assert!(RegenPolicy::forced().need_regen(&output, &[input.clone()]));

        set_mtime(&input, now + Duration::from_secs(100));
        assert!(policy.need_regen(&output, &[input]));
    }

    #[test]
    fn test_missing_dependency_needs_regen() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.log");
        fs::write(&output, b"y").unwrap();
        assert!(RegenPolicy::default().need_regen(&output, &[dir.path().join("gone")]));
    }

    #[test]
    fn test_cache_path_flattens() {
        let path = cache_path(Path::new("/cache"), Path::new("/res/fdt/a.dtb"), ".log");
        assert_eq!(path, PathBuf::from("/cache/res_fdt_a.dtb.log"));
    }
}
