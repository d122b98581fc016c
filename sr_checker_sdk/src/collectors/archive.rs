//! # Archive integrity
//!
//! Lists tarballs with `tar tf`; a listing failure means a corrupt archive.

use sr_checker_base::strategies::{
    ArchiveChecker, ArchiveStatus, CollaboratorError, SystemCommandExecutor,
};
use sr_config::log_debug;
use std::path::Path;

pub struct TarArchiveChecker {
    tar: String,
    executor: SystemCommandExecutor,
}

impl TarArchiveChecker {
    pub fn new(tar: impl Into<String>, executor: SystemCommandExecutor) -> Self {
        Self {
            tar: tar.into(),
            executor,
        }
    }
}

impl ArchiveChecker for TarArchiveChecker {
    fn verify(&self, path: &Path) -> Result<ArchiveStatus, CollaboratorError> {
        let output = self
            .executor
            .execute(&self.tar, &[std::ffi::OsStr::new("tf"), path.as_os_str()])?;
        log_debug!("tar listing", "path" => path.display(), "exit_code" => output.exit_code);

        if output.success() {
            Ok(ArchiveStatus::Ok)
        } else {
            let reason = output
                .stderr
                .lines()
                .next()
                .unwrap_or("tar failed")
                .to_string();
            Ok(ArchiveStatus::Corrupt(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_tar_not_whitelisted() {
        let checker = TarArchiveChecker::new("tar", SystemCommandExecutor::new());
        assert_matches!(
            checker.verify(Path::new("x.tar")),
            Err(CollaboratorError::Command(_))
        );
    }

    #[test]
    fn test_missing_tool() {
        let mut executor = SystemCommandExecutor::new();
        executor.allow_command("no-such-tar-binary");
        let checker = TarArchiveChecker::new("no-such-tar-binary", executor);
        assert_matches!(
            checker.verify(Path::new("x.tar")),
            Err(CollaboratorError::Command(_))
        );
    }
}
