//! # External capsule tool
//!
//! Adapter for a capsule tool that prints its verdict on stdout and its GUID
//! database lookup on stderr or as the last stdout line.

use regex::Regex;
use sr_checker_base::guid::Guid;
use sr_checker_base::strategies::{
    CapsuleGuidStatus, CapsuleReport, CapsuleValidator, CollaboratorError, SystemCommandExecutor,
};
use sr_config::log_debug;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::LazyLock;

pub const VALID_CAPSULE: &str = "Valid authenticated capsule in FMP format";

static IMAGE_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Image type id GUID: ([a-f0-9-]+)").expect("image type pattern is valid")
});
static KNOWN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Capsule update image type id `([a-f0-9-]+)' is known: "(.*)""#)
        .expect("known pattern is valid")
});
static UNKNOWN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Capsule update image type id `([a-f0-9-]+)' is unknown")
        .expect("unknown pattern is valid")
});

pub struct ExternalCapsuleTool {
    tool: String,
    executor: SystemCommandExecutor,
}

impl ExternalCapsuleTool {
    pub fn new(tool: impl Into<String>, executor: SystemCommandExecutor) -> Self {
        Self {
            tool: tool.into(),
            executor,
        }
    }

    fn unexpected(&self, reason: impl Into<String>) -> CollaboratorError {
        CollaboratorError::UnexpectedOutput {
            tool: self.tool.clone(),
            reason: reason.into(),
        }
    }
}

/// Verdict from the tool's two output streams
pub fn interpret_output(stdout: &str, stderr: &str) -> Result<CapsuleReport, String> {
    let lines: Vec<&str> = stdout.lines().collect();

    if lines.first().map(|l| l.trim_end()) != Some(VALID_CAPSULE) {
        return Ok(CapsuleReport {
            valid: false,
            authenticated: false,
            image_type_guid: None,
            guid_status: CapsuleGuidStatus::Inconclusive("capsule not validated".to_string()),
            warnings: lines.first().map(|l| l.to_string()).into_iter().collect(),
        });
    }

    let guid_text = lines
        .get(1)
        .and_then(|l| IMAGE_TYPE.captures(l))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| "no image type GUID".to_string())?;
    let guid: Guid = guid_text
        .parse()
        .map_err(|e| format!("bad image type GUID `{}': {}", guid_text, e))?;

    let known = KNOWN
        .captures(stderr)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().to_string());
    let unknown = lines.last().is_some_and(|l| UNKNOWN.is_match(l));

    let guid_status = match (known, unknown) {
        (Some(description), false) => CapsuleGuidStatus::Known(description),
        (None, true) => CapsuleGuidStatus::Unknown,
        (Some(_), true) => {
            CapsuleGuidStatus::Inconclusive("GUID reported both known and unknown".to_string())
        }
        (None, false) => {
            CapsuleGuidStatus::Inconclusive("no GUID lookup verdict".to_string())
        }
    };

    Ok(CapsuleReport {
        valid: true,
        authenticated: true,
        image_type_guid: Some(guid),
        guid_status,
        warnings: Vec::new(),
    })
}

impl CapsuleValidator for ExternalCapsuleTool {
    fn validate(&self, path: &Path) -> Result<CapsuleReport, CollaboratorError> {
        let output = self
            .executor
            .execute(&self.tool, &[OsStr::new("--print-guid"), path.as_os_str()])?;
        log_debug!("Capsule tool finished", "path" => path.display(), "exit_code" => output.exit_code);

        if !output.success() {
            return Err(CollaboratorError::ToolFailed {
                tool: self.tool.clone(),
                reason: format!("exit code {}", output.exit_code),
            });
        }

        interpret_output(&output.stdout, &output.stderr).map_err(|reason| self.unexpected(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const GUID: &str = "1ed4b7a7-5a7e-4e5f-a2c4-3fc4f1d4b3a1";

    fn stdout(last: &str) -> String {
        format!("{}\nImage type id GUID: {}\n{}\n", VALID_CAPSULE, GUID, last)
    }

    #[test]
    fn test_known_guid() {
        let stderr = format!("Capsule update image type id `{}' is known: \"Board firmware\"\n", GUID);
        let report = interpret_output(&stdout("done"), &stderr).unwrap();
        assert!(report.valid && report.authenticated);
        assert_eq!(report.image_type_guid.unwrap().to_string(), GUID);
        assert_eq!(report.guid_status, CapsuleGuidStatus::Known("Board firmware".to_string()));
    }

    #[test]
    fn test_unknown_guid() {
        let out = stdout(&format!("Capsule update image type id `{}' is unknown", GUID));
        let report = interpret_output(&out, "").unwrap();
        assert_eq!(report.guid_status, CapsuleGuidStatus::Unknown);
    }

    #[test]
    fn test_contradictory_verdict() {
        let out = stdout(&format!("Capsule update image type id `{}' is unknown", GUID));
        let stderr = format!("Capsule update image type id `{}' is known: \"x\"", GUID);
        let report = interpret_output(&out, &stderr).unwrap();
        assert_matches!(report.guid_status, CapsuleGuidStatus::Inconclusive(_));

        let report = interpret_output(&stdout("done"), "").unwrap();
        assert_matches!(report.guid_status, CapsuleGuidStatus::Inconclusive(_));
    }

    #[test]
    fn test_invalid_capsule() {
        let report = interpret_output("Bad capsule header\n", "").unwrap();
        assert!(!report.valid);
        assert_eq!(report.warnings, vec!["Bad capsule header".to_string()]);
    }

    #[test]
    fn test_missing_image_guid() {
        assert!(interpret_output(&format!("{}\n", VALID_CAPSULE), "").is_err());
    }
}
