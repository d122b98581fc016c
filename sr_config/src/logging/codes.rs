//! Consolidated error codes and classification system
//!
//! Single source of truth for all codes emitted by the checker, their metadata,
//! and classification functions.

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Universal code wrapper for error, warning and success codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ERROR CLASSIFICATION TYPES
// ============================================================================

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Complete metadata for a code
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub fatal: bool,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl ErrorMetadata {
    pub fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        fatal: bool,
        description: &'static str,
        recommended_action: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            fatal,
            description,
            recommended_action,
        }
    }
}

// ============================================================================
// CODE CONSTANTS
// ============================================================================

/// System error codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ERR001");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ERR002");
    pub const RESULT_ROOT_UNREADABLE: Code = Code::new("ERR003");
}

/// Configuration loading codes (all fatal except the duplicate pattern warning)
pub mod configuration {
    use super::Code;

    pub const FILE_NOT_READABLE: Code = Code::new("E001");
    pub const PARSE_ERROR: Code = Code::new("E002");
    pub const MALFORMED_NODE: Code = Code::new("E003");
    pub const MISSING_MARKER: Code = Code::new("E004");
    pub const INVALID_OVERLAY: Code = Code::new("E005");
    pub const DELETE_OUTSIDE_OVERLAY: Code = Code::new("E006");
    pub const DUPLICATE_RULE: Code = Code::new("E007");
    pub const UNKNOWN_FIELD: Code = Code::new("E008");
    pub const INVALID_FILTER: Code = Code::new("E009");
    pub const DUPLICATE_PATTERN: Code = Code::new("W001");
    pub const DUPLICATE_DATABASE_ENTRY: Code = Code::new("W002");
}

/// Missing or malformed artifacts in the result tree
pub mod artifact {
    use super::Code;

    pub const MISSING: Code = Code::new("E010");
    pub const EMPTY: Code = Code::new("E011");
    pub const TOO_FEW_ENTRIES: Code = Code::new("E012");
    pub const TOO_MANY_ENTRIES: Code = Code::new("E013");
    pub const TOO_FEW_OCCURRENCES: Code = Code::new("E014");
    pub const UNREADABLE: Code = Code::new("E015");
    pub const NOT_NAMED: Code = Code::new("W010");
}

/// Content constraint violations
pub mod content {
    use super::Code;

    pub const REQUIRED_TEXT_MISSING: Code = Code::new("E020");
    pub const FORBIDDEN_TEXT_FOUND: Code = Code::new("E021");
    pub const ARCHIVE_CORRUPT: Code = Code::new("E022");
    pub const SUGGESTED_TEXT_MISSING: Code = Code::new("W020");
    pub const DISCOURAGED_TEXT_FOUND: Code = Code::new("W021");
}

/// Semantic role sub-verifier findings
pub mod role {
    use super::Code;

    pub const ESRT_WITHOUT_GUID: Code = Code::new("E030");
    pub const CAPSULE_INVALID: Code = Code::new("E031");
    pub const DEVICETREE_FAILURE: Code = Code::new("E032");
    pub const DEVICETREE_DIAGNOSTIC: Code = Code::new("E033");
    pub const SNIFF_WITHOUT_ESP: Code = Code::new("E034");
    pub const SHELL_WITHOUT_ESP: Code = Code::new("E035");
    pub const REPORT_FIELD_MISSING: Code = Code::new("E036");
    pub const COLLABORATOR_FAILURE: Code = Code::new("E037");
    pub const GUID_LOOKUP_FAILED: Code = Code::new("E038");
    pub const KNOWN_ESRT_GUID: Code = Code::new("W030");
    pub const KNOWN_CAPSULE_GUID: Code = Code::new("W031");
    pub const DEVICETREE_UNPARSED: Code = Code::new("W032");
    pub const SCT_REGEN_FAILED: Code = Code::new("W033");
    pub const CAPSULE_WARNING: Code = Code::new("W034");
}

/// Deferred cross-file checks
pub mod deferred {
    use super::Code;

    pub const CAPSULE_GUID_NOT_IN_ESRT: Code = Code::new("E040");
    pub const UEFI_LOG_WITHOUT_ESP: Code = Code::new("E041");
    pub const DEVICE_LOGS_MISSING: Code = Code::new("E042");
    pub const DEVICE_SCORE_FAILED: Code = Code::new("E043");
    pub const UNEXPECTED_DEVICE_LOGS: Code = Code::new("W040");
}

/// Success and progress codes
pub mod success {
    use super::Code;

    pub const SYSTEM_INITIALIZATION_COMPLETED: Code = Code::new("I001");
    pub const CONFIGURATION_LOADED: Code = Code::new("I002");
    pub const IDENTIFICATION_COMPLETE: Code = Code::new("I003");
    pub const OVERLAY_APPLIED: Code = Code::new("I004");
    pub const WALK_COMPLETE: Code = Code::new("I005");
    pub const ARTIFACT_REGENERATED: Code = Code::new("I006");
    pub const TOOL_PROBED: Code = Code::new("I007");
    pub const CHECK_PASSED: Code = Code::new("I008");
}

// ============================================================================
// METADATA REGISTRY
// ============================================================================

static ERROR_REGISTRY: OnceLock<HashMap<&'static str, ErrorMetadata>> = OnceLock::new();

fn get_error_registry() -> &'static HashMap<&'static str, ErrorMetadata> {
    ERROR_REGISTRY.get_or_init(|| {
        let entries = [
            // System
            ErrorMetadata::new("ERR001", "System", Severity::Critical, true,
                "Internal checker error",
                "File a bug report with the command line and result tree layout"),
            ErrorMetadata::new("ERR002", "System", Severity::Critical, true,
                "Logging or runtime initialization failure",
                "Check SR_* environment variables"),
            ErrorMetadata::new("ERR003", "System", Severity::Critical, true,
                "Result tree root cannot be read",
                "Check the --dir argument and directory permissions"),
            // Configuration
            ErrorMetadata::new("E001", "Configuration", Severity::Critical, true,
                "Configuration file cannot be read",
                "Check the configuration path"),
            ErrorMetadata::new("E002", "Configuration", Severity::Critical, true,
                "Configuration file is not valid YAML for its schema",
                "Fix the reported key or value"),
            ErrorMetadata::new("E003", "Configuration", Severity::Critical, true,
                "Tree node has neither or both of file and dir",
                "Give every tree node exactly one of file or dir"),
            ErrorMetadata::new("E004", "Configuration", Severity::Critical, true,
                "Configuration marker key is missing",
                "Add the marker key expected for this kind of file"),
            ErrorMetadata::new("E005", "Configuration", Severity::Critical, true,
                "Overlay guard is missing or ambiguous",
                "Give every overlay exactly one of when-any or when-all"),
            ErrorMetadata::new("E006", "Configuration", Severity::Critical, true,
                "DELETE used outside an overlay",
                "Remove the key from the base tree instead"),
            ErrorMetadata::new("E007", "Configuration", Severity::Critical, true,
                "Duplicate rule name in rule set",
                "Rename one of the rules"),
            ErrorMetadata::new("E008", "Configuration", Severity::Critical, true,
                "Rule criteria refers to an unknown diagnostic field",
                "Use one of the fixed diagnostic field names"),
            ErrorMetadata::new("E009", "Configuration", Severity::Critical, true,
                "Filter expression cannot be parsed",
                "Use FIELD==VALUE, FIELD!=VALUE, FIELD~=VALUE or FIELD!~VALUE clauses"),
            ErrorMetadata::new("W001", "Configuration", Severity::Medium, false,
                "Several nodes share one pattern; overlays patch the first",
                "Merge the duplicated nodes"),
            ErrorMetadata::new("W002", "Configuration", Severity::Medium, false,
                "Database lists the same entry more than once",
                "Remove the duplicated entry"),
            // Artifacts
            ErrorMetadata::new("E010", "Artifact", Severity::High, false,
                "Required file or directory is missing",
                "Re-run the test suite and collect the missing result"),
            ErrorMetadata::new("E011", "Artifact", Severity::High, false,
                "File is empty",
                "Check the test run that produced this file"),
            ErrorMetadata::new("E012", "Artifact", Severity::High, false,
                "Directory holds fewer entries than required",
                "Collect the missing results"),
            ErrorMetadata::new("E013", "Artifact", Severity::Medium, false,
                "Directory holds more entries than allowed",
                "Remove stray files"),
            ErrorMetadata::new("E014", "Artifact", Severity::High, false,
                "Pattern matched fewer entries than required across the tree",
                "Collect the missing results"),
            ErrorMetadata::new("E015", "Artifact", Severity::High, false,
                "File or directory cannot be read",
                "Check permissions"),
            ErrorMetadata::new("W010", "Artifact", Severity::Low, false,
                "Entry name does not follow the expected naming",
                "Rename the entry"),
            // Content
            ErrorMetadata::new("E020", "Content", Severity::High, false,
                "Required text missing or out of order",
                "Inspect the log for the failed step"),
            ErrorMetadata::new("E021", "Content", Severity::High, false,
                "Forbidden text present",
                "Inspect the log around the reported position"),
            ErrorMetadata::new("E022", "Content", Severity::High, false,
                "Archive fails integrity check",
                "Re-create the archive"),
            ErrorMetadata::new("W020", "Content", Severity::Medium, false,
                "Suggested text missing or out of order",
                "Inspect the log"),
            ErrorMetadata::new("W021", "Content", Severity::Medium, false,
                "Discouraged text present",
                "Inspect the log around the reported position"),
            // Roles
            ErrorMetadata::new("E030", "Role", Severity::High, false,
                "ESRT dump lists no firmware class GUID",
                "Check the platform ESRT"),
            ErrorMetadata::new("E031", "Role", Severity::High, false,
                "Capsule is not a valid authenticated FMP capsule",
                "Rebuild and sign the capsule"),
            ErrorMetadata::new("E032", "Role", Severity::High, false,
                "Devicetree toolchain failed",
                "Check dtc and dt-validate installation"),
            ErrorMetadata::new("E033", "Role", Severity::High, false,
                "Devicetree diagnostics classified as errors",
                "Fix the devicetree or add a classification rule"),
            ErrorMetadata::new("E034", "Role", Severity::High, false,
                "UEFI sniff log shows no EFI system partition",
                "Check the boot media"),
            ErrorMetadata::new("E035", "Role", Severity::High, false,
                "UEFI shell log shows no mapped device",
                "Check the boot media"),
            ErrorMetadata::new("E036", "Role", Severity::High, false,
                "Report field missing",
                "Re-generate the report"),
            ErrorMetadata::new("E037", "Role", Severity::High, false,
                "External collaborator failed",
                "Check the tool named in the message"),
            ErrorMetadata::new("E038", "Role", Severity::High, false,
                "GUID lookup failed",
                "Check the GUID database"),
            ErrorMetadata::new("W030", "Role", Severity::Medium, false,
                "ESRT lists a well-known GUID",
                "Use a platform-specific firmware class GUID"),
            ErrorMetadata::new("W031", "Role", Severity::Medium, false,
                "Capsule uses a well-known image type GUID",
                "Use a platform-specific image type GUID"),
            ErrorMetadata::new("W032", "Role", Severity::Low, false,
                "Devicetree log contains unparsed lines",
                "Check the devicetree log format"),
            ErrorMetadata::new("W033", "Role", Severity::Medium, false,
                "SCT summary could not be regenerated",
                "Check the SCT parser installation"),
            ErrorMetadata::new("W034", "Role", Severity::Low, false,
                "Capsule validator reported a warning",
                "Inspect the capsule"),
            // Deferred
            ErrorMetadata::new("E040", "Deferred", Severity::High, false,
                "Capsule image type GUID absent from ESRT",
                "Align capsule and ESRT GUIDs"),
            ErrorMetadata::new("E041", "Deferred", Severity::High, false,
                "UEFI log recorded without an EFI system partition",
                "Check the boot media"),
            ErrorMetadata::new("E042", "Deferred", Severity::High, false,
                "Expected device logs are missing",
                "Collect the device test logs"),
            ErrorMetadata::new("E043", "Deferred", Severity::High, false,
                "Device test log scored as failed",
                "Inspect the device test log"),
            ErrorMetadata::new("W040", "Deferred", Severity::Medium, false,
                "Device logs present while no device is expected",
                "Check the declared device count"),
        ];

        entries.into_iter().map(|m| (m.code, m)).collect()
    })
}

// ============================================================================
// CLASSIFICATION FUNCTIONS
// ============================================================================

/// Get metadata for a specific code
pub fn get_error_metadata(code: &str) -> Option<&'static ErrorMetadata> {
    get_error_registry().get(code)
}

/// Get severity from code
pub fn get_severity(code: &str) -> Severity {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.severity)
        .unwrap_or(Severity::Medium)
}

/// Check if code aborts the run
pub fn is_fatal(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.fatal)
        .unwrap_or(false)
}

/// Get human-readable description for code
pub fn get_description(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.description)
        .unwrap_or("Unknown error")
}

/// Get recommended action for code
pub fn get_action(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recommended_action)
        .unwrap_or("No specific action available")
}

/// Get category from code
pub fn get_category(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.category)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_constant_has_metadata() {
        let codes = [
            system::RESULT_ROOT_UNREADABLE,
            configuration::MALFORMED_NODE,
            configuration::DUPLICATE_PATTERN,
            artifact::MISSING,
            artifact::NOT_NAMED,
            content::REQUIRED_TEXT_MISSING,
            content::DISCOURAGED_TEXT_FOUND,
            role::DEVICETREE_DIAGNOSTIC,
            role::SCT_REGEN_FAILED,
            deferred::UEFI_LOG_WITHOUT_ESP,
            deferred::UNEXPECTED_DEVICE_LOGS,
        ];
        for code in codes {
            assert_ne!(get_description(code.as_str()), "Unknown error", "{}", code);
        }
    }

    #[test]
    fn test_configuration_errors_are_fatal() {
        assert!(is_fatal(configuration::MALFORMED_NODE.as_str()));
        assert!(!is_fatal(configuration::DUPLICATE_PATTERN.as_str()));
        assert!(!is_fatal(artifact::MISSING.as_str()));
    }

    #[test]
    fn test_unknown_code_defaults() {
        assert_eq!(get_category("Z999"), "Unknown");
        assert_eq!(get_severity("Z999"), Severity::Medium);
        assert_eq!(get_action("Z999"), "No specific action available");
        assert!(get_error_metadata("Z999").is_none());
    }
}
