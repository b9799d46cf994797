//! Error categorization for downstream failures.
//!
//! [`ErrorCategorizer::categorize`] maps a [`RawError`] to exactly one
//! [`ErrorKind`] and attaches a human message, a detail string and a list of
//! remediation steps. Classification is a pure function of its input.
//!
//! # Matching order
//!
//! Rules live in a single ordered table and are evaluated top to bottom; the
//! first match wins. Exception-name rules come before message-text rules, and
//! within each group kinds appear in priority order:
//!
//! `NotFound > Timeout > PermissionDenied > InvalidResponse > ToolFailure > Unknown`
//!
//! A message mentioning both "not found" and "permission denied" therefore
//! classifies as `NotFound`, while an `AccessDeniedException` whose message
//! says "not found" classifies as `PermissionDenied`.
//!
//! # Example
//!
//! ```rust
//! use renewable_proxy::{ErrorCategorizer, ErrorKind, RawError};
//!
//! let raw = RawError::named("TimeoutError", "Task timed out after 60 seconds");
//! let categorized = ErrorCategorizer::categorize(&raw, Some("req-42"));
//!
//! assert_eq!(categorized.kind, ErrorKind::Timeout);
//! assert!(categorized.details.contains("60 seconds"));
//! assert!(ErrorCategorizer::format_for_user(&categorized).ends_with("Request ID: req-42"));
//! ```

use crate::error::{ErrorKind, ErrorSeverity, RawError};
use crate::logging::{log_error, log_info, log_warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A failure after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedError {
    pub kind: ErrorKind,
    /// Short human-readable summary of the failure.
    pub message: String,
    /// Context extracted from the raw error (function name, duration, defect).
    pub details: String,
    /// Ordered, ops-actionable remediation steps. Never empty.
    pub remediation_steps: Vec<String>,
    pub correlation_id: Option<String>,
    /// The failure exactly as it was received.
    pub original_error: RawError,
}

/// Machine-readable rendering of a [`CategorizedError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogRecord {
    pub error_kind: ErrorKind,
    pub message: String,
    pub details: String,
    pub remediation_steps: Vec<String>,
    pub correlation_id: Option<String>,
    pub original_error: OriginalErrorRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalErrorRecord {
    pub name: String,
    pub message: String,
}

// ============================================================================
// Rule table
// ============================================================================

/// Lower-cased view of a raw error used by the matching rules.
struct Probe<'a> {
    name: Option<&'a str>,
    text: String,
}

impl<'a> Probe<'a> {
    fn new(raw: &'a RawError) -> Self {
        Self {
            name: raw.name.as_deref(),
            text: raw.message.as_deref().unwrap_or_default().to_lowercase(),
        }
    }

    fn name_is(&self, candidates: &[&str]) -> bool {
        self.name
            .is_some_and(|name| candidates.iter().any(|c| name.ends_with(c)))
    }

    fn mentions(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.text.contains(needle))
    }
}

struct Rule {
    kind: ErrorKind,
    matches: fn(&Probe<'_>) -> bool,
}

const TOOL_KEYWORDS: [&str; 5] = ["tool", "terrain", "layout", "simulation", "report"];
const FAILURE_WORDS: [&str; 6] = ["fail", "error", "exception", "crash", "unable", "could not"];
const DEPENDENCY_SIGNALS: [&str; 8] = [
    "no module named",
    "importerror",
    "import error",
    "cannot import",
    "modulenotfound",
    "importmoduleerror",
    "dependency",
    "dependencies",
];

fn is_dependency_failure(probe: &Probe<'_>) -> bool {
    named_import_failure(probe) || probe.mentions(&DEPENDENCY_SIGNALS)
}

fn named_not_found(p: &Probe<'_>) -> bool {
    p.name_is(&["ResourceNotFoundException"])
}

fn named_timeout(p: &Probe<'_>) -> bool {
    p.name_is(&["TimeoutError"])
}

fn named_permission_denied(p: &Probe<'_>) -> bool {
    p.name_is(&["AccessDeniedException", "UnauthorizedException"])
}

fn named_validation(p: &Probe<'_>) -> bool {
    p.name_is(&["ValidationException"])
}

fn named_import_failure(p: &Probe<'_>) -> bool {
    p.name_is(&["ImportError", "ModuleNotFoundError", "ImportModuleError"])
}

fn mentions_not_found(p: &Probe<'_>) -> bool {
    p.mentions(&["not found", "does not exist"])
}

fn mentions_timeout(p: &Probe<'_>) -> bool {
    p.mentions(&["timed out", "timeout"])
}

fn mentions_permission_denied(p: &Probe<'_>) -> bool {
    p.mentions(&[
        "permission denied",
        "not authorized",
        "access denied",
        "accessdenied",
        "unauthorized",
    ])
}

fn mentions_invalid_response(p: &Probe<'_>) -> bool {
    p.mentions(&[
        "missing required field",
        "invalid project id",
        "invalid structure",
        "invalid response",
        "malformed",
        "invalid json",
        "failed to parse",
    ])
}

fn mentions_tool_failure(p: &Probe<'_>) -> bool {
    is_dependency_failure(p) || (p.mentions(&TOOL_KEYWORDS) && p.mentions(&FAILURE_WORDS))
}

/// Evaluated top to bottom, first match wins.
static RULES: [Rule; 10] = [
    Rule { kind: ErrorKind::NotFound, matches: named_not_found },
    Rule { kind: ErrorKind::Timeout, matches: named_timeout },
    Rule { kind: ErrorKind::PermissionDenied, matches: named_permission_denied },
    Rule { kind: ErrorKind::InvalidResponse, matches: named_validation },
    Rule { kind: ErrorKind::ToolFailure, matches: named_import_failure },
    Rule { kind: ErrorKind::NotFound, matches: mentions_not_found },
    Rule { kind: ErrorKind::Timeout, matches: mentions_timeout },
    Rule { kind: ErrorKind::PermissionDenied, matches: mentions_permission_denied },
    Rule { kind: ErrorKind::InvalidResponse, matches: mentions_invalid_response },
    Rule { kind: ErrorKind::ToolFailure, matches: mentions_tool_failure },
];

// ============================================================================
// Detail extraction
// ============================================================================

static FUNCTION_NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r":function:([A-Za-z0-9_-]+)",
        r#"(?i)function\s+['"]?([A-Za-z0-9_.-]+)['"]?\s+(?:was\s+)?(?:not found|does not exist)"#,
        r#"(?i)(?:not found|does not exist)\s*:\s*['"]?([A-Za-z0-9_.-]+)"#,
        r#"(?i)function(?:\s+name)?\s*[:=]\s*['"]?([A-Za-z0-9_.-]+)"#,
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static DURATION_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?)\s*(milliseconds?|ms|seconds?|secs?|s|minutes?|mins?)\b",
    )
    .ok()
});

static MISSING_FIELDS_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)missing required fields?\s*:?\s*([A-Za-z0-9_, ]+)").ok());

fn extract_function_name(message: &str) -> Option<String> {
    FUNCTION_NAME_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(message))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_duration(message: &str) -> Option<String> {
    let captures = DURATION_PATTERN.as_ref()?.captures(message)?;
    Some(format!("{} {}", &captures[1], &captures[2]))
}

fn extract_missing_fields(message: &str) -> Option<String> {
    let captures = MISSING_FIELDS_PATTERN.as_ref()?.captures(message)?;
    let fields = captures[1].trim().trim_end_matches(',').trim();
    (!fields.is_empty()).then(|| fields.to_string())
}

fn identify_tool(text: &str) -> Option<&'static str> {
    [
        ("terrain", "terrain analysis"),
        ("layout", "layout optimization"),
        ("simulation", "wake simulation"),
        ("report", "report generation"),
    ]
    .iter()
    .find(|(keyword, _)| text.contains(keyword))
    .map(|(_, tool)| *tool)
}

// ============================================================================
// Remediation steps
// ============================================================================

const NOT_FOUND_STEPS: &[&str] = &[
    "Verify the renewable energy backend function is deployed in this environment",
    "Check that RENEWABLE_ORCHESTRATOR_FUNCTION_NAME matches the deployed function name",
    "Redeploy the backend stack and confirm the deployment finished without errors",
    "Confirm the proxy and the backend are deployed in the same region and account",
];

const TIMEOUT_STEPS: &[&str] = &[
    "Reduce the scope of the request (smaller area, fewer turbines or a single analysis step) and try again",
    "Check the configured timeout settings of the downstream function and raise them if analyses regularly run long",
    "Inspect the downstream function's operational logs for slow or stuck processing steps",
    "Verify the downstream function has enough memory allocated, since CPU scales with memory",
    "Retry the request once the backend is under less load",
];

const PERMISSION_DENIED_STEPS: &[&str] = &[
    "Check that the proxy's execution role allows lambda:InvokeFunction on the backend function",
    "Verify the backend function's resource policy permits calls from the proxy's role",
    "Confirm the role policy references the correct function ARN, including alias or version qualifiers",
    "Look for explicit deny statements in service control policies or permission boundaries",
    "Redeploy the stack so IAM changes are applied, then allow a minute for them to propagate",
    "Review access-denied entries in the audit logs to identify the missing permission",
];

const INVALID_RESPONSE_STEPS: &[&str] = &[
    "Inspect the backend function's logs for the raw response it returned",
    "Confirm the backend response includes the success, message and artifacts fields",
    "Ensure every artifact carries both a type and a data field",
    "Check that artifacts are tagged with a real project ID rather than a placeholder",
    "Verify the proxy and backend were deployed from the same version so their response contracts match",
];

const TOOL_FAILURE_STEPS: &[&str] = &[
    "Check the downstream function's logs for the failing tool's error output",
    "Verify the request parameters (coordinates, area, turbine settings) are within supported ranges",
    "Retry the request, since intermittent tool failures often succeed on a second attempt",
    "Run the failing tool on its own with the same parameters to isolate the problem",
];

const DEPENDENCY_FAILURE_STEPS: &[&str] = &[
    "Verify the downstream function's deployment package or layer contains all required dependencies",
    "Rebuild the dependency layer for the function's runtime and architecture",
    "Check the function's environment configuration for missing variables or a mismatched runtime version",
    "Redeploy the function and review the import errors in its startup logs",
];

const UNKNOWN_STEPS: &[&str] = &[
    "Retry the request, the failure may be transient",
    "Check the downstream function's logs around the time of the failure using the request ID",
    "Verify the downstream service is healthy and not throttling requests",
    "Confirm recent deployments completed successfully",
    "If the problem persists, report it together with the request ID and the time of the failure",
];

fn steps(list: &[&str]) -> Vec<String> {
    list.iter().map(|step| (*step).to_string()).collect()
}

// ============================================================================
// Categorizer
// ============================================================================

/// Stateless classifier for downstream failures.
pub struct ErrorCategorizer;

impl ErrorCategorizer {
    /// Classify a raw failure.
    ///
    /// `correlation_id` takes precedence over a request id carried by the raw
    /// error itself. Never panics; unrecognized input yields `Unknown`.
    pub fn categorize(raw: &RawError, correlation_id: Option<&str>) -> CategorizedError {
        let probe = Probe::new(raw);
        let kind = Self::classify(&probe);
        let message_text = raw.message.as_deref().unwrap_or_default();

        let (message, details, remediation_steps) = match kind {
            ErrorKind::NotFound => (
                "Renewable energy backend not found".to_string(),
                extract_function_name(message_text)
                    .map(|name| format!("Function: {name}"))
                    .unwrap_or_else(|| "The downstream function could not be found".to_string()),
                steps(NOT_FOUND_STEPS),
            ),
            ErrorKind::Timeout => (
                "Renewable energy analysis timed out".to_string(),
                extract_duration(message_text)
                    .map(|duration| format!("Operation timed out after {duration}"))
                    .unwrap_or_else(|| "The operation exceeded its time limit".to_string()),
                steps(TIMEOUT_STEPS),
            ),
            ErrorKind::PermissionDenied => (
                "Permission denied: not authorized to invoke the renewable energy backend"
                    .to_string(),
                format!("Access denied: {}", raw.display_message()),
                steps(PERMISSION_DENIED_STEPS),
            ),
            ErrorKind::InvalidResponse => (
                "Invalid response from renewable energy backend".to_string(),
                Self::invalid_response_details(&probe, message_text),
                steps(INVALID_RESPONSE_STEPS),
            ),
            ErrorKind::ToolFailure => Self::tool_failure(&probe),
            ErrorKind::Unknown => (
                "Unexpected error in renewable energy backend".to_string(),
                format!("{}: {}", raw.display_name(), raw.display_message()),
                steps(UNKNOWN_STEPS),
            ),
        };

        CategorizedError {
            kind,
            message,
            details,
            remediation_steps,
            correlation_id: correlation_id
                .map(str::to_string)
                .or_else(|| raw.request_id.clone()),
            original_error: raw.clone(),
        }
    }

    /// Kind assigned to a raw failure, without building the full record.
    pub fn kind_of(raw: &RawError) -> ErrorKind {
        Self::classify(&Probe::new(raw))
    }

    fn classify(probe: &Probe<'_>) -> ErrorKind {
        RULES
            .iter()
            .find(|rule| (rule.matches)(probe))
            .map(|rule| rule.kind)
            .unwrap_or(ErrorKind::Unknown)
    }

    fn invalid_response_details(probe: &Probe<'_>, message: &str) -> String {
        if let Some(fields) = extract_missing_fields(message) {
            format!("missing required fields: {fields}")
        } else if probe.mentions(&["invalid project id"]) {
            "invalid project ID".to_string()
        } else if probe.mentions(&["structure", "malformed", "must be an array"]) {
            "invalid structure".to_string()
        } else if probe.mentions(&["json", "parse"]) {
            "response is not valid JSON".to_string()
        } else {
            "response failed validation".to_string()
        }
    }

    fn tool_failure(probe: &Probe<'_>) -> (String, String, Vec<String>) {
        let tool = identify_tool(&probe.text);

        if is_dependency_failure(probe) {
            let details = match tool {
                Some(tool) => format!("Dependency or module import failure in the {tool} tool"),
                None => "Dependency or module import failure".to_string(),
            };
            return (
                "Renewable energy tool could not load its dependencies".to_string(),
                details,
                steps(DEPENDENCY_FAILURE_STEPS),
            );
        }

        let details = match tool {
            Some(tool) => format!("The {tool} tool failed"),
            None => "A downstream analysis tool failed".to_string(),
        };
        (
            "Renewable energy tool execution failed".to_string(),
            details,
            steps(TOOL_FAILURE_STEPS),
        )
    }

    /// Render a categorized error as a machine-readable log record.
    pub fn format_for_logging(categorized: &CategorizedError) -> ErrorLogRecord {
        ErrorLogRecord {
            error_kind: categorized.kind,
            message: categorized.message.clone(),
            details: categorized.details.clone(),
            remediation_steps: categorized.remediation_steps.clone(),
            correlation_id: categorized.correlation_id.clone(),
            original_error: OriginalErrorRecord {
                name: categorized.original_error.display_name().to_string(),
                message: categorized.original_error.display_message().to_string(),
            },
        }
    }

    /// Render a categorized error for end users.
    ///
    /// The message is followed by a numbered remediation list and, when a
    /// correlation id is known, a trailing `Request ID: <id>` line.
    pub fn format_for_user(categorized: &CategorizedError) -> String {
        let mut rendered = format!("{}\n\nRemediation steps:", categorized.message);
        for (index, step) in categorized.remediation_steps.iter().enumerate() {
            rendered.push_str(&format!("\n{}. {}", index + 1, step));
        }
        if let Some(id) = &categorized.correlation_id {
            rendered.push_str(&format!("\n\nRequest ID: {id}"));
        }
        rendered
    }

    /// Write the full logging record at a level matching the kind's severity.
    pub fn log(categorized: &CategorizedError) {
        let record = Self::format_for_logging(categorized);
        let serialized = serde_json::to_string(&record).unwrap_or_default();

        match categorized.kind.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => log_error!(
                error_kind = %record.error_kind,
                correlation_id = record.correlation_id.as_deref().unwrap_or("-"),
                details = %record.details,
                record = %serialized,
                "{}", record.message
            ),
            ErrorSeverity::Warning => log_warn!(
                error_kind = %record.error_kind,
                correlation_id = record.correlation_id.as_deref().unwrap_or("-"),
                details = %record.details,
                record = %serialized,
                "{}", record.message
            ),
            ErrorSeverity::Info => log_info!(
                error_kind = %record.error_kind,
                correlation_id = record.correlation_id.as_deref().unwrap_or("-"),
                details = %record.details,
                record = %serialized,
                "{}", record.message
            ),
        }
    }
}
