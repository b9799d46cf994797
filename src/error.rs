//! Error types for the renewable proxy.
//!
//! This module holds the three error shapes the crate works with:
//!
//! - [`ErrorKind`]: the closed taxonomy every downstream failure is mapped to.
//! - [`RawError`]: a failure as it arrived from the downstream boundary,
//!   normalized into optional `name` / `message` / `status_code` fields.
//! - [`ProxyError`]: crate-level failures (configuration) that happen outside
//!   the agent boundary and are returned as ordinary `Result`s.
//!
//! # Normalizing arbitrary failures
//!
//! Downstream collaborators may fail with anything: a Rust error, a string, or
//! a JSON error payload. [`RawError`] accepts all of them:
//!
//! ```rust
//! use renewable_proxy::RawError;
//! use serde_json::json;
//!
//! let from_text = RawError::from("Function not found: renewable-orchestrator");
//! let from_json = RawError::from_value(&json!({
//!     "name": "ThrottlingException",
//!     "message": "Rate exceeded",
//!     "$metadata": { "httpStatusCode": 429 }
//! }));
//! let from_null = RawError::from_value(&serde_json::Value::Null);
//!
//! assert_eq!(from_json.status_code, Some(429));
//! assert!(from_null.name.is_none() && from_null.message.is_none());
//! # let _ = from_text;
//! ```

use crate::logging::log_error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error taxonomy
// ============================================================================

/// Fixed classification label assigned to a downstream failure.
///
/// Variants are declared in priority order: when a failure carries signals
/// for more than one kind, the earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The downstream function (or a resource it needs) does not exist.
    NotFound,
    /// The downstream call ran out of time.
    Timeout,
    /// The caller is not allowed to invoke the downstream function.
    PermissionDenied,
    /// The downstream answered, but with a payload that fails validation.
    InvalidResponse,
    /// One of the downstream analysis tools (or its dependencies) failed.
    ToolFailure,
    /// Nothing more specific matched.
    Unknown,
}

impl ErrorKind {
    /// All kinds, in priority order.
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::NotFound,
        ErrorKind::Timeout,
        ErrorKind::PermissionDenied,
        ErrorKind::InvalidResponse,
        ErrorKind::ToolFailure,
        ErrorKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Timeout => "Timeout",
            Self::PermissionDenied => "PermissionDenied",
            Self::InvalidResponse => "InvalidResponse",
            Self::ToolFailure => "ToolFailure",
            Self::Unknown => "Unknown",
        }
    }

    /// Severity used to pick the log level for a categorized failure.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound => ErrorSeverity::Error,
            Self::Timeout => ErrorSeverity::Warning,
            Self::PermissionDenied => ErrorSeverity::Critical,
            Self::InvalidResponse => ErrorSeverity::Warning,
            Self::ToolFailure => ErrorSeverity::Error,
            Self::Unknown => ErrorSeverity::Error,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level for logging and alerting decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Deployment is broken in a way retries can never fix.
    Critical,
    /// Action failed but the proxy is stable.
    Error,
    /// Unexpected but recoverable.
    Warning,
    /// Expected outcome, informational only.
    Info,
}

// ============================================================================
// Raw downstream failures
// ============================================================================

/// A downstream failure normalized at the boundary.
///
/// Every field is optional: a `null` rejection produces a `RawError` with all
/// fields empty, and classification falls back to placeholder values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawError {
    /// Exception name, e.g. `ResourceNotFoundException`.
    pub name: Option<String>,
    /// Human-readable failure text.
    pub message: Option<String>,
    /// HTTP-status-like code, when the transport reported one.
    pub status_code: Option<u16>,
    /// Request id reported by the downstream service.
    pub request_id: Option<String>,
}

impl RawError {
    /// Create an unnamed error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Create a named error, e.g. `RawError::named("TimeoutError", "...")`.
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Normalize an arbitrary JSON error payload.
    ///
    /// Understands SDK-style errors (`name`, `message`, `$metadata`), function
    /// error payloads (`errorType`, `errorMessage`) and bare strings. Anything
    /// else yields an empty record.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::new(text.clone()),
            Value::Object(map) => {
                let text = |keys: &[&str]| {
                    keys.iter()
                        .find_map(|key| map.get(*key).and_then(Value::as_str))
                        .map(str::to_string)
                };
                let metadata = map.get("$metadata");

                let status_code = ["statusCode", "status", "$statusCode"]
                    .iter()
                    .find_map(|key| map.get(*key))
                    .or_else(|| metadata.and_then(|m| m.get("httpStatusCode")))
                    .and_then(Value::as_u64)
                    .and_then(|code| u16::try_from(code).ok());

                let request_id = text(&["requestId", "RequestId"]).or_else(|| {
                    metadata
                        .and_then(|m| m.get("requestId"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });

                Self {
                    name: text(&["name", "errorType", "code", "__type"]),
                    message: text(&["message", "errorMessage", "Message", "error"]),
                    status_code,
                    request_id,
                }
            }
            _ => Self::default(),
        }
    }

    /// Normalize a Rust error, keeping its source chain in the message.
    pub fn from_std_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(message)
    }

    /// Name to show when none was reported.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Error")
    }

    /// Message to show when none was reported.
    pub fn display_message(&self) -> &str {
        self.message.as_deref().unwrap_or("unknown error occurred")
    }
}

impl fmt::Display for RawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.display_name(), self.display_message())
    }
}

impl From<&str> for RawError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for RawError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for RawError {
    fn from(error: anyhow::Error) -> Self {
        // `{:#}` renders the whole context chain on one line
        Self::new(format!("{error:#}"))
    }
}

// ============================================================================
// Crate-level errors
// ============================================================================

/// Convenient result type for crate-level operations.
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

/// Failures that happen outside the agent boundary.
///
/// Downstream failures never surface as `ProxyError`; the agent always turns
/// them into a `success: false` response.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Proxy configuration is invalid or incomplete.
    #[error("Proxy configuration error: {message}")]
    ConfigurationError { message: String },

    /// An environment variable holds a value that cannot be parsed.
    #[error("Invalid value '{value}' for environment variable {variable}")]
    InvalidEnvVar { variable: String, value: String },
}

impl ProxyError {
    pub fn configuration_error(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(
            error_type = "configuration_error",
            message = %message,
            "Proxy configuration validation failed"
        );
        Self::ConfigurationError { message }
    }

    pub fn invalid_env_var(variable: impl Into<String>, value: impl Into<String>) -> Self {
        let variable = variable.into();
        let value = value.into();
        log_error!(
            error_type = "invalid_env_var",
            variable = %variable,
            value = %value,
            "Environment variable could not be parsed"
        );
        Self::InvalidEnvVar { variable, value }
    }
}
