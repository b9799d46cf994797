//! Response types and downstream response validation.
//!
//! Every call, successful or not, produces an [`AgentResponse`] of the same
//! shape. Downstream bodies are checked by [`ResponseParser`] before they are
//! trusted; any defect becomes a [`RawError`] named `ValidationException` so
//! it classifies as `InvalidResponse`.

use crate::error::RawError;
use crate::logging::{log_debug, log_warn};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Exception name attached to response validation failures.
pub const VALIDATION_EXCEPTION: &str = "ValidationException";

/// Placeholder project id the downstream emits when it lost track of the
/// real project.
pub const PLACEHOLDER_PROJECT_ID: &str = "default-project";

const REQUIRED_FIELDS: [&str; 3] = ["success", "message", "artifacts"];
const REQUIRED_ARTIFACT_FIELDS: [&str; 2] = ["type", "data"];

// ============================================================================
// Caller-facing response
// ============================================================================

/// Final response returned for every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub success: bool,
    pub message: String,
    pub artifacts: Vec<Value>,
    pub thought_steps: Vec<ThoughtStep>,
    pub agent_used: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Complete,
    Error,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// One entry of the reasoning trail shown next to the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtStep {
    #[serde(rename = "type")]
    pub step_type: String,
    pub title: String,
    pub summary: String,
    pub status: StepStatus,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ThoughtStep {
    pub fn new(
        step_type: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
        status: StepStatus,
    ) -> Self {
        Self {
            step_type: step_type.into(),
            title: title.into(),
            summary: summary.into(),
            status,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Lenient conversion of a step reported by the downstream.
    ///
    /// Missing fields get defaults and any non-terminal status is treated as
    /// complete, since the downstream has already finished.
    fn from_downstream(value: &Value) -> Option<Self> {
        let step = value.as_object()?;
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| step.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string()
        };

        let status = match step.get("status").and_then(Value::as_str) {
            Some("error" | "failed" | "failure") => StepStatus::Error,
            _ => StepStatus::Complete,
        };

        Some(Self {
            step_type: Some(text(&["type"]))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "analysis".to_string()),
            title: text(&["title"]),
            summary: text(&["summary", "description"]),
            status,
            timestamp: step
                .get("timestamp")
                .and_then(Value::as_i64)
                .unwrap_or_else(|| Utc::now().timestamp_millis()),
        })
    }
}

/// Ordered builder for the thought steps of one call.
#[derive(Debug, Default)]
pub struct ThoughtTrail {
    steps: Vec<ThoughtStep>,
}

impl ThoughtTrail {
    /// Open a step in progress and return its handle.
    pub fn begin(
        &mut self,
        step_type: &str,
        title: impl Into<String>,
        summary: impl Into<String>,
    ) -> usize {
        self.steps.push(ThoughtStep::new(
            step_type,
            title,
            summary,
            StepStatus::InProgress,
        ));
        self.steps.len() - 1
    }

    pub fn complete(&mut self, handle: usize, summary: impl Into<String>) {
        self.close(handle, StepStatus::Complete, summary.into());
    }

    pub fn fail(&mut self, handle: usize, summary: impl Into<String>) {
        self.close(handle, StepStatus::Error, summary.into());
    }

    /// Append an already finished step.
    pub fn record(
        &mut self,
        step_type: &str,
        title: impl Into<String>,
        summary: impl Into<String>,
        status: StepStatus,
    ) {
        self.steps
            .push(ThoughtStep::new(step_type, title, summary, status));
    }

    pub fn extend(&mut self, steps: impl IntoIterator<Item = ThoughtStep>) {
        self.steps.extend(steps);
    }

    /// Consume the trail; steps still in progress are closed as errors.
    pub fn finish(mut self) -> Vec<ThoughtStep> {
        for step in &mut self.steps {
            if !step.status.is_terminal() {
                step.status = StepStatus::Error;
            }
        }
        self.steps
    }

    fn close(&mut self, handle: usize, status: StepStatus, summary: String) {
        if let Some(step) = self.steps.get_mut(handle) {
            step.status = status;
            step.summary = summary;
            step.timestamp = Utc::now().timestamp_millis();
        }
    }
}

// ============================================================================
// Downstream response parsing
// ============================================================================

/// A downstream response that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResponse {
    pub message: String,
    pub artifacts: Vec<Value>,
    pub thought_steps: Vec<ThoughtStep>,
}

/// Parser and validator for downstream response bodies
pub struct ResponseParser;

impl ResponseParser {
    /// Parse a raw body and validate its structure.
    ///
    /// Envelopes of the form `{"statusCode": .., "body": "<json>"}` are
    /// unwrapped first, and function-error payloads (`errorType` /
    /// `errorMessage`) are returned as the error they describe.
    pub fn parse(body: &str) -> Result<ValidatedResponse, RawError> {
        log_debug!(
            content_length = body.len(),
            content_preview = body.chars().take(200).collect::<String>(),
            "Parsing downstream response"
        );

        if body.trim().is_empty() {
            return Err(Self::invalid("Invalid response: empty response body"));
        }

        let value: Value = serde_json::from_str(body).map_err(|e| {
            log_warn!(
                error = %e,
                content_preview = body.chars().take(200).collect::<String>(),
                "Downstream response is not valid JSON"
            );
            Self::invalid(format!("Invalid response: failed to parse response JSON: {e}"))
        })?;

        let value = Self::unwrap_envelope(value)?;
        Self::validate(&value)
    }

    fn invalid(message: impl Into<String>) -> RawError {
        RawError::named(VALIDATION_EXCEPTION, message)
    }

    fn unwrap_envelope(value: Value) -> Result<Value, RawError> {
        let Some(object) = value.as_object() else {
            return Ok(value);
        };
        if object.contains_key("success") {
            return Ok(value);
        }

        if object.contains_key("errorType") || object.contains_key("errorMessage") {
            return Err(RawError::from_value(&value));
        }

        let (Some(status), Some(body)) = (
            object.get("statusCode").and_then(Value::as_u64),
            object.get("body"),
        ) else {
            return Ok(value);
        };

        let inner = match body {
            Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| body.clone()),
            other => other.clone(),
        };

        if status >= 400 {
            let mut error = RawError::from_value(&inner);
            if error.message.as_deref().map_or(true, |m| m.trim().is_empty()) {
                error.message = Some(format!("Downstream returned status {status}"));
            }
            error.status_code = u16::try_from(status).ok();
            return Err(error);
        }

        log_debug!(status_code = status, "Unwrapped downstream response envelope");
        match inner {
            Value::String(text) => Err(Self::invalid(format!(
                "Invalid response: failed to parse response JSON in envelope body: {}",
                text.chars().take(100).collect::<String>()
            ))),
            other => Ok(other),
        }
    }

    /// Check the structure of a parsed response.
    pub fn validate(value: &Value) -> Result<ValidatedResponse, RawError> {
        if value.is_null() {
            return Err(Self::invalid("Invalid response: response payload is null"));
        }
        let Some(object) = value.as_object() else {
            return Err(Self::invalid(
                "Invalid response: invalid structure, expected a JSON object",
            ));
        };

        let missing = Self::missing_fields(object, &REQUIRED_FIELDS);
        if !missing.is_empty() {
            return Err(Self::invalid(format!(
                "Invalid response: missing required fields: {}",
                missing.join(", ")
            )));
        }

        let Some(success) = object.get("success").and_then(Value::as_bool) else {
            return Err(Self::invalid(
                "Invalid response: invalid structure, success must be a boolean",
            ));
        };
        let Some(message) = object.get("message").and_then(Value::as_str) else {
            return Err(Self::invalid(
                "Invalid response: invalid structure, message must be a string",
            ));
        };
        let Some(artifacts) = object.get("artifacts").and_then(Value::as_array) else {
            return Err(Self::invalid(
                "Invalid response: invalid structure, artifacts must be an array",
            ));
        };

        for (index, artifact) in artifacts.iter().enumerate() {
            Self::validate_artifact(index, artifact)?;
        }

        if !success {
            // Downstream reported its own failure; classify by its text.
            let mut error = RawError::new(message);
            error.name = object
                .get("errorType")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Err(error);
        }

        let thought_steps = object
            .get("thoughtSteps")
            .and_then(Value::as_array)
            .map(|steps| steps.iter().filter_map(ThoughtStep::from_downstream).collect())
            .unwrap_or_default();

        Ok(ValidatedResponse {
            message: message.to_string(),
            artifacts: artifacts.clone(),
            thought_steps,
        })
    }

    fn validate_artifact(index: usize, artifact: &Value) -> Result<(), RawError> {
        let Some(object) = artifact.as_object() else {
            return Err(Self::invalid(format!(
                "Invalid response: invalid structure, artifact {index} must be an object"
            )));
        };

        let missing = Self::missing_fields(object, &REQUIRED_ARTIFACT_FIELDS);
        if !missing.is_empty() {
            return Err(Self::invalid(format!(
                "Invalid response: invalid structure, artifact {index} is missing required fields: {}",
                missing.join(", ")
            )));
        }

        let Some(project_id) = object
            .get("metadata")
            .and_then(Value::as_object)
            .and_then(|metadata| metadata.get("projectId"))
        else {
            return Ok(());
        };

        match project_id.as_str().map(str::trim) {
            None | Some("") => Err(Self::invalid(format!(
                "Invalid project ID: artifact {index} has an empty projectId"
            ))),
            Some(PLACEHOLDER_PROJECT_ID) => Err(Self::invalid(format!(
                "Invalid project ID: artifact {index} uses the placeholder '{PLACEHOLDER_PROJECT_ID}'"
            ))),
            Some(_) => Ok(()),
        }
    }

    fn missing_fields<'a>(object: &Map<String, Value>, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|field| !object.contains_key(**field))
            .copied()
            .collect()
    }
}
