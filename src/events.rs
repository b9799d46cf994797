//! Diagnostic events emitted while a query is processed.
//!
//! The agent reports three kinds of progress to an external collaborator:
//!
//! - a retry is about to happen (`RetryAttempt`)
//! - an invocation has been running longer than the warning threshold
//!   (`WarningThreshold`)
//! - the call gave up (`FinalFailure`)
//!
//! Events are delivered to a [`DiagnosticSink`]. The crate ships two sinks:
//! [`TracingSink`](crate::logging::TracingSink), which writes structured
//! `tracing` events and is the agent's default, and [`MemorySink`], which
//! keeps every event for later inspection.
//!
//! # Usage
//!
//! ```rust
//! use renewable_proxy::events::{DiagnosticEvent, DiagnosticPayload, DiagnosticSink, MemorySink};
//!
//! let sink = MemorySink::default();
//! sink.emit(&DiagnosticEvent::new(
//!     "req-1",
//!     DiagnosticPayload::WarningThreshold {
//!         duration: "31s".to_string(),
//!         threshold: "30s".to_string(),
//!     },
//! ));
//! assert_eq!(sink.warning_events().len(), 1);
//! ```

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Pre-defined event type names, matching the serialized `event` tag.
pub mod event_types {
    /// A failed attempt is about to be retried.
    pub const RETRY_ATTEMPT: &str = "retry_attempt";

    /// An invocation crossed the warning threshold.
    pub const WARNING_THRESHOLD: &str = "warning_threshold";

    /// The call failed for good.
    pub const FINAL_FAILURE: &str = "final_failure";
}

/// Field sets carried by each diagnostic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticPayload {
    /// Emitted before the backoff delay of a retry is applied.
    RetryAttempt {
        /// The attempt about to be made (2 for the first retry).
        attempt: u32,
        /// Kind of the failure that triggered the retry.
        reason: ErrorKind,
        /// Raw text of that failure.
        message: String,
        /// Delay applied before the attempt.
        #[serde(rename = "backoffMs")]
        backoff_ms: u64,
    },

    /// Emitted at most once per call.
    WarningThreshold {
        /// Elapsed time when the warning fired, e.g. `"30s"`.
        duration: String,
        /// Configured warning threshold, e.g. `"30s"`.
        threshold: String,
    },

    /// Emitted exactly once when a call ends without success.
    FinalFailure {
        #[serde(rename = "totalAttempts")]
        total_attempts: u32,
        #[serde(rename = "finalError")]
        final_error: String,
    },
}

impl DiagnosticPayload {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RetryAttempt { .. } => event_types::RETRY_ATTEMPT,
            Self::WarningThreshold { .. } => event_types::WARNING_THRESHOLD,
            Self::FinalFailure { .. } => event_types::FINAL_FAILURE,
        }
    }
}

/// A diagnostic event together with its envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    /// Unique identifier for this event
    pub id: Uuid,
    /// Correlation id of the call that produced the event
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(flatten)]
    pub payload: DiagnosticPayload,
    /// Timestamp when the event was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl DiagnosticEvent {
    pub fn new(correlation_id: impl Into<String>, payload: DiagnosticPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_id: correlation_id.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// External collaborator receiving diagnostic events.
///
/// Sinks are shared between concurrent calls, so implementations must be
/// thread-safe. `emit` must not block for long: it runs inline in the retry
/// loop.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: &DiagnosticEvent);
}

/// Sink that keeps every event in memory.
///
/// Cloning shares the underlying buffer, so a clone handed to the agent can
/// be inspected through the original.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl MemorySink {
    /// Snapshot of everything emitted so far, in emission order.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn retry_events(&self) -> Vec<DiagnosticEvent> {
        self.filtered(event_types::RETRY_ATTEMPT)
    }

    pub fn warning_events(&self) -> Vec<DiagnosticEvent> {
        self.filtered(event_types::WARNING_THRESHOLD)
    }

    pub fn final_failure_events(&self) -> Vec<DiagnosticEvent> {
        self.filtered(event_types::FINAL_FAILURE)
    }

    fn filtered(&self, event_type: &str) -> Vec<DiagnosticEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.payload.event_type() == event_type)
            .collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, event: &DiagnosticEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
    }
}

/// Fan an event out to several sinks.
impl<S: DiagnosticSink> DiagnosticSink for Vec<S> {
    fn emit(&self, event: &DiagnosticEvent) {
        for sink in self {
            sink.emit(event);
        }
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn emit(&self, event: &DiagnosticEvent) {
        (**self).emit(event);
    }
}
