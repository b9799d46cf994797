//! Logging utilities for renewable-proxy
//!
//! Re-exports tracing macros with log_* naming convention for consistency,
//! and provides the default diagnostic sink.

use crate::events::{DiagnosticEvent, DiagnosticPayload, DiagnosticSink};

// Re-export tracing macros with log_* naming
pub use tracing::{
    debug as log_debug,
    error as log_error,
    info as log_info,
    warn as log_warn,
};

/// Diagnostic sink that writes every event as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: &DiagnosticEvent) {
        match &event.payload {
            DiagnosticPayload::RetryAttempt {
                attempt,
                reason,
                message,
                backoff_ms,
            } => {
                log_warn!(
                    event_id = %event.id,
                    correlation_id = %event.correlation_id,
                    attempt = attempt,
                    reason = %reason,
                    message = %message,
                    backoff_ms = backoff_ms,
                    "Retrying downstream invocation"
                );
            }
            DiagnosticPayload::WarningThreshold {
                duration,
                threshold,
            } => {
                log_warn!(
                    event_id = %event.id,
                    correlation_id = %event.correlation_id,
                    duration = %duration,
                    threshold = %threshold,
                    "Downstream invocation is taking longer than expected"
                );
            }
            DiagnosticPayload::FinalFailure {
                total_attempts,
                final_error,
            } => {
                log_error!(
                    event_id = %event.id,
                    correlation_id = %event.correlation_id,
                    total_attempts = total_attempts,
                    final_error = %final_error,
                    "Downstream invocation failed"
                );
            }
        }
    }
}
