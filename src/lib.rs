//! # renewable-proxy
//!
//! Retry, deadline and error-categorization core for the renewable energy
//! proxy agent.
//!
//! ## Key Features
//!
//! - **Error taxonomy**: every downstream failure maps to exactly one
//!   [`ErrorKind`] with remediation steps ([`ErrorCategorizer`])
//! - **Retry policy**: exponential backoff for transient failures, immediate
//!   abort for permanent ones ([`RetryPolicy`])
//! - **Deadlines**: one-off slow-call warning and a hard timeout raced
//!   against the in-flight invocation ([`DeadlineMonitor`])
//! - **Uniform responses**: success and failure share one response shape with
//!   a fully terminated thought trail ([`AgentResponse`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use renewable_proxy::{DownstreamTarget, ProxyConfig, RawError, RenewableProxyAgent};
//! use std::sync::Arc;
//!
//! struct Orchestrator;
//!
//! #[async_trait::async_trait]
//! impl DownstreamTarget for Orchestrator {
//!     async fn exists(&self, _function_name: &str) -> Result<bool, RawError> {
//!         Ok(true)
//!     }
//!
//!     async fn invoke(
//!         &self,
//!         _function_name: &str,
//!         _payload: &serde_json::Value,
//!     ) -> Result<String, RawError> {
//!         Ok(r#"{"success": true, "message": "Done", "artifacts": []}"#.to_string())
//!     }
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let agent = RenewableProxyAgent::new(
//!     ProxyConfig::for_function("renewable-orchestrator"),
//!     Arc::new(Orchestrator),
//! )?;
//! let response = agent.process_query("Analyze terrain at 35.067, -101.395").await;
//! println!("{}", response.message);
//! # Ok(())
//! # }
//! ```

// Allow missing errors documentation - errors are self-documenting via type signatures
#![allow(clippy::missing_errors_doc)]

// Logging utilities (re-exports tracing with log_* naming) and the tracing sink
pub mod logging;

pub mod agent;
pub mod categorizer;
pub mod config;
pub mod deadline;
pub mod error;
pub mod events;
pub mod response;
pub mod retry;
pub mod target;

#[cfg(test)]
pub mod tests;

// Re-export main types
pub use agent::{AgentState, InvocationResult, QueryReport, RenewableProxyAgent};
pub use categorizer::{CategorizedError, ErrorCategorizer, ErrorLogRecord};
pub use config::ProxyConfig;
pub use deadline::{DeadlineConfig, DeadlineExceeded, DeadlineMonitor};
pub use error::{ErrorKind, ErrorSeverity, ProxyError, ProxyResult, RawError};
pub use events::{DiagnosticEvent, DiagnosticPayload, DiagnosticSink, MemorySink};
pub use logging::TracingSink;
pub use response::{AgentResponse, StepStatus, ThoughtStep};
pub use retry::{RetryAttempt, RetryHistory, RetryPolicy};
pub use target::DownstreamTarget;
