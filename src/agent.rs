//! The renewable energy proxy agent.
//!
//! [`RenewableProxyAgent::process_query`] is the only caller-facing
//! operation. It runs one logical call through the state machine
//!
//! ```text
//! Idle -> Validating -> Invoking -> Success
//!                          |  ^
//!                          v  |
//!                        Retrying
//!                          |
//!                          +-> Failed | TimedOut
//! ```
//!
//! and always returns an [`AgentResponse`]; downstream failures never escape
//! as errors or panics.
//!
//! Each call owns its [`DeadlineMonitor`], [`RetryHistory`] and
//! [`ThoughtTrail`], so concurrent calls through one agent share nothing
//! mutable except the diagnostic sink.

use crate::categorizer::{CategorizedError, ErrorCategorizer};
use crate::config::ProxyConfig;
use crate::deadline::{format_seconds, DeadlineExceeded, DeadlineMonitor};
use crate::error::{ErrorKind, ProxyResult, RawError};
use crate::events::{DiagnosticEvent, DiagnosticPayload, DiagnosticSink};
use crate::logging::{log_debug, log_info, log_warn, TracingSink};
use crate::response::{
    AgentResponse, ResponseParser, StepStatus, ThoughtTrail, ValidatedResponse,
};
use crate::retry::RetryHistory;
use crate::target::DownstreamTarget;

use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Orchestration state of a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Validating,
    Invoking,
    Retrying,
    Success,
    TimedOut,
    Failed,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::TimedOut | Self::Failed)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Invoking => "invoking",
            Self::Retrying => "retrying",
            Self::Success => "success",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of the invoke/retry loop.
#[derive(Debug, Clone)]
pub enum InvocationResult {
    Success {
        payload: ValidatedResponse,
        history: RetryHistory,
    },
    Failure {
        aggregated_message: String,
        history: RetryHistory,
        final_error: CategorizedError,
        /// `Failed` or `TimedOut`
        state: AgentState,
        total_attempts: u32,
    },
}

/// Response of one call together with how it got there.
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub response: AgentResponse,
    /// Terminal state: `Success`, `Failed` or `TimedOut`
    pub state: AgentState,
    pub correlation_id: String,
    /// Failed attempts, in order
    pub history: RetryHistory,
}

/// Per-call bookkeeping threaded through the orchestration steps.
struct CallContext {
    correlation_id: String,
    state: AgentState,
    trail: ThoughtTrail,
    started_at: Instant,
}

impl CallContext {
    fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            state: AgentState::Idle,
            trail: ThoughtTrail::default(),
            started_at: Instant::now(),
        }
    }

    fn transition(&mut self, next: AgentState) {
        log_debug!(
            correlation_id = %self.correlation_id,
            from = %self.state,
            to = %next,
            "Agent state transition"
        );
        self.state = next;
    }
}

/// Proxy agent forwarding renewable energy queries to the downstream function
pub struct RenewableProxyAgent {
    config: ProxyConfig,
    target: Arc<dyn DownstreamTarget>,
    sink: Arc<dyn DiagnosticSink>,
}

impl RenewableProxyAgent {
    /// Create an agent that reports diagnostics through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ConfigurationError`](crate::ProxyError) if the
    /// configuration fails validation.
    pub fn new(config: ProxyConfig, target: Arc<dyn DownstreamTarget>) -> ProxyResult<Self> {
        Self::with_sink(config, target, Arc::new(TracingSink))
    }

    /// Create an agent with a custom diagnostic sink.
    pub fn with_sink(
        config: ProxyConfig,
        target: Arc<dyn DownstreamTarget>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> ProxyResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            target,
            sink,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Answer a renewable energy query.
    ///
    /// Never fails: every failure path yields `success: false` with a
    /// self-diagnosing message and a fully terminated thought trail.
    pub async fn process_query(&self, query: &str) -> AgentResponse {
        self.process_query_detailed(query).await.response
    }

    /// [`process_query`](Self::process_query), also reporting the terminal
    /// state and the retry history of the call.
    pub async fn process_query_detailed(&self, query: &str) -> QueryReport {
        let mut ctx = CallContext::new();

        log_info!(
            correlation_id = %ctx.correlation_id,
            target_function = %self.config.target_function,
            query_length = query.len(),
            "Processing renewable energy query"
        );

        ctx.transition(AgentState::Validating);
        if let Err(categorized) = self.validate_target(&mut ctx).await {
            ctx.transition(AgentState::Failed);
            self.emit(
                &ctx.correlation_id,
                DiagnosticPayload::FinalFailure {
                    total_attempts: 0,
                    final_error: categorized.original_error.display_message().to_string(),
                },
            );
            let message = Self::aggregate_validation_failure(&categorized);
            return self.failure_report(ctx, message, RetryHistory::default());
        }

        let payload = json!({
            "query": query,
            "requestId": ctx.correlation_id,
        });

        match self.invoke_with_retry(&payload, &mut ctx).await {
            InvocationResult::Success { payload, history } => {
                log_info!(
                    correlation_id = %ctx.correlation_id,
                    attempts = history.len() + 1,
                    artifact_count = payload.artifacts.len(),
                    duration_ms = ctx.started_at.elapsed().as_millis() as u64,
                    "Renewable energy query succeeded"
                );

                ctx.trail.extend(payload.thought_steps);
                ctx.trail.record(
                    "completion",
                    "Analysis complete",
                    format!("Received {} artifact(s)", payload.artifacts.len()),
                    StepStatus::Complete,
                );
                debug_assert!(ctx.state.is_terminal(), "call ended in state {}", ctx.state);

                QueryReport {
                    response: AgentResponse {
                        success: true,
                        message: payload.message,
                        artifacts: payload.artifacts,
                        thought_steps: ctx.trail.finish(),
                        agent_used: self.config.agent_name.clone(),
                    },
                    state: ctx.state,
                    correlation_id: ctx.correlation_id,
                    history,
                }
            }
            InvocationResult::Failure {
                aggregated_message,
                history,
                final_error,
                total_attempts,
                ..
            } => {
                log_warn!(
                    correlation_id = %ctx.correlation_id,
                    state = %ctx.state,
                    error_kind = %final_error.kind,
                    total_attempts = total_attempts,
                    duration_ms = ctx.started_at.elapsed().as_millis() as u64,
                    "Renewable energy query failed"
                );
                self.failure_report(ctx, aggregated_message, history)
            }
        }
    }

    /// Confirm the downstream function exists before the first attempt.
    ///
    /// Any failure here is reported as `NotFound` and costs no attempt.
    async fn validate_target(&self, ctx: &mut CallContext) -> Result<(), CategorizedError> {
        let function = &self.config.target_function;
        let step = ctx.trail.begin(
            "validation",
            "Validating renewable energy backend",
            format!("Checking that {function} is deployed"),
        );

        let problem = match self.target.exists(function).await {
            Ok(true) => {
                ctx.trail
                    .complete(step, format!("{function} is available"));
                return Ok(());
            }
            Ok(false) => format!("Function not found: {function}"),
            Err(error) => format!(
                "Function {function} does not exist or is not reachable: {}",
                error.display_message()
            ),
        };

        let raw = RawError::named("ResourceNotFoundException", problem);
        let categorized = ErrorCategorizer::categorize(&raw, Some(&ctx.correlation_id));
        ErrorCategorizer::log(&categorized);
        ctx.trail.fail(step, categorized.details.clone());
        Err(categorized)
    }

    /// Invoke the downstream function, retrying per the retry policy.
    ///
    /// Each attempt is raced against the hard deadline. Returns the validated
    /// payload or an aggregated failure carrying the full retry history.
    async fn invoke_with_retry(
        &self,
        payload: &serde_json::Value,
        ctx: &mut CallContext,
    ) -> InvocationResult {
        let policy = &self.config.retry_policy;
        let function = &self.config.target_function;
        let mut history = RetryHistory::default();
        let mut monitor = DeadlineMonitor::new(self.config.deadline.clone());
        let mut attempt: u32 = 0;
        let mut backoff_ms: u64 = 0;

        loop {
            attempt += 1;
            ctx.transition(AgentState::Invoking);
            monitor.start();

            let step = ctx.trail.begin(
                "execution",
                format!("Invoking renewable energy backend (attempt {attempt})"),
                format!("Calling {function}"),
            );

            log_debug!(
                correlation_id = %ctx.correlation_id,
                attempt = attempt,
                max_attempts = policy.max_attempts,
                "Invoking downstream function"
            );

            let raced = monitor
                .race(
                    self.target.invoke(function, payload),
                    self.sink.as_ref(),
                    &ctx.correlation_id,
                )
                .await;

            let outcome = match raced {
                Err(exceeded) => {
                    ctx.transition(AgentState::TimedOut);
                    history.record(attempt, ErrorKind::Timeout, backoff_ms);
                    return self.timed_out(exceeded, attempt, step, history, ctx);
                }
                Ok(Ok(body)) => ResponseParser::parse(&body),
                Ok(Err(error)) => Err(error),
            };

            let raw = match outcome {
                Ok(validated) => {
                    ctx.trail.complete(
                        step,
                        format!("Backend responded after {}ms", monitor.elapsed_ms()),
                    );
                    ctx.transition(AgentState::Success);
                    return InvocationResult::Success {
                        payload: validated,
                        history,
                    };
                }
                Err(raw) => raw,
            };

            let categorized = ErrorCategorizer::categorize(&raw, Some(&ctx.correlation_id));
            ErrorCategorizer::log(&categorized);
            history.record(attempt, categorized.kind, backoff_ms);
            ctx.trail.fail(step, categorized.details.clone());

            if !policy.should_retry_raw(categorized.kind, &raw, attempt) {
                ctx.transition(AgentState::Failed);
                self.emit(
                    &ctx.correlation_id,
                    DiagnosticPayload::FinalFailure {
                        total_attempts: attempt,
                        final_error: raw.display_message().to_string(),
                    },
                );
                return InvocationResult::Failure {
                    aggregated_message: Self::aggregate_failure(&categorized, attempt),
                    history,
                    final_error: categorized,
                    state: AgentState::Failed,
                    total_attempts: attempt,
                };
            }

            ctx.transition(AgentState::Retrying);
            let delay = policy.calculate_delay(attempt + 1);
            backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);

            self.emit(
                &ctx.correlation_id,
                DiagnosticPayload::RetryAttempt {
                    attempt: attempt + 1,
                    reason: categorized.kind,
                    message: raw.display_message().to_string(),
                    backoff_ms,
                },
            );
            ctx.trail.record(
                "retry",
                format!("Retrying after {}", categorized.kind),
                format!(
                    "Waiting {backoff_ms}ms before attempt {} of {}",
                    attempt + 1,
                    policy.max_attempts
                ),
                StepStatus::Complete,
            );
            log_debug!(
                correlation_id = %ctx.correlation_id,
                attempt = attempt,
                error_kind = %categorized.kind,
                delay_ms = backoff_ms,
                "Invocation failed, retrying after delay"
            );

            tokio::time::sleep(delay).await;
        }
    }

    fn timed_out(
        &self,
        exceeded: DeadlineExceeded,
        attempt: u32,
        step: usize,
        history: RetryHistory,
        ctx: &mut CallContext,
    ) -> InvocationResult {
        let limit_secs = exceeded.limit.as_secs();
        let raw = RawError::named(
            "TimeoutError",
            format!(
                "Renewable energy analysis timed out after {limit_secs} seconds on attempt {attempt}"
            ),
        );
        let categorized = ErrorCategorizer::categorize(&raw, Some(&ctx.correlation_id));
        ErrorCategorizer::log(&categorized);
        ctx.trail.fail(
            step,
            format!("No response within {}", format_seconds(exceeded.limit)),
        );

        self.emit(
            &ctx.correlation_id,
            DiagnosticPayload::FinalFailure {
                total_attempts: attempt,
                final_error: raw.display_message().to_string(),
            },
        );

        let aggregated_message = format!(
            "{}\n\n{}",
            raw.display_message(),
            ErrorCategorizer::format_for_user(&categorized)
        );

        InvocationResult::Failure {
            aggregated_message,
            history,
            final_error: categorized,
            state: AgentState::TimedOut,
            total_attempts: attempt,
        }
    }

    /// User-facing summary of a call that ran out of retries or hit a
    /// non-retryable error.
    pub fn aggregate_failure(categorized: &CategorizedError, total_attempts: u32) -> String {
        format!(
            "Request failed after {total_attempts} attempts: {}\nDetails: {}\n\n{}",
            categorized.original_error.display_message(),
            categorized.details,
            ErrorCategorizer::format_for_user(categorized)
        )
    }

    fn aggregate_validation_failure(categorized: &CategorizedError) -> String {
        format!(
            "Renewable energy backend validation failed: {}\nDetails: {}\n\n{}",
            categorized.original_error.display_message(),
            categorized.details,
            ErrorCategorizer::format_for_user(categorized)
        )
    }

    fn failure_report(
        &self,
        ctx: CallContext,
        message: String,
        history: RetryHistory,
    ) -> QueryReport {
        debug_assert!(ctx.state.is_terminal(), "call ended in state {}", ctx.state);
        let mut trail = ctx.trail;
        trail.record(
            "error",
            "Request failed",
            message.lines().next().unwrap_or_default().to_string(),
            StepStatus::Error,
        );

        QueryReport {
            response: AgentResponse {
                success: false,
                message,
                artifacts: Vec::new(),
                thought_steps: trail.finish(),
                agent_used: self.config.agent_name.clone(),
            },
            state: ctx.state,
            correlation_id: ctx.correlation_id,
            history,
        }
    }

    fn emit(&self, correlation_id: &str, payload: DiagnosticPayload) {
        self.sink
            .emit(&DiagnosticEvent::new(correlation_id, payload));
    }
}
