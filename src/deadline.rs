//! Warning and hard-timeout tracking for a single call.
//!
//! A [`DeadlineMonitor`] is created per call and never shared. The hard
//! timeout is enforced by racing the in-flight invocation against a timer
//! ([`DeadlineMonitor::race`]) instead of checking the clock after the
//! invocation returns, so a downstream call that never answers still ends at
//! the deadline.

use crate::events::{DiagnosticEvent, DiagnosticPayload, DiagnosticSink};
use crate::logging::log_debug;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Thresholds governing how long an invocation may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineConfig {
    /// Elapsed time after which a one-off warning is emitted
    pub warning_threshold: Duration,
    /// Elapsed time after which the invocation is abandoned
    pub hard_timeout: Duration,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            warning_threshold: Duration::from_secs(30),
            hard_timeout: Duration::from_secs(60),
        }
    }
}

/// The hard timeout fired before the invocation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation exceeded the {}s deadline after {}ms", .limit.as_secs(), .elapsed.as_millis())]
pub struct DeadlineExceeded {
    pub elapsed: Duration,
    pub limit: Duration,
}

/// Tracks elapsed time against the warning and hard thresholds.
#[derive(Debug)]
pub struct DeadlineMonitor {
    config: DeadlineConfig,
    started_at: Instant,
    warned: bool,
    timed_out: bool,
}

impl DeadlineMonitor {
    /// Create a monitor; the clock starts immediately.
    pub fn new(config: DeadlineConfig) -> Self {
        Self {
            config,
            started_at: Instant::now(),
            warned: false,
            timed_out: false,
        }
    }

    pub fn config(&self) -> &DeadlineConfig {
        &self.config
    }

    /// Restart the clock for a new attempt.
    ///
    /// The warning stays spent: it fires at most once per call.
    pub fn start(&mut self) {
        self.started_at = Instant::now();
        self.timed_out = false;
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// True exactly once, the first time elapsed time reaches the warning
    /// threshold.
    pub fn check_warning(&mut self) -> bool {
        if self.warned || self.elapsed() < self.config.warning_threshold {
            return false;
        }
        self.warned = true;
        true
    }

    /// True exactly once per attempt, when elapsed time reaches the hard
    /// timeout.
    pub fn check_timeout(&mut self) -> bool {
        if self.timed_out || self.elapsed() < self.config.hard_timeout {
            return false;
        }
        self.timed_out = true;
        true
    }

    pub fn has_warned(&self) -> bool {
        self.warned
    }

    /// Next instant at which a check can change its answer.
    fn next_checkpoint(&self) -> Instant {
        if self.warned || self.config.warning_threshold >= self.config.hard_timeout {
            self.started_at + self.config.hard_timeout
        } else {
            self.started_at + self.config.warning_threshold
        }
    }

    /// Drive `operation` to completion unless the hard timeout fires first.
    ///
    /// Crossing the warning threshold emits a single `WarningThreshold` event
    /// to `sink` and lets the operation continue. On timeout the operation
    /// future is dropped.
    pub async fn race<F, T>(
        &mut self,
        operation: F,
        sink: &dyn DiagnosticSink,
        correlation_id: &str,
    ) -> Result<T, DeadlineExceeded>
    where
        F: Future<Output = T>,
    {
        tokio::pin!(operation);

        loop {
            let checkpoint = self.next_checkpoint();

            tokio::select! {
                biased;

                output = &mut operation => return Ok(output),

                _ = tokio::time::sleep_until(checkpoint) => {
                    if self.check_timeout() {
                        let elapsed = self.elapsed();
                        log_debug!(
                            correlation_id = %correlation_id,
                            elapsed_ms = self.elapsed_ms(),
                            limit_secs = self.config.hard_timeout.as_secs(),
                            "Hard deadline reached, abandoning invocation"
                        );
                        return Err(DeadlineExceeded {
                            elapsed,
                            limit: self.config.hard_timeout,
                        });
                    }

                    if self.check_warning() {
                        sink.emit(&DiagnosticEvent::new(
                            correlation_id,
                            DiagnosticPayload::WarningThreshold {
                                duration: format_seconds(self.elapsed()),
                                threshold: format_seconds(self.config.warning_threshold),
                            },
                        ));
                    }
                }
            }
        }
    }
}

/// `Duration` rendered as whole seconds, e.g. `"30s"`.
pub fn format_seconds(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}
