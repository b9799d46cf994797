//! Retry policy with exponential backoff
//!
//! Decides whether a categorized failure should be retried and how long to
//! wait before the next attempt:
//! - Retryable kinds: `Timeout`, `ToolFailure`, `Unknown` (which covers
//!   service, throttling and 5xx failures)
//! - Never retried: `NotFound`, `PermissionDenied`, `InvalidResponse`, unless
//!   the raw failure is a transient service error
//! - Backoff: 1s before attempt 2, 2s before attempt 3, doubling up to `max_delay`

use crate::error::{ErrorKind, RawError};
use crate::logging::log_debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy configuration for downstream invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry (attempt 2)
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add up to 10% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(16),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Whether a failure of `kind` on `attempt_number` (1-based) should be
    /// followed by another attempt.
    pub fn should_retry(kind: ErrorKind, attempt_number: u32, max_attempts: u32) -> bool {
        Self::is_retryable_kind(kind) && attempt_number < max_attempts
    }

    /// [`should_retry`](Self::should_retry) against this policy's budget.
    pub fn allows_retry(&self, kind: ErrorKind, attempt_number: u32) -> bool {
        Self::should_retry(kind, attempt_number, self.max_attempts)
    }

    /// Retry decision for a failed attempt.
    ///
    /// Transient service failures (throttling, 5xx) are retried within the
    /// budget even when their text classifies as a permanent kind.
    pub fn should_retry_raw(&self, kind: ErrorKind, raw: &RawError, attempt_number: u32) -> bool {
        self.allows_retry(kind, attempt_number)
            || (Self::is_transient_service_error(raw) && attempt_number < self.max_attempts)
    }

    pub fn is_retryable_kind(kind: ErrorKind) -> bool {
        match kind {
            ErrorKind::Timeout => true,
            ErrorKind::ToolFailure => true,
            ErrorKind::Unknown => true,
            ErrorKind::NotFound => false,         // Target missing, retrying cannot help
            ErrorKind::PermissionDenied => false, // Needs an IAM change
            ErrorKind::InvalidResponse => false,  // Backend would answer the same way
        }
    }

    /// Whether a raw failure looks like a transient service-side problem:
    /// service/throttling exceptions, HTTP 5xx or 429, or rate-limit wording.
    pub fn is_transient_service_error(raw: &RawError) -> bool {
        if raw
            .status_code
            .is_some_and(|code| code == 429 || (500..600).contains(&code))
        {
            return true;
        }

        let name = raw.name.as_deref().unwrap_or_default();
        if [
            "ServiceException",
            "ThrottlingException",
            "TooManyRequestsException",
            "ServiceUnavailableException",
        ]
        .iter()
        .any(|candidate| name.ends_with(candidate))
        {
            return true;
        }

        let text = raw.display_message().to_lowercase();
        [
            "serviceexception",
            "throttl",
            "rate exceeded",
            "rate limit",
            "too many requests",
            "service unavailable",
            "503",
            "502",
            "500 internal",
        ]
        .iter()
        .any(|needle| text.contains(needle))
    }

    /// Nominal backoff in milliseconds before `attempt_number`.
    ///
    /// Attempt 1 has no preceding delay; attempt `n >= 2` waits
    /// `base_delay * multiplier^(n - 2)`, capped at `max_delay`.
    pub fn compute_backoff(&self, attempt_number: u32) -> u64 {
        if attempt_number < 2 {
            return 0;
        }

        let exponent = i32::try_from(attempt_number - 2).unwrap_or(i32::MAX);
        let delay_ms = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);

        delay_ms.min(self.max_delay.as_millis() as f64).round() as u64
    }

    /// Delay to actually sleep before `attempt_number`, jitter included.
    ///
    /// Jitter only ever lengthens the delay, by at most 10%.
    pub fn calculate_delay(&self, attempt_number: u32) -> Duration {
        let nominal = self.compute_backoff(attempt_number);
        if nominal == 0 || !self.jitter {
            return Duration::from_millis(nominal);
        }

        let jitter = fastrand::f64() * 0.1; // Up to 10% jitter
        let delay = Duration::from_millis((nominal as f64 * (1.0 + jitter)).round() as u64);

        log_debug!(
            attempt = attempt_number,
            nominal_ms = nominal,
            delay_ms = delay.as_millis() as u64,
            "Computed retry backoff"
        );
        delay
    }
}

/// One failed attempt within a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryAttempt {
    /// 1-based attempt number
    pub attempt: u32,
    /// Kind of the failure this attempt ended with
    pub error_kind: ErrorKind,
    /// Delay applied before this attempt was made (0 for the first)
    pub backoff_ms: u64,
    /// When the attempt failed
    pub timestamp: DateTime<Utc>,
}

/// Ordered, append-only log of the attempts made during one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryHistory {
    attempts: Vec<RetryAttempt>,
}

impl RetryHistory {
    pub fn record(&mut self, attempt: u32, error_kind: ErrorKind, backoff_ms: u64) {
        self.attempts.push(RetryAttempt {
            attempt,
            error_kind,
            backoff_ms,
            timestamp: Utc::now(),
        });
    }

    pub fn attempts(&self) -> &[RetryAttempt] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn last(&self) -> Option<&RetryAttempt> {
        self.attempts.last()
    }

    /// Total backoff time spent across the call.
    pub fn total_backoff(&self) -> Duration {
        Duration::from_millis(self.attempts.iter().map(|a| a.backoff_ms).sum())
    }
}
