use crate::error::{ErrorKind, RawError};
use crate::retry::{RetryHistory, RetryPolicy};
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    // Unit Tests for RetryPolicy
    //
    // UNIT UNDER TEST: RetryPolicy (concrete implementation)
    //
    // BUSINESS RESPONSIBILITY:
    //   - Decides which failure kinds are worth another attempt
    //   - Enforces the attempt budget (3 attempts by default)
    //   - Defines exponential backoff progression (1s before attempt 2, 2s before attempt 3)
    //   - Recognizes transient service-side failures
    //
    // TEST COVERAGE:
    //   - Default configuration values
    //   - Retry decision table for every kind and attempt number
    //   - Backoff progression, cap and jitter bounds
    //   - Transient failure detection by status, name and wording

    #[test]
    fn test_retry_policy_defaults_match_production_requirements() {
        // Test verifies the default policy allows three attempts with one second base delay
        // Ensures backoff timing gives the backend a chance to recover between attempts

        // Arrange
        let policy = RetryPolicy::default();

        // Act & Assert
        assert_eq!(policy.max_attempts, 3, "Should allow 3 attempts in total");
        assert_eq!(
            policy.base_delay,
            Duration::from_millis(1000),
            "Should wait 1 second before the first retry"
        );
        assert_eq!(
            policy.max_delay,
            Duration::from_secs(16),
            "Should cap delays at 16 seconds"
        );
        assert_eq!(
            policy.backoff_multiplier, 2.0,
            "Should double delay each attempt"
        );
        assert!(policy.jitter, "Jitter should be enabled by default");
    }

    #[test]
    fn test_should_retry_decision_table() {
        // Test verifies retryable kinds retry until the budget is spent
        // Ensures permanent kinds are never retried, even on the first attempt

        let retryable = [ErrorKind::Timeout, ErrorKind::ToolFailure, ErrorKind::Unknown];
        let permanent = [
            ErrorKind::NotFound,
            ErrorKind::PermissionDenied,
            ErrorKind::InvalidResponse,
        ];

        for kind in retryable {
            assert!(RetryPolicy::should_retry(kind, 1, 3), "{kind} should retry after attempt 1");
            assert!(RetryPolicy::should_retry(kind, 2, 3), "{kind} should retry after attempt 2");
            assert!(
                !RetryPolicy::should_retry(kind, 3, 3),
                "{kind} should stop once the budget is spent"
            );
        }

        for kind in permanent {
            for attempt in 1..=3 {
                assert!(
                    !RetryPolicy::should_retry(kind, attempt, 3),
                    "{kind} must never be retried"
                );
            }
        }
    }

    #[test]
    fn test_single_attempt_budget_never_retries() {
        // Test verifies a budget of one attempt disables retries entirely

        // Arrange
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };

        // Act & Assert
        for kind in ErrorKind::ALL {
            assert!(!policy.allows_retry(kind, 1), "{kind} should not retry");
        }
    }

    #[test]
    fn test_backoff_progression() {
        // Test verifies nominal backoff doubles from the base delay and starts at attempt 2

        // Arrange
        let policy = RetryPolicy::default();

        // Act & Assert
        assert_eq!(policy.compute_backoff(1), 0, "First attempt has no delay");
        assert_eq!(policy.compute_backoff(2), 1000);
        assert_eq!(policy.compute_backoff(3), 2000);
        assert_eq!(policy.compute_backoff(4), 4000);
        assert_eq!(policy.compute_backoff(5), 8000);
    }

    #[test]
    fn test_backoff_is_capped_at_max_delay() {
        // Test verifies very late attempts never exceed the configured cap

        let policy = RetryPolicy::default();

        assert_eq!(policy.compute_backoff(6), 16_000);
        assert_eq!(policy.compute_backoff(10), 16_000);
        assert_eq!(policy.compute_backoff(u32::MAX), 16_000);
    }

    #[test]
    fn test_jitter_only_lengthens_delay_by_at_most_ten_percent() {
        // Test verifies jittered delays stay within [nominal, nominal * 1.1]
        // Ensures the second retry always waits longer than the first

        // Arrange
        let policy = RetryPolicy::default();

        for _ in 0..100 {
            // Act
            let first = policy.calculate_delay(2).as_millis();
            let second = policy.calculate_delay(3).as_millis();

            // Assert
            assert!((1000..=1100).contains(&first), "first delay {first}ms out of range");
            assert!((2000..=2200).contains(&second), "second delay {second}ms out of range");
            assert!(second > first);
        }
    }

    #[test]
    fn test_delay_without_jitter_is_exact() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };

        assert_eq!(policy.calculate_delay(1), Duration::ZERO);
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(1000));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_transient_service_error_detection() {
        // Test verifies throttling, service exceptions and 5xx responses count as transient

        let transient = [
            RawError::named("ServiceException", "Service temporarily unavailable"),
            RawError::named("ThrottlingException", "Rate exceeded"),
            RawError::named("TooManyRequestsException", "Slow down"),
            RawError::new("Internal failure").with_status_code(502),
            RawError::new("Request limit").with_status_code(429),
            RawError::new("Rate limit reached for this account"),
        ];
        let permanent = [
            RawError::named("ResourceNotFoundException", "Function not found"),
            RawError::new("Bad input").with_status_code(400),
            RawError::default(),
        ];

        for raw in &transient {
            assert!(
                RetryPolicy::is_transient_service_error(raw),
                "{raw} should be transient"
            );
        }
        for raw in &permanent {
            assert!(
                !RetryPolicy::is_transient_service_error(raw),
                "{raw} should not be transient"
            );
        }
    }

    #[test]
    fn test_transient_service_error_overrides_permanent_kind() {
        // Test verifies a 503 service failure is retried within budget even when classified permanent
        // Ensures permanent failures without service signals still stop at once

        // Arrange
        let policy = RetryPolicy::default();
        let transient = RawError::named(
            "ServiceException",
            "Service returned a malformed payload, please retry",
        )
        .with_status_code(503);
        let denied = RawError::named("AccessDeniedException", "User is not authorized");

        // Act & Assert
        assert!(policy.should_retry_raw(ErrorKind::InvalidResponse, &transient, 1));
        assert!(policy.should_retry_raw(ErrorKind::InvalidResponse, &transient, 2));
        assert!(!policy.should_retry_raw(ErrorKind::InvalidResponse, &transient, 3));
        assert!(!policy.should_retry_raw(ErrorKind::PermissionDenied, &denied, 1));
        assert!(policy.should_retry_raw(ErrorKind::Unknown, &denied, 1));
    }

    // Unit Tests for RetryHistory
    //
    // UNIT UNDER TEST: RetryHistory
    //
    // BUSINESS RESPONSIBILITY:
    //   - Keeps an ordered, append-only record of failed attempts within one call
    //
    // TEST COVERAGE:
    //   - Recording order and fields
    //   - Total backoff accounting
    //   - Serialized field names

    #[test]
    fn test_history_records_attempts_in_order() {
        // Test verifies attempts are kept in order with kind and applied backoff

        // Arrange
        let mut history = RetryHistory::default();
        assert!(history.is_empty());

        // Act
        history.record(1, ErrorKind::Unknown, 0);
        history.record(2, ErrorKind::ToolFailure, 1000);
        history.record(3, ErrorKind::Unknown, 2000);

        // Assert
        assert_eq!(history.len(), 3);
        let numbers: Vec<u32> = history.attempts().iter().map(|a| a.attempt).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(history.attempts()[1].error_kind, ErrorKind::ToolFailure);
        assert_eq!(history.last().map(|a| a.backoff_ms), Some(2000));
        assert_eq!(history.total_backoff(), Duration::from_millis(3000));
        assert!(history
            .attempts()
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[test]
    fn test_history_serializes_with_camel_case_fields() {
        let mut history = RetryHistory::default();
        history.record(1, ErrorKind::Timeout, 0);

        let value = serde_json::to_value(history.attempts()).unwrap();

        assert_eq!(value[0]["attempt"], 1);
        assert_eq!(value[0]["errorKind"], "Timeout");
        assert_eq!(value[0]["backoffMs"], 0);
        assert!(value[0]["timestamp"].is_string());
    }
}
