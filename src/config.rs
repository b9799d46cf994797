use crate::deadline::DeadlineConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::logging::log_debug;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable naming the downstream function.
pub const ENV_FUNCTION_NAME: &str = "RENEWABLE_ORCHESTRATOR_FUNCTION_NAME";
pub const ENV_AGENT_NAME: &str = "RENEWABLE_AGENT_NAME";
pub const ENV_MAX_ATTEMPTS: &str = "RENEWABLE_MAX_ATTEMPTS";
pub const ENV_BASE_DELAY_MS: &str = "RENEWABLE_RETRY_BASE_DELAY_MS";
pub const ENV_WARNING_THRESHOLD_SECS: &str = "RENEWABLE_WARNING_THRESHOLD_SECS";
pub const ENV_TIMEOUT_SECS: &str = "RENEWABLE_TIMEOUT_SECS";

/// Configuration for the renewable proxy agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Name of the downstream compute function
    pub target_function: String,
    /// Reported as `agentUsed` in every response
    pub agent_name: String,
    pub retry_policy: RetryPolicy,
    pub deadline: DeadlineConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target_function: "renewable-orchestrator".to_string(),
            agent_name: "renewable_energy".to_string(),
            retry_policy: RetryPolicy::default(),
            deadline: DeadlineConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Default configuration pointing at the given function
    pub fn for_function(target_function: impl Into<String>) -> Self {
        Self {
            target_function: target_function.into(),
            ..Self::default()
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_deadline(mut self, deadline: DeadlineConfig) -> Self {
        self.deadline = deadline;
        self
    }

    /// Validate the configuration is complete and consistent
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ConfigurationError`] if:
    /// - The target function name is empty
    /// - `max_attempts` is zero
    /// - The warning threshold is not below the hard timeout
    pub fn validate(&self) -> ProxyResult<()> {
        if self.target_function.trim().is_empty() {
            return Err(ProxyError::configuration_error(
                "Target function name must not be empty",
            ));
        }
        if self.agent_name.trim().is_empty() {
            return Err(ProxyError::configuration_error(
                "Agent name must not be empty",
            ));
        }
        if self.retry_policy.max_attempts == 0 {
            return Err(ProxyError::configuration_error(
                "Retry policy must allow at least one attempt",
            ));
        }
        if self.deadline.warning_threshold >= self.deadline.hard_timeout {
            return Err(ProxyError::configuration_error(format!(
                "Warning threshold ({}s) must be below the hard timeout ({}s)",
                self.deadline.warning_threshold.as_secs(),
                self.deadline.hard_timeout.as_secs()
            )));
        }
        Ok(())
    }

    /// Load configuration from environment variables
    /// This is the ONLY method that should access environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ConfigurationError`] if the function name variable
    /// is missing or the resulting configuration fails validation, and
    /// [`ProxyError::InvalidEnvVar`] if a numeric variable cannot be parsed.
    pub fn from_env() -> ProxyResult<Self> {
        let target_function = std::env::var(ENV_FUNCTION_NAME).map_err(|_| {
            ProxyError::configuration_error(format!("{ENV_FUNCTION_NAME} is not set"))
        })?;

        let mut config = Self::for_function(target_function);

        if let Ok(agent_name) = std::env::var(ENV_AGENT_NAME) {
            config.agent_name = agent_name;
        }
        if let Some(max_attempts) = Self::parse_env::<u32>(ENV_MAX_ATTEMPTS)? {
            config.retry_policy.max_attempts = max_attempts;
        }
        if let Some(base_delay_ms) = Self::parse_env::<u64>(ENV_BASE_DELAY_MS)? {
            config.retry_policy.base_delay = Duration::from_millis(base_delay_ms);
        }
        if let Some(secs) = Self::parse_env::<u64>(ENV_WARNING_THRESHOLD_SECS)? {
            config.deadline.warning_threshold = Duration::from_secs(secs);
        }
        if let Some(secs) = Self::parse_env::<u64>(ENV_TIMEOUT_SECS)? {
            config.deadline.hard_timeout = Duration::from_secs(secs);
        }

        config.validate()?;

        log_debug!(
            target_function = %config.target_function,
            agent_name = %config.agent_name,
            max_attempts = config.retry_policy.max_attempts,
            base_delay_ms = config.retry_policy.base_delay.as_millis() as u64,
            warning_threshold_secs = config.deadline.warning_threshold.as_secs(),
            hard_timeout_secs = config.deadline.hard_timeout.as_secs(),
            "Proxy configuration loaded and validated"
        );

        Ok(config)
    }

    /// Parse an optional numeric environment variable
    fn parse_env<T: FromStr>(variable: &str) -> ProxyResult<Option<T>> {
        match std::env::var(variable) {
            Ok(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| ProxyError::invalid_env_var(variable, raw)),
            Err(_) => Ok(None),
        }
    }
}
