//! Downstream invocation boundary.
//!
//! The agent does not know how the downstream compute function is reached.
//! Anything that can check a function exists and invoke it with a JSON
//! payload can implement [`DownstreamTarget`].

use crate::error::RawError;
use async_trait::async_trait;
use serde_json::Value;

/// Contract between the proxy agent and the downstream compute function.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DownstreamTarget: Send + Sync {
    /// Whether the named function exists and is reachable.
    ///
    /// `Ok(false)` and `Err(_)` both mean the function cannot be invoked.
    async fn exists(&self, function_name: &str) -> Result<bool, RawError>;

    /// Invoke the named function and return its raw response body.
    ///
    /// Retried calls reuse the same payload; idempotency is the downstream's
    /// responsibility.
    async fn invoke(&self, function_name: &str, payload: &Value) -> Result<String, RawError>;
}
