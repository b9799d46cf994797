//! Test helper utilities for renewable-proxy unit tests
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

// Allow dead code in test utilities - functions are used across different test files
#![allow(dead_code)]

use crate::agent::RenewableProxyAgent;
use crate::config::ProxyConfig;
use crate::error::RawError;
use crate::events::MemorySink;
use crate::target::DownstreamTarget;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer of a [`ScriptedTarget`]
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Return this raw body
    Body(String),
    /// Fail with this error
    Error(RawError),
    /// Return this raw body after the delay
    SlowBody(Duration, String),
    /// Fail with this error after the delay
    SlowError(Duration, RawError),
    /// Never answer
    Hang,
}

/// Downstream target replaying a fixed script of answers.
///
/// When the script runs out, the fallback answer repeats forever.
pub struct ScriptedTarget {
    exists: Result<bool, RawError>,
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    invocations: AtomicU32,
    payloads: Mutex<Vec<Value>>,
}

impl ScriptedTarget {
    pub fn new(script: Vec<Scripted>, fallback: Scripted) -> Self {
        Self {
            exists: Ok(true),
            script: Mutex::new(script.into()),
            fallback,
            invocations: AtomicU32::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Target that always answers the same way
    pub fn always(answer: Scripted) -> Self {
        Self::new(Vec::new(), answer)
    }

    pub fn with_existence(mut self, exists: Result<bool, RawError>) -> Self {
        self.exists = exists;
        self
    }

    pub fn invocation_count(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownstreamTarget for ScriptedTarget {
    async fn exists(&self, _function_name: &str) -> Result<bool, RawError> {
        self.exists.clone()
    }

    async fn invoke(&self, _function_name: &str, payload: &Value) -> Result<String, RawError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match next {
            Scripted::Body(body) => Ok(body),
            Scripted::Error(error) => Err(error),
            Scripted::SlowBody(delay, body) => {
                tokio::time::sleep(delay).await;
                Ok(body)
            }
            Scripted::SlowError(delay, error) => {
                tokio::time::sleep(delay).await;
                Err(error)
            }
            Scripted::Hang => std::future::pending().await,
        }
    }
}

/// Valid downstream body with one terrain artifact
pub fn success_body() -> String {
    json!({
        "success": true,
        "message": "Terrain analysis complete for project wind-farm-7",
        "artifacts": [{
            "type": "wind_farm_terrain_analysis",
            "data": { "features": 42 },
            "metadata": { "projectId": "wind-farm-7" }
        }],
        "thoughtSteps": [{
            "type": "analysis",
            "title": "Terrain analysis",
            "summary": "Fetched OSM features",
            "status": "complete",
            "timestamp": 1_700_000_000_000_i64
        }]
    })
    .to_string()
}

/// Error the downstream raises when it is briefly unavailable
pub fn service_exception() -> RawError {
    RawError::named("ServiceException", "Service temporarily unavailable").with_status_code(503)
}

pub fn create_test_config() -> ProxyConfig {
    ProxyConfig::for_function("renewable-orchestrator-test")
}

/// Build an agent around `target` that records diagnostics in memory
pub fn create_test_agent(target: Arc<dyn DownstreamTarget>) -> (RenewableProxyAgent, MemorySink) {
    let sink = MemorySink::default();
    let agent = RenewableProxyAgent::with_sink(create_test_config(), target, Arc::new(sink.clone()))
        .expect("test config should be valid");
    (agent, sink)
}
