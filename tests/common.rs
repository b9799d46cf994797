//! Test helper utilities for renewable-proxy integration tests
//!
//! This module provides a fake downstream function and response fixtures
//! shared across integration test files.
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

// Allow dead code in test utilities - functions are used across different test files
#![allow(dead_code)]

use async_trait::async_trait;
use renewable_proxy::{
    DiagnosticEvent, DiagnosticSink, DownstreamTarget, ProxyConfig, RawError, RenewableProxyAgent,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake downstream answers one invocation
#[derive(Debug, Clone)]
pub enum Reply {
    /// Raw response body
    Body(String),
    /// Error payload as the SDK would surface it, normalized with `RawError::from_value`
    ErrorPayload(Value),
    /// Answer after the given delay
    Delayed(Duration, String),
    /// Never answer
    Silence,
}

/// In-process stand-in for the deployed orchestrator function.
///
/// Replies are consumed in order; the last one repeats once the queue is empty.
pub struct FakeOrchestrator {
    deployed: bool,
    replies: Mutex<VecDeque<Reply>>,
    last: Reply,
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakeOrchestrator {
    pub fn with_replies(replies: Vec<Reply>) -> Self {
        let last = replies
            .last()
            .cloned()
            .unwrap_or_else(|| Reply::Body(success_body("wind-farm-1")));
        Self {
            deployed: true,
            replies: Mutex::new(replies.into()),
            last,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn not_deployed() -> Self {
        Self {
            deployed: false,
            ..Self::with_replies(Vec::new())
        }
    }

    /// Every (function name, payload) pair the fake was invoked with
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DownstreamTarget for FakeOrchestrator {
    async fn exists(&self, _function_name: &str) -> Result<bool, RawError> {
        Ok(self.deployed)
    }

    async fn invoke(&self, function_name: &str, payload: &Value) -> Result<String, RawError> {
        self.calls
            .lock()
            .unwrap()
            .push((function_name.to_string(), payload.clone()));

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.last.clone());

        match reply {
            Reply::Body(body) => Ok(body),
            Reply::ErrorPayload(payload) => Err(RawError::from_value(&payload)),
            Reply::Delayed(delay, body) => {
                tokio::time::sleep(delay).await;
                Ok(body)
            }
            Reply::Silence => std::future::pending().await,
        }
    }
}

/// Sink keeping every event as the JSON an external collaborator would receive
#[derive(Default, Clone)]
pub struct JsonSink {
    events: Arc<Mutex<Vec<Value>>>,
}

impl JsonSink {
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().unwrap().clone()
    }

    pub fn of_type(&self, event: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|value| value["event"] == event)
            .collect()
    }
}

impl DiagnosticSink for JsonSink {
    fn emit(&self, event: &DiagnosticEvent) {
        let value = serde_json::to_value(event).expect("events always serialize");
        self.events.lock().unwrap().push(value);
    }
}

/// Successful orchestrator body with one layout artifact for `project_id`
pub fn success_body(project_id: &str) -> String {
    json!({
        "success": true,
        "message": format!("Layout optimized for {project_id}"),
        "artifacts": [{
            "type": "wind_farm_layout",
            "data": { "turbines": 25, "capacityMw": 62.5 },
            "metadata": { "projectId": project_id }
        }],
        "thoughtSteps": [{
            "type": "analysis",
            "title": "Layout optimization",
            "summary": "Placed 25 turbines",
            "status": "complete"
        }]
    })
    .to_string()
}

/// SDK-style throttling error payload
pub fn throttling_payload() -> Value {
    json!({
        "name": "ThrottlingException",
        "message": "Rate exceeded",
        "$metadata": { "httpStatusCode": 429, "requestId": "aws-req-1" }
    })
}

/// Build an agent around `target` reporting diagnostics to a fresh `JsonSink`
pub fn create_agent(target: Arc<FakeOrchestrator>) -> (RenewableProxyAgent, JsonSink) {
    let sink = JsonSink::default();
    let agent = RenewableProxyAgent::with_sink(
        ProxyConfig::for_function("renewable-orchestrator"),
        target,
        Arc::new(sink.clone()),
    )
    .expect("default config should be valid");
    (agent, sink)
}
