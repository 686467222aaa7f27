// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model runner for deterministic testing.
//!
//! `MockModelRunner` implements `ModelRunner` with pre-configured responses,
//! enabling agent loop tests without a model service.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::types::{AdapterType, GenerateRequest, GenerateResponse, HealthStatus};
use parley_core::{ModelRunner, ParleyError, PluginAdapter};

/// A mock model runner that returns pre-configured responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty the
/// fallback response is returned, which defaults to a plain text answer.
pub struct MockModelRunner {
    responses: Arc<Mutex<VecDeque<Result<GenerateResponse, String>>>>,
    fallback: GenerateResponse,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
    delay: Option<Duration>,
}

impl MockModelRunner {
    /// Create a new mock runner with an empty response queue.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fallback: GenerateResponse::text("mock response"),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Sleep for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Create a mock runner pre-loaded with the given responses.
    pub fn with_responses(responses: Vec<GenerateResponse>) -> Self {
        let runner = Self::new();
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Ok).collect())),
            ..runner
        }
    }

    /// Create a mock runner that answers every call with `response`.
    pub fn repeating(response: GenerateResponse) -> Self {
        Self {
            fallback: response,
            ..Self::new()
        }
    }

    /// Add a response to the end of the queue.
    pub async fn push_response(&self, response: GenerateResponse) {
        self.responses.lock().await.push_back(Ok(response));
    }

    /// Queue a failing call.
    pub async fn push_error(&self, message: impl Into<String>) {
        self.responses.lock().await.push_back(Err(message.into()));
    }

    /// Number of `generate` calls made so far.
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Every request received, in order.
    pub async fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockModelRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockModelRunner {
    fn name(&self) -> &str {
        "mock-model"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Model
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ModelRunner for MockModelRunner {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ParleyError> {
        self.requests.lock().await.push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.responses.lock().await.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ParleyError::Model {
                message,
                source: None,
            }),
            None => Ok(self.fallback.clone()),
        }
    }
}
