// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model runner client: one generation turn per request.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parley_config::model::ModelConfig;
use parley_core::types::{AdapterType, GenerateRequest, GenerateResponse, HealthStatus};
use parley_core::{ModelRunner, ParleyError, PluginAdapter};
use tracing::debug;

use crate::client::{ClientError, JsonClient};

/// Posts a [`GenerateRequest`] as JSON and decodes a [`GenerateResponse`].
pub struct HttpModelRunner {
    client: JsonClient,
    url: String,
}

impl HttpModelRunner {
    pub fn new(url: impl Into<String>, api_key: Option<&str>, timeout: Duration) -> Result<Self, ParleyError> {
        Ok(Self {
            client: JsonClient::new(api_key, timeout).map_err(model_error)?,
            url: url.into(),
        })
    }

    /// Builds from config. `None` when no model URL is set.
    pub fn from_config(config: &ModelConfig) -> Result<Option<Self>, ParleyError> {
        config
            .url
            .as_deref()
            .map(|url| {
                Self::new(
                    url,
                    config.api_key.as_deref(),
                    Duration::from_secs(config.timeout_secs),
                )
            })
            .transpose()
    }
}

fn model_error(e: ClientError) -> ParleyError {
    ParleyError::Model {
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for HttpModelRunner {
    fn name(&self) -> &str {
        "http-model"
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
impl ModelRunner for HttpModelRunner {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ParleyError> {
        let start = Instant::now();
        let response: GenerateResponse = self
            .client
            .post(&self.url, &request)
            .await
            .map_err(model_error)?;
        debug!(
            model = %request.model,
            turns = request.messages.len(),
            tool_calls = response.tool_calls.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "generation turn completed"
        );
        Ok(response)
    }
}
