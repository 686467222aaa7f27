// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time broadcast service client.

use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::BroadcasterConfig;
use parley_core::types::{AdapterType, BroadcastEvent, BroadcastResult, HealthStatus};
use parley_core::{Broadcaster, ParleyError, PluginAdapter};
use serde::Serialize;
use tracing::debug;

use crate::client::{ClientError, JsonClient};

#[derive(Serialize)]
struct BroadcastBody<'a> {
    events: &'a [BroadcastEvent],
}

/// Posts event batches as `{"events": [...]}` and reads `{success, error}`.
pub struct HttpBroadcaster {
    client: JsonClient,
    url: String,
}

impl HttpBroadcaster {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ParleyError> {
        Ok(Self {
            client: JsonClient::new(None, timeout).map_err(broadcast_error)?,
            url: url.into(),
        })
    }

    /// Builds from config. `None` when no broadcaster URL is set.
    pub fn from_config(config: &BroadcasterConfig) -> Result<Option<Self>, ParleyError> {
        config
            .url
            .as_deref()
            .map(|url| Self::new(url, Duration::from_secs(config.timeout_secs)))
            .transpose()
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.client = self.client.with_retry_delay(delay);
        self
    }
}

fn broadcast_error(e: ClientError) -> ParleyError {
    ParleyError::Broadcast {
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for HttpBroadcaster {
    fn name(&self) -> &str {
        "http-broadcaster"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Broadcaster
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl Broadcaster for HttpBroadcaster {
    async fn send_events(
        &self,
        events: Vec<BroadcastEvent>,
    ) -> Result<BroadcastResult, ParleyError> {
        if events.is_empty() {
            return Ok(BroadcastResult {
                success: true,
                error: None,
            });
        }
        let count = events.len();
        let result: BroadcastResult = self
            .client
            .post(&self.url, &BroadcastBody { events: &events })
            .await
            .map_err(broadcast_error)?;
        debug!(count, success = result.success, "broadcast batch sent");
        Ok(result)
    }
}
