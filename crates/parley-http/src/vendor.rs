// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor REST gateway.
//!
//! ```text
//! GET  {base}/conversations/{id}  -> ConversationInfo
//! GET  {base}/users/{id}          -> VendorUser
//! POST {base}/messages            <- VendorMessage
//! ```

use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::VendorConfig;
use parley_core::types::{AdapterType, ConversationInfo, HealthStatus, VendorMessage, VendorUser};
use parley_core::{ParleyError, PluginAdapter, VendorGateway};
use tracing::debug;

use crate::client::{ClientError, JsonClient, endpoint};

pub struct HttpVendorGateway {
    name: String,
    client: JsonClient,
    base_url: String,
}

impl HttpVendorGateway {
    /// Creates a gateway registered under `name`.
    pub fn new(name: impl Into<String>, config: &VendorConfig) -> Result<Self, ParleyError> {
        let name = name.into();
        let client = JsonClient::new(
            config.api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
        .map_err(|e| vendor_error(&name, e))?;
        Ok(Self {
            name,
            client,
            base_url: config.base_url.clone(),
        })
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.client = self.client.with_retry_delay(delay);
        self
    }

    fn url(&self, segments: &[&str]) -> Result<String, ParleyError> {
        endpoint(&self.base_url, segments).map_err(|e| vendor_error(&self.name, e))
    }
}

fn vendor_error(vendor: &str, e: ClientError) -> ParleyError {
    ParleyError::Vendor {
        vendor: vendor.to_string(),
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for HttpVendorGateway {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Vendor
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl VendorGateway for HttpVendorGateway {
    async fn get_conversation_info(
        &self,
        external_id: &str,
    ) -> Result<ConversationInfo, ParleyError> {
        let url = self.url(&["conversations", external_id])?;
        let info: ConversationInfo = self
            .client
            .get(&url)
            .await
            .map_err(|e| vendor_error(&self.name, e))?;
        debug!(
            vendor = %self.name,
            external_id,
            participants = info.participants.len(),
            "conversation info fetched"
        );
        Ok(info)
    }

    async fn get_user_info(&self, external_user_id: &str) -> Result<VendorUser, ParleyError> {
        let url = self.url(&["users", external_user_id])?;
        self.client
            .get(&url)
            .await
            .map_err(|e| vendor_error(&self.name, e))
    }

    async fn send_message(&self, message: VendorMessage) -> Result<(), ParleyError> {
        let url = self.url(&["messages"])?;
        self.client
            .post_unit(&url, &message)
            .await
            .map_err(|e| vendor_error(&self.name, e))
    }
}
