// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock vendor gateway with seeded conversations and users.
//!
//! Lookups for unknown ids fail with a vendor error, so tests can exercise
//! the resolver's partial-failure paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::types::{
    AdapterType, ConversationInfo, HealthStatus, Participant, VendorMessage, VendorUser,
};
use parley_core::{ParleyError, PluginAdapter, VendorGateway};

/// A vendor gateway backed by in-memory maps.
pub struct MockVendorGateway {
    name: String,
    conversations: Arc<Mutex<HashMap<String, ConversationInfo>>>,
    users: Arc<Mutex<HashMap<String, VendorUser>>>,
    sent: Arc<Mutex<Vec<VendorMessage>>>,
    fail_sends: AtomicBool,
    lookup_delay: Option<Duration>,
    conversation_lookups: AtomicUsize,
    user_lookups: AtomicUsize,
}

impl MockVendorGateway {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conversations: Arc::new(Mutex::new(HashMap::new())),
            users: Arc::new(Mutex::new(HashMap::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_sends: AtomicBool::new(false),
            lookup_delay: None,
            conversation_lookups: AtomicUsize::new(0),
            user_lookups: AtomicUsize::new(0),
        }
    }

    /// Delay every lookup, widening race windows in concurrency tests.
    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    /// Seed a conversation whose participants are `(external_user_id, role)` pairs.
    pub async fn add_conversation(&self, external_id: &str, name: &str, participants: &[(&str, &str)]) {
        let info = ConversationInfo {
            name: name.to_string(),
            context: None,
            metadata: serde_json::json!({}),
            participants: participants
                .iter()
                .map(|(id, role)| Participant {
                    external_user_id: id.to_string(),
                    role: role.to_string(),
                })
                .collect(),
        };
        self.conversations
            .lock()
            .await
            .insert(external_id.to_string(), info);
    }

    /// Seed a user profile.
    pub async fn add_user(&self, external_id: &str, name: &str) {
        self.users.lock().await.insert(
            external_id.to_string(),
            VendorUser {
                name: name.to_string(),
                email: None,
                is_active: true,
            },
        );
    }

    /// Make subsequent `send_message` calls fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Messages delivered through `send_message`.
    pub async fn sent_messages(&self) -> Vec<VendorMessage> {
        self.sent.lock().await.clone()
    }

    /// Number of conversation lookups served.
    pub fn conversation_lookups(&self) -> usize {
        self.conversation_lookups.load(Ordering::SeqCst)
    }

    /// Number of user lookups served.
    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PluginAdapter for MockVendorGateway {
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
impl VendorGateway for MockVendorGateway {
    async fn get_conversation_info(
        &self,
        external_id: &str,
    ) -> Result<ConversationInfo, ParleyError> {
        self.conversation_lookups.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.conversations
            .lock()
            .await
            .get(external_id)
            .cloned()
            .ok_or_else(|| {
                ParleyError::vendor(&self.name, format!("conversation {external_id} not found"))
            })
    }

    async fn get_user_info(&self, external_user_id: &str) -> Result<VendorUser, ParleyError> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.users
            .lock()
            .await
            .get(external_user_id)
            .cloned()
            .ok_or_else(|| {
                ParleyError::vendor(&self.name, format!("user {external_user_id} not found"))
            })
    }

    async fn send_message(&self, message: VendorMessage) -> Result<(), ParleyError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ParleyError::vendor(&self.name, "send rejected"));
        }
        self.sent.lock().await.push(message);
        Ok(())
    }
}
