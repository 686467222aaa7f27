// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock broadcaster capturing every event batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::types::{AdapterType, BroadcastEvent, BroadcastResult, HealthStatus};
use parley_core::{Broadcaster, ParleyError, PluginAdapter};

/// Captures broadcast events for assertions.
pub struct MockBroadcaster {
    events: Arc<Mutex<Vec<BroadcastEvent>>>,
    failing: AtomicBool,
}

impl MockBroadcaster {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            failing: AtomicBool::new(false),
        }
    }

    /// Make subsequent sends fail with a broadcast error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All events sent so far.
    pub async fn events(&self) -> Vec<BroadcastEvent> {
        self.events.lock().await.clone()
    }

    /// Events addressed to `user_id`.
    pub async fn events_for(&self, user_id: &str) -> Vec<BroadcastEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl Default for MockBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockBroadcaster {
    fn name(&self) -> &str {
        "mock-broadcaster"
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
impl Broadcaster for MockBroadcaster {
    async fn send_events(
        &self,
        events: Vec<BroadcastEvent>,
    ) -> Result<BroadcastResult, ParleyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ParleyError::Broadcast {
                message: "mock broadcaster unavailable".to_string(),
                source: None,
            });
        }
        self.events.lock().await.extend(events);
        Ok(BroadcastResult {
            success: true,
            error: None,
        })
    }
}
