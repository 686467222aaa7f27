// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission guard: pattern filter, tenant allow-list, deduplication and
//! loop prevention, applied in that order.
//!
//! The dedup insert is the only write. Its conflict is the single point that
//! serializes duplicate deliveries across workers and replicas.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parley_core::types::{DedupRecord, format_timestamp, vendor_id_attribute};
use parley_core::{ParleyError, StorageAdapter};
use tracing::debug;

use crate::event::{BrokerEvent, ChatEvent};

/// Why an event was not admitted. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PatternMismatch,
    TenantNotAllowed,
    Duplicate,
    InternalSender,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::PatternMismatch => "pattern_mismatch",
            SkipReason::TenantNotAllowed => "tenant_not_allowed",
            SkipReason::Duplicate => "duplicate",
            SkipReason::InternalSender => "internal_sender",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Proceed(ChatEvent),
    Skip(SkipReason),
}

/// Tenant allow-list. Empty or containing `*` allows every tenant.
#[derive(Debug, Clone, Default)]
pub struct TenantAllowList {
    allow_all: bool,
    tenants: HashSet<String>,
}

impl TenantAllowList {
    pub fn new(entries: &[String]) -> Self {
        Self {
            allow_all: entries.is_empty() || entries.iter().any(|e| e == "*"),
            tenants: entries.iter().cloned().collect(),
        }
    }

    pub fn allows(&self, tenant: Option<&str>) -> bool {
        self.allow_all || tenant.is_some_and(|t| self.tenants.contains(t))
    }
}

pub struct AdmissionGuard {
    storage: Arc<dyn StorageAdapter>,
    vendor_name: String,
    allowlist: TenantAllowList,
    retention: Duration,
}

impl AdmissionGuard {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        vendor_name: impl Into<String>,
        allowlist: TenantAllowList,
        retention: Duration,
    ) -> Self {
        Self {
            storage,
            vendor_name: vendor_name.into(),
            allowlist,
            retention,
        }
    }

    /// Decides whether `envelope` proceeds. Errors are malformed data or an
    /// unavailable dedup store; both leave the event to broker redelivery.
    pub async fn admit(&self, envelope: &BrokerEvent) -> Result<Admission, ParleyError> {
        let result = self.evaluate(envelope).await;
        let outcome = match &result {
            Ok(Admission::Proceed(_)) => "proceed",
            Ok(Admission::Skip(reason)) => reason.as_str(),
            Err(_) => "error",
        };
        parley_prometheus::record_admission(outcome);
        result
    }

    async fn evaluate(&self, envelope: &BrokerEvent) -> Result<Admission, ParleyError> {
        if !envelope.is_message_sent() {
            debug!(pattern = %envelope.pattern, "ignoring event pattern");
            return Ok(Admission::Skip(SkipReason::PatternMismatch));
        }
        let event = envelope.chat_event()?;

        if !self.allowlist.allows(event.tenant_id.as_deref()) {
            debug!(tenant = ?event.tenant_id, channel_id = %event.channel_id, "tenant not on allow-list");
            return Ok(Admission::Skip(SkipReason::TenantNotAllowed));
        }

        let now = Utc::now();
        let retention = chrono::Duration::from_std(self.retention)
            .map_err(|e| ParleyError::Internal(format!("dedup retention out of range: {e}")))?;
        let record = DedupRecord {
            external_message_id: event.external_message_id.clone(),
            conversation_key: event.channel_id.clone(),
            vendor_name: self.vendor_name.clone(),
            content_hash: event.content_hash.clone(),
            processed_at: format_timestamp(now),
            expires_at: format_timestamp(now + retention),
        };
        if !self.storage.try_insert_dedup(&record).await? {
            debug!(
                external_message_id = %event.external_message_id,
                channel_id = %event.channel_id,
                "duplicate delivery"
            );
            return Ok(Admission::Skip(SkipReason::Duplicate));
        }

        let sender = self
            .storage
            .find_user_by_attribute(&vendor_id_attribute(&self.vendor_name), &event.sender_id)
            .await?;
        if sender.is_some_and(|u| u.is_internal) {
            debug!(sender_id = %event.sender_id, "message from internal identity");
            return Ok(Admission::Skip(SkipReason::InternalSender));
        }

        Ok(Admission::Proceed(event))
    }
}
