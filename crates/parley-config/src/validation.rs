// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.ingest.topic.trim().is_empty() {
        fail("ingest.topic must not be empty".to_string());
    }
    if config.ingest.vendor.trim().is_empty() {
        fail("ingest.vendor must not be empty".to_string());
    }
    if config.ingest.workers == 0 {
        fail("ingest.workers must be at least 1".to_string());
    }

    let positive = [
        ("ingest.handler_timeout_secs", config.ingest.handler_timeout_secs),
        ("ingest.redelivery_timeout_secs", config.ingest.redelivery_timeout_secs),
        ("ingest.dedup_retention_secs", config.ingest.dedup_retention_secs),
        ("fanout.task_timeout_secs", config.fanout.task_timeout_secs),
        ("fanout.event_ttl_secs", config.fanout.event_ttl_secs),
        ("agent.trigger_timeout_secs", config.agent.trigger_timeout_secs),
        ("storage.sweep_interval_secs", config.storage.sweep_interval_secs),
    ];
    for (key, value) in positive {
        if value == 0 {
            fail(format!("{key} must be greater than 0"));
        }
    }

    if config.fanout.max_background_tasks == 0 {
        fail("fanout.max_background_tasks must be at least 1".to_string());
    }
    if config.agent.history_limit < 1 {
        fail(format!(
            "agent.history_limit must be at least 1, got {}",
            config.agent.history_limit
        ));
    }

    let host = config.gateway.host.trim();
    let is_ip = host.parse::<std::net::IpAddr>().is_ok();
    let is_hostname = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !is_ip && !is_hostname {
        fail(format!(
            "gateway.host `{host}` is not a valid IP address or hostname"
        ));
    }

    let mut seen = HashSet::new();
    for user in &config.identity.internal_users {
        if user.external_id.trim().is_empty() || user.vendor.trim().is_empty() {
            fail("identity.internal_users entries need a vendor and an external_id".to_string());
        } else if !seen.insert((user.vendor.as_str(), user.external_id.as_str())) {
            fail(format!(
                "duplicate internal user `{}` for vendor `{}`",
                user.external_id, user.vendor
            ));
        }
    }

    for (name, vendor) in &config.vendors {
        if vendor.base_url.trim().is_empty() {
            fail(format!("vendors.{name}.base_url must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
