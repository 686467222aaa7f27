// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Broker consumer and admission settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Post-persistence fan-out settings.
    #[serde(default)]
    pub fanout: FanoutConfig,

    /// Agent orchestration settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Explicitly provisioned internal identities.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Real-time broadcaster endpoint.
    #[serde(default)]
    pub broadcaster: BroadcasterConfig,

    /// Model runner endpoint.
    #[serde(default)]
    pub model: ModelConfig,

    /// Vendor gateways keyed by vendor name.
    #[serde(default)]
    pub vendors: BTreeMap<String, VendorConfig>,

    /// Internal HTTP ingress.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Prometheus metrics.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Service name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "parley".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Interval between purges of expired dedup records and message events.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_database_path() -> String {
    "parley.db".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    300
}

/// Broker consumer and admission configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Topic to consume.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Consumer group name.
    #[serde(default = "default_group")]
    pub group: String,

    /// Vendor the consumed events originate from.
    #[serde(default = "default_vendor")]
    pub vendor: String,

    /// Maximum number of events handled concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-event processing deadline.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,

    /// Sleep between fetches when the broker is empty.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long a fetched but uncommitted record stays claimed before redelivery.
    #[serde(default = "default_redelivery_timeout")]
    pub redelivery_timeout_secs: u64,

    /// Tenants whose events are admitted. Empty admits all; `"*"` admits all.
    #[serde(default)]
    pub tenant_allowlist: Vec<String>,

    /// How long a dedup record blocks reprocessing.
    #[serde(default = "default_dedup_retention")]
    pub dedup_retention_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            group: default_group(),
            vendor: default_vendor(),
            workers: default_workers(),
            handler_timeout_secs: default_handler_timeout(),
            poll_interval_ms: default_poll_interval(),
            redelivery_timeout_secs: default_redelivery_timeout(),
            tenant_allowlist: Vec::new(),
            dedup_retention_secs: default_dedup_retention(),
        }
    }
}

fn default_topic() -> String {
    "chat.events".to_string()
}

fn default_group() -> String {
    "parley-ingest".to_string()
}

fn default_vendor() -> String {
    "marketplace".to_string()
}

fn default_workers() -> usize {
    16
}

fn default_handler_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    250
}

fn default_redelivery_timeout() -> u64 {
    300
}

fn default_dedup_retention() -> u64 {
    7 * 24 * 60 * 60
}

/// Fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FanoutConfig {
    /// Platform tag attached to broadcast events.
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Maximum number of background tasks running at once.
    #[serde(default = "default_max_background_tasks")]
    pub max_background_tasks: usize,

    /// Deadline for each background task (fan-out, vendor send).
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// Lifetime of offline-sync message events.
    #[serde(default = "default_event_ttl")]
    pub event_ttl_secs: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            max_background_tasks: default_max_background_tasks(),
            task_timeout_secs: default_task_timeout(),
            event_ttl_secs: default_event_ttl(),
        }
    }
}

fn default_platform() -> String {
    "web".to_string()
}

fn default_max_background_tasks() -> usize {
    256
}

fn default_task_timeout() -> u64 {
    10
}

fn default_event_ttl() -> u64 {
    24 * 60 * 60
}

/// Agent orchestration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// YAML file listing chat modes, upserted at startup.
    #[serde(default)]
    pub chat_modes_path: Option<String>,

    /// Chat mode used for tenants without an explicit mapping.
    #[serde(default)]
    pub default_chat_mode: Option<String>,

    /// Tenant key to chat mode name.
    #[serde(default)]
    pub tenant_chat_modes: BTreeMap<String, String>,

    /// Number of recent messages placed in the initial model context.
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,

    /// Deadline for one agent trigger, including every iteration. Should exceed
    /// `model.timeout_secs` so a single slow generation does not consume it.
    #[serde(default = "default_trigger_timeout")]
    pub trigger_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            chat_modes_path: None,
            default_chat_mode: None,
            tenant_chat_modes: BTreeMap::new(),
            history_limit: default_history_limit(),
            trigger_timeout_secs: default_trigger_timeout(),
        }
    }
}

impl AgentConfig {
    /// Chat mode for a tenant: explicit mapping first, then the default.
    pub fn chat_mode_for(&self, tenant: Option<&str>) -> Option<&str> {
        tenant
            .and_then(|t| self.tenant_chat_modes.get(t))
            .or(self.default_chat_mode.as_ref())
            .map(String::as_str)
    }
}

fn default_history_limit() -> i64 {
    10
}

fn default_trigger_timeout() -> u64 {
    180
}

/// Internal identity provisioning.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Operator and bot accounts, flagged `is_internal` on provisioning.
    #[serde(default)]
    pub internal_users: Vec<InternalUserConfig>,
}

/// One internal account as known to a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InternalUserConfig {
    pub vendor: String,
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Broadcaster endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcasterConfig {
    /// Endpoint accepting event batches. `None` disables real-time broadcast.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_client_timeout(),
        }
    }
}

fn default_client_timeout() -> u64 {
    10
}

/// Model runner endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Endpoint executing generation turns. `None` disables the agent.
    #[serde(default)]
    pub url: Option<String>,

    /// Bearer token for the model runner.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: default_model_timeout(),
        }
    }
}

fn default_model_timeout() -> u64 {
    60
}

/// One vendor gateway endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VendorConfig {
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

/// Internal HTTP ingress configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
