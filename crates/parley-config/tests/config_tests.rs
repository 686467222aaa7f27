// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Parley configuration system.

use parley_config::diagnostic::ConfigError;
use parley_config::model::ParleyConfig;
use parley_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML covering every section deserializes.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
name = "parley-test"
log_level = "debug"

[storage]
database_path = "/tmp/parley.db"
wal_mode = false
sweep_interval_secs = 60

[ingest]
topic = "events"
group = "g1"
vendor = "shopchat"
workers = 4
handler_timeout_secs = 5
tenant_allowlist = ["seller-1", "seller-2"]

[fanout]
platform = "mobile"
max_background_tasks = 8
task_timeout_secs = 3

[agent]
chat_modes_path = "modes.yaml"
default_chat_mode = "general"
history_limit = 5

[agent.tenant_chat_modes]
seller-1 = "sales"

[[identity.internal_users]]
vendor = "shopchat"
external_id = "seller-1"
name = "Seller One"

[broadcaster]
url = "http://broadcast.local/events"

[model]
url = "http://model.local/generate"
timeout_secs = 20

[vendors.shopchat]
base_url = "http://vendor.local"

[gateway]
host = "0.0.0.0"
port = 9000

[prometheus]
enabled = false
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.service.log_level, "debug");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.ingest.workers, 4);
    assert_eq!(config.ingest.tenant_allowlist, vec!["seller-1", "seller-2"]);
    assert_eq!(config.fanout.platform, "mobile");
    assert_eq!(config.agent.chat_mode_for(Some("seller-1")), Some("sales"));
    assert_eq!(config.identity.internal_users[0].external_id, "seller-1");
    assert_eq!(
        config.broadcaster.url.as_deref(),
        Some("http://broadcast.local/events")
    );
    assert_eq!(config.model.timeout_secs, 20);
    assert_eq!(config.vendors["shopchat"].base_url, "http://vendor.local");
    assert_eq!(config.gateway.port, 9000);
    assert!(!config.prometheus.enabled);
}

/// Empty TOML yields the documented defaults.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.service.name, "parley");
    assert_eq!(config.storage.database_path, "parley.db");
    assert_eq!(config.ingest.topic, "chat.events");
    assert_eq!(config.ingest.workers, 16);
    assert_eq!(config.ingest.handler_timeout_secs, 30);
    assert!(config.ingest.tenant_allowlist.is_empty());
    assert_eq!(config.fanout.task_timeout_secs, 10);
    assert_eq!(config.agent.history_limit, 10);
    assert_eq!(config.agent.trigger_timeout_secs, 180);
    assert!(config.broadcaster.url.is_none());
    assert!(config.vendors.is_empty());
    assert!(config.gateway.enabled);
}

/// A typo in a known section is reported with a suggestion.
#[test]
fn unknown_key_produces_suggestion() {
    let toml = r#"
[ingest]
wrokers = 4
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { key, suggestion, .. }
                if key == "wrokers" && suggestion.as_deref() == Some("workers")
        )
    });
    assert!(found, "expected an UnknownKey error with a suggestion, got {errors:?}");
}

/// Wrong value types are reported as InvalidType.
#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[ingest]
workers = "many"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject string for usize");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("workers")))
    );
}

/// Semantic validation runs after a successful parse.
#[test]
fn validation_errors_surface_through_loader() {
    let toml = r#"
[ingest]
workers = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("zero workers is invalid");
    assert!(matches!(&errors[0], ConfigError::Validation { message } if message.contains("workers")));
}

/// `PARLEY_*` variables override TOML values section by section.
#[test]
fn env_vars_override_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "parley.toml",
            r#"
[ingest]
workers = 2
topic = "from-file"
"#,
        )?;
        jail.set_env("PARLEY_INGEST_WORKERS", "12");
        jail.set_env("PARLEY_INGEST_HANDLER_TIMEOUT_SECS", "9");
        jail.set_env("PARLEY_MODEL_API_KEY", "secret");

        let config: ParleyConfig =
            parley_config::load_config_from_path(std::path::Path::new("parley.toml"))?;
        assert_eq!(config.ingest.workers, 12);
        assert_eq!(config.ingest.handler_timeout_secs, 9);
        assert_eq!(config.ingest.topic, "from-file");
        assert_eq!(config.model.api_key.as_deref(), Some("secret"));
        Ok(())
    });
}

/// Missing config files are skipped rather than failing.
#[test]
fn missing_config_file_is_skipped() {
    let config = parley_config::load_config_from_path(std::path::Path::new(
        "/nonexistent/parley.toml",
    ))
    .expect("missing file should fall back to defaults");
    assert_eq!(config.ingest.vendor, "marketplace");
}
