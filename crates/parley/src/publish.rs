// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley publish` command implementation.
//!
//! Appends broker events to the SQLite queue that `parley serve` consumes.
//! Input is one JSON event document or a JSON array of them.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parley_config::model::ParleyConfig;
use parley_core::{ParleyError, StorageAdapter};
use parley_ingest::{BrokerEvent, QueueEventSource};
use parley_storage::SqliteStorage;
use serde_json::Value;

/// Splits input into raw event payloads, checking each parses as an envelope.
pub fn parse_events(input: &str) -> Result<Vec<String>, ParleyError> {
    let document: Value = serde_json::from_str(input)
        .map_err(|e| ParleyError::MalformedEvent(format!("input is not JSON: {e}")))?;
    let events = match document {
        Value::Array(items) => items,
        single => vec![single],
    };
    events
        .into_iter()
        .map(|event| {
            let payload = event.to_string();
            BrokerEvent::parse(&payload)?;
            Ok(payload)
        })
        .collect()
}

/// Runs the `parley publish` command. Reads stdin when `file` is `None`.
/// Returns the assigned offsets.
pub async fn run_publish(config: &ParleyConfig, file: Option<&Path>) -> Result<Vec<i64>, ParleyError> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            ParleyError::Config(format!("failed to read {}: {e}", path.display()))
        })?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| ParleyError::Config(format!("failed to read stdin: {e}")))?;
            buf
        }
    };
    let payloads = parse_events(&input)?;

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);
    let source = QueueEventSource::new(
        Arc::clone(&storage),
        config.ingest.topic.clone(),
        config.ingest.group.clone(),
        Duration::from_secs(config.ingest.redelivery_timeout_secs),
    );

    let mut offsets = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        offsets.push(source.publish(payload).await?);
    }
    storage.close().await?;
    Ok(offsets)
}
