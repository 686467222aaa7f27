// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Opens SQLite storage, builds the HTTP collaborators from configuration,
//! assembles the [`App`] and consumes the broker topic until a shutdown
//! signal arrives.

use std::sync::Arc;
use std::time::Duration;

use parley_config::model::ParleyConfig;
use parley_core::{Broadcaster, EventSource, ModelRunner, ParleyError, StorageAdapter, VendorGateway};
use parley_http::{HttpBroadcaster, HttpModelRunner, HttpVendorGateway};
use parley_ingest::QueueEventSource;
use parley_storage::SqliteStorage;
use tracing::{debug, info, warn};

use crate::app::{App, Collaborators, MetricsRender};
use crate::shutdown;

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting parley serve");

    let prometheus = if config.prometheus.enabled {
        match parley_prometheus::PrometheusAdapter::new() {
            Ok(adapter) => {
                info!("prometheus metrics enabled");
                Some(adapter)
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };
    let metrics: Option<MetricsRender> = prometheus.as_ref().map(|adapter| {
        let handle = adapter.handle().clone();
        Arc::new(move || handle.render()) as MetricsRender
    });

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    let collaborators = build_collaborators(&config, Arc::clone(&storage))?;
    let source: Arc<dyn EventSource> = Arc::new(QueueEventSource::new(
        Arc::clone(&storage),
        config.ingest.topic.clone(),
        config.ingest.group.clone(),
        Duration::from_secs(config.ingest.redelivery_timeout_secs),
    ));

    let app = App::build(config, collaborators).await?;

    let gateway = if app.config().gateway.enabled {
        let listener = parley_gateway::bind(&app.config().gateway).await?;
        Some((listener, metrics))
    } else {
        debug!("gateway disabled by configuration");
        None
    };

    let cancel = shutdown::install_signal_handler();
    app.run(source, gateway, cancel).await?;

    storage.close().await?;
    info!("parley serve shutdown complete");
    Ok(())
}

/// HTTP adapters for every configured collaborator.
fn build_collaborators(
    config: &ParleyConfig,
    storage: Arc<dyn StorageAdapter>,
) -> Result<Collaborators, ParleyError> {
    let mut vendors: Vec<Arc<dyn VendorGateway>> = Vec::new();
    for (name, vendor) in &config.vendors {
        vendors.push(Arc::new(HttpVendorGateway::new(name.clone(), vendor)?));
    }
    let broadcaster = HttpBroadcaster::from_config(&config.broadcaster)?
        .map(|b| Arc::new(b) as Arc<dyn Broadcaster>);
    let model = HttpModelRunner::from_config(&config.model)?
        .map(|m| Arc::new(m) as Arc<dyn ModelRunner>);

    Ok(Collaborators {
        storage,
        vendors,
        broadcaster,
        model,
    })
}

/// Initializes the tracing subscriber. `RUST_LOG` wins over `service.log_level`.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
