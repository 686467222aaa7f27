// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service assembly.
//!
//! [`App::build`] wires storage, resolver, message store, agent and ingest
//! pipeline from a [`ParleyConfig`] and a set of collaborator adapters. The
//! `serve` command supplies HTTP adapters; tests supply mocks.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parley_agent::{Orchestrator, validate_chat_mode};
use parley_config::model::{InternalUserConfig, ParleyConfig};
use parley_core::types::{SessionStatus, now_timestamp};
use parley_core::{
    Broadcaster, EventSource, ModelRunner, ParleyError, StorageAdapter, VendorGateway,
};
use parley_gateway::{GatewayState, HealthState};
use parley_ingest::{
    AdmissionGuard, BackgroundExecutor, IngestPipeline, LocalIngress, MessageStore, Resolver,
    TenantAllowList, VendorRegistry, WorkerPool, run_sweeper,
};
use parley_skill::ToolRegistry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Renders the Prometheus exposition for `/metrics`.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// External adapters the service talks to.
pub struct Collaborators {
    pub storage: Arc<dyn StorageAdapter>,
    pub vendors: Vec<Arc<dyn VendorGateway>>,
    pub broadcaster: Option<Arc<dyn Broadcaster>>,
    /// `None` disables agent triggers.
    pub model: Option<Arc<dyn ModelRunner>>,
}

/// The assembled service.
pub struct App {
    config: ParleyConfig,
    storage: Arc<dyn StorageAdapter>,
    executor: Arc<BackgroundExecutor>,
    store: MessageStore,
    ingress: Arc<LocalIngress>,
    pipeline: Arc<IngestPipeline>,
}

impl App {
    /// Wires every component and performs the startup steps: crash recovery
    /// of stale sessions, internal user provisioning and chat mode loading.
    pub async fn build(config: ParleyConfig, collaborators: Collaborators) -> Result<Self, ParleyError> {
        let storage = collaborators.storage;
        mark_stale_sessions(storage.as_ref()).await?;

        let mut vendors = VendorRegistry::new();
        for vendor in collaborators.vendors {
            vendors.register(vendor);
        }
        let vendor_name = config.ingest.vendor.clone();
        if vendors.get(&vendor_name).is_err() {
            return Err(ParleyError::Config(format!(
                "no gateway configured for ingest vendor `{vendor_name}`; add a [vendors.{vendor_name}] section"
            )));
        }
        let vendors = Arc::new(vendors);
        info!(vendors = ?vendors.names(), "vendor gateways registered");

        let resolver = Arc::new(Resolver::new(Arc::clone(&storage), Arc::clone(&vendors)));
        provision_internal_users(&resolver, &config.identity.internal_users).await?;

        let executor = Arc::new(BackgroundExecutor::new(
            config.fanout.max_background_tasks,
            Duration::from_secs(config.fanout.task_timeout_secs),
        ));
        if collaborators.broadcaster.is_none() {
            info!("no broadcaster configured, real-time fan-out disabled");
        }
        let store = MessageStore::new(
            Arc::clone(&storage),
            collaborators.broadcaster,
            vendors,
            Arc::clone(&executor),
            config.fanout.platform.clone(),
            Duration::from_secs(config.fanout.event_ttl_secs),
        );
        let ingress = Arc::new(LocalIngress::new(
            Arc::clone(&storage),
            Arc::clone(&resolver),
            store.clone(),
            vendor_name.clone(),
        ));

        let guard = AdmissionGuard::new(
            Arc::clone(&storage),
            vendor_name.clone(),
            TenantAllowList::new(&config.ingest.tenant_allowlist),
            Duration::from_secs(config.ingest.dedup_retention_secs),
        );
        let mut pipeline = IngestPipeline::new(
            guard,
            resolver,
            store.clone(),
            Arc::clone(&executor),
            vendor_name,
        );

        match collaborators.model {
            Some(model) => {
                let mut tools = ToolRegistry::new();
                parley_skill::builtin::register_builtins(&mut tools);
                info!("tool registry initialized with {} built-in tools", tools.len());

                load_chat_modes(&config, storage.as_ref(), &tools).await?;
                let orchestrator = Arc::new(
                    Orchestrator::new(
                        Arc::clone(&storage),
                        model,
                        Arc::new(tools),
                        ingress.clone(),
                        config.agent.history_limit,
                    )
                    .with_deadline(Duration::from_secs(config.agent.trigger_timeout_secs)),
                );
                pipeline = pipeline.with_agent(orchestrator, config.agent.clone());
                info!(
                    default_chat_mode = ?config.agent.default_chat_mode,
                    tenant_routes = config.agent.tenant_chat_modes.len(),
                    "agent triggers enabled"
                );
            }
            None => info!("no model runner configured, agent triggers disabled"),
        }

        Ok(Self {
            config,
            storage,
            executor,
            store,
            ingress,
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub fn executor(&self) -> &Arc<BackgroundExecutor> {
        &self.executor
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.pipeline
    }

    pub fn ingress(&self) -> &Arc<LocalIngress> {
        &self.ingress
    }

    /// Worker pool consuming `source` with the configured width and deadlines.
    pub fn worker_pool(&self, source: Arc<dyn EventSource>) -> WorkerPool {
        let ingest = &self.config.ingest;
        WorkerPool::new(
            source,
            self.pipeline.clone(),
            ingest.workers,
            Duration::from_secs(ingest.handler_timeout_secs),
            Duration::from_millis(ingest.poll_interval_ms),
        )
    }

    pub fn gateway_state(&self, metrics: Option<MetricsRender>) -> GatewayState {
        GatewayState {
            ingress: Arc::clone(&self.ingress),
            store: self.store.clone(),
            health: HealthState::new(metrics),
        }
    }

    /// Runs the consumer, the TTL sweeper and, given a listener, the gateway
    /// until `cancel` fires. Then drains background work.
    pub async fn run(
        &self,
        source: Arc<dyn EventSource>,
        gateway: Option<(TcpListener, Option<MetricsRender>)>,
        cancel: CancellationToken,
    ) -> Result<(), ParleyError> {
        let sweeper = tokio::spawn(run_sweeper(
            Arc::clone(&self.storage),
            Duration::from_secs(self.config.storage.sweep_interval_secs),
            cancel.clone(),
        ));

        let gateway = gateway.map(|(listener, metrics)| {
            let state = self.gateway_state(metrics);
            tokio::spawn(parley_gateway::serve(listener, state, cancel.clone()))
        });

        info!(
            topic = source.topic(),
            group = source.group(),
            workers = self.config.ingest.workers,
            "consumer started"
        );
        self.worker_pool(source).run(cancel.clone()).await;

        if let Some(handle) = gateway {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "gateway exited with error"),
                Err(e) => warn!(error = %e, "gateway task failed"),
            }
        }
        if let Err(e) = sweeper.await {
            warn!(error = %e, "sweeper task failed");
        }

        self.executor
            .shutdown(Duration::from_secs(self.config.fanout.task_timeout_secs))
            .await;
        info!("background tasks drained");
        Ok(())
    }
}

/// Ends sessions left `active` by a previous process.
async fn mark_stale_sessions(storage: &dyn StorageAdapter) -> Result<(), ParleyError> {
    let active_sessions = storage.list_sessions(None, Some(SessionStatus::Active)).await?;
    if !active_sessions.is_empty() {
        info!(count = active_sessions.len(), "ending stale sessions");
        let now = now_timestamp();
        for session in &active_sessions {
            storage.end_session(&session.id, &now).await?;
        }
    }
    Ok(())
}

async fn provision_internal_users(
    resolver: &Resolver,
    users: &[InternalUserConfig],
) -> Result<(), ParleyError> {
    for user in users {
        let provisioned = resolver
            .provision_internal_user(&user.vendor, &user.external_id, &user.name, user.email.as_deref())
            .await?;
        debug!(user_id = %provisioned.id, external_id = %user.external_id, "internal user ready");
    }
    if !users.is_empty() {
        info!(count = users.len(), "internal users provisioned");
    }
    Ok(())
}

/// Validates and upserts the chat modes file, if one is configured.
async fn load_chat_modes(
    config: &ParleyConfig,
    storage: &dyn StorageAdapter,
    tools: &ToolRegistry,
) -> Result<(), ParleyError> {
    if let Some(path) = &config.agent.chat_modes_path {
        let modes = parley_config::load_chat_modes(Path::new(path))
            .map_err(|e| ParleyError::Config(e.to_string()))?;
        for mode in &modes {
            validate_chat_mode(mode)?;
            if let Some(unknown) = mode.tools.iter().find(|t| !tools.has_tool(t)) {
                return Err(ParleyError::InvalidChatMode {
                    name: mode.name.clone(),
                    reason: format!("unknown tool `{unknown}`"),
                });
            }
            storage.upsert_chat_mode(mode).await?;
        }
        info!(path = %path, count = modes.len(), "chat modes loaded");
    }

    let referenced = config
        .agent
        .default_chat_mode
        .iter()
        .chain(config.agent.tenant_chat_modes.values());
    for name in referenced {
        if storage.get_chat_mode(name).await?.is_none() {
            warn!(chat_mode = %name, "routed chat mode is not loaded; its triggers will fail");
        }
    }
    Ok(())
}
