// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ingest handler: admission, resolution, persistence, then detached
//! fan-out and agent trigger.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parley_agent::{Orchestrator, TriggerOutcome};
use parley_config::model::AgentConfig;
use parley_core::ParleyError;
use parley_core::types::{
    Conversation, Delivery, DeliveryStatus, Message, MessageDirection, timestamp_from_unix,
};
use tracing::{debug, info};

use crate::admission::{Admission, AdmissionGuard, SkipReason};
use crate::event::BrokerEvent;
use crate::executor::BackgroundExecutor;
use crate::fanout::MessageStore;
use crate::pool::EventHandler;
use crate::resolver::Resolver;

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Skipped(SkipReason),
    Stored {
        message_id: String,
        conversation_id: String,
        /// Chat mode whose trigger was queued, if any.
        chat_mode: Option<String>,
    },
}

/// Extra time the executor grants a trigger past its own deadline. The
/// orchestrator enforces the deadline and ends the session; this bound only
/// catches a trigger stuck outside the iteration loop.
const TRIGGER_GRACE: Duration = Duration::from_secs(10);

/// Agent wiring: who runs triggers and which chat mode each tenant gets.
struct AgentRouting {
    orchestrator: Arc<Orchestrator>,
    config: AgentConfig,
    trigger_timeout: Duration,
}

pub struct IngestPipeline {
    guard: AdmissionGuard,
    resolver: Arc<Resolver>,
    store: MessageStore,
    executor: Arc<BackgroundExecutor>,
    agent: Option<AgentRouting>,
    vendor_name: String,
}

impl IngestPipeline {
    pub fn new(
        guard: AdmissionGuard,
        resolver: Arc<Resolver>,
        store: MessageStore,
        executor: Arc<BackgroundExecutor>,
        vendor_name: impl Into<String>,
    ) -> Self {
        Self {
            guard,
            resolver,
            store,
            executor,
            agent: None,
            vendor_name: vendor_name.into(),
        }
    }

    /// Enables agent triggers for stored messages, routed per tenant by `config`.
    pub fn with_agent(mut self, orchestrator: Arc<Orchestrator>, config: AgentConfig) -> Self {
        self.agent = Some(AgentRouting {
            orchestrator,
            trigger_timeout: Duration::from_secs(config.trigger_timeout_secs) + TRIGGER_GRACE,
            config,
        });
        self
    }

    /// Processes one raw broker payload.
    ///
    /// Errors abort this event only: nothing after the failing step runs and
    /// no message is stored.
    pub async fn ingest(&self, payload: &str) -> Result<IngestOutcome, ParleyError> {
        let envelope = BrokerEvent::parse(payload)?;
        let event = match self.guard.admit(&envelope).await? {
            Admission::Proceed(event) => event,
            Admission::Skip(reason) => return Ok(IngestOutcome::Skipped(reason)),
        };

        let conversation = self
            .resolver
            .resolve_conversation(&self.vendor_name, &event.channel_id)
            .await?;
        let sender = self
            .resolver
            .resolve_user(&self.vendor_name, &event.sender_id)
            .await?;
        self.resolver
            .ensure_member(&conversation.id, &sender.id, "participant")
            .await?;

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            sender_id: sender.id.clone(),
            content: event.message.clone(),
            external_message_id: Some(event.external_message_id.clone()),
            vendor_name: Some(self.vendor_name.clone()),
            direction: MessageDirection::Inbound,
            delivery_status: DeliveryStatus::Received,
            metadata: event.metadata_json(),
            created_at: timestamp_from_unix(event.created_at),
        };
        let (message, inserted) = self.store.persist(&message).await?;
        if !inserted {
            debug!(message_id = %message.id, "message already stored");
            return Ok(IngestOutcome::Skipped(SkipReason::Duplicate));
        }
        info!(
            message_id = %message.id,
            conversation_id = %conversation.id,
            sender_id = %sender.id,
            "inbound message stored"
        );

        self.store.schedule_fanout(message.clone());

        let chat_mode = self.schedule_trigger(event.tenant_id.as_deref(), conversation, &message);
        Ok(IngestOutcome::Stored {
            message_id: message.id,
            conversation_id: message.conversation_id,
            chat_mode,
        })
    }

    /// Queues the agent trigger for the tenant's chat mode. Returns the mode.
    fn schedule_trigger(
        &self,
        tenant: Option<&str>,
        conversation: Conversation,
        message: &Message,
    ) -> Option<String> {
        let agent = self.agent.as_ref()?;
        let mode = agent.config.chat_mode_for(tenant)?.to_string();
        let orchestrator = Arc::clone(&agent.orchestrator);
        let message = message.clone();
        let chat_mode = mode.clone();
        self.executor
            .spawn_with_timeout("agent_trigger", agent.trigger_timeout, async move {
                match orchestrator.trigger_mode(&chat_mode, &conversation, &message).await? {
                    TriggerOutcome::Skipped(reason) => {
                        debug!(message_id = %message.id, ?reason, "agent not triggered")
                    }
                    TriggerOutcome::Completed {
                        session_id,
                        iterations,
                        termination,
                    } => debug!(
                        message_id = %message.id,
                        session_id = %session_id,
                        iterations,
                        termination = termination.as_str(),
                        "agent trigger finished"
                    ),
                }
                Ok(())
            });
        Some(mode)
    }
}

#[async_trait]
impl EventHandler for IngestPipeline {
    async fn handle(&self, delivery: &Delivery) -> Result<(), ParleyError> {
        match self.ingest(&delivery.payload).await? {
            IngestOutcome::Skipped(reason) => {
                debug!(offset = delivery.offset, reason = reason.as_str(), "event skipped")
            }
            IngestOutcome::Stored { message_id, .. } => {
                debug!(offset = delivery.offset, message_id = %message_id, "event stored")
            }
        }
        Ok(())
    }
}
