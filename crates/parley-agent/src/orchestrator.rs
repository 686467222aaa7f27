// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message agent orchestration.
//!
//! Each trigger walks the states
//! `Validating -> ConditionGate -> PromptBuilt -> SessionActive -> Iterating -> Terminated`.
//! Skips (internal sender, false condition) are values, not errors. Once a
//! session row exists it is always ended, whether the loop completed, failed
//! or ran past the deadline.

use std::sync::Arc;
use std::time::Duration;

use parley_core::types::{
    ChatMode, Conversation, GenerateRequest, HistoryCursor, Message, ModelMessage, Session,
    SessionStatus, ToolCall, User, now_timestamp,
};
use parley_core::{ModelRunner, Outbox, ParleyError, StorageAdapter};
use parley_skill::{BoundTool, SessionContext, ToolOutput, ToolRegistry, ToolSignal};
use tracing::{debug, info, warn};

use crate::template::{PromptRenderer, TemplateContext};

/// States of one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Validating,
    ConditionGate,
    PromptBuilt,
    SessionActive,
    Iterating,
    Terminated,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Validating => write!(f, "validating"),
            AgentState::ConditionGate => write!(f, "condition_gate"),
            AgentState::PromptBuilt => write!(f, "prompt_built"),
            AgentState::SessionActive => write!(f, "session_active"),
            AgentState::Iterating => write!(f, "iterating"),
            AgentState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Why a trigger ended without creating a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSkip {
    /// The sender is an internal identity.
    InternalSender,
    /// The chat mode's condition did not render `true`.
    ConditionFalse,
}

/// Why the iteration loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The model answered without requesting tools.
    NoToolCalls,
    /// A tool returned [`ToolSignal::Stop`].
    EndedByTool,
    /// `max_iterations` generation calls were made.
    IterationBudget,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::NoToolCalls => "no_tool_calls",
            Termination::EndedByTool => "ended_by_tool",
            Termination::IterationBudget => "iteration_budget",
        }
    }
}

/// Result of a successful trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Skipped(TriggerSkip),
    Completed {
        session_id: String,
        iterations: u32,
        termination: Termination,
    },
}

/// The two parties of a conversation as seen by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parties {
    pub merchant_id: String,
    pub buyer_id: String,
}

/// Runs the bounded tool-calling loop for admitted messages.
///
/// Built once at startup and shared by every worker; triggers for different
/// messages run fully in parallel.
pub struct Orchestrator {
    storage: Arc<dyn StorageAdapter>,
    model: Arc<dyn ModelRunner>,
    tools: Arc<ToolRegistry>,
    outbox: Arc<dyn Outbox>,
    renderer: PromptRenderer,
    history_limit: i64,
    deadline: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        model: Arc<dyn ModelRunner>,
        tools: Arc<ToolRegistry>,
        outbox: Arc<dyn Outbox>,
        history_limit: i64,
    ) -> Self {
        Self {
            storage,
            model,
            tools,
            outbox,
            renderer: PromptRenderer::new(),
            history_limit,
            deadline: None,
        }
    }

    /// Bounds the iteration loop of every trigger. A loop still running at the
    /// deadline is abandoned with [`ParleyError::Timeout`] and its session ended.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Loads the named chat mode and triggers it.
    pub async fn trigger_mode(
        &self,
        chat_mode: &str,
        conversation: &Conversation,
        message: &Message,
    ) -> Result<TriggerOutcome, ParleyError> {
        let mode = self
            .storage
            .get_chat_mode(chat_mode)
            .await?
            .ok_or_else(|| ParleyError::InvalidChatMode {
                name: chat_mode.to_string(),
                reason: "no chat mode with this name is loaded".to_string(),
            })?;
        self.trigger(&mode, conversation, message).await
    }

    /// Runs one agent session for `message`.
    pub async fn trigger(
        &self,
        mode: &ChatMode,
        conversation: &Conversation,
        message: &Message,
    ) -> Result<TriggerOutcome, ParleyError> {
        let mut state = AgentState::Validating;
        validate_chat_mode(mode)?;
        if message.content.trim().is_empty() {
            return Err(ParleyError::MalformedEvent(format!(
                "message {} has empty content",
                message.id
            )));
        }
        let sender = self.storage.get_user(&message.sender_id).await?.ok_or_else(|| {
            ParleyError::Resolution(format!("sender {} of message {} not found", message.sender_id, message.id))
        })?;
        if sender.is_internal {
            debug!(message_id = %message.id, "internal sender, agent not triggered");
            return Ok(TriggerOutcome::Skipped(TriggerSkip::InternalSender));
        }

        advance(&mut state, AgentState::ConditionGate, &message.id);
        let template_ctx = TemplateContext::new(conversation, message);
        if !self.renderer.condition_holds(&mode.condition, &template_ctx)? {
            debug!(message_id = %message.id, chat_mode = %mode.name, "condition gate closed");
            return Ok(TriggerOutcome::Skipped(TriggerSkip::ConditionFalse));
        }

        advance(&mut state, AgentState::PromptBuilt, &message.id);
        let system_prompt = self.renderer.render(&mode.prompt_template, &template_ctx)?;
        let parties = self.resolve_parties(&conversation.id, &sender).await?;
        let history = self
            .storage
            .recent_messages(&conversation.id, self.history_limit, Some(&message.id))
            .await?;

        advance(&mut state, AgentState::SessionActive, &message.id);
        let watermark = HistoryCursor::at(history.first().unwrap_or(message));
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            chat_mode: mode.name.clone(),
            status: SessionStatus::Active,
            started_at: now_timestamp(),
            ended_at: None,
            next_poll_at: Some(watermark.created_at),
            next_poll_message_id: watermark.message_id,
        };
        self.storage.create_session(&session).await?;
        info!(
            session_id = %session.id,
            conversation_id = %conversation.id,
            chat_mode = %mode.name,
            "agent session started"
        );

        let ctx = Arc::new(SessionContext {
            session_id: session.id.clone(),
            conversation_id: conversation.id.clone(),
            chat_mode: mode.name.clone(),
            merchant_id: parties.merchant_id,
            buyer_id: parties.buyer_id.clone(),
            storage: Arc::clone(&self.storage),
            outbox: Arc::clone(&self.outbox),
        });

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ModelMessage::system(system_prompt));
        messages.extend(history.iter().map(|m| {
            if m.sender_id == parties.buyer_id {
                ModelMessage::user(m.content.clone())
            } else {
                ModelMessage::model(m.content.clone(), Vec::new())
            }
        }));
        messages.push(ModelMessage::user(message.content.clone()));

        advance(&mut state, AgentState::Iterating, &message.id);
        let result = match self.deadline {
            Some(duration) => tokio::time::timeout(duration, self.iterate(mode, ctx, messages))
                .await
                .unwrap_or(Err(ParleyError::Timeout { duration })),
            None => self.iterate(mode, ctx, messages).await,
        };

        advance(&mut state, AgentState::Terminated, &message.id);
        if let Err(e) = self.storage.end_session(&session.id, &now_timestamp()).await {
            warn!(session_id = %session.id, error = %e, "failed to end session");
            if result.is_ok() {
                return Err(e);
            }
        }

        match result {
            Ok((iterations, termination)) => {
                parley_prometheus::record_agent_session(termination.as_str());
                info!(
                    session_id = %session.id,
                    iterations,
                    termination = termination.as_str(),
                    "agent session ended"
                );
                Ok(TriggerOutcome::Completed {
                    session_id: session.id,
                    iterations,
                    termination,
                })
            }
            Err(e) => {
                parley_prometheus::record_agent_session("error");
                warn!(session_id = %session.id, error = %e, "agent session failed");
                Err(e)
            }
        }
    }

    /// The generation loop. Returns the number of generation calls and why it stopped.
    async fn iterate(
        &self,
        mode: &ChatMode,
        ctx: Arc<SessionContext>,
        mut messages: Vec<ModelMessage>,
    ) -> Result<(u32, Termination), ParleyError> {
        let bound = self.tools.resolve_for_names(&mode.tools, Arc::clone(&ctx))?;
        let definitions: Vec<_> = bound.iter().map(BoundTool::definition).collect();

        let mut iterations = 0;
        while iterations < mode.max_iterations {
            iterations += 1;
            let response = self
                .model
                .generate(GenerateRequest {
                    model: mode.model.clone(),
                    messages: messages.clone(),
                    tools: definitions.clone(),
                    max_prompt_tokens: mode.max_prompt_tokens,
                    max_response_tokens: mode.max_response_tokens,
                })
                .await?;

            let text = response.text.filter(|t| !t.trim().is_empty());
            if text.is_some() || !response.tool_calls.is_empty() {
                messages.push(ModelMessage::model(
                    text.unwrap_or_default(),
                    response.tool_calls.clone(),
                ));
            }
            if response.tool_calls.is_empty() {
                return Ok((iterations, Termination::NoToolCalls));
            }

            let mut stop = false;
            for call in &response.tool_calls {
                let output = execute_call(&bound, call, &ctx).await;
                stop |= output.signal == ToolSignal::Stop;
                messages.push(ModelMessage::tool(
                    call.id.clone(),
                    output.content,
                    output.is_error,
                ));
            }
            if stop {
                return Ok((iterations, Termination::EndedByTool));
            }
        }
        Ok((iterations, Termination::IterationBudget))
    }

    /// Classifies conversation members into the merchant (internal) and buyer
    /// (external) parties. The sender is preferred as buyer.
    pub async fn resolve_parties(
        &self,
        conversation_id: &str,
        sender: &User,
    ) -> Result<Parties, ParleyError> {
        let members = self.storage.list_members(conversation_id).await?;
        let mut merchant_id = None;
        let mut buyer_id = None;
        for member in &members {
            let Some(user) = self.storage.get_user(&member.user_id).await? else {
                warn!(user_id = %member.user_id, conversation_id, "member without user record");
                continue;
            };
            if user.is_internal {
                merchant_id.get_or_insert(user.id);
            } else if user.id == sender.id {
                buyer_id = Some(user.id);
            } else {
                buyer_id.get_or_insert(user.id);
            }
        }

        match (merchant_id, buyer_id) {
            (Some(merchant_id), Some(buyer_id)) => Ok(Parties {
                merchant_id,
                buyer_id,
            }),
            (None, _) => Err(ParleyError::Resolution(format!(
                "conversation {conversation_id} has no merchant member"
            ))),
            (_, None) => Err(ParleyError::Resolution(format!(
                "conversation {conversation_id} has no buyer member"
            ))),
        }
    }
}

async fn execute_call(bound: &[BoundTool], call: &ToolCall, ctx: &SessionContext) -> ToolOutput {
    match bound.iter().find(|t| t.name() == call.name) {
        Some(tool) => tool.execute(call).await,
        None => {
            warn!(
                tool = %call.name,
                session_id = %ctx.session_id,
                "model requested a tool not bound to this session"
            );
            let output =
                ToolOutput::error(format!("tool `{}` is not available in this session", call.name));
            ctx.record_activity(call, &output).await;
            output
        }
    }
}

fn advance(state: &mut AgentState, next: AgentState, message_id: &str) {
    debug!(message_id, from = %state, to = %next, "agent state transition");
    *state = next;
}

/// Rejects chat modes that cannot run.
pub fn validate_chat_mode(mode: &ChatMode) -> Result<(), ParleyError> {
    let invalid = |reason: &str| ParleyError::InvalidChatMode {
        name: mode.name.clone(),
        reason: reason.to_string(),
    };
    if mode.name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if mode.model.trim().is_empty() {
        return Err(invalid("model is empty"));
    }
    if mode.prompt_template.trim().is_empty() {
        return Err(invalid("prompt_template is empty"));
    }
    if mode.max_iterations == 0 {
        return Err(invalid("max_iterations must be positive"));
    }
    Ok(())
}
