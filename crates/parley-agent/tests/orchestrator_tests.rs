// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent loop tests against a temp store and a scripted model.

use std::sync::Arc;
use std::time::Duration;

use parley_agent::{Orchestrator, Termination, TriggerOutcome, TriggerSkip};
use parley_core::types::{
    ChatMode, Conversation, GenerateResponse, Message, ModelRole, SessionStatus, ToolCall,
};
use parley_core::{ParleyError, StorageAdapter};
use parley_skill::ToolRegistry;
use parley_skill::builtin::register_builtins;
use parley_test_utils::{MockModelRunner, TestHarness, chat_mode};
use serde_json::json;

struct Fixture {
    harness: TestHarness,
    conversation: Conversation,
}

async fn fixture(model: MockModelRunner) -> Fixture {
    let harness = TestHarness::builder().with_model(model).build().await.unwrap();
    harness.seed_user("buyer", "b-1", false).await.unwrap();
    harness.seed_user("shop", "s-1", true).await.unwrap();
    let conversation = harness
        .seed_conversation("c1", "ch-1", &[("buyer", "buyer"), ("shop", "seller")])
        .await
        .unwrap();
    Fixture {
        harness,
        conversation,
    }
}

impl Fixture {
    fn orchestrator(&self) -> Orchestrator {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry);
        Orchestrator::new(
            Arc::clone(&self.harness.storage),
            self.harness.model.clone(),
            Arc::new(registry),
            self.harness.outbox.clone(),
            10,
        )
    }

    async fn buyer_says(&self, content: &str) -> Message {
        self.harness
            .seed_message("c1", "buyer", content, "2026-03-01T10:00:00.000Z")
            .await
            .unwrap()
    }

    async fn run(&self, mode: &ChatMode, message: &Message) -> Result<TriggerOutcome, ParleyError> {
        self.orchestrator()
            .trigger(mode, &self.conversation, message)
            .await
    }

    async fn sessions(&self) -> Vec<parley_core::types::Session> {
        self.harness.storage.list_sessions(Some("c1"), None).await.unwrap()
    }
}

fn call(id: &str, name: &str, arguments: serde_json::Value) -> GenerateResponse {
    GenerateResponse::tool_call(id, name, arguments)
}

#[tokio::test]
async fn tool_calls_every_turn_stop_at_iteration_budget() {
    let f = fixture(MockModelRunner::repeating(call("c", "fetch_history", json!({})))).await;
    let message = f.buyer_says("is this still available?").await;
    let mode = chat_mode("sales", &["fetch_history"], 3);

    let outcome = f.run(&mode, &message).await.unwrap();

    let TriggerOutcome::Completed {
        session_id,
        iterations,
        termination,
    } = outcome
    else {
        panic!("expected a completed session, got {outcome:?}");
    };
    assert_eq!(iterations, 3);
    assert_eq!(termination, Termination::IterationBudget);
    assert_eq!(f.harness.model.call_count().await, 3);

    let session = f.harness.storage.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Ended);
    assert!(session.ended_at.is_some());
    let activities = f
        .harness
        .storage
        .list_tool_activities(Some(&session_id))
        .await
        .unwrap();
    assert_eq!(activities.len(), 3);
}

#[tokio::test]
async fn plain_answer_ends_after_one_turn() {
    let f = fixture(MockModelRunner::with_responses(vec![GenerateResponse::text("ok")])).await;
    let message = f.buyer_says("hello").await;
    let mode = chat_mode("sales", &["send_reply"], 5);

    let outcome = f.run(&mode, &message).await.unwrap();
    assert!(matches!(
        outcome,
        TriggerOutcome::Completed {
            iterations: 1,
            termination: Termination::NoToolCalls,
            ..
        }
    ));

    let requests = f.harness.model.requests().await;
    let first = &requests[0];
    assert_eq!(first.model, "test-model");
    assert_eq!(first.messages[0].role, ModelRole::System);
    assert_eq!(first.messages[0].content, "You sell on behalf of Conversation ch-1.");
    let last = first.messages.last().unwrap();
    assert_eq!(last.role, ModelRole::User);
    assert_eq!(last.content, "hello");
    assert_eq!(first.tools.len(), 1);
    assert_eq!(first.tools[0].name, "send_reply");
}

#[tokio::test]
async fn end_session_tool_stops_the_loop() {
    let f = fixture(MockModelRunner::with_responses(vec![
        call("c1", "send_reply", json!({"content": "Yes, it ships tomorrow."})),
        call("c2", "end_session", json!({})),
        GenerateResponse::text("never requested"),
    ]))
    .await;
    let message = f.buyer_says("when does it ship?").await;
    let mode = chat_mode("sales", &["send_reply", "end_session"], 5);

    let outcome = f.run(&mode, &message).await.unwrap();
    assert!(matches!(
        outcome,
        TriggerOutcome::Completed {
            iterations: 2,
            termination: Termination::EndedByTool,
            ..
        }
    ));
    assert_eq!(f.harness.model.call_count().await, 2);

    let sent = f.harness.outbox.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sender_id, "shop");
    assert_eq!(sent[0].content, "Yes, it ships tomorrow.");
}

#[tokio::test]
async fn false_condition_skips_without_a_session() {
    let f = fixture(MockModelRunner::new()).await;
    let message = f.buyer_says("hello").await;
    let mut mode = chat_mode("refunds", &[], 3);
    mode.condition = "{{ 'refund' in message.content }}".to_string();

    let outcome = f.run(&mode, &message).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::Skipped(TriggerSkip::ConditionFalse));
    assert_eq!(f.harness.model.call_count().await, 0);
    assert!(f.sessions().await.is_empty());
}

#[tokio::test]
async fn true_condition_runs_the_session() {
    let f = fixture(MockModelRunner::new()).await;
    let message = f.buyer_says("I want a refund").await;
    let mut mode = chat_mode("refunds", &[], 3);
    mode.condition = "{{ 'refund' in message.content }}".to_string();

    let outcome = f.run(&mode, &message).await.unwrap();
    assert!(matches!(outcome, TriggerOutcome::Completed { .. }));
    assert_eq!(f.sessions().await.len(), 1);
}

#[tokio::test]
async fn internal_sender_is_skipped() {
    let f = fixture(MockModelRunner::new()).await;
    let message = f
        .harness
        .seed_message("c1", "shop", "thanks for your order", "2026-03-01T10:00:00.000Z")
        .await
        .unwrap();

    let outcome = f.run(&chat_mode("sales", &[], 3), &message).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::Skipped(TriggerSkip::InternalSender));
    assert_eq!(f.harness.model.call_count().await, 0);
    assert!(f.sessions().await.is_empty());
}

#[tokio::test]
async fn unregistered_mode_tool_fails_and_ends_the_session() {
    let f = fixture(MockModelRunner::new()).await;
    let message = f.buyer_says("hello").await;
    let mode = chat_mode("sales", &["issue_refund"], 3);

    let err = f.run(&mode, &message).await.unwrap_err();
    assert!(matches!(err, ParleyError::ToolNotFound(ref name) if name == "issue_refund"));
    assert_eq!(f.harness.model.call_count().await, 0);

    let sessions = f.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Ended);
}

#[tokio::test]
async fn unavailable_tool_request_becomes_a_failed_tool_turn() {
    let f = fixture(MockModelRunner::with_responses(vec![
        call("c1", "flag_purchase_intent", json!({"product": "lamp"})),
        GenerateResponse::text("done"),
    ]))
    .await;
    let message = f.buyer_says("hello").await;
    let mode = chat_mode("sales", &["fetch_history"], 3);

    let outcome = f.run(&mode, &message).await.unwrap();
    assert!(matches!(
        outcome,
        TriggerOutcome::Completed {
            iterations: 2,
            termination: Termination::NoToolCalls,
            ..
        }
    ));

    let requests = f.harness.model.requests().await;
    let turns = &requests[1].messages;
    let model_turn = &turns[turns.len() - 2];
    assert_eq!(model_turn.role, ModelRole::Model);
    assert_eq!(
        model_turn.tool_calls,
        vec![ToolCall {
            id: "c1".into(),
            name: "flag_purchase_intent".into(),
            arguments: json!({"product": "lamp"}),
        }]
    );
    let tool_turn = turns.last().unwrap();
    assert_eq!(tool_turn.role, ModelRole::Tool);
    assert_eq!(tool_turn.tool_call_id.as_deref(), Some("c1"));
    assert_eq!(tool_turn.is_error, Some(true));
    assert!(tool_turn.content.contains("not available"));

    let TriggerOutcome::Completed { session_id, .. } = outcome else {
        unreachable!();
    };
    let activities = f
        .harness
        .storage
        .list_tool_activities(Some(&session_id))
        .await
        .unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].action, "flag_purchase_intent");
    assert!(activities[0].is_error);
    assert!(activities[0].data.contains("not available"));
}

#[tokio::test]
async fn history_is_replayed_by_role_and_sets_the_watermark() {
    let f = fixture(MockModelRunner::new()).await;
    let oldest = f
        .harness
        .seed_message("c1", "buyer", "do you have it in blue?", "2026-03-01T09:00:00.000Z")
        .await
        .unwrap();
    f.harness
        .seed_message("c1", "shop", "yes we do", "2026-03-01T09:05:00.000Z")
        .await
        .unwrap();
    let message = f.buyer_says("great, how much?").await;

    let outcome = f.run(&chat_mode("sales", &[], 2), &message).await.unwrap();
    let TriggerOutcome::Completed { session_id, .. } = outcome else {
        panic!("expected a completed session");
    };

    let request = &f.harness.model.requests().await[0];
    let replay: Vec<_> = request.messages[1..]
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        replay,
        vec![
            (ModelRole::User, "do you have it in blue?"),
            (ModelRole::Model, "yes we do"),
            (ModelRole::User, "great, how much?"),
        ]
    );

    let session = f.harness.storage.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.next_poll_at.as_deref(), Some("2026-03-01T09:00:00.000Z"));
    assert_eq!(session.next_poll_message_id.as_deref(), Some(oldest.id.as_str()));
}

#[tokio::test]
async fn conversation_without_merchant_is_a_resolution_error() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.seed_user("buyer", "b-1", false).await.unwrap();
    let conversation = harness
        .seed_conversation("c1", "ch-1", &[("buyer", "buyer")])
        .await
        .unwrap();
    let message = harness
        .seed_message("c1", "buyer", "anyone there?", "2026-03-01T10:00:00.000Z")
        .await
        .unwrap();
    let f = Fixture {
        harness,
        conversation,
    };

    let err = f.run(&chat_mode("sales", &[], 3), &message).await.unwrap_err();
    assert!(matches!(err, ParleyError::Resolution(_)));
    assert!(f.sessions().await.is_empty());
}

#[tokio::test]
async fn model_failure_still_ends_the_session() {
    let model = MockModelRunner::new();
    model.push_error("upstream overloaded").await;
    let f = fixture(model).await;
    let message = f.buyer_says("hello").await;

    let err = f.run(&chat_mode("sales", &[], 3), &message).await.unwrap_err();
    assert!(matches!(err, ParleyError::Model { .. }));

    let sessions = f.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Ended);
}

#[tokio::test]
async fn slow_model_hits_the_deadline_and_the_session_is_ended() {
    let model = MockModelRunner::repeating(GenerateResponse::text("late"))
        .with_delay(Duration::from_secs(30));
    let f = fixture(model).await;
    let message = f.buyer_says("hello").await;
    let orchestrator = f.orchestrator().with_deadline(Duration::from_millis(100));

    let err = orchestrator
        .trigger(&chat_mode("sales", &[], 3), &f.conversation, &message)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ParleyError::Timeout { duration } if duration == Duration::from_millis(100)
    ));
    assert_eq!(f.harness.model.call_count().await, 1);

    let sessions = f.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Ended);
    assert!(sessions[0].ended_at.is_some());
}

#[tokio::test]
async fn invalid_mode_and_empty_message_are_rejected() {
    let f = fixture(MockModelRunner::new()).await;
    let message = f.buyer_says("hello").await;

    let mut mode = chat_mode("sales", &[], 3);
    mode.prompt_template = String::new();
    assert!(matches!(
        f.run(&mode, &message).await,
        Err(ParleyError::InvalidChatMode { .. })
    ));

    let mut blank = message.clone();
    blank.content = "   ".to_string();
    assert!(matches!(
        f.run(&chat_mode("sales", &[], 3), &blank).await,
        Err(ParleyError::MalformedEvent(_))
    ));

    let err = f
        .orchestrator()
        .trigger_mode("missing", &f.conversation, &message)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::InvalidChatMode { ref name, .. } if name == "missing"));
    assert!(f.sessions().await.is_empty());
}

#[tokio::test]
async fn stored_chat_mode_is_loaded_by_name() {
    let f = fixture(MockModelRunner::new()).await;
    f.harness
        .storage
        .upsert_chat_mode(&chat_mode("sales", &["end_session"], 2))
        .await
        .unwrap();
    let message = f.buyer_says("hello").await;

    let outcome = f
        .orchestrator()
        .trigger_mode("sales", &f.conversation, &message)
        .await
        .unwrap();
    assert!(matches!(outcome, TriggerOutcome::Completed { .. }));
    assert_eq!(f.harness.model.requests().await[0].tools[0].name, "end_session");
}
