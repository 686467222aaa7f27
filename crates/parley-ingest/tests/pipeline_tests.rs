// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingest pipeline tests: raw broker payloads in, stored messages, fan-out
//! and agent sessions out.

use std::sync::Arc;
use std::time::Duration;

use parley_agent::Orchestrator;
use parley_config::model::AgentConfig;
use parley_core::types::{
    DeliveryStatus, GenerateResponse, MessageDirection, SessionStatus,
};
use parley_core::{Broadcaster, EventSource, StorageAdapter};
use parley_ingest::{
    AdmissionGuard, BackgroundExecutor, IngestOutcome, IngestPipeline, LocalIngress,
    MessageStore, Resolver, SkipReason, TenantAllowList, VendorRegistry, WorkerPool,
};
use parley_skill::ToolRegistry;
use parley_skill::builtin::register_builtins;
use parley_test_utils::{MockModelRunner, MockVendorGateway, TestHarness, chat_mode};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const VENDOR: &str = "marketplace";

struct Stack {
    harness: TestHarness,
    pipeline: Arc<IngestPipeline>,
    resolver: Arc<Resolver>,
    store: MessageStore,
    executor: Arc<BackgroundExecutor>,
}

struct StackOptions {
    allowlist: Vec<String>,
    default_chat_mode: Option<String>,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            allowlist: Vec::new(),
            default_chat_mode: Some("sales".to_string()),
        }
    }
}

async fn vendor() -> MockVendorGateway {
    let vendor = MockVendorGateway::new(VENDOR);
    vendor
        .add_conversation("ch-9", "Order 42", &[("b-1", "buyer"), ("s-1", "seller")])
        .await;
    vendor.add_user("b-1", "Buyer").await;
    vendor.add_user("s-1", "Shop").await;
    vendor
}

async fn stack(model: MockModelRunner, vendor: MockVendorGateway, options: StackOptions) -> Stack {
    let harness = TestHarness::builder()
        .with_model(model)
        .with_vendor(vendor)
        .build()
        .await
        .unwrap();

    let mut vendors = VendorRegistry::new();
    vendors.register(harness.vendor.clone());
    let vendors = Arc::new(vendors);
    let resolver = Arc::new(Resolver::new(Arc::clone(&harness.storage), Arc::clone(&vendors)));
    resolver
        .provision_internal_user(VENDOR, "s-1", "Shop", None)
        .await
        .unwrap();

    let executor = Arc::new(BackgroundExecutor::new(8, Duration::from_secs(5)));
    let store = MessageStore::new(
        Arc::clone(&harness.storage),
        Some(harness.broadcaster.clone() as Arc<dyn Broadcaster>),
        vendors,
        Arc::clone(&executor),
        "web",
        Duration::from_secs(3600),
    );
    let ingress = Arc::new(LocalIngress::new(
        Arc::clone(&harness.storage),
        Arc::clone(&resolver),
        store.clone(),
        VENDOR,
    ));

    let mut tools = ToolRegistry::new();
    register_builtins(&mut tools);
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&harness.storage),
        harness.model.clone(),
        Arc::new(tools),
        ingress,
        10,
    ));
    harness
        .storage
        .upsert_chat_mode(&chat_mode("sales", &["send_reply", "end_session"], 4))
        .await
        .unwrap();

    let guard = AdmissionGuard::new(
        Arc::clone(&harness.storage),
        VENDOR,
        TenantAllowList::new(&options.allowlist),
        Duration::from_secs(86_400),
    );
    let agent = AgentConfig {
        default_chat_mode: options.default_chat_mode,
        trigger_timeout_secs: 5,
        ..AgentConfig::default()
    };
    let pipeline = Arc::new(
        IngestPipeline::new(
            guard,
            Arc::clone(&resolver),
            store.clone(),
            Arc::clone(&executor),
            VENDOR,
        )
        .with_agent(orchestrator, agent),
    );

    Stack {
        harness,
        pipeline,
        resolver,
        store,
        executor,
    }
}

fn event(sender: &str, message_id: &str, content: &str) -> String {
    json!({
        "pattern": "message.sent",
        "data": {
            "channel_id": "ch-9",
            "sender_id": sender,
            "created_at": 1_767_225_600,
            "message": content,
            "metadata": {"seller_id": "s-1"},
            "message_id": message_id,
        }
    })
    .to_string()
}

fn replying_model(reply: &str) -> MockModelRunner {
    MockModelRunner::with_responses(vec![
        GenerateResponse::tool_call("call-1", "send_reply", json!({"content": reply})),
        GenerateResponse::tool_call("call-2", "end_session", json!({"reason": "answered"})),
    ])
}

impl Stack {
    async fn conversation_id(&self) -> String {
        self.harness
            .storage
            .find_conversation(VENDOR, "ch-9")
            .await
            .unwrap()
            .expect("conversation resolved")
            .id
    }

    async fn messages(&self) -> Vec<parley_core::types::Message> {
        let id = self.conversation_id().await;
        self.harness.storage.recent_messages(&id, 50, None).await.unwrap()
    }
}

#[tokio::test]
async fn buyer_message_is_answered_by_the_agent() {
    let s = stack(replying_model("It ships today."), vendor().await, StackOptions::default()).await;

    let outcome = s
        .pipeline
        .ingest(&event("b-1", "m-1", "When does it ship?"))
        .await
        .unwrap();
    let IngestOutcome::Stored { chat_mode, .. } = &outcome else {
        panic!("expected stored, got {outcome:?}");
    };
    assert_eq!(chat_mode.as_deref(), Some("sales"));
    s.executor.settle().await;

    let messages = s.messages().await;
    assert_eq!(messages.len(), 2);
    let inbound = messages
        .iter()
        .find(|m| m.direction == MessageDirection::Inbound)
        .unwrap();
    assert_eq!(inbound.external_message_id.as_deref(), Some("m-1"));
    assert_eq!(inbound.created_at, "2026-01-01T00:00:00.000Z");
    let reply = messages
        .iter()
        .find(|m| m.direction == MessageDirection::Outbound)
        .unwrap();
    assert_eq!(reply.content, "It ships today.");
    assert_eq!(reply.delivery_status, DeliveryStatus::Delivered);

    let sent = s.harness.vendor.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].external_conversation_id, "ch-9");
    assert_eq!(sent[0].external_sender_id, "s-1");

    let sessions = s.harness.storage.list_sessions(None, None).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Ended);
    assert_eq!(s.harness.model.call_count().await, 2);
}

#[tokio::test]
async fn redelivered_event_is_stored_once() {
    let s = stack(MockModelRunner::new(), vendor().await, StackOptions {
        default_chat_mode: None,
        ..StackOptions::default()
    })
    .await;
    let payload = event("b-1", "m-1", "hello");

    let IngestOutcome::Stored {
        message_id,
        conversation_id,
        ..
    } = s.pipeline.ingest(&payload).await.unwrap()
    else {
        panic!("expected the first delivery to be stored");
    };
    assert_eq!(
        s.pipeline.ingest(&payload).await.unwrap(),
        IngestOutcome::Skipped(SkipReason::Duplicate)
    );
    s.executor.settle().await;

    assert_eq!(s.messages().await.len(), 1);
    assert_eq!(s.harness.model.call_count().await, 0);

    let shop = s.resolver.resolve_user(VENDOR, "s-1").await.unwrap();
    let members = s.harness.storage.list_members(&conversation_id).await.unwrap();
    assert_eq!(members.len(), 2);
    let shop_member = members.iter().find(|m| m.user_id == shop.id).unwrap();
    assert_eq!(shop_member.unread_count, 1);

    let now = parley_core::types::now_timestamp();
    for member in &members {
        assert_eq!(
            s.harness.broadcaster.events_for(&member.user_id).await.len(),
            1,
            "one broadcast for {}",
            member.user_id
        );
        let events = s
            .harness
            .storage
            .list_message_events(&member.user_id, "2000-01-01T00:00:00.000Z", &now)
            .await
            .unwrap();
        assert_eq!(events.len(), 1, "one offline event for {}", member.user_id);
        assert_eq!(events[0].message_id, message_id);
    }
}

#[tokio::test]
async fn events_without_message_id_dedup_on_content() {
    let s = stack(MockModelRunner::new(), vendor().await, StackOptions {
        default_chat_mode: None,
        ..StackOptions::default()
    })
    .await;
    let payload = json!({
        "pattern": "message.sent",
        "data": {"channel_id": "ch-9", "sender_id": "b-1", "created_at": "1767225600", "message": "hi"}
    })
    .to_string();

    s.pipeline.ingest(&payload).await.unwrap();
    assert_eq!(
        s.pipeline.ingest(&payload).await.unwrap(),
        IngestOutcome::Skipped(SkipReason::Duplicate)
    );
}

#[tokio::test]
async fn shop_echo_is_not_stored_or_answered() {
    let s = stack(replying_model("unused"), vendor().await, StackOptions::default()).await;

    let outcome = s.pipeline.ingest(&event("s-1", "m-7", "Thanks!")).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Skipped(SkipReason::InternalSender));
    s.executor.settle().await;

    assert!(s.harness.storage.find_conversation(VENDOR, "ch-9").await.unwrap().is_none());
    assert_eq!(s.harness.model.call_count().await, 0);
}

#[tokio::test]
async fn other_patterns_and_tenants_are_skipped() {
    let s = stack(MockModelRunner::new(), vendor().await, StackOptions {
        allowlist: vec!["s-2".to_string()],
        default_chat_mode: None,
    })
    .await;

    let typing = json!({"pattern": "typing.started", "data": {}}).to_string();
    assert_eq!(
        s.pipeline.ingest(&typing).await.unwrap(),
        IngestOutcome::Skipped(SkipReason::PatternMismatch)
    );
    assert_eq!(
        s.pipeline.ingest(&event("b-1", "m-1", "hello")).await.unwrap(),
        IngestOutcome::Skipped(SkipReason::TenantNotAllowed)
    );
}

#[tokio::test]
async fn malformed_payload_is_an_error() {
    let s = stack(MockModelRunner::new(), vendor().await, StackOptions::default()).await;
    assert!(s.pipeline.ingest("{not json").await.is_err());
    let missing_channel = json!({
        "pattern": "message.sent",
        "data": {"sender_id": "b-1", "created_at": 1, "message": "hi"}
    })
    .to_string();
    assert!(s.pipeline.ingest(&missing_channel).await.is_err());
}

#[tokio::test]
async fn unknown_vendor_conversation_stores_nothing() {
    let s = stack(MockModelRunner::new(), vendor().await, StackOptions::default()).await;
    let payload = json!({
        "pattern": "message.sent",
        "data": {"channel_id": "ch-404", "sender_id": "b-1", "created_at": 1, "message": "hi"}
    })
    .to_string();

    assert!(s.pipeline.ingest(&payload).await.is_err());
    assert!(s.harness.storage.find_conversation(VENDOR, "ch-404").await.unwrap().is_none());
}

#[tokio::test]
async fn unread_counts_follow_fanout_and_reset_on_read() {
    let s = stack(MockModelRunner::new(), vendor().await, StackOptions {
        default_chat_mode: None,
        ..StackOptions::default()
    })
    .await;
    let IngestOutcome::Stored {
        message_id,
        conversation_id,
        ..
    } = s.pipeline.ingest(&event("b-1", "m-1", "hello")).await.unwrap()
    else {
        panic!("expected stored");
    };
    s.executor.settle().await;

    let shop = s.resolver.resolve_user(VENDOR, "s-1").await.unwrap();
    let unread = |members: Vec<parley_core::types::ConversationMember>| {
        members
            .into_iter()
            .find(|m| m.user_id == shop.id)
            .map(|m| m.unread_count)
    };
    let members = s.harness.storage.list_members(&conversation_id).await.unwrap();
    assert_eq!(unread(members), Some(1));
    assert_eq!(s.harness.broadcaster.events_for(&shop.id).await.len(), 1);

    assert!(s.store.mark_read(&conversation_id, &shop.id, &message_id).await.unwrap());
    let members = s.harness.storage.list_members(&conversation_id).await.unwrap();
    assert_eq!(unread(members), Some(0));
}

#[tokio::test]
async fn concurrent_first_messages_create_one_conversation() {
    let vendor = vendor().await.with_lookup_delay(Duration::from_millis(30));
    let s = stack(MockModelRunner::new(), vendor, StackOptions {
        default_chat_mode: None,
        ..StackOptions::default()
    })
    .await;

    let mut handles = Vec::new();
    for i in 0..6 {
        let pipeline = Arc::clone(&s.pipeline);
        handles.push(tokio::spawn(async move {
            pipeline
                .ingest(&event("b-1", &format!("m-{i}"), &format!("message {i}")))
                .await
        }));
    }
    let mut conversations = std::collections::HashSet::new();
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            IngestOutcome::Stored {
                conversation_id, ..
            } => {
                conversations.insert(conversation_id);
            }
            other => panic!("expected stored, got {other:?}"),
        }
    }
    s.executor.settle().await;

    assert_eq!(conversations.len(), 1);
    assert_eq!(s.harness.vendor.conversation_lookups(), 1);
    assert_eq!(s.messages().await.len(), 6);
    let members = s
        .harness
        .storage
        .list_members(&s.conversation_id().await)
        .await
        .unwrap();
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn worker_pool_drives_the_pipeline_end_to_end() {
    let s = stack(replying_model("On its way."), vendor().await, StackOptions::default()).await;
    let source = Arc::clone(&s.harness.source);
    source.push(event("b-1", "m-1", "Where is my order?")).await;
    source.push(event("b-1", "m-1", "Where is my order?")).await;
    source.push("garbage").await;

    let pool = WorkerPool::new(
        Arc::clone(&source) as Arc<dyn EventSource>,
        Arc::clone(&s.pipeline) as Arc<dyn parley_ingest::EventHandler>,
        4,
        Duration::from_secs(5),
        Duration::from_millis(5),
    );
    let cancel = CancellationToken::new();
    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { pool.run(cancel).await })
    };

    assert!(source.wait_for_commits(3, Duration::from_secs(5)).await);
    cancel.cancel();
    run.await.unwrap();
    s.executor.settle().await;

    assert_eq!(source.pending_count().await, 0);
    let messages = s.messages().await;
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.direction == MessageDirection::Inbound)
            .count(),
        1
    );
    assert_eq!(s.harness.vendor.sent_messages().await.len(), 1);
}
