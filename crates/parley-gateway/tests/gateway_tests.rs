// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process route tests for the internal ingress.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use parley_core::types::{DeliveryStatus, MessageDirection};
use parley_core::{Broadcaster, StorageAdapter};
use parley_gateway::{GatewayState, HealthState, router};
use parley_ingest::{BackgroundExecutor, LocalIngress, MessageStore, Resolver, VendorRegistry};
use parley_test_utils::{MockVendorGateway, TestHarness};
use serde_json::{Value, json};
use tower::ServiceExt;

struct App {
    harness: TestHarness,
    executor: Arc<BackgroundExecutor>,
    router: Router,
}

async fn app(metrics: bool) -> App {
    let vendor = MockVendorGateway::new("marketplace");
    vendor
        .add_conversation("ch-1", "Order 7", &[("b-1", "buyer"), ("s-1", "seller")])
        .await;
    vendor.add_user("b-1", "Buyer").await;
    vendor.add_user("s-1", "Shop").await;
    let harness = TestHarness::builder().with_vendor(vendor).build().await.unwrap();

    let mut vendors = VendorRegistry::new();
    vendors.register(harness.vendor.clone());
    let vendors = Arc::new(vendors);
    let resolver = Arc::new(Resolver::new(Arc::clone(&harness.storage), Arc::clone(&vendors)));
    let executor = Arc::new(BackgroundExecutor::new(4, Duration::from_secs(5)));
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
        resolver,
        store.clone(),
        "marketplace",
    ));
    let render: Option<Arc<dyn Fn() -> String + Send + Sync>> = if metrics {
        Some(Arc::new(|| "parley_up 1\n".to_string()))
    } else {
        None
    };
    let router = router(GatewayState {
        ingress,
        store,
        health: HealthState::new(render),
    });
    App {
        harness,
        executor,
        router,
    }
}

async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn post_message_returns_created_id_and_delivers() {
    let app = app(false).await;
    let (status, body) = call(
        &app.router,
        post(
            "/internal/messages",
            json!({"channel_id": "ch-1", "sender_id": "s-1", "content": "Your order shipped."}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();
    app.executor.settle().await;

    let message = app.harness.storage.get_message(&id).await.unwrap().unwrap();
    assert_eq!(message.direction, MessageDirection::Outbound);
    assert_eq!(message.delivery_status, DeliveryStatus::Delivered);
    let sent = app.harness.vendor.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "Your order shipped.");
}

#[tokio::test]
async fn skip_partner_keeps_message_local() {
    let app = app(false).await;
    let (status, _) = call(
        &app.router,
        post(
            "/internal/messages",
            json!({"channel_id": "ch-1", "sender_id": "s-1", "content": "note", "skip_partner": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    app.executor.settle().await;
    assert!(app.harness.vendor.sent_messages().await.is_empty());
    assert!(!app.harness.broadcaster.events().await.is_empty());
}

#[tokio::test]
async fn empty_content_is_bad_request() {
    let app = app(false).await;
    let (status, body) = call(
        &app.router,
        post(
            "/internal/messages",
            json!({"channel_id": "ch-1", "sender_id": "s-1", "content": "  "}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "malformed_event");
}

#[tokio::test]
async fn missing_fields_use_the_error_envelope() {
    let app = app(false).await;
    let (status, body) = call(
        &app.router,
        post("/internal/messages", json!({"channel_id": "ch-1"})),
    )
    .await;
    assert!(status.is_client_error());
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn unknown_vendor_conversation_is_bad_gateway() {
    let app = app(false).await;
    let (status, body) = call(
        &app.router,
        post(
            "/internal/messages",
            json!({"channel_id": "ch-404", "sender_id": "s-1", "content": "hi"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "vendor");
}

#[tokio::test]
async fn mark_read_resets_unread() {
    let app = app(false).await;
    let (_, body) = call(
        &app.router,
        post(
            "/internal/messages",
            json!({"channel_id": "ch-1", "sender_id": "b-1", "content": "hello", "skip_partner": true}),
        ),
    )
    .await;
    let message_id = body["id"].as_str().unwrap().to_string();
    app.executor.settle().await;

    let conversation = app
        .harness
        .storage
        .find_conversation("marketplace", "ch-1")
        .await
        .unwrap()
        .unwrap();
    let shop = app
        .harness
        .storage
        .find_user_by_attribute("vendor:marketplace:id", "s-1")
        .await
        .unwrap()
        .unwrap();
    let unread = |members: Vec<parley_core::types::ConversationMember>| {
        members.into_iter().find(|m| m.user_id == shop.id).unwrap().unread_count
    };
    assert_eq!(unread(app.harness.storage.list_members(&conversation.id).await.unwrap()), 1);

    let (status, _) = call(
        &app.router,
        post(
            &format!("/internal/conversations/{}/read", conversation.id),
            json!({"user_id": shop.id, "message_id": message_id}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(unread(app.harness.storage.list_members(&conversation.id).await.unwrap()), 0);

    let (status, body) = call(
        &app.router,
        post(
            &format!("/internal/conversations/{}/read", conversation.id),
            json!({"user_id": shop.id, "message_id": "missing"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "resolution");
}

#[tokio::test]
async fn health_reports_version() {
    let app = app(false).await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = call(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn metrics_endpoint_follows_config() {
    let enabled = app(true).await;
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, body) = call(&enabled.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("parley_up 1\n".into()));

    let disabled = app(false).await;
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, _) = call(&disabled.router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
