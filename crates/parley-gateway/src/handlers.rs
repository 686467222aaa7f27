// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the internal ingress.
//!
//! Handles POST /internal/messages, POST /internal/conversations/{id}/read,
//! GET /health and GET /metrics.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parley_core::ParleyError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::server::{GatewayState, HealthState};

/// Request body for POST /internal/messages.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Vendor conversation id.
    pub channel_id: String,
    /// Vendor user id of the sender.
    pub sender_id: String,
    pub content: String,
    /// Persist and fan out without forwarding to the vendor.
    #[serde(default)]
    pub skip_partner: bool,
}

/// Response body for POST /internal/messages.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub id: String,
}

/// Request body for POST /internal/conversations/{id}/read.
#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub user_id: String,
    pub message_id: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
    /// Stable error kind, e.g. `malformed_event`.
    pub kind: String,
}

/// A [`ParleyError`] rendered as a JSON error envelope.
pub struct ApiError(ParleyError);

impl From<ParleyError> for ApiError {
    fn from(err: ParleyError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ParleyError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            ParleyError::Resolution(_) => StatusCode::NOT_FOUND,
            ParleyError::Vendor { .. } => StatusCode::BAD_GATEWAY,
            ParleyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, kind = self.0.kind(), "internal ingress request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                kind: self.0.kind().to_string(),
            }),
        )
            .into_response()
    }
}

fn rejected(rejection: JsonRejection) -> Response {
    (
        rejection.status(),
        Json(ErrorResponse {
            error: rejection.body_text(),
            kind: "invalid_request".to_string(),
        }),
    )
        .into_response()
}

/// POST /internal/messages
///
/// Persists a locally originated message and returns its id. Fan-out and
/// vendor delivery continue in the background.
pub async fn post_messages(
    State(state): State<GatewayState>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    match state
        .ingress
        .send_external(&body.channel_id, &body.sender_id, &body.content, body.skip_partner)
        .await
    {
        Ok(message) => (
            StatusCode::CREATED,
            Json(SendMessageResponse { id: message.id }),
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// POST /internal/conversations/{id}/read
pub async fn post_mark_read(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
    body: Result<Json<MarkReadRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    match state
        .store
        .mark_read(&conversation_id, &body.user_id, &body.message_id)
        .await
    {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => ApiError::from(ParleyError::Resolution(format!(
            "user {} is not a member of conversation {conversation_id}",
            body.user_id
        )))
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// GET /health
pub async fn get_health(State(health): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when metrics are disabled.
pub async fn get_metrics(State(health): State<HealthState>) -> Response {
    match &health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
