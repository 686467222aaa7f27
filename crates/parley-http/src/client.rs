// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared JSON-over-HTTP client.
//!
//! Provides [`JsonClient`] which handles bearer authentication, request
//! timeouts, and a single retry on transient status codes. Adapters map its
//! [`ClientError`] into their own [`ParleyError`](parley_core::ParleyError)
//! variant.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Failure of one logical request, after retries.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("{status} returned: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ClientError {
    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Connection-pooled JSON client with bearer auth and one transient retry.
#[derive(Debug, Clone)]
pub struct JsonClient {
    client: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl JsonClient {
    /// Builds a client. `api_key`, when present, is sent as a bearer token.
    pub fn new(api_key: Option<&str>, timeout: Duration) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| ClientError::Config(format!("invalid API key header value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Overrides the pause before the retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn get<R: DeserializeOwned>(&self, url: &str) -> Result<R, ClientError> {
        let body = self.execute::<()>(Method::GET, url, None).await?;
        serde_json::from_str(&body).map_err(ClientError::Decode)
    }

    pub async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, ClientError> {
        let body = self.execute(Method::POST, url, Some(body)).await?;
        serde_json::from_str(&body).map_err(ClientError::Decode)
    }

    /// POST whose response body is ignored.
    pub async fn post_unit<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<(), ClientError> {
        self.execute(Method::POST, url, Some(body)).await.map(|_| ())
    }

    /// Sends the request and returns the raw success body.
    ///
    /// On transient errors (429, 500, 502, 503), retries once after the
    /// retry delay.
    async fn execute<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<String, ClientError> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                warn!(attempt, url, "retrying request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let mut request = self.client.request(method.clone(), url);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(ClientError::Transport)?;

            let status = response.status();
            debug!(status = %status, attempt, url, "response received");

            let text = response.text().await.map_err(ClientError::Transport)?;
            if status.is_success() {
                return Ok(text);
            }
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %text, "transient error, will retry");
                attempt += 1;
                continue;
            }
            return Err(ClientError::Status { status, body: text });
        }
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

/// Appends percent-encoded path segments to a base URL.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<String, ClientError> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| ClientError::Config(format!("invalid base URL `{base}`: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ClientError::Config(format!("base URL `{base}` cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.into())
}
