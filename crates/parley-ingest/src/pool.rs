// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion worker pool.
//!
//! A semaphore bounds in-flight handlers to the pool width. A slot is
//! acquired before the next fetch, so a full pool stops pulling from the
//! broker. Each handler runs under a deadline with panics caught. The
//! delivery is committed once the handler returns, whatever the outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parley_core::types::Delivery;
use parley_core::{EventSource, ParleyError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::executor::panic_message;

/// Processes one broker delivery.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, delivery: &Delivery) -> Result<(), ParleyError>;
}

/// Outcome label of one processed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Ok,
    Error,
    Timeout,
    Panic,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Ok => "ok",
            EventStatus::Error => "error",
            EventStatus::Timeout => "timeout",
            EventStatus::Panic => "panic",
        }
    }
}

pub struct WorkerPool {
    source: Arc<dyn EventSource>,
    handler: Arc<dyn EventHandler>,
    workers: usize,
    handler_timeout: Duration,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(
        source: Arc<dyn EventSource>,
        handler: Arc<dyn EventHandler>,
        workers: usize,
        handler_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            handler,
            workers: workers.max(1),
            handler_timeout,
            poll_interval,
        }
    }

    /// Consumes until `cancel` fires, then waits for in-flight handlers.
    pub async fn run(&self, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        info!(
            topic = self.source.topic(),
            group = self.source.group(),
            workers = self.workers,
            "ingestion pool started"
        );

        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let fetched = tokio::select! {
                _ = cancel.cancelled() => break,
                fetched = self.source.fetch() => fetched,
            };
            match fetched {
                Ok(Some(delivery)) => {
                    let source = Arc::clone(&self.source);
                    let handler = Arc::clone(&self.handler);
                    let timeout = self.handler_timeout;
                    tasks.spawn(async move {
                        let _permit = permit;
                        process_delivery(source.as_ref(), handler.as_ref(), delivery, timeout).await;
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    warn!(topic = self.source.topic(), error = %e, "broker fetch failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }

            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("ingestion worker crashed: {e}");
                }
            }
        }

        info!(in_flight = tasks.len(), "ingestion pool draining");
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("ingestion worker crashed: {e}");
            }
        }
        info!("ingestion pool stopped");
    }
}

/// Runs the handler for one delivery, commits it and reports the outcome.
pub async fn process_delivery(
    source: &dyn EventSource,
    handler: &dyn EventHandler,
    delivery: Delivery,
    timeout: Duration,
) -> EventStatus {
    let started = Instant::now();
    let outcome =
        tokio::time::timeout(timeout, AssertUnwindSafe(handler.handle(&delivery)).catch_unwind())
            .await;
    let status = match outcome {
        Ok(Ok(Ok(()))) => EventStatus::Ok,
        Ok(Ok(Err(e))) => {
            warn!(
                topic = %delivery.topic,
                offset = delivery.offset,
                kind = e.kind(),
                error = %e,
                "event handler failed"
            );
            EventStatus::Error
        }
        Ok(Err(panic)) => {
            error!(
                topic = %delivery.topic,
                offset = delivery.offset,
                panic = %panic_message(&*panic),
                "event handler panicked"
            );
            EventStatus::Panic
        }
        Err(_) => {
            warn!(
                topic = %delivery.topic,
                offset = delivery.offset,
                timeout_secs = timeout.as_secs_f64(),
                "event handler timed out"
            );
            EventStatus::Timeout
        }
    };

    if let Err(e) = source.commit(&delivery).await {
        warn!(topic = %delivery.topic, offset = delivery.offset, error = %e, "offset commit failed");
    }

    let elapsed = started.elapsed();
    let lag = broker_lag(delivery.enqueued_at.as_deref());
    parley_prometheus::record_consumer_event(
        status.as_str(),
        source.topic(),
        source.group(),
        elapsed.as_secs_f64(),
    );
    if let Some(lag) = lag {
        parley_prometheus::set_consumer_lag(source.topic(), source.group(), lag.as_secs_f64());
    }
    info!(
        topic = %delivery.topic,
        partition = delivery.partition,
        offset = delivery.offset,
        status = status.as_str(),
        duration_ms = elapsed.as_millis() as u64,
        lag_ms = lag.map(|l| l.as_millis() as u64),
        "event processed"
    );
    status
}

/// Time between broker acceptance and now; `None` when unknown.
fn broker_lag(enqueued_at: Option<&str>) -> Option<Duration> {
    let enqueued: DateTime<Utc> = DateTime::parse_from_rfc3339(enqueued_at?).ok()?.into();
    (Utc::now() - enqueued).to_std().ok()
}
