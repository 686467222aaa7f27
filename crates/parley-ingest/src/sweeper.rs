// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic purge of expired dedup records and offline-sync events.

use std::sync::Arc;
use std::time::Duration;

use parley_core::types::now_timestamp;
use parley_core::{ParleyError, StorageAdapter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub dedup_records: usize,
    pub message_events: usize,
}

pub async fn sweep_once(storage: &dyn StorageAdapter) -> Result<SweepReport, ParleyError> {
    let now = now_timestamp();
    Ok(SweepReport {
        dedup_records: storage.purge_expired_dedup(&now).await?,
        message_events: storage.purge_expired_events(&now).await?,
    })
}

/// Sweeps every `interval` until cancelled.
pub async fn run_sweeper(
    storage: Arc<dyn StorageAdapter>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match sweep_once(storage.as_ref()).await {
            Ok(report) if report == SweepReport::default() => debug!("sweep found nothing expired"),
            Ok(report) => info!(
                dedup_records = report.dedup_records,
                message_events = report.message_events,
                "expired rows purged"
            ),
            Err(e) => warn!(error = %e, "sweep failed"),
        }
    }
    debug!("sweeper stopped");
}
