// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

pub const CONSUMER_EVENT_DURATION: &str = "parley_consumer_event_duration_seconds";
pub const CONSUMER_LAG: &str = "parley_consumer_lag_seconds";
pub const ADMISSION_TOTAL: &str = "parley_admission_total";
pub const AGENT_SESSIONS_TOTAL: &str = "parley_agent_sessions_total";
pub const BACKGROUND_TASKS_TOTAL: &str = "parley_background_tasks_total";

/// Register all Parley metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_histogram!(
        CONSUMER_EVENT_DURATION,
        "Time spent handling one broker event"
    );
    describe_gauge!(
        CONSUMER_LAG,
        "Seconds between broker enqueue and consumption of the last event"
    );
    describe_counter!(ADMISSION_TOTAL, "Admission decisions by outcome");
    describe_counter!(AGENT_SESSIONS_TOTAL, "Agent sessions by termination reason");
    describe_counter!(
        BACKGROUND_TASKS_TOTAL,
        "Detached background tasks by name and final status"
    );
}

/// Record the handling duration of one consumed event.
pub fn record_consumer_event(status: &str, topic: &str, group: &str, seconds: f64) {
    metrics::histogram!(
        CONSUMER_EVENT_DURATION,
        "status" => status.to_string(),
        "topic" => topic.to_string(),
        "group" => group.to_string()
    )
    .record(seconds);
}

/// Set the broker lag observed on the last consumed event.
pub fn set_consumer_lag(topic: &str, group: &str, seconds: f64) {
    metrics::gauge!(CONSUMER_LAG, "topic" => topic.to_string(), "group" => group.to_string())
        .set(seconds);
}

/// Record one admission decision (`proceed`, a skip reason, or `error`).
pub fn record_admission(outcome: &str) {
    metrics::counter!(ADMISSION_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Record a finished agent session.
pub fn record_agent_session(termination: &str) {
    metrics::counter!(AGENT_SESSIONS_TOTAL, "termination" => termination.to_string())
        .increment(1);
}

/// Record the final status of a background task (`ok`, `error`, `timeout`, `panic`, `rejected`).
pub fn record_background_task(task: &str, status: &str) {
    metrics::counter!(
        BACKGROUND_TASKS_TOTAL,
        "task" => task.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
