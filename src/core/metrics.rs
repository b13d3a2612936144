//! Process-level metrics for the webhook runtime using Prometheus
//!
//! Per-project business counters live in the `bot_analytics` table (see
//! `storage::metrics`); this registry tracks the process itself:
//! - inbound updates by kind
//! - dispatch outcomes
//! - outbound send failures
//! - webhook handling latency

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};

lazy_static! {
    /// Inbound webhook updates by classification
    /// Labels: kind (message/callback_query/pre_checkout_query/other)
    pub static ref UPDATES_RECEIVED_TOTAL: CounterVec = register_counter_vec!(
        "botforge_updates_received_total",
        "Total number of webhook updates received by kind",
        &["kind"]
    )
    .unwrap();

    /// Dispatch outcomes for text messages
    /// Labels: outcome (flow_continued/flow_started/intent/command/ai_fallback/ignored)
    pub static ref DISPATCH_OUTCOME_TOTAL: CounterVec = register_counter_vec!(
        "botforge_dispatch_outcome_total",
        "Total number of dispatched messages by resolution outcome",
        &["outcome"]
    )
    .unwrap();

    /// Outbound Telegram sends that failed (logged and swallowed)
    pub static ref SEND_FAILURES_TOTAL: Counter = register_counter!(
        "botforge_send_failures_total",
        "Total number of failed outbound Telegram API calls"
    )
    .unwrap();

    /// End-to-end webhook handling latency
    pub static ref WEBHOOK_DURATION_SECONDS: Histogram = register_histogram!(
        "botforge_webhook_duration_seconds",
        "Time spent handling one webhook update",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();
}

/// Render all registered metrics in Prometheus text exposition format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        log::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
