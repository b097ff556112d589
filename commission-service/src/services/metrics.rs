//! Prometheus metrics for commission-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter, TextEncoder,
};
use std::sync::OnceLock;

/// Recorder behind the per-route HTTP metrics emitted by the middleware.
static HTTP_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Margin saves by outcome (saved, exceeds_public_price, non_sellable, invalid).
pub static MARGIN_SAVES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "commission_margin_saves_total",
        "Margin save attempts by outcome",
        &["outcome"]
    )
    .expect("Failed to register margin_saves_total")
});

pub static CHECKOUTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "commission_checkouts_total",
        "Checkouts submitted to the payment provider by status",
        &["status"]
    )
    .expect("Failed to register checkouts_total")
});

pub static WEBHOOK_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "commission_webhook_events_total",
        "Payment webhook deliveries by event type and outcome",
        &["event", "outcome"]
    )
    .expect("Failed to register webhook_events_total")
});

pub static COMMISSIONS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "commission_commissions_created_total",
        "Commission ledger entries created"
    )
    .expect("Failed to register commissions_created_total")
});

/// Captured payments that could not be turned into an order and commission.
pub static RECORDING_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "commission_recording_failures_total",
        "Captured payments without a recorded commission",
        &["reason"]
    )
    .expect("Failed to register recording_failures_total")
});

pub static PROVIDER_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "commission_provider_request_duration_seconds",
        "Payment provider API call duration in seconds",
        &["operation", "status"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register provider_request_duration")
});

pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "commission_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Install the HTTP metrics recorder and force domain metric registration.
pub fn init_metrics() {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HTTP_METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder already installed"),
    }

    Lazy::force(&MARGIN_SAVES_TOTAL);
    Lazy::force(&CHECKOUTS_TOTAL);
    Lazy::force(&WEBHOOK_EVENTS_TOTAL);
    Lazy::force(&COMMISSIONS_CREATED_TOTAL);
    Lazy::force(&RECORDING_FAILURES_TOTAL);
    Lazy::force(&PROVIDER_REQUEST_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = HTTP_METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    output.push_str(&encoder.encode_to_string(&metric_families).unwrap_or_default());
    output
}
