//! Prometheus metrics for fiscal-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Histogram, HistogramVec, TextEncoder,
};

/// Issuance attempts by outcome (`issued` or an error type).
pub static ISSUANCES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_issuances_total",
        "Total number of invoice issuance attempts by outcome",
        &["outcome"]
    )
    .expect("Failed to register issuances_total")
});

/// End-to-end issuance duration.
pub static ISSUANCE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "fiscal_issuance_duration_seconds",
        "Invoice issuance duration in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register issuance_duration")
});

/// Gross amount of issued invoices.
pub static GROSS_AMOUNT_ISSUED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "fiscal_gross_amount_issued_total",
        "Sum of gross amounts of issued invoices"
    )
    .expect("Failed to register gross_amount_issued")
});

/// Public verification checks by result.
pub static VERIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_verifications_total",
        "Total number of hash verifications by result",
        &["result"] // match, mismatch, unknown_invoice
    )
    .expect("Failed to register verifications_total")
});

/// Lifecycle transitions.
pub static STATUS_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_status_transitions_total",
        "Total number of invoice status transitions",
        &["from", "to"]
    )
    .expect("Failed to register status_transitions_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fiscal_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Force registration of every metric so `/metrics` lists them from startup.
pub fn init_metrics() {
    Lazy::force(&ISSUANCES_TOTAL);
    Lazy::force(&ISSUANCE_DURATION);
    Lazy::force(&GROSS_AMOUNT_ISSUED);
    Lazy::force(&VERIFICATIONS_TOTAL);
    Lazy::force(&STATUS_TRANSITIONS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Render the default registry in the Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|e| format!("# Failed to encode metrics: {}", e))
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
