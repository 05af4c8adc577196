//! Metrics and telemetry for ledgerscope
//!
//! Prometheus counters for page fetches, reference resolution and histogram
//! aggregation.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};

lazy_static! {
    // === Page fetches ===

    /// Page fetches by entity path and status
    pub static ref PAGE_FETCHES_TOTAL: CounterVec = register_counter_vec!(
        "ledgerscope_page_fetches_total",
        "Total paged query fetches",
        &["entity", "status"]
    ).unwrap();

    /// Page fetch latency
    pub static ref PAGE_FETCH_DURATION: HistogramVec = register_histogram_vec!(
        "ledgerscope_page_fetch_duration_seconds",
        "Paged query latency in seconds, including reference resolution",
        &["entity"],
        vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();

    /// Page results discarded because a newer request landed or the view was cancelled
    pub static ref STALE_PAGES_DISCARDED: CounterVec = register_counter_vec!(
        "ledgerscope_stale_pages_discarded_total",
        "Page results ignored by last-request-wins or cancellation",
        &["reason"]
    ).unwrap();

    // === Reference resolution ===

    /// Cache lookups by result (hit, coalesced, miss)
    pub static ref RESOLUTION_LOOKUPS: CounterVec = register_counter_vec!(
        "ledgerscope_resolution_lookups_total",
        "Reference resolution cache lookups",
        &["namespace", "result"]
    ).unwrap();

    /// Upstream entity fetches by outcome
    pub static ref RESOLUTION_FETCHES: CounterVec = register_counter_vec!(
        "ledgerscope_resolution_fetches_total",
        "Upstream fetches issued by the resolution cache",
        &["namespace", "outcome"]
    ).unwrap();

    // === Histograms ===

    /// Sample type counts dropped for lack of a category mapping
    pub static ref HISTOGRAM_TYPES_DROPPED: Counter = register_counter!(
        "ledgerscope_histogram_types_dropped_total",
        "Histogram type counts without a category mapping"
    ).unwrap();
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record a completed page fetch
#[inline]
pub fn record_page_fetch(entity: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    PAGE_FETCHES_TOTAL
        .with_label_values(&[entity, status])
        .inc();

    PAGE_FETCH_DURATION
        .with_label_values(&[entity])
        .observe(duration_secs);
}

/// Record a discarded page result
#[inline]
pub fn record_stale_page(reason: &str) {
    STALE_PAGES_DISCARDED.with_label_values(&[reason]).inc();
}

/// Record a resolution cache lookup
#[inline]
pub fn record_lookup(namespace: &str, result: &str) {
    RESOLUTION_LOOKUPS
        .with_label_values(&[namespace, result])
        .inc();
}

/// Record an upstream entity fetch
#[inline]
pub fn record_resolution_fetch(namespace: &str, outcome: &str) {
    RESOLUTION_FETCHES
        .with_label_values(&[namespace, outcome])
        .inc();
}
