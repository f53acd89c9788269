//! Prometheus metrics
//!
//! Registered lazily against the default registry and exposed at
//! `GET /metrics`. Recording helpers swallow label errors; metrics must
//! never fail a request.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
    Histogram, IntCounter, IntCounterVec, IntGaugeVec,
};

static FEED_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("feed_requests_total", "Feed pages served").unwrap()
});

static FEED_ITEMS_SERVED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("feed_items_served_total", "Feed items delivered").unwrap()
});

static FEED_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_request_duration_seconds",
        "Feed assembly latency",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .unwrap()
});

static CACHE_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "cache_events_total",
        "Cache hits and misses per cache",
        &["cache", "event"]
    )
    .unwrap()
});

static CACHE_ENTRIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "cache_entries",
        "Resident entries per in-process cache",
        &["cache"]
    )
    .unwrap()
});

static PREDICTOR_FALLBACKS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "predictor_fallbacks_total",
        "Candidates scored by the local formula after a predictor failure"
    )
    .unwrap()
});

static VIEW_FLUSHES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "view_flushes_total",
        "View batch flush attempts by outcome",
        &["status"]
    )
    .unwrap()
});

static VIEW_BATCHES_FLUSHED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "view_batches_flushed_total",
        "Content-id batches written back to the store"
    )
    .unwrap()
});

static PRESSURE_EVICTIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "cache_pressure_evictions_total",
        "Entries evicted by the memory-pressure policy"
    )
    .unwrap()
});

pub fn record_feed_request(duration_ms: u64, items: usize) {
    FEED_REQUESTS.inc();
    FEED_ITEMS_SERVED.inc_by(items as u64);
    FEED_DURATION.observe(duration_ms as f64 / 1000.0);
}

pub fn record_cache_event(cache: &str, event: &str) {
    CACHE_EVENTS.with_label_values(&[cache, event]).inc();
}

pub fn set_cache_entries(cache: &str, entries: usize) {
    CACHE_ENTRIES
        .with_label_values(&[cache])
        .set(entries as i64);
}

pub fn record_predictor_fallback() {
    PREDICTOR_FALLBACKS.inc();
}

pub fn record_view_flush(status: &str, batches: usize) {
    VIEW_FLUSHES.with_label_values(&[status]).inc();
    if status == "success" {
        VIEW_BATCHES_FLUSHED.inc_by(batches as u64);
    }
}

pub fn record_pressure_evictions(evicted: usize) {
    if evicted > 0 {
        PRESSURE_EVICTIONS.inc_by(evicted as u64);
    }
}

/// Text exposition of the default registry.
pub fn gather() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
