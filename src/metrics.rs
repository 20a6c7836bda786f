// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// Inbound requests per route & outcome (ok | upstream_error | validation | proxy_error)
pub static PROXY_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("proxy_requests_total", "inbound proxy requests"),
        &["route", "outcome"],
    )
    .unwrap()
});

pub static PROXY_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("proxy_errors_total", "failures reaching or reading the exchange"),
        &["kind"],
    )
    .unwrap()
});

pub static UPSTREAM_RESPONSES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("upstream_responses_total", "exchange responses by endpoint & status"),
        &["endpoint", "status"],
    )
    .unwrap()
});

// Round trip to the exchange (milliseconds)
pub static UPSTREAM_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("upstream_latency_ms", "Latency of exchange calls (ms)").buckets(vec![
            10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
        ]),
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(PROXY_REQUESTS.clone())),
        REGISTRY.register(Box::new(PROXY_ERRORS.clone())),
        REGISTRY.register(Box::new(UPSTREAM_RESPONSES.clone())),
        REGISTRY.register(Box::new(UPSTREAM_LATENCY.clone())),
    ] {
        if let Err(e) = m {
            tracing::debug!(?e, "metric already registered");
        }
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}
