//! Process-wide Prometheus metrics.
//!
//! Metrics are registered on the default registry and exposed in text
//! exposition format by a small HTTP server on the configured metrics port.
//! Any GET path serves the exposition.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter_vec, Encoder, GaugeVec,
    Histogram, IntCounterVec, TextEncoder,
};

use crate::httpd::{self, HttpResponse, HttpServerHandle};

/// Inference latency per Metis call, in milliseconds.
pub static INFER_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "safehaven_infer_ms",
        "Inference latency in milliseconds",
        vec![1.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0]
    )
    .expect("register safehaven_infer_ms")
});

/// Capture-to-decision latency per sample, in milliseconds.
pub static E2E_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "safehaven_e2e_ms",
        "End-to-end latency in milliseconds",
        vec![5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0]
    )
    .expect("register safehaven_e2e_ms")
});

pub static QUEUE_DEPTH: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("safehaven_queue_depth", "Queue depth per camera", &["camera"])
        .expect("register safehaven_queue_depth")
});

pub static DROPPED_SAMPLES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "safehaven_dropped_samples",
        "Dropped stale samples",
        &["camera"]
    )
    .expect("register safehaven_dropped_samples")
});

pub static SEMANTIC_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "safehaven_semantic_events",
        "Semantic events emitted",
        &["camera", "type"]
    )
    .expect("register safehaven_semantic_events")
});

/// Force registration of every metric family.
///
/// `Lazy` statics register on first touch; an idle daemon must still expose
/// all families on the first scrape.
pub fn register_all() {
    Lazy::force(&INFER_MS);
    Lazy::force(&E2E_MS);
    Lazy::force(&QUEUE_DEPTH);
    Lazy::force(&DROPPED_SAMPLES);
    Lazy::force(&SEMANTIC_EVENTS);
}

/// Render the default registry in Prometheus text exposition format.
pub fn render() -> Result<Vec<u8>> {
    let families = prometheus::gather();
    let mut out = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut out)
        .context("encode metrics")?;
    Ok(out)
}

/// Start the metrics HTTP server.
pub fn spawn_metrics_server(port: u16) -> Result<HttpServerHandle> {
    register_all();
    httpd::spawn("metrics", port, |_request| match render() {
        Ok(body) => HttpResponse::new(200, "text/plain; version=0.0.4", body),
        Err(err) => {
            log::warn!("metrics render failed: {:#}", err);
            HttpResponse::new(500, "text/plain", b"metrics unavailable".to_vec())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_contains_all_families() {
        register_all();
        INFER_MS.observe(12.0);
        E2E_MS.observe(40.0);
        QUEUE_DEPTH.with_label_values(&["metrics-test-cam"]).set(3.0);
        DROPPED_SAMPLES
            .with_label_values(&["metrics-test-cam"])
            .inc_by(2);
        SEMANTIC_EVENTS
            .with_label_values(&["metrics-test-cam", "garage_opened"])
            .inc();

        let text = String::from_utf8(render().expect("render")).expect("utf8");
        for family in [
            "safehaven_infer_ms",
            "safehaven_e2e_ms",
            "safehaven_queue_depth",
            "safehaven_dropped_samples",
            "safehaven_semantic_events",
        ] {
            assert!(text.contains(family), "missing {family} in exposition");
        }
    }
}
