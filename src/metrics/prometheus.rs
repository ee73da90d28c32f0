use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus HTTP exporter on the given port.
/// After this call, any metrics recorded via the `metrics` crate
/// macros (counter!, histogram!) are automatically exported at /metrics.
///
/// Must be called from inside the tokio runtime.
pub fn init_metrics_server(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    Ok(())
}

// ── Request metrics ──────────────────────────────────────────────

pub fn record_request(method: &str, status: &str) {
    counter!(
        "broker_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ── Cache metrics ────────────────────────────────────────────────

pub fn record_cache_hit() {
    counter!("broker_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    counter!("broker_cache_misses_total").increment(1);
}

pub fn record_cache_eviction() {
    counter!("broker_cache_evictions_total").increment(1);
}

// ── Provider metrics ─────────────────────────────────────────────

pub fn record_fetch_error(kind: &str) {
    counter!("broker_fetch_errors_total", "kind" => kind.to_string())
        .increment(1);
}

/// Wall time of one provider call, success or failure.
pub fn record_fetch_latency_ms(latency_ms: f64) {
    histogram!("broker_fetch_latency_ms").record(latency_ms);
}
