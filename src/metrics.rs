use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first increment.
    counter!("feed_trades_total").absolute(0);
    counter!("trade_events_total").absolute(0);
    counter!("alerts_emitted_total").absolute(0);
    counter!("dedup_hits_total").absolute(0);
    counter!("malformed_messages_total").absolute(0);
    counter!("ws_reconnects_total").absolute(0);
    counter!("ws_failovers_total").absolute(0);
    counter!("ws_rotations_total").absolute(0);
    counter!("enrichment_timeouts_total").absolute(0);
    counter!("enrichment_errors_total").absolute(0);
    counter!("volatility_alerts_total").absolute(0);
    counter!("volatility_samples_dropped_total").absolute(0);

    // Histogram is lazily created on first record; force creation.
    histogram!("pipeline_latency_seconds").record(0.0);

    handle
}
