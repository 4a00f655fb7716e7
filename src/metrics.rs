use metrics::{counter, gauge, histogram};
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
    counter!("ticks_total").absolute(0);
    counter!("tick_errors_total").absolute(0);
    counter!("signals_fetched_total").absolute(0);
    counter!("orders_accepted").absolute(0);
    counter!("orders_failed").absolute(0);

    gauge!("active_users").set(0.0);

    // Histogram is lazily created on first record; force creation.
    histogram!("tick_duration_seconds").record(0.0);

    handle
}
