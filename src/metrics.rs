use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("tracker_ticks_total", "Completed poll ticks per source.");
        describe_counter!(
            "tracker_fetch_errors_total",
            "Ticks abandoned because the source fetch failed."
        );
        describe_counter!("tracker_events_total", "Update events emitted to the sink.");
        describe_counter!(
            "tracker_delivery_errors_total",
            "Events the sink failed to deliver."
        );
        describe_counter!(
            "tracker_persist_errors_total",
            "State saves rejected by the durable medium."
        );
        describe_gauge!("tracker_last_tick_ts", "Unix ts of the last tick per source.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }
}
