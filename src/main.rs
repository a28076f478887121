//! CS2 update tracker binary entrypoint.
//! Loads config and state, starts one timer per source, optionally serves the
//! operator HTTP surface, and runs until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cs2_update_tracker::api::{self, ApiState};
use cs2_update_tracker::metrics::Metrics;
use cs2_update_tracker::sources::steam_sources;
use cs2_update_tracker::status::StatusReport;
use cs2_update_tracker::{http_client, sink_from_config, FileStateStore, Tracker, TrackerConfig};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cs2_update_tracker=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = TrackerConfig::load_default()?;
    let metrics = Metrics::init()?;

    let store = Arc::new(FileStateStore::new(cfg.state_path.clone()));
    let sink = sink_from_config(&cfg);
    let client = http_client(&cfg)?;

    let tracker = Tracker::new(store, sink)
        .with_bindings(steam_sources(client, cfg.app_id))
        .context("registering sources")?
        .initialize()
        .await;
    let handle = tracker.start(cfg.schedules());

    if let Some(addr) = cfg.http_addr.clone() {
        let state = ApiState {
            status: Arc::new(StatusReport::from_config(&cfg)),
            metrics: Some(metrics.handle.clone()),
        };
        let listener = tokio::net::TcpListener::bind(addr.as_str())
            .await
            .with_context(|| format!("binding {addr}"))?;
        tracing::info!(%addr, "operator http surface listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, api::create_router(state)).await {
                tracing::error!(error = %e, "http server stopped");
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
