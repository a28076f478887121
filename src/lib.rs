// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod detect;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod sources;
pub mod state;
pub mod status;
pub mod tracker;

// ---- Re-exports for stable public API ----
pub use crate::config::TrackerConfig;
pub use crate::error::{DeliveryError, FetchError, PersistenceError, TrackerError};
pub use crate::notify::{Notifier, UpdateEvent, UpdateKind};
pub use crate::state::{FileStateStore, StateStore, TrackedState};
pub use crate::tracker::{ReadyTracker, Tracker, TrackerHandle};

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::notify::{discord::DiscordNotifier, LogNotifier};

/// Discord webhook sink when configured, log sink otherwise.
pub fn sink_from_config(cfg: &TrackerConfig) -> Arc<dyn Notifier> {
    match &cfg.webhook_url {
        Some(url) => Arc::new(DiscordNotifier::new(url.clone()).with_timeout(cfg.request_timeout_secs)),
        None => {
            tracing::warn!("DISCORD_WEBHOOK_URL not set; updates go to the log only");
            Arc::new(LogNotifier)
        }
    }
}

/// Shared HTTP client for all source fetchers.
pub fn http_client(cfg: &TrackerConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(cfg.request_timeout())
        .user_agent(concat!("cs2-update-tracker/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")
}
