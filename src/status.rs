// src/status.rs
//! Operator status: configured poll intervals per source. Static, no runtime state.

use serde::Serialize;

use crate::config::TrackerConfig;
use crate::sources::SourceKey;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub source: SourceKey,
    pub label: &'static str,
    pub enabled: bool,
    pub interval_secs: u64,
    pub every: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub app_id: u32,
    pub sources: Vec<SourceStatus>,
}

impl StatusReport {
    pub fn from_config(cfg: &TrackerConfig) -> Self {
        let sources = SourceKey::ALL
            .into_iter()
            .map(|key| {
                let sched = cfg.sources.get(key);
                let secs = sched.interval().as_secs();
                SourceStatus {
                    source: key,
                    label: key.label(),
                    enabled: sched.enabled,
                    interval_secs: secs,
                    every: describe_interval(secs),
                }
            })
            .collect();
        Self {
            app_id: cfg.app_id,
            sources,
        }
    }
}

/// "Every 5 minutes", "Every 90 seconds", "Every hour".
pub fn describe_interval(secs: u64) -> String {
    match secs {
        1 => "Every second".to_string(),
        60 => "Every minute".to_string(),
        3600 => "Every hour".to_string(),
        s if s % 3600 == 0 => format!("Every {} hours", s / 3600),
        s if s % 60 == 0 => format!("Every {} minutes", s / 60),
        s => format!("Every {s} seconds"),
    }
}
