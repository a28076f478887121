// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sources::SourceKey;
use crate::state::DEFAULT_STATE_PATH;

pub const ENV_CONFIG_PATH: &str = "TRACKER_CONFIG_PATH";
pub const ENV_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
pub const ENV_STATE_PATH: &str = "TRACKER_STATE_PATH";
pub const ENV_HTTP_ADDR: &str = "TRACKER_HTTP_ADDR";
pub const DEFAULT_CONFIG_PATH: &str = "config/tracker.toml";

fn default_app_id() -> u32 {
    730
}
fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSchedule {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub interval_secs: u64,
}

impl SourceSchedule {
    fn every(interval_secs: u64) -> Self {
        Self {
            enabled: true,
            interval_secs,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

fn default_depot() -> SourceSchedule {
    SourceSchedule::every(5 * 60)
}
fn default_news() -> SourceSchedule {
    SourceSchedule::every(10 * 60)
}
fn default_steamdb() -> SourceSchedule {
    SourceSchedule::every(15 * 60)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_depot")]
    pub steam_depot: SourceSchedule,
    #[serde(default = "default_news")]
    pub steam_news: SourceSchedule,
    #[serde(default = "default_steamdb")]
    pub steamdb: SourceSchedule,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            steam_depot: default_depot(),
            steam_news: default_news(),
            steamdb: default_steamdb(),
        }
    }
}

impl SourcesConfig {
    pub fn get(&self, key: SourceKey) -> &SourceSchedule {
        match key {
            SourceKey::SteamDepot => &self.steam_depot,
            SourceKey::SteamNews => &self.steam_news,
            SourceKey::SteamDbChanges => &self.steamdb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_app_id")]
    pub app_id: u32,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Bind address for /health, /status and /metrics. Unset disables it.
    #[serde(default)]
    pub http_addr: Option<String>,
    #[serde(default)]
    pub sources: SourcesConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            state_path: default_state_path(),
            request_timeout_secs: default_request_timeout_secs(),
            webhook_url: None,
            http_addr: None,
            sources: SourcesConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: TrackerConfig = toml::from_str(s).context("parsing tracker config")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading tracker config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve config, then apply env overrides:
    /// 1) $TRACKER_CONFIG_PATH (must exist)
    /// 2) config/tracker.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                Self::default()
            }
        };
        Ok(base.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(url) = non_empty_env(ENV_WEBHOOK_URL) {
            self.webhook_url = Some(url);
        }
        if let Some(p) = non_empty_env(ENV_STATE_PATH) {
            self.state_path = PathBuf::from(p);
        }
        if let Some(addr) = non_empty_env(ENV_HTTP_ADDR) {
            self.http_addr = Some(addr);
        }
        self
    }

    fn sanitized(mut self) -> Self {
        for s in [
            &mut self.sources.steam_depot,
            &mut self.sources.steam_news,
            &mut self.sources.steamdb,
        ] {
            s.interval_secs = s.interval_secs.max(1);
        }
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self.webhook_url = self.webhook_url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Enabled sources with their poll interval.
    pub fn schedules(&self) -> Vec<(SourceKey, Duration)> {
        SourceKey::ALL
            .into_iter()
            .filter(|k| self.sources.get(*k).enabled)
            .map(|k| (k, self.sources.get(k).interval()))
            .collect()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
