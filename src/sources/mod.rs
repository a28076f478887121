// src/sources/mod.rs
//! Source fetchers: one per upstream, each returning a normalized snapshot.

pub mod steam_depot;
pub mod steam_news;
pub mod steamdb;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::detect::{identity::IdentityListDetector, single_hash::SingleHashDetector, Detector};
use crate::error::FetchError;
use crate::notify::{EventField, UpdateKind};

/// Stable key of a tracked source. Doubles as its key in the state document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKey {
    #[serde(rename = "steam_depot")]
    SteamDepot,
    #[serde(rename = "steam_news")]
    SteamNews,
    #[serde(rename = "steamdb_changes")]
    SteamDbChanges,
}

impl SourceKey {
    pub const ALL: [SourceKey; 3] = [
        SourceKey::SteamDepot,
        SourceKey::SteamNews,
        SourceKey::SteamDbChanges,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKey::SteamDepot => "steam_depot",
            SourceKey::SteamNews => "steam_news",
            SourceKey::SteamDbChanges => "steamdb_changes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceKey::SteamDepot => "Steam Depot",
            SourceKey::SteamNews => "Steam News",
            SourceKey::SteamDbChanges => "SteamDB",
        }
    }

    pub fn kind(self) -> SourceKind {
        match self {
            SourceKey::SteamDepot => SourceKind::SingleHash,
            SourceKey::SteamNews | SourceKey::SteamDbChanges => SourceKind::IdentityList,
        }
    }

    pub fn update_kind(self) -> UpdateKind {
        match self {
            SourceKey::SteamDepot => UpdateKind::Depot,
            SourceKey::SteamNews => UpdateKind::News,
            SourceKey::SteamDbChanges => UpdateKind::Change,
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detector strategy family applicable to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// One evolving blob, change detected by fingerprint.
    SingleHash,
    /// Batch of discrete items with native identifiers.
    IdentityList,
}

/// One discrete item from an identity-list source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceItem {
    pub id: String,
    pub title: String,
    /// Raw body; markup is cleaned by the detector.
    pub body: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fields: Vec<EventField>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotBody {
    Blob(Value),
    Items(Vec<SourceItem>),
}

/// Raw normalized output of one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSnapshot {
    pub source: SourceKey,
    pub observed_at: DateTime<Utc>,
    pub body: SnapshotBody,
}

impl SourceSnapshot {
    pub fn blob(source: SourceKey, value: Value) -> Self {
        Self {
            source,
            observed_at: Utc::now(),
            body: SnapshotBody::Blob(value),
        }
    }

    pub fn items(source: SourceKey, items: Vec<SourceItem>) -> Self {
        Self {
            source,
            observed_at: Utc::now(),
            body: SnapshotBody::Items(items),
        }
    }
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self) -> Result<SourceSnapshot, FetchError>;
    fn key(&self) -> SourceKey;
}

/// GET `url` and parse the body as JSON. Non-2xx is a `FetchError::Status`.
pub(crate) async fn get_json(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, FetchError> {
    let resp = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| transport_error(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = resp.text().await.map_err(|e| transport_error(url, e))?;
    serde_json::from_str(&body).map_err(|e| FetchError::Malformed(format!("{url}: {e}")))
}

fn transport_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: e,
        }
    }
}

/// Fetcher + detector pair for a source.
pub struct SourceBinding {
    pub fetcher: Arc<dyn SourceFetcher>,
    pub detector: Arc<dyn Detector>,
}

/// Default Steam sources for `app_id`, all sharing `client`.
pub fn steam_sources(client: Client, app_id: u32) -> Vec<SourceBinding> {
    vec![
        SourceBinding {
            fetcher: Arc::new(steam_depot::SteamDepotFetcher::new(client.clone(), app_id)),
            detector: Arc::new(SingleHashDetector::steam_depot(app_id)),
        },
        SourceBinding {
            fetcher: Arc::new(steam_news::SteamNewsFetcher::new(client.clone(), app_id)),
            detector: Arc::new(IdentityListDetector::default()),
        },
        SourceBinding {
            fetcher: Arc::new(steamdb::SteamDbFetcher::new(client, app_id)),
            detector: Arc::new(IdentityListDetector::default()),
        },
    ]
}
