// src/sources/steam_depot.rs
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::FetchError;
use crate::sources::{get_json, SourceFetcher, SourceKey, SourceSnapshot};

const STEAMCMD_INFO_URL: &str = "https://api.steamcmd.net/v1/info";

/// Polls steamcmd's app info; the whole `data.<app>` subtree is the snapshot.
pub struct SteamDepotFetcher {
    client: Client,
    app_id: u32,
}

impl SteamDepotFetcher {
    pub fn new(client: Client, app_id: u32) -> Self {
        Self { client, app_id }
    }

    /// Pull `data.<app_id>` out of a steamcmd response.
    pub fn parse(payload: &Value, app_id: u32) -> Result<Value, FetchError> {
        payload
            .get("data")
            .and_then(|d| d.get(app_id.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::Malformed(format!("steamcmd response lacks data.{app_id}")))
    }
}

#[async_trait]
impl SourceFetcher for SteamDepotFetcher {
    async fn fetch(&self) -> Result<SourceSnapshot, FetchError> {
        let url = format!("{STEAMCMD_INFO_URL}/{}", self.app_id);
        let payload = get_json(&self.client, &url, &[]).await?;
        let depot = Self::parse(&payload, self.app_id)?;
        Ok(SourceSnapshot::blob(SourceKey::SteamDepot, depot))
    }

    fn key(&self) -> SourceKey {
        SourceKey::SteamDepot
    }
}
