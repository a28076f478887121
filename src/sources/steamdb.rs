// src/sources/steamdb.rs
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::FetchError;
use crate::notify::EventField;
use crate::sources::steam_news::scalar_to_string;
use crate::sources::{get_json, SourceFetcher, SourceItem, SourceKey, SourceSnapshot};

const HISTORY_URL: &str = "https://steamdb.info/api/GetAppHistoryItems/";
const ITEMS_PER_PAGE: u32 = 5;
/// Only the newest few entries of a page are considered.
const ENTRIES_CONSIDERED: usize = 3;

pub struct SteamDbFetcher {
    client: Client,
    app_id: u32,
}

impl SteamDbFetcher {
    pub fn new(client: Client, app_id: u32) -> Self {
        Self { client, app_id }
    }

    pub fn parse(payload: &Value, app_id: u32) -> Vec<SourceItem> {
        let entries = payload
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        entries
            .iter()
            .take(ENTRIES_CONSIDERED)
            .filter_map(|change| {
                let id = change.get("ChangeID").and_then(scalar_to_string)?;
                let change_type = match change.get("Type") {
                    None | Some(Value::Null) => "Unknown".to_string(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                Some(SourceItem {
                    title: "SteamDB: CS2 Database Change".to_string(),
                    body: Some("A change has been detected in CS2's Steam database".to_string()),
                    url: Some(format!("https://steamdb.info/app/{app_id}/history/")),
                    published_at: None,
                    fields: vec![
                        EventField::new("Change ID", format!("`{id}`")).inline(),
                        EventField::new("Type", change_type).inline(),
                    ],
                    id,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SourceFetcher for SteamDbFetcher {
    async fn fetch(&self) -> Result<SourceSnapshot, FetchError> {
        let query = [
            ("appid", self.app_id.to_string()),
            ("itemsPerPage", ITEMS_PER_PAGE.to_string()),
        ];
        let payload = get_json(&self.client, HISTORY_URL, &query).await?;
        Ok(SourceSnapshot::items(
            SourceKey::SteamDbChanges,
            Self::parse(&payload, self.app_id),
        ))
    }

    fn key(&self) -> SourceKey {
        SourceKey::SteamDbChanges
    }
}
