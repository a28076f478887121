// src/sources/steam_news.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use crate::error::FetchError;
use crate::notify::EventField;
use crate::sources::{get_json, SourceFetcher, SourceItem, SourceKey, SourceSnapshot};

const NEWS_URL: &str = "https://api.steampowered.com/ISteamNews/GetNewsForApp/v2/";
const NEWS_COUNT: u32 = 5;
const DEFAULT_AUTHOR: &str = "Valve";

pub struct SteamNewsFetcher {
    client: Client,
    app_id: u32,
}

impl SteamNewsFetcher {
    pub fn new(client: Client, app_id: u32) -> Self {
        Self { client, app_id }
    }

    /// Map `appnews.newsitems` to items. A missing list is an empty batch;
    /// entries without a `gid` are skipped.
    pub fn parse(payload: &Value) -> Vec<SourceItem> {
        let Some(items) = payload
            .get("appnews")
            .and_then(|a| a.get("newsitems"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(items.len());
        for it in items {
            let Some(id) = it.get("gid").and_then(scalar_to_string) else {
                tracing::debug!(source = "steam_news", "news item without gid skipped");
                continue;
            };
            let author = it
                .get("author")
                .and_then(Value::as_str)
                .filter(|a| !a.trim().is_empty())
                .unwrap_or(DEFAULT_AUTHOR);

            out.push(SourceItem {
                id,
                title: str_field(it, "title").unwrap_or_default(),
                body: str_field(it, "contents"),
                url: str_field(it, "url"),
                published_at: it
                    .get("date")
                    .and_then(Value::as_i64)
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
                fields: vec![EventField::new("Author", author).inline()],
            });
        }
        out
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Steam hands out gids as strings, older payloads as numbers.
pub(crate) fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl SourceFetcher for SteamNewsFetcher {
    async fn fetch(&self) -> Result<SourceSnapshot, FetchError> {
        let query = [
            ("appid", self.app_id.to_string()),
            ("count", NEWS_COUNT.to_string()),
            ("format", "json".to_string()),
        ];
        let payload = get_json(&self.client, NEWS_URL, &query).await?;
        Ok(SourceSnapshot::items(
            SourceKey::SteamNews,
            Self::parse(&payload),
        ))
    }

    fn key(&self) -> SourceKey {
        SourceKey::SteamNews
    }
}
