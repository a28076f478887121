use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{Notifier, UpdateEvent, UpdateKind};
use crate::error::DeliveryError;

const FOOTER_PREFIX: &str = "CS2 Update Tracker";

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, event: &UpdateEvent) -> Result<(), DeliveryError> {
        let payload = DiscordWebhookPayload::from_event(event);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => DeliveryError::Status(rsp.status().as_u16()),
                Err(e) => DeliveryError::Transport(e),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(attempt, error = %err, "discord webhook retry");
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

fn color(kind: UpdateKind) -> u32 {
    match kind {
        UpdateKind::Depot => 0xFF6B00,
        UpdateKind::News => 0x1B2838,
        UpdateKind::Change => 0x2A3F5F,
    }
}

#[derive(Debug, Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct DiscordFooter {
    text: String,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    color: u32,
    timestamp: String,
    fields: Vec<DiscordField>,
    footer: DiscordFooter,
}

#[derive(Debug, Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn from_event(ev: &UpdateEvent) -> Self {
        let fields = ev
            .fields()
            .iter()
            .map(|f| DiscordField {
                name: f.name.clone(),
                value: f.value.clone(),
                inline: f.inline,
            })
            .collect();

        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: ev.title().to_string(),
                description: ev.summary().map(str::to_string),
                url: ev.url().map(str::to_string),
                color: color(ev.kind()),
                timestamp: ev.timestamp().to_rfc3339(),
                fields,
                footer: DiscordFooter {
                    text: format!("{FOOTER_PREFIX} • {}", ev.kind().source_label()),
                },
            }],
        }
    }
}
