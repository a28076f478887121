// src/notify/mod.rs
pub mod discord;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::DeliveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Depot,
    News,
    Change,
}

impl UpdateKind {
    pub fn source_label(self) -> &'static str {
        match self {
            UpdateKind::Depot | UpdateKind::Change => "SteamDB Monitor",
            UpdateKind::News => "Steam News",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EventField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: false,
        }
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }
}

/// Unit handed to a [`Notifier`]. Built once by a detector, then only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateEvent {
    kind: UpdateKind,
    title: String,
    summary: Option<String>,
    url: Option<String>,
    timestamp: DateTime<Utc>,
    fields: Vec<EventField>,
}

impl UpdateEvent {
    pub fn new(kind: UpdateKind, title: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            title: title.into(),
            summary: None,
            url: None,
            timestamp,
            fields: Vec::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_field(mut self, field: EventField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn kind(&self) -> UpdateKind {
        self.kind
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    pub fn fields(&self) -> &[EventField] {
        &self.fields
    }

    /// Value of the first field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &UpdateEvent) -> Result<(), DeliveryError>;
}

/// Fallback sink when no webhook is configured: writes the event to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &UpdateEvent) -> Result<(), DeliveryError> {
        tracing::info!(
            kind = ?event.kind(),
            title = event.title(),
            url = event.url().unwrap_or_default(),
            fields = event.fields().len(),
            "update (no webhook configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_fields_in_order() {
        let ts = Utc::now();
        let ev = UpdateEvent::new(UpdateKind::Depot, "Build", ts)
            .with_summary("new build")
            .with_field(EventField::new("Build ID", "`1`").inline())
            .with_field(EventField::new("App ID", "730"));

        assert_eq!(ev.field("Build ID"), Some("`1`"));
        assert_eq!(ev.fields()[1].name, "App ID");
        assert!(ev.fields()[0].inline);
        assert!(!ev.fields()[1].inline);
        assert_eq!(ev.url(), None);
    }
}
