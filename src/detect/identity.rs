// src/detect/identity.rs
//! Identity-list detector: one event per item whose id has not been seen.

use once_cell::sync::OnceCell;
use regex::Regex;

use super::{mismatch, Detection, Detector};
use crate::error::TrackerError;
use crate::notify::UpdateEvent;
use crate::sources::{SnapshotBody, SourceItem, SourceKind, SourceSnapshot};
use crate::state::SourceState;

/// Seen ids kept per source.
pub const SEEN_RETENTION: usize = 50;
/// Summary length cap, applied after cleanup.
pub const MAX_BODY_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct IdentityListDetector {
    retention: usize,
    max_body_chars: usize,
}

impl Default for IdentityListDetector {
    fn default() -> Self {
        Self {
            retention: SEEN_RETENTION,
            max_body_chars: MAX_BODY_CHARS,
        }
    }
}

impl IdentityListDetector {
    pub fn new(retention: usize, max_body_chars: usize) -> Self {
        Self {
            retention,
            max_body_chars,
        }
    }

    fn event_for(&self, item: &SourceItem, snapshot: &SourceSnapshot) -> UpdateEvent {
        let ts = item.published_at.unwrap_or(snapshot.observed_at);
        let mut ev = UpdateEvent::new(snapshot.source.update_kind(), item.title.as_str(), ts);

        let body = item
            .body
            .as_deref()
            .map(|b| clean_body(b, self.max_body_chars))
            .unwrap_or_default();
        if !body.trim().is_empty() {
            ev = ev.with_summary(body);
        }
        if let Some(url) = &item.url {
            ev = ev.with_url(url.as_str());
        }
        for f in &item.fields {
            ev = ev.with_field(f.clone());
        }
        ev
    }
}

impl Detector for IdentityListDetector {
    fn kind(&self) -> SourceKind {
        SourceKind::IdentityList
    }

    fn detect(
        &self,
        state: SourceState,
        snapshot: &SourceSnapshot,
    ) -> Result<Detection, TrackerError> {
        let (SourceState::Seen(mut seen), SnapshotBody::Items(items)) = (state, &snapshot.body)
        else {
            return Err(mismatch(snapshot, "items"));
        };

        let mut events = Vec::new();
        for item in items {
            if seen.contains(&item.id) {
                continue;
            }
            events.push(self.event_for(item, snapshot));
            seen.insert(item.id.as_str());
        }

        let evicted = seen.evict_to(self.retention);
        if !evicted.is_empty() {
            tracing::debug!(
                source = snapshot.source.as_str(),
                evicted = evicted.len(),
                "seen set trimmed"
            );
        }

        Ok(Detection {
            state: SourceState::Seen(seen),
            events,
        })
    }
}

/// Strip `[bbcode]` tokens, then `<html>` tags, then cap at `max_chars`.
pub fn clean_body(raw: &str, max_chars: usize) -> String {
    static RE_BRACKETS: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_brackets = RE_BRACKETS.get_or_init(|| Regex::new(r"\[.*?\]").expect("bracket regex"));
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"<.*?>").expect("tag regex"));

    let out = re_brackets.replace_all(raw, "");
    let out = re_tags.replace_all(&out, "");
    out.chars().take(max_chars).collect()
}
