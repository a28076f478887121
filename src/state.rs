// src/state.rs
//! Persisted "seen" state: one JSON document partitioned by source key.
//!
//! The document stays operator-editable. Unknown keys survive a
//! load/save cycle and missing keys fall back to empty, so deleting a key
//! resets that source's baseline.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;

use crate::error::{PersistenceError, TrackerError};
use crate::sources::SourceKey;

pub const DEFAULT_STATE_PATH: &str = "tracked_updates.json";

/// Insertion-ordered identifier set; the front holds the oldest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenSet(VecDeque<String>);

impl SeenSet {
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|s| s == id)
    }

    /// Append `id` unless already present. Returns `true` when inserted.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.0.push_back(id);
        true
    }

    /// Drop the oldest entries until at most `bound` remain.
    pub fn evict_to(&mut self, bound: usize) -> Vec<String> {
        let excess = self.0.len().saturating_sub(bound);
        self.0.drain(..excess).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SeenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SeenSet::default();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

const LAST_HASH: &str = "last_hash";
const LAST_BUILD: &str = "last_build";

/// Depot slice. Only string values populate `last_hash`/`last_build`; any
/// other stored value (including an explicit `null`) stays in `extra`
/// verbatim until the detector writes a real value over it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct DepotState {
    pub last_hash: Option<String>,
    pub last_build: Option<String>,
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for DepotState {
    fn from(mut map: Map<String, Value>) -> Self {
        fn take(map: &mut Map<String, Value>, key: &str) -> Option<String> {
            match map.remove(key) {
                Some(Value::String(s)) => Some(s),
                Some(other) => {
                    map.insert(key.to_string(), other);
                    None
                }
                None => None,
            }
        }
        let last_hash = take(&mut map, LAST_HASH);
        let last_build = take(&mut map, LAST_BUILD);
        Self {
            last_hash,
            last_build,
            extra: map,
        }
    }
}

impl From<DepotState> for Map<String, Value> {
    fn from(d: DepotState) -> Self {
        let mut map = d.extra;
        if let Some(h) = d.last_hash {
            map.insert(LAST_HASH.to_string(), Value::String(h));
        }
        if let Some(b) = d.last_build {
            map.insert(LAST_BUILD.to_string(), Value::String(b));
        }
        map
    }
}

/// A single source's slice of the document.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceState {
    Hash(DepotState),
    Seen(SeenSet),
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

/// The full persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedState {
    #[serde(default)]
    pub steam_depot: DepotState,
    // Reserved for future sources; carried through untouched.
    #[serde(default = "empty_list")]
    pub reddit_posts: Value,
    #[serde(default = "empty_list")]
    pub twitter_posts: Value,
    #[serde(default)]
    pub steam_news: SeenSet,
    #[serde(default = "empty_list")]
    pub github_commits: Value,
    /// Added on the first SteamDB change, absent before.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steamdb_changes: Option<SeenSet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TrackedState {
    fn default() -> Self {
        Self {
            steam_depot: DepotState::default(),
            reddit_posts: empty_list(),
            twitter_posts: empty_list(),
            steam_news: SeenSet::default(),
            github_commits: empty_list(),
            steamdb_changes: None,
            extra: Map::new(),
        }
    }
}

impl TrackedState {
    /// Decode a stored document one key at a time. A known key holding a
    /// value of the wrong shape falls back to its own default; every other
    /// key, known or not, is kept.
    pub fn from_document(doc: Value) -> Self {
        let Value::Object(mut map) = doc else {
            tracing::warn!("tracked state is not a JSON object; starting empty");
            return Self::default();
        };

        let mut state = Self::default();
        if let Some(v) = map.remove("steam_depot") {
            state.steam_depot = decode_or_default("steam_depot", v);
        }
        if let Some(v) = map.remove("steam_news") {
            state.steam_news = decode_or_default("steam_news", v);
        }
        if let Some(v) = map.remove("steamdb_changes") {
            state.steamdb_changes = decode_or_default("steamdb_changes", v);
        }
        for (key, slot) in [
            ("reddit_posts", &mut state.reddit_posts),
            ("twitter_posts", &mut state.twitter_posts),
            ("github_commits", &mut state.github_commits),
        ] {
            if let Some(v) = map.remove(key) {
                *slot = v;
            }
        }
        state.extra = map;
        state
    }

    pub fn partition(&self, key: SourceKey) -> SourceState {
        match key {
            SourceKey::SteamDepot => SourceState::Hash(self.steam_depot.clone()),
            SourceKey::SteamNews => SourceState::Seen(self.steam_news.clone()),
            SourceKey::SteamDbChanges => {
                SourceState::Seen(self.steamdb_changes.clone().unwrap_or_default())
            }
        }
    }

    /// Replace the slice owned by `key`; other partitions are untouched.
    pub fn set_partition(&mut self, key: SourceKey, state: SourceState) -> Result<(), TrackerError> {
        match (key, state) {
            (SourceKey::SteamDepot, SourceState::Hash(d)) => self.steam_depot = d,
            (SourceKey::SteamNews, SourceState::Seen(s)) => self.steam_news = s,
            (SourceKey::SteamDbChanges, SourceState::Seen(s)) => self.steamdb_changes = Some(s),
            (key, _) => {
                return Err(TrackerError::KindMismatch {
                    source_key: key,
                    expected: match key.kind() {
                        crate::sources::SourceKind::SingleHash => "hash",
                        crate::sources::SourceKind::IdentityList => "seen-set",
                    },
                })
            }
        }
        Ok(())
    }
}

fn decode_or_default<T: DeserializeOwned + Default>(key: &str, value: Value) -> T {
    match serde_json::from_value(value) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(key, error = %e, "tracked state key malformed; resetting it");
            T::default()
        }
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Never fails: unreadable or missing state yields the default document.
    async fn load(&self) -> TrackedState;
    /// The mutation is committed only once this returns `Ok`.
    async fn save(&self, state: &TrackedState) -> Result<(), PersistenceError>;
}

/// JSON file store. Saves go to a sibling temp file that is then renamed
/// over the target, so readers see either the old or the new document.
pub struct FileStateStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_STATE_PATH.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> TrackedState {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no tracked state yet; starting empty");
                return TrackedState::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "tracked state unreadable; starting empty");
                return TrackedState::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(doc) => TrackedState::from_document(doc),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "tracked state corrupt; starting empty");
                TrackedState::default()
            }
        }
    }

    async fn save(&self, state: &TrackedState) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let _guard = self.write_lock.lock().await;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| self.io_err(e))?;
        }

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| self.io_err(e))?;
        file.write_all(&bytes).await.map_err(|e| self.io_err(e))?;
        file.sync_all().await.map_err(|e| self.io_err(e))?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.io_err(e));
        }
        Ok(())
    }
}

/// In-memory store holding the encoded document. Saves can be made to fail.
#[derive(Default)]
pub struct MemoryStateStore {
    doc: Mutex<Option<Value>>,
    fail_saves: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: Value) -> Self {
        Self {
            doc: Mutex::new(Some(doc)),
            fail_saves: AtomicBool::new(false),
        }
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Last successfully saved document, if any.
    pub fn document(&self) -> Option<Value> {
        self.doc.lock().ok().and_then(|d| d.clone())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> TrackedState {
        self.document()
            .map(TrackedState::from_document)
            .unwrap_or_default()
    }

    async fn save(&self, state: &TrackedState) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(ErrorKind::Other, "save rejected"),
            });
        }
        let value = serde_json::to_value(state)?;
        if let Ok(mut doc) = self.doc.lock() {
            *doc = Some(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seen_set_keeps_insertion_order_and_rejects_duplicates() {
        let mut s = SeenSet::default();
        assert!(s.insert("b"));
        assert!(s.insert("a"));
        assert!(!s.insert("b"));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn evict_drops_oldest_first() {
        let mut s: SeenSet = (0..55).map(|i| i.to_string()).collect();
        let evicted = s.evict_to(50);
        assert_eq!(evicted, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(s.len(), 50);
        assert_eq!(s.iter().next(), Some("5"));
        assert!(s.evict_to(50).is_empty());
    }

    #[test]
    fn default_document_has_original_keys() {
        let v = serde_json::to_value(TrackedState::default()).unwrap();
        assert_eq!(
            v,
            json!({
                "steam_depot": {},
                "reddit_posts": [],
                "twitter_posts": [],
                "steam_news": [],
                "github_commits": []
            })
        );
    }

    #[test]
    fn unknown_keys_survive_and_missing_keys_default() {
        let doc = json!({
            "steam_depot": { "last_hash": "abc", "last_build": "42", "note": "manual" },
            "steamdb_changes": ["1", "2"],
            "custom_source": { "cursor": 7 }
        });
        let state: TrackedState = serde_json::from_value(doc).unwrap();
        assert!(state.steam_news.is_empty());
        assert_eq!(state.steam_depot.last_hash.as_deref(), Some("abc"));
        assert_eq!(state.extra["custom_source"]["cursor"], 7);

        let back = serde_json::to_value(&state).unwrap();
        assert_eq!(back["custom_source"], json!({ "cursor": 7 }));
        assert_eq!(back["steam_depot"]["note"], "manual");
        assert_eq!(back["steamdb_changes"], json!(["1", "2"]));
    }

    #[test]
    fn depot_null_is_kept_until_overwritten() {
        let mut depot: DepotState =
            serde_json::from_value(json!({ "last_hash": null, "last_build": 7 })).unwrap();
        assert_eq!(depot.last_hash, None);
        assert_eq!(depot.last_build, None);
        assert_eq!(
            serde_json::to_value(&depot).unwrap(),
            json!({ "last_hash": null, "last_build": 7 })
        );

        depot.last_hash = Some("abc".into());
        assert_eq!(
            serde_json::to_value(&depot).unwrap(),
            json!({ "last_hash": "abc", "last_build": 7 })
        );
    }

    #[test]
    fn malformed_key_resets_only_itself() {
        let state = TrackedState::from_document(json!({
            "steam_depot": { "last_hash": "abc" },
            "steam_news": null,
            "steamdb_changes": ["9"],
            "reddit_posts": { "kept": true },
            "future_source": 1
        }));
        assert_eq!(state.steam_depot.last_hash.as_deref(), Some("abc"));
        assert!(state.steam_news.is_empty());
        assert_eq!(state.steamdb_changes.map(|s| s.len()), Some(1));
        assert_eq!(state.reddit_posts, json!({ "kept": true }));
        assert_eq!(state.extra["future_source"], 1);

        assert_eq!(TrackedState::from_document(json!([1, 2])), TrackedState::default());
    }

    #[test]
    fn partitions_are_disjoint() {
        let mut state = TrackedState::default();
        let seen: SeenSet = ["x"].into_iter().collect();
        state
            .set_partition(SourceKey::SteamDbChanges, SourceState::Seen(seen.clone()))
            .unwrap();
        assert_eq!(state.partition(SourceKey::SteamDbChanges), SourceState::Seen(seen));
        assert_eq!(
            state.partition(SourceKey::SteamNews),
            SourceState::Seen(SeenSet::default())
        );

        let err = state
            .set_partition(SourceKey::SteamDepot, SourceState::Seen(SeenSet::default()))
            .unwrap_err();
        assert!(matches!(err, TrackerError::KindMismatch { .. }));
    }
}
