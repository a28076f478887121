// src/detect/single_hash.rs
//! Fingerprint detector for sources that expose one evolving blob.
//!
//! Any difference from the stored hash, including an absent hash, emits
//! exactly one event. After a reset the first successful poll therefore
//! always announces the current build.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{mismatch, Detection, Detector};
use crate::error::TrackerError;
use crate::notify::{EventField, UpdateEvent};
use crate::sources::{SnapshotBody, SourceKind, SourceSnapshot};
use crate::state::{DepotState, SourceState};

pub const UNKNOWN: &str = "Unknown";

pub struct SingleHashDetector {
    title: String,
    summary: String,
    id_label: String,
    id_path: Vec<String>,
    static_fields: Vec<EventField>,
}

impl SingleHashDetector {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        id_label: impl Into<String>,
        id_path: &[&str],
    ) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            id_label: id_label.into(),
            id_path: id_path.iter().map(|s| s.to_string()).collect(),
            static_fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: EventField) -> Self {
        self.static_fields.push(field);
        self
    }

    /// Steam depot tracking: build id lives at `depots.branches.public.buildid`.
    pub fn steam_depot(app_id: u32) -> Self {
        Self::new(
            "CS2 Steam Depot Update Detected",
            "A new build has been pushed to Steam",
            "Build ID",
            &["depots", "branches", "public", "buildid"],
        )
        .with_field(EventField::new("App ID", format!("{app_id} (CS2)")).inline())
        .with_field(EventField::new(
            "Info",
            "This update was detected through Steam's depot system. Patch notes may follow soon.",
        ))
    }
}

impl Detector for SingleHashDetector {
    fn kind(&self) -> SourceKind {
        SourceKind::SingleHash
    }

    fn detect(
        &self,
        state: SourceState,
        snapshot: &SourceSnapshot,
    ) -> Result<Detection, TrackerError> {
        let (SourceState::Hash(prior), SnapshotBody::Blob(blob)) = (state, &snapshot.body) else {
            return Err(mismatch(snapshot, "blob"));
        };

        let hash = fingerprint(blob);
        if prior.last_hash.as_deref() == Some(hash.as_str()) {
            return Ok(Detection {
                state: SourceState::Hash(prior),
                events: Vec::new(),
            });
        }

        let build = lookup_display(blob, &self.id_path);
        let mut event = UpdateEvent::new(
            snapshot.source.update_kind(),
            self.title.as_str(),
            snapshot.observed_at,
        )
        .with_summary(self.summary.as_str())
        .with_field(EventField::new(self.id_label.as_str(), format!("`{build}`")).inline());
        for f in &self.static_fields {
            event = event.with_field(f.clone());
        }

        Ok(Detection {
            state: SourceState::Hash(DepotState {
                last_hash: Some(hash),
                last_build: Some(build),
                extra: prior.extra,
            }),
            events: vec![event],
        })
    }
}

/// Hex SHA-256 over a canonical encoding (object keys sorted at every level).
pub fn fingerprint(value: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Follow `path` through nested objects.
pub fn lookup_path<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |node, key| node.get(key.as_ref()))
}

/// Scalar at `path` rendered as text, or [`UNKNOWN`].
pub fn lookup_display<S: AsRef<str>>(value: &Value, path: &[S]) -> String {
    match lookup_path(value, path) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKey;
    use serde_json::json;

    fn depot(build: &str) -> SourceSnapshot {
        SourceSnapshot::blob(
            SourceKey::SteamDepot,
            json!({ "depots": { "branches": { "public": { "buildid": build } } } }),
        )
    }

    fn run(det: &SingleHashDetector, prior: DepotState, snap: &SourceSnapshot) -> (DepotState, usize) {
        let out = det.detect(SourceState::Hash(prior), snap).unwrap();
        match out.state {
            SourceState::Hash(d) => (d, out.events.len()),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn fingerprint_ignores_key_order() {
        let a = json!({ "a": 1, "b": { "x": [1, 2], "y": "z" } });
        let b = json!({ "b": { "y": "z", "x": [1, 2] }, "a": 1 });
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&json!({ "a": 2 })));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn first_poll_emits_then_identical_polls_are_quiet() {
        let det = SingleHashDetector::steam_depot(730);
        let snap = depot("100");

        let (s1, n1) = run(&det, DepotState::default(), &snap);
        assert_eq!(n1, 1);
        assert_eq!(s1.last_build.as_deref(), Some("100"));

        let (s2, n2) = run(&det, s1.clone(), &snap);
        assert_eq!(n2, 0);
        assert_eq!(s2, s1);
    }

    #[test]
    fn event_carries_build_and_static_fields() {
        let det = SingleHashDetector::steam_depot(730);
        let out = det
            .detect(SourceState::Hash(DepotState::default()), &depot("19876543"))
            .unwrap();
        let ev = &out.events[0];
        assert_eq!(ev.field("Build ID"), Some("`19876543`"));
        assert_eq!(ev.field("App ID"), Some("730 (CS2)"));
        assert_eq!(ev.summary(), Some("A new build has been pushed to Steam"));
    }

    #[test]
    fn missing_build_path_degrades_to_unknown() {
        let det = SingleHashDetector::steam_depot(730);
        let snap = SourceSnapshot::blob(SourceKey::SteamDepot, json!({ "depots": "gone" }));
        let (state, n) = run(&det, DepotState::default(), &snap);
        assert_eq!(n, 1);
        assert_eq!(state.last_build.as_deref(), Some(UNKNOWN));
    }

    #[test]
    fn lookup_handles_numbers_and_absence() {
        let v = json!({ "a": { "b": 7 } });
        assert_eq!(lookup_display(&v, &["a", "b"]), "7");
        assert_eq!(lookup_display(&v, &["a", "c"]), UNKNOWN);
        assert!(lookup_path(&v, &["a", "b", "c"]).is_none());
    }

    #[test]
    fn items_snapshot_is_rejected() {
        let det = SingleHashDetector::steam_depot(730);
        let snap = SourceSnapshot::items(SourceKey::SteamDepot, Vec::new());
        assert!(det
            .detect(SourceState::Hash(DepotState::default()), &snap)
            .is_err());
    }
}
