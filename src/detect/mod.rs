// src/detect/mod.rs
//! Change detectors. Pure functions of (prior state, snapshot): no I/O.

pub mod identity;
pub mod single_hash;

use crate::error::TrackerError;
use crate::notify::UpdateEvent;
use crate::sources::{SourceKind, SourceSnapshot};
use crate::state::SourceState;

/// Outcome of one detection: the state to persist and the events to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub state: SourceState,
    pub events: Vec<UpdateEvent>,
}

pub trait Detector: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn detect(
        &self,
        state: SourceState,
        snapshot: &SourceSnapshot,
    ) -> Result<Detection, TrackerError>;
}

pub(crate) fn mismatch(snapshot: &SourceSnapshot, expected: &'static str) -> TrackerError {
    TrackerError::KindMismatch {
        source_key: snapshot.source,
        expected,
    }
}
