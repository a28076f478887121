// src/error.rs
//! Error taxonomy for the tracker core.
//!
//! None of these are fatal: a failed fetch abandons one tick, a failed save
//! leaves memory ahead of disk until the next successful save, and a failed
//! delivery is logged while the event still counts as handled.

use std::path::PathBuf;

use thiserror::Error;

use crate::sources::SourceKey;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("writing state to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding state: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook answered with status {0}")]
    Status(u16),
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("no source registered for {0}")]
    UnknownSource(SourceKey),

    #[error("{source_key} detector expects a {expected} snapshot")]
    KindMismatch {
        source_key: SourceKey,
        expected: &'static str,
    },
}
