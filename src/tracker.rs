// src/tracker.rs
//! Tracker service: fetch → detect → notify → persist, one timer per source.
//!
//! Lifecycle is two-phase. [`Tracker`] only collects dependencies;
//! [`Tracker::initialize`] loads the persisted state and returns a
//! [`ReadyTracker`], the only type that can run ticks or start timers.
//!
//! Each source's partition of the document is written only by that source's
//! ticks, and ticks of one source never overlap, whether they come from its
//! timer or from direct [`ReadyTracker::tick`] calls. The document lock is held
//! while reading a partition and again for the write-and-save step, never
//! across a fetch or a delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::detect::Detector;
use crate::error::TrackerError;
use crate::notify::Notifier;
use crate::sources::{SourceBinding, SourceFetcher, SourceKey};
use crate::state::{StateStore, TrackedState};

/// Dependencies of a tracker that has not loaded its state yet.
pub struct Tracker {
    store: Arc<dyn StateStore>,
    sink: Arc<dyn Notifier>,
    sources: HashMap<SourceKey, SourceBinding>,
}

impl Tracker {
    pub fn new(store: Arc<dyn StateStore>, sink: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            sink,
            sources: HashMap::new(),
        }
    }

    /// Register a source. The detector must match the source's kind.
    pub fn with_source(
        mut self,
        fetcher: Arc<dyn SourceFetcher>,
        detector: Arc<dyn Detector>,
    ) -> Result<Self, TrackerError> {
        let key = fetcher.key();
        if detector.kind() != key.kind() {
            return Err(TrackerError::KindMismatch {
                source_key: key,
                expected: "detector of the source's kind",
            });
        }
        self.sources.insert(key, SourceBinding { fetcher, detector });
        Ok(self)
    }

    pub fn with_bindings(
        self,
        bindings: impl IntoIterator<Item = SourceBinding>,
    ) -> Result<Self, TrackerError> {
        bindings
            .into_iter()
            .try_fold(self, |t, b| t.with_source(b.fetcher, b.detector))
    }

    pub async fn initialize(self) -> ReadyTracker {
        let state = self.store.load().await;
        tracing::info!(
            sources = self.sources.len(),
            depot_hash = state.steam_depot.last_hash.is_some(),
            seen_news = state.steam_news.len(),
            seen_changes = state.steamdb_changes.as_ref().map_or(0, |s| s.len()),
            "tracker initialized"
        );
        ReadyTracker {
            inner: Arc::new(Inner {
                store: self.store,
                sink: self.sink,
                sources: self
                    .sources
                    .into_iter()
                    .map(|(key, binding)| {
                        let slot = Slot {
                            binding,
                            running: Mutex::new(()),
                        };
                        (key, slot)
                    })
                    .collect(),
                state: Mutex::new(state),
            }),
        }
    }
}

struct Slot {
    binding: SourceBinding,
    // Held for a whole tick of this source.
    running: Mutex<()>,
}

struct Inner {
    store: Arc<dyn StateStore>,
    sink: Arc<dyn Notifier>,
    sources: HashMap<SourceKey, Slot>,
    state: Mutex<TrackedState>,
}

/// What a completed tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub events: usize,
    pub delivered: usize,
    pub persisted: bool,
}

#[derive(Clone)]
pub struct ReadyTracker {
    inner: Arc<Inner>,
}

impl ReadyTracker {
    /// Copy of the in-memory document.
    pub async fn state(&self) -> TrackedState {
        self.inner.state.lock().await.clone()
    }

    /// Run one fetch → detect → notify → persist pass for `key`.
    ///
    /// A fetch error leaves state untouched. Delivery errors are logged and
    /// the event still counts as handled. A save error is returned after the
    /// in-memory document was already updated. Concurrent calls for the same
    /// source run one after the other.
    pub async fn tick(&self, key: SourceKey) -> Result<TickReport, TrackerError> {
        let slot = self
            .inner
            .sources
            .get(&key)
            .ok_or(TrackerError::UnknownSource(key))?;
        let _running = slot.running.lock().await;
        let binding = &slot.binding;
        gauge!("tracker_last_tick_ts", "source" => key.as_str())
            .set(chrono::Utc::now().timestamp() as f64);

        let snapshot = match binding.fetcher.fetch().await {
            Ok(s) => s,
            Err(e) => {
                counter!("tracker_fetch_errors_total", "source" => key.as_str()).increment(1);
                return Err(e.into());
            }
        };

        let prior = self.inner.state.lock().await.partition(key);
        let detection = binding.detector.detect(prior.clone(), &snapshot)?;

        let mut report = TickReport {
            events: detection.events.len(),
            ..TickReport::default()
        };
        for ev in &detection.events {
            match self.inner.sink.notify(ev).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    counter!("tracker_delivery_errors_total", "source" => key.as_str())
                        .increment(1);
                    tracing::warn!(source = key.as_str(), title = ev.title(), error = %e, "delivery failed");
                }
            }
        }
        counter!("tracker_events_total", "source" => key.as_str()).increment(report.events as u64);

        if detection.state != prior {
            let mut doc = self.inner.state.lock().await;
            doc.set_partition(key, detection.state)?;
            if let Err(e) = self.inner.store.save(&doc).await {
                counter!("tracker_persist_errors_total", "source" => key.as_str()).increment(1);
                return Err(e.into());
            }
            report.persisted = true;
        }

        counter!("tracker_ticks_total", "source" => key.as_str()).increment(1);
        if report.events > 0 {
            tracing::info!(
                source = key.as_str(),
                events = report.events,
                delivered = report.delivered,
                "new updates announced"
            );
        } else {
            tracing::debug!(source = key.as_str(), "no change");
        }
        Ok(report)
    }

    /// Spawn one fixed-interval timer per `(source, interval)`. The first tick
    /// fires immediately; ticks missed while one is running are skipped.
    pub fn start(&self, schedules: impl IntoIterator<Item = (SourceKey, Duration)>) -> TrackerHandle {
        let (shutdown, _) = watch::channel(false);
        let mut tasks = Vec::new();

        for (key, period) in schedules {
            if !self.inner.sources.contains_key(&key) {
                tracing::warn!(source = key.as_str(), "schedule for unregistered source ignored");
                continue;
            }
            tracing::info!(source = key.as_str(), interval_secs = period.as_secs(), "timer started");
            let handle = spawn_timer(self.clone(), key, period, shutdown.subscribe());
            tasks.push((key, handle));
        }

        TrackerHandle { shutdown, tasks }
    }
}

fn spawn_timer(
    tracker: ReadyTracker,
    key: SourceKey,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            // Run on its own task so a panic is caught here instead of
            // killing the timer.
            let t = tracker.clone();
            match tokio::spawn(async move { t.tick(key).await }).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(source = key.as_str(), error = %e, "tick failed"),
                Err(e) => tracing::error!(source = key.as_str(), error = %e, "tick panicked"),
            }
        }
        tracing::debug!(source = key.as_str(), "timer stopped");
    })
}

/// Running timers. Dropping it also stops them, after any in-flight tick.
pub struct TrackerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(SourceKey, JoinHandle<()>)>,
}

impl TrackerHandle {
    pub fn sources(&self) -> Vec<SourceKey> {
        self.tasks.iter().map(|(k, _)| *k).collect()
    }

    /// Signal every timer and wait for it; in-flight ticks finish first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (key, task) in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(source = key.as_str(), error = %e, "timer ended abnormally");
            }
        }
    }
}
