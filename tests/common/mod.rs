// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cs2_update_tracker::error::{DeliveryError, FetchError};
use cs2_update_tracker::notify::{Notifier, UpdateEvent};
use cs2_update_tracker::sources::{SourceFetcher, SourceItem, SourceKey, SourceSnapshot};
use serde_json::{json, Value};

pub enum Step {
    Blob(Value),
    Ids(Vec<&'static str>),
    Fail,
    Panic,
}

/// Fetcher that replays a fixed script, then repeats the last step.
pub struct ScriptedFetcher {
    key: SourceKey,
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    delay: Duration,
    pub calls: AtomicUsize,
    pub running: AtomicUsize,
    pub max_running: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(key: SourceKey, steps: Vec<Step>) -> Self {
        Self {
            key,
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        match steps.pop_front() {
            Some(step) => {
                let replay = clone_step(&step);
                *last = Some(replay);
                step
            }
            None => last.as_ref().map(clone_step).unwrap_or(Step::Fail),
        }
    }
}

fn clone_step(s: &Step) -> Step {
    match s {
        Step::Blob(v) => Step::Blob(v.clone()),
        Step::Ids(ids) => Step::Ids(ids.clone()),
        Step::Fail => Step::Fail,
        // Only panic once.
        Step::Panic => Step::Fail,
    }
}

pub fn news_item(id: &str) -> SourceItem {
    SourceItem {
        id: id.to_string(),
        title: format!("item {id}"),
        body: Some(format!("[p]body of {id}[/p]")),
        url: None,
        published_at: None,
        fields: Vec::new(),
    }
}

pub fn depot_blob(build: &str) -> Value {
    json!({ "depots": { "branches": { "public": { "buildid": build } } } })
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<SourceSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        match self.next_step() {
            Step::Blob(v) => Ok(SourceSnapshot::blob(self.key, v)),
            Step::Ids(ids) => Ok(SourceSnapshot::items(
                self.key,
                ids.into_iter().map(news_item).collect(),
            )),
            Step::Fail => Err(FetchError::Status {
                url: "https://upstream.test".into(),
                status: 503,
            }),
            Step::Panic => panic!("scripted fetcher panic"),
        }
    }

    fn key(&self) -> SourceKey {
        self.key
    }
}

/// Sink that records every event; can be switched to reject deliveries.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<UpdateEvent>>,
    pub fail: std::sync::atomic::AtomicBool,
}

impl RecordingSink {
    pub fn titles(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.title().to_string())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingSink {
    async fn notify(&self, event: &UpdateEvent) -> Result<(), DeliveryError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeliveryError::Status(500));
        }
        Ok(())
    }
}

pub fn arc<T>(v: T) -> Arc<T> {
    Arc::new(v)
}
