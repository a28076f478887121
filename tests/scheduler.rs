// tests/scheduler.rs
mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{arc, depot_blob, RecordingSink, ScriptedFetcher, Step};
use cs2_update_tracker::detect::identity::IdentityListDetector;
use cs2_update_tracker::detect::single_hash::SingleHashDetector;
use cs2_update_tracker::sources::SourceKey;
use cs2_update_tracker::state::MemoryStateStore;
use cs2_update_tracker::Tracker;

#[tokio::test]
async fn timers_never_overlap_with_themselves() {
    let fetcher = Arc::new(
        ScriptedFetcher::new(SourceKey::SteamNews, vec![Step::Ids(vec!["a"])])
            .with_delay(Duration::from_millis(60)),
    );
    let sink = arc(RecordingSink::default());
    let t = Tracker::new(arc(MemoryStateStore::new()), sink.clone())
        .with_source(fetcher.clone(), arc(IdentityListDetector::default()))
        .unwrap()
        .initialize()
        .await;

    let handle = t.start([(SourceKey::SteamNews, Duration::from_millis(10))]);
    tokio::time::sleep(Duration::from_millis(350)).await;
    handle.shutdown().await;

    assert!(fetcher.calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(fetcher.max_running.load(Ordering::SeqCst), 1);
    assert_eq!(sink.count(), 1);
}

#[tokio::test]
async fn failing_and_panicking_ticks_do_not_stop_the_timer() {
    let news = Arc::new(ScriptedFetcher::new(
        SourceKey::SteamNews,
        vec![Step::Panic, Step::Fail, Step::Ids(vec!["late"])],
    ));
    let sink = arc(RecordingSink::default());
    let t = Tracker::new(arc(MemoryStateStore::new()), sink.clone())
        .with_source(news.clone(), arc(IdentityListDetector::default()))
        .unwrap()
        .initialize()
        .await;

    let handle = t.start([(SourceKey::SteamNews, Duration::from_millis(20))]);
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.shutdown().await;

    assert!(news.calls.load(Ordering::SeqCst) >= 3);
    assert_eq!(sink.titles(), vec!["item late"]);
}

#[tokio::test]
async fn sources_run_independently() {
    let slow = Arc::new(
        ScriptedFetcher::new(SourceKey::SteamDepot, vec![Step::Blob(depot_blob("1"))])
            .with_delay(Duration::from_millis(400)),
    );
    let fast = Arc::new(ScriptedFetcher::new(
        SourceKey::SteamNews,
        vec![Step::Ids(vec!["n"])],
    ));
    let sink = arc(RecordingSink::default());
    let t = Tracker::new(arc(MemoryStateStore::new()), sink.clone())
        .with_source(slow.clone(), arc(SingleHashDetector::steam_depot(730)))
        .unwrap()
        .with_source(fast.clone(), arc(IdentityListDetector::default()))
        .unwrap()
        .initialize()
        .await;

    let handle = t.start([
        (SourceKey::SteamDepot, Duration::from_millis(20)),
        (SourceKey::SteamNews, Duration::from_millis(20)),
    ]);
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The depot fetch is still hanging while news keeps polling.
    assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    assert!(fast.calls.load(Ordering::SeqCst) >= 3);
    assert_eq!(sink.titles(), vec!["item n"]);

    handle.shutdown().await;
    // Shutdown waited for the in-flight depot tick.
    assert_eq!(sink.count(), 2);
    assert!(t.state().await.steam_depot.last_hash.is_some());
}

#[tokio::test]
async fn unregistered_schedules_are_ignored() {
    let t = Tracker::new(arc(MemoryStateStore::new()), arc(RecordingSink::default()))
        .initialize()
        .await;
    let handle = t.start([(SourceKey::SteamDbChanges, Duration::from_secs(1))]);
    assert!(handle.sources().is_empty());
    handle.shutdown().await;
}
