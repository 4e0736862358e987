//! Integration Tests for the value stores and the controller
//!
//! These tests drive the public API end to end on tokio's paused clock, so
//! the simulated fetch delay and the shared-state grace period elapse
//! instantly but in order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;

use statecast_core::config::Config;
use statecast_core::controller::{PresentationController, Track, TrackPhase};
use statecast_core::error::FetchError;
use statecast_core::fetch::{format_code, FetchService, Fetcher, SimulatedFetcher};
use statecast_core::reactive::{distinct_until_changed, LiveValue, SharedState};
use statecast_core::snapshot::{FileSnapshot, MemorySnapshot, SnapshotStore};

const GRACE: Duration = Duration::from_secs(5);
const DELAY: Duration = Duration::from_secs(2);

/// Fetcher returning 0001, 0002, ... that counts how often it was asked.
#[derive(Clone, Default)]
struct CountingFetcher {
    calls: Arc<AtomicU32>,
}

impl Fetcher for CountingFetcher {
    fn load(&self) -> BoxFuture<'_, Result<String, FetchError>> {
        async move {
            tokio::time::sleep(DELAY).await;
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format_code(n))
        }
        .boxed()
    }
}

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&String) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |v: &String| sink.lock().push(v.clone()))
}

fn assert_code(value: &str) {
    assert_eq!(value.len(), 4, "{value:?} is not four characters");
    let n: u32 = value.parse().expect("numeric code");
    assert!((1..=1000).contains(&n), "{n} out of range");
}

/// A ticking shared state: every start emits `start-N` and then ticks
/// `start-N/tick-M` once per second.
fn ticking_state(starts: Arc<AtomicU32>) -> SharedState<String> {
    SharedState::new("Nothing".to_string(), GRACE, move |emitter| {
        let starts = starts.clone();
        async move {
            let start = starts.fetch_add(1, Ordering::SeqCst) + 1;
            emitter.emit(format!("start-{start}"));
            let mut tick = 0;
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                tick += 1;
                emitter.emit(format!("start-{start}/tick-{tick}"));
            }
        }
    })
    .unwrap()
}

/// Test that any sequence of sets is replayed as its last value.
#[test]
fn live_value_replays_latest_to_late_observer() {
    let value = LiveValue::new("Initial".to_string());
    for n in 1..=25 {
        value.set(format_code(n));
    }

    let (seen, observer) = recorder();
    let _sub = value.observe(observer);

    assert_eq!(*seen.lock(), vec!["0025"]);
}

/// Test that a long detach stops the upstream, and the reattach replays the
/// cache exactly once before production resumes.
#[tokio::test(start_paused = true)]
async fn shared_state_restarts_after_grace() {
    let starts = Arc::new(AtomicU32::new(0));
    let state = ticking_state(starts.clone());

    let first = state.observe(|_| {});
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    drop(first);
    tokio::time::sleep(GRACE + Duration::from_millis(100)).await;

    assert!(!state.is_active());
    let cached = state.get();
    assert!(cached.starts_with("start-1/"), "unexpected cache {cached:?}");

    let (seen, observer) = recorder();
    let _second = state.observe(observer);
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let seen = seen.lock().clone();
    assert_eq!(starts.load(Ordering::SeqCst), 2);
    assert_eq!(seen.iter().filter(|v| **v == cached).count(), 1);
    assert_eq!(seen[0], cached);
    assert_eq!(&seen[1..], ["start-2", "start-2/tick-1"]);
}

/// Test that a detach shorter than the grace period is invisible upstream.
#[tokio::test(start_paused = true)]
async fn shared_state_survives_short_detach() {
    let starts = Arc::new(AtomicU32::new(0));
    let state = ticking_state(starts.clone());

    let first = state.observe(|_| {});
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    drop(first);
    tokio::time::sleep(Duration::from_secs(3)).await;

    let (seen, observer) = recorder();
    let _second = state.observe(observer);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(state.activation_count(), 1);
    assert!(seen.lock().iter().all(|v| v.starts_with("start-1")));
}

/// Test that a fresh controller seeds once per track and persists, and that
/// a recreated one fetches nothing for its loaded channels.
#[tokio::test(start_paused = true)]
async fn controller_recreation_uses_snapshot() {
    let snapshot = Arc::new(MemorySnapshot::new());
    let fetcher = CountingFetcher::default();
    let config = Config::default();

    let first = PresentationController::new(
        &config,
        FetchService::new(fetcher.clone()),
        snapshot.clone(),
    )
    .unwrap();
    let loaded_state = first.loaded_state().subscribe();
    tokio::time::sleep(DELAY + Duration::from_millis(10)).await;

    // Live loader, state loader, and one trigger seed per track.
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
    let persisted_live = first.loaded_live().get();
    let persisted_state = loaded_state.get();
    assert_eq!(snapshot.get("LoadLiveDataKey"), Some(persisted_live.clone()));
    assert_eq!(snapshot.get("LoadStateFlowKey"), Some(persisted_state.clone()));
    drop(loaded_state);
    drop(first);

    fetcher.calls.store(0, Ordering::SeqCst);
    let second = PresentationController::new(
        &config,
        FetchService::new(fetcher.clone()),
        snapshot.clone(),
    )
    .unwrap();
    assert_eq!(second.phase(Track::Live), TrackPhase::Idle);
    assert_eq!(second.phase(Track::State), TrackPhase::Idle);
    assert_eq!(second.loaded_live().get(), persisted_live);

    let mut loaded_state = second.loaded_state().subscribe();
    assert_eq!(loaded_state.next().await.unwrap(), persisted_state);
    tokio::time::sleep(DELAY * 3).await;

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

/// Test that a live trigger lands a valid code within the delay bound.
#[tokio::test(start_paused = true)]
async fn trigger_live_produces_code_within_delay() {
    let config = Config::default();
    let snapshot = Arc::new(MemorySnapshot::with_entries([
        ("TriggerLiveDataKey", "Initial"),
        ("TriggerStateFlowKey", "Initial"),
        ("LoadLiveDataKey", "0001"),
        ("LoadStateFlowKey", "0001"),
    ]));
    let controller = PresentationController::new(
        &config,
        FetchService::new(SimulatedFetcher::new(config.fetch_delay())),
        snapshot,
    )
    .unwrap();

    controller.trigger_live();
    tokio::time::sleep(config.fetch_delay() + Duration::from_millis(1)).await;

    assert_code(&controller.triggered_live().get());
    assert_eq!(controller.phase(Track::Live), TrackPhase::Idle);
}

/// Test that the state trigger reaches observers through the shared state.
#[tokio::test(start_paused = true)]
async fn trigger_state_reaches_shared_observers() {
    let snapshot = Arc::new(MemorySnapshot::with_entries([
        ("TriggerLiveDataKey", "Initial"),
        ("TriggerStateFlowKey", "Initial"),
        ("LoadLiveDataKey", "0001"),
        ("LoadStateFlowKey", "0001"),
    ]));
    let fetcher = CountingFetcher::default();
    let controller =
        PresentationController::new(&Config::default(), FetchService::new(fetcher), snapshot.clone())
            .unwrap();

    let (seen, observer) = recorder();
    let _button = controller
        .triggered_state()
        .observe(distinct_until_changed(observer));

    controller.trigger_state();
    tokio::time::sleep(DELAY + Duration::from_millis(10)).await;

    assert_eq!(*seen.lock(), vec!["Nothing", "Initial", "0001"]);
    assert_eq!(snapshot.get("TriggerStateFlowKey").as_deref(), Some("0001"));
}

/// Test that consecutive duplicates render once.
#[test]
fn distinct_filter_renders_duplicates_once() {
    let value = LiveValue::new("0100".to_string());
    let (renders, observer) = recorder();
    let _sub = value.observe(distinct_until_changed(observer));

    value.set("0100".to_string());
    value.set("0200".to_string());
    value.set("0200".to_string());

    assert_eq!(*renders.lock(), vec!["0100", "0200"]);
}

/// Test that a file snapshot carries trigger values across a restart.
#[tokio::test(start_paused = true)]
async fn file_snapshot_survives_restart() {
    let dir = std::env::temp_dir().join(format!("statecast-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("screen.json");
    let _ = std::fs::remove_file(&path);

    let fetcher = CountingFetcher::default();
    {
        let snapshot = Arc::new(FileSnapshot::open(&path).unwrap());
        let controller = PresentationController::new(
            &Config::default(),
            FetchService::new(fetcher.clone()),
            snapshot,
        )
        .unwrap();
        tokio::time::sleep(DELAY + Duration::from_millis(10)).await;
        assert_code(&controller.triggered_live().get());
    }

    let reopened = Arc::new(FileSnapshot::open(&path).unwrap());
    let live = reopened.get("TriggerLiveDataKey").unwrap();
    let calls_before = fetcher.calls.load(Ordering::SeqCst);

    let controller = PresentationController::new(
        &Config::default(),
        FetchService::new(fetcher.clone()),
        reopened,
    )
    .unwrap();
    assert_eq!(controller.triggered_live().get(), live);
    assert_eq!(controller.phase(Track::Live), TrackPhase::Idle);

    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), calls_before);

    let _ = std::fs::remove_file(&path);
}
