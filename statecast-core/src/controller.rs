//! Presentation Controller
//!
//! The controller owns one screen's worth of state: a live value and a
//! shared state for loaded data, and a live value and a shared state for
//! user-triggered data. It drives them from the [`FetchService`] and
//! persists through the [`SnapshotStore`] port.
//!
//! # Tracks
//!
//! The live track and the state track run independently. Each moves through
//! [`TrackPhase`]s:
//!
//! ```text
//! Uninitialized --(no persisted trigger value)--> Seeding --> Idle
//! Uninitialized --(persisted trigger value)-----------------> Idle
//! Idle --trigger()--> Triggering --(fetch done)--> Idle
//! ```
//!
//! A trigger issued while a fetch is still running aborts that fetch and
//! starts over, so an older result can never overwrite a newer one.
//! Dropping the controller aborts every pending fetch.
//!
//! # Channels
//!
//! - `loaded_live`: fetched once and persisted. On recreation it is
//!   restored from the snapshot and never fetched again.
//! - `loaded_state`: same contract, but produced lazily by a shared-state
//!   upstream that only runs while observed.
//! - `triggered_live` / `triggered_state`: refreshed on every trigger and
//!   persisted on every write.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{FetchError, StoreError};
use crate::fetch::FetchService;
use crate::reactive::{Emitter, LiveValue, SharedState, StateCell, ValueStore};
use crate::snapshot::{restore, Persisted, SnapshotKey, SnapshotStore};

const FAILURE_CAPACITY: usize = 16;

/// One of the two independent tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Live,
    State,
}

impl Track {
    pub const ALL: [Track; 2] = [Track::Live, Track::State];

    /// Snapshot key of the track's trigger channel.
    pub fn trigger_key(self) -> SnapshotKey {
        match self {
            Track::Live => SnapshotKey::TriggerLive,
            Track::State => SnapshotKey::TriggerState,
        }
    }

    /// Snapshot key of the track's loaded channel.
    pub fn load_key(self) -> SnapshotKey {
        match self {
            Track::Live => SnapshotKey::LoadLive,
            Track::State => SnapshotKey::LoadState,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Live => f.write_str("live"),
            Track::State => f.write_str("state"),
        }
    }
}

/// Where a track is in its fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackPhase {
    Uninitialized,
    /// First fetch after creation, issued because nothing was persisted.
    Seeding,
    Idle,
    /// Fetch issued by a user trigger.
    Triggering,
}

/// Which of a track's two channels a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Loaded,
    Trigger,
}

/// A fetch that failed. The channel keeps its previous value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFailure {
    pub track: Track,
    pub channel: Channel,
    pub error: FetchError,
}

struct TrackSlot {
    phase: TrackPhase,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl TrackSlot {
    fn new() -> Self {
        Self {
            phase: TrackPhase::Uninitialized,
            generation: 0,
            task: None,
        }
    }
}

/// Owner of one screen's stores and fetches.
pub struct PresentationController {
    loaded_live: Persisted<LiveValue<String>>,
    loaded_state: SharedState<String>,
    triggered_live: Persisted<LiveValue<String>>,
    trigger_cell: Persisted<StateCell<String>>,
    triggered_state: SharedState<String>,

    fetch: FetchService,
    failures: broadcast::Sender<TrackFailure>,
    live: Arc<Mutex<TrackSlot>>,
    state: Arc<Mutex<TrackSlot>>,
    loader: Mutex<Option<JoinHandle<()>>>,
    alive: Arc<AtomicBool>,
    runtime: Handle,
}

impl PresentationController {
    /// Build the controller, restoring whatever `snapshot` holds.
    ///
    /// Must be called inside a tokio runtime. Every track without a
    /// persisted trigger value starts seeding right away.
    pub fn new(
        config: &Config,
        fetch: FetchService,
        snapshot: Arc<dyn SnapshotStore>,
    ) -> Result<Self, StoreError> {
        let runtime = Handle::try_current()?;
        let grace = config.grace_period();
        let (failures, _) = broadcast::channel(FAILURE_CAPACITY);
        let alive = Arc::new(AtomicBool::new(true));

        let triggered_live = Persisted::new(
            LiveValue::new(restore(
                &*snapshot,
                SnapshotKey::TriggerLive,
                &config.initial_value,
            )),
            SnapshotKey::TriggerLive,
            Arc::clone(&snapshot),
        );

        let trigger_cell = Persisted::new(
            StateCell::new(restore(
                &*snapshot,
                SnapshotKey::TriggerState,
                &config.initial_value,
            ))?,
            SnapshotKey::TriggerState,
            Arc::clone(&snapshot),
        );
        let triggered_state = trigger_cell
            .inner()
            .share(config.placeholder.clone(), grace)?;

        let loaded_live = Persisted::new(
            LiveValue::new(restore(
                &*snapshot,
                SnapshotKey::LoadLive,
                &config.placeholder,
            )),
            SnapshotKey::LoadLive,
            Arc::clone(&snapshot),
        );

        let loaded_state = SharedState::new(
            restore(&*snapshot, SnapshotKey::LoadState, &config.placeholder),
            grace,
            load_state_upstream(
                Arc::clone(&snapshot),
                fetch.clone(),
                failures.clone(),
                Arc::clone(&alive),
            ),
        )?;

        let controller = Self {
            loaded_live,
            loaded_state,
            triggered_live,
            trigger_cell,
            triggered_state,
            fetch,
            failures,
            live: Arc::new(Mutex::new(TrackSlot::new())),
            state: Arc::new(Mutex::new(TrackSlot::new())),
            loader: Mutex::new(None),
            alive,
            runtime,
        };

        if !snapshot.contains(Track::Live.load_key().as_str()) {
            controller.spawn_live_loader();
        }

        // Both tracks seed whenever their trigger value is missing, even
        // though the loaded channels fetch on their own.
        for track in Track::ALL {
            if snapshot.contains(track.trigger_key().as_str()) {
                controller.slot(track).lock().phase = TrackPhase::Idle;
            } else {
                tracing::debug!(track = %track, "no persisted trigger value, seeding");
                controller.launch(track, TrackPhase::Seeding);
            }
        }

        Ok(controller)
    }

    /// Loaded value of the live track.
    pub fn loaded_live(&self) -> &LiveValue<String> {
        self.loaded_live.inner()
    }

    /// Loaded value of the state track. Produced only while observed.
    pub fn loaded_state(&self) -> &SharedState<String> {
        &self.loaded_state
    }

    /// Trigger value of the live track.
    pub fn triggered_live(&self) -> &LiveValue<String> {
        self.triggered_live.inner()
    }

    /// Trigger value of the state track.
    pub fn triggered_state(&self) -> &SharedState<String> {
        &self.triggered_state
    }

    /// Current value of the state track's trigger cell, whether or not
    /// anyone observes [`triggered_state`](Self::triggered_state).
    pub fn trigger_state_value(&self) -> String {
        self.trigger_cell.get()
    }

    /// Receive fetch failures from every channel.
    pub fn failures(&self) -> broadcast::Receiver<TrackFailure> {
        self.failures.subscribe()
    }

    pub fn phase(&self, track: Track) -> TrackPhase {
        self.slot(track).lock().phase
    }

    /// Refresh the live trigger channel.
    pub fn trigger_live(&self) {
        self.trigger(Track::Live);
    }

    /// Refresh the state trigger channel.
    pub fn trigger_state(&self) {
        self.trigger(Track::State);
    }

    /// Refresh `track`'s trigger channel in the background.
    pub fn trigger(&self, track: Track) {
        tracing::info!(track = %track, "trigger");
        self.launch(track, TrackPhase::Triggering);
    }

    /// Abort every pending fetch. Also runs on drop.
    ///
    /// Receivers that outlive the controller keep their last value, but the
    /// shared-state upstreams are halted along with the track tasks.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(loader) = self.loader.lock().take() {
            loader.abort();
        }
        self.loaded_state.halt();
        self.triggered_state.halt();
        for track in Track::ALL {
            let mut slot = self.slot(track).lock();
            if let Some(task) = slot.task.take() {
                task.abort();
                tracing::debug!(track = %track, "pending fetch cancelled");
            }
            slot.phase = TrackPhase::Idle;
        }
    }

    fn slot(&self, track: Track) -> &Arc<Mutex<TrackSlot>> {
        match track {
            Track::Live => &self.live,
            Track::State => &self.state,
        }
    }

    fn trigger_target(&self, track: Track) -> Box<dyn ValueStore<String>> {
        match track {
            Track::Live => Box::new(self.triggered_live.clone()),
            Track::State => Box::new(self.trigger_cell.clone()),
        }
    }

    fn launch(&self, track: Track, phase: TrackPhase) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }

        let slot = Arc::clone(self.slot(track));
        let mut guard = slot.lock();
        if let Some(superseded) = guard.task.take() {
            superseded.abort();
            tracing::debug!(track = %track, "superseded pending fetch");
        }
        guard.generation += 1;
        guard.phase = phase;

        let generation = guard.generation;
        let target = self.trigger_target(track);
        let fetch = self.fetch.clone();
        let failures = self.failures.clone();
        let task_slot = Arc::clone(&slot);

        guard.task = Some(self.runtime.spawn(async move {
            if let Err(error) = fetch.refresh_into(&*target).await {
                tracing::warn!(track = %track, error = %error, "trigger fetch failed");
                let _ = failures.send(TrackFailure {
                    track,
                    channel: Channel::Trigger,
                    error,
                });
            }

            let mut slot = task_slot.lock();
            if slot.generation == generation {
                slot.phase = TrackPhase::Idle;
                slot.task = None;
            }
        }));
    }

    fn spawn_live_loader(&self) {
        let store = self.loaded_live.clone();
        let fetch = self.fetch.clone();
        let failures = self.failures.clone();

        let task = self.runtime.spawn(async move {
            if let Err(error) = fetch.refresh_into(&store).await {
                tracing::warn!(error = %error, "live load failed");
                let _ = failures.send(TrackFailure {
                    track: Track::Live,
                    channel: Channel::Loaded,
                    error,
                });
            }
        });
        *self.loader.lock() = Some(task);
    }
}

/// Upstream of the state track's loaded channel: serve the persisted value,
/// or fetch and persist one.
fn load_state_upstream(
    snapshot: Arc<dyn SnapshotStore>,
    fetch: FetchService,
    failures: broadcast::Sender<TrackFailure>,
    alive: Arc<AtomicBool>,
) -> impl Fn(Emitter<String>) -> BoxFuture<'static, ()> + Send + Sync + 'static {
    move |emitter| {
        let snapshot = Arc::clone(&snapshot);
        let fetch = fetch.clone();
        let failures = failures.clone();
        let alive = Arc::clone(&alive);
        let key = SnapshotKey::LoadState;

        async move {
            let value = match snapshot.get(key.as_str()) {
                Some(value) => value,
                None => match fetch.load().await {
                    Ok(value) => value,
                    Err(_) if !alive.load(Ordering::SeqCst) => return,
                    Err(error) => {
                        tracing::warn!(error = %error, "state load failed");
                        let _ = failures.send(TrackFailure {
                            track: Track::State,
                            channel: Channel::Loaded,
                            error,
                        });
                        return;
                    }
                },
            };

            if !alive.load(Ordering::SeqCst) {
                return;
            }
            if let Err(err) = snapshot.set(key.as_str(), &value) {
                tracing::warn!(key = %key, error = %err, "snapshot write failed");
            }
            emitter.emit(value);
        }
        .boxed()
    }
}

impl Drop for PresentationController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for PresentationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationController")
            .field("loaded_live", &self.loaded_live().get())
            .field("loaded_state", &self.loaded_state.get())
            .field("triggered_live", &self.triggered_live().get())
            .field("triggered_state", &self.trigger_cell.get())
            .field("live_phase", &self.phase(Track::Live))
            .field("state_phase", &self.phase(Track::State))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
