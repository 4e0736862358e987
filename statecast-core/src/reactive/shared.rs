//! Shared State
//!
//! A `SharedState` is the always-latest variant of the value store: a cached
//! value fed by an upstream producer that only runs while someone watches.
//!
//! # How Shared State Works
//!
//! 1. The first observer to attach starts the upstream producer on the
//!    runtime the state was created in. The producer pushes values through
//!    an [`Emitter`].
//!
//! 2. Every observer, including one attaching late, first receives the
//!    cached value and then each value the producer emits.
//!
//! 3. When the last observer detaches, the producer keeps running for the
//!    grace period. If nobody reattaches in that window the producer is
//!    aborted. The cached value survives, and the next attach replays it
//!    and restarts the producer from scratch.
//!
//! The start/stop bookkeeping lives in an [`ActivationGate`], kept behind the
//! same lock as the producer's task handle.

use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::gate::{Activation, ActivationGate, IdleTicket, Release};
use super::subscriber::{SubscriberId, Subscription};
use crate::error::StoreError;

static SHARED_STATE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_shared_state_id() -> u64 {
    SHARED_STATE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Upstream<T> = Box<dyn Fn(Emitter<T>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Write end handed to the upstream producer.
pub struct Emitter<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Emitter<T> {
    /// Replace the cached value and wake every observer.
    pub fn emit(&self, value: T) {
        self.tx.send_replace(value);
    }
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

struct Duty {
    gate: ActivationGate,
    producer: Option<JoinHandle<()>>,
    halted: bool,
}

struct Inner<T> {
    id: u64,
    tx: Arc<watch::Sender<T>>,
    upstream: Upstream<T>,
    duty: Mutex<Duty>,
    runtime: Handle,
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn acquire(&self) {
        let mut duty = self.duty.lock();
        if duty.gate.acquire() == Activation::Start {
            self.start_producer(&mut duty);
        }
    }

    fn release(self: &Arc<Self>) {
        let mut duty = self.duty.lock();
        let Release::Idle(ticket) = duty.gate.release() else {
            return;
        };

        let grace = duty.gate.grace();
        if grace.is_zero() {
            self.expire(&mut duty, ticket);
            return;
        }

        let weak = Arc::downgrade(self);
        self.runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inner) = weak.upgrade() {
                let mut duty = inner.duty.lock();
                inner.expire(&mut duty, ticket);
            }
        });
    }

    fn expire(&self, duty: &mut Duty, ticket: IdleTicket) {
        if duty.gate.expire(ticket) {
            if let Some(producer) = duty.producer.take() {
                producer.abort();
            }
            tracing::debug!(state = self.id, "shared state upstream stopped");
        }
    }

    fn start_producer(&self, duty: &mut Duty) {
        if let Some(stale) = duty.producer.take() {
            stale.abort();
        }
        if duty.halted {
            return;
        }
        let emitter = Emitter {
            tx: Arc::clone(&self.tx),
        };
        let future = (self.upstream)(emitter);
        duty.producer = Some(self.runtime.spawn(future));
        tracing::debug!(
            state = self.id,
            activation = duty.gate.activation_count(),
            "shared state upstream started"
        );
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(producer) = self.duty.get_mut().producer.take() {
            producer.abort();
        }
    }
}

/// A cached value fed by an upstream that runs only while observed.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use statecast_core::reactive::SharedState;
///
/// # async fn demo() -> Result<(), statecast_core::error::StoreError> {
/// let ticks = SharedState::new(0u32, Duration::from_secs(5), |emitter| async move {
///     let mut n = 0;
///     loop {
///         n += 1;
///         emitter.emit(n);
///         tokio::time::sleep(Duration::from_secs(1)).await;
///     }
/// })?;
///
/// let mut receiver = ticks.subscribe();
/// let first = receiver.next().await?;
/// # let _ = first;
/// # Ok(())
/// # }
/// ```
pub struct SharedState<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<T>>,
}

impl<T> SharedState<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a shared state holding `initial` until the upstream emits.
    ///
    /// Must be called inside a tokio runtime; the upstream and the grace
    /// timers are spawned on it.
    pub fn new<F, Fut>(initial: T, grace: Duration, upstream: F) -> Result<Self, StoreError>
    where
        F: Fn(Emitter<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current()?;
        let (tx, _) = watch::channel(initial);

        Ok(Self {
            inner: Arc::new(Inner {
                id: next_shared_state_id(),
                tx: Arc::new(tx),
                upstream: Box::new(move |emitter| upstream(emitter).boxed()),
                duty: Mutex::new(Duty {
                    gate: ActivationGate::new(grace),
                    producer: None,
                    halted: false,
                }),
                runtime,
            }),
        })
    }

    /// Get the state's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The cached value. Reading does not activate the upstream.
    pub fn get(&self) -> T {
        self.inner.tx.borrow().clone()
    }

    /// Attach a receiver. Its first [`StateReceiver::next`] yields the
    /// value cached at the moment of attaching, even if the restarted
    /// upstream has emitted since.
    pub fn subscribe(&self) -> StateReceiver<T> {
        let mut rx = self.inner.tx.subscribe();
        let replay = rx.borrow_and_update().clone();
        self.inner.acquire();

        StateReceiver {
            rx,
            replay: Some(replay),
            lease: Lease {
                inner: Arc::clone(&self.inner),
            },
        }
    }

    /// Attach a callback observer.
    ///
    /// Delivery runs on a task spawned on the state's runtime, so the first
    /// call (with the cached value) happens shortly after this returns.
    pub fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut receiver = self.subscribe();
        let task = self.inner.runtime.spawn(async move {
            while let Ok(value) = receiver.next().await {
                observer(&value);
            }
        });
        Subscription::new(SubscriberId::new(), move || task.abort())
    }

    /// Abort the upstream for good.
    ///
    /// Attached receivers keep the cached value and stay usable, but no
    /// later attach restarts the producer.
    pub fn halt(&self) {
        let mut duty = self.inner.duty.lock();
        duty.halted = true;
        if let Some(producer) = duty.producer.take() {
            producer.abort();
            tracing::debug!(state = self.inner.id, "shared state upstream halted");
        }
    }

    /// Whether the upstream is currently running (or inside its grace window).
    pub fn is_active(&self) -> bool {
        self.inner.duty.lock().gate.is_active()
    }

    /// Number of attached receivers.
    pub fn observer_count(&self) -> usize {
        self.inner.duty.lock().gate.observer_count()
    }

    /// How many times the upstream has been started.
    pub fn activation_count(&self) -> u64 {
        self.inner.duty.lock().gate.activation_count()
    }
}

impl<T> Clone for SharedState<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for SharedState<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("id", &self.inner.id)
            .field("value", &self.get())
            .field("active", &self.is_active())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

/// Keeps the gate acquired for as long as a receiver lives.
struct Lease<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<T>>,
}

impl<T> Drop for Lease<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.inner.release();
    }
}

/// An attached receiver of a [`SharedState`]. Dropping it detaches.
pub struct StateReceiver<T>
where
    T: Clone + Send + Sync + 'static,
{
    rx: watch::Receiver<T>,
    replay: Option<T>,
    lease: Lease<T>,
}

impl<T> StateReceiver<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The latest value, without waiting.
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Wait for the next value.
    ///
    /// Values emitted faster than the receiver polls are conflated: it
    /// always wakes up with the latest one.
    pub async fn next(&mut self) -> Result<T, StoreError> {
        if let Some(replay) = self.replay.take() {
            return Ok(replay);
        }
        self.rx.changed().await.map_err(|_| StoreError::Closed)?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Convert into a stream of values.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        stream::unfold(self, |mut receiver| async move {
            match receiver.next().await {
                Ok(value) => Some((value, receiver)),
                Err(_) => None,
            }
        })
    }

    /// The state this receiver is attached to.
    pub fn state_id(&self) -> u64 {
        self.lease.inner.id
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
