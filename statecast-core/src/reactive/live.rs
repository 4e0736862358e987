//! Live Value
//!
//! A `LiveValue` is the replaying variant of the value store. It holds the
//! latest value and pushes it to observers.
//!
//! # How Live Values Work
//!
//! 1. An observer attached at any time is called with the current value
//!    immediately, then again on every `set`.
//!
//! 2. Every `set` notifies, even when the new value equals the old one.
//!    Consumers that only care about changes put a
//!    [`Distinct`](super::Distinct) filter in front of their callback.
//!
//! 3. The value lives as long as any clone of the `LiveValue` does.
//!
//! # Thread Safety
//!
//! The value sits behind an `RwLock`. Delivery is serialized by a reentrant
//! dispatch lock, so observers see sets in the order they happened and an
//! observer may call `set` or `observe` on the same value from inside its
//! callback without deadlocking.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use smallvec::SmallVec;

use super::store::{Observer, ValueStore};
use super::subscriber::{SubscriberId, Subscription};

/// Counter for generating unique store IDs.
static LIVE_VALUE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_live_value_id() -> u64 {
    LIVE_VALUE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Most screens attach one or two observers per value.
type ObserverList<T> = SmallVec<[(SubscriberId, Observer<T>); 2]>;

struct Inner<T> {
    id: u64,
    value: RwLock<T>,
    observers: RwLock<ObserverList<T>>,
    dispatch: ReentrantMutex<()>,
}

/// A value holder that replays its latest value to late observers.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use statecast_core::reactive::LiveValue;
///
/// let value = LiveValue::new("Initial".to_string());
/// value.set("0042".to_string());
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// let _sub = value.observe(move |v: &String| sink.lock().unwrap().push(v.clone()));
///
/// // The late observer got the latest value on attach.
/// assert_eq!(*seen.lock().unwrap(), vec!["0042".to_string()]);
/// ```
pub struct LiveValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<T>>,
}

impl<T> LiveValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a live value seeded with `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: next_live_value_id(),
                value: RwLock::new(value),
                observers: RwLock::new(SmallVec::new()),
                dispatch: ReentrantMutex::new(()),
            }),
        }
    }

    /// Get the store's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify every observer.
    pub fn set(&self, value: T) {
        let _dispatch = self.inner.dispatch.lock();
        *self.inner.value.write() = value.clone();

        // Snapshot the list so observers can attach or detach while we deliver.
        let observers: ObserverList<T> = self.inner.observers.read().clone();
        for (_, observer) in observers.iter() {
            observer(&value);
        }
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let _dispatch = self.inner.dispatch.lock();
        let next = f(&self.inner.value.read());
        self.set(next);
    }

    /// Attach an observer.
    ///
    /// The observer is called with the current value before this returns,
    /// and with every later value until the subscription is dropped.
    pub fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.attach_observer(Arc::new(observer))
    }

    fn attach_observer(&self, observer: Observer<T>) -> Subscription {
        let id = SubscriberId::new();
        let _dispatch = self.inner.dispatch.lock();
        self.inner.observers.write().push((id, observer.clone()));

        let current = self.get();
        observer(&current);

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.write().retain(|(sid, _)| *sid != id);
            }
        })
    }

    /// Get the number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().len()
    }
}

impl<T> ValueStore<T> for LiveValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        LiveValue::get(self)
    }

    fn set(&self, value: T) {
        LiveValue::set(self, value)
    }

    fn attach(&self, observer: Observer<T>) -> Subscription {
        self.attach_observer(observer)
    }
}

impl<T> Clone for LiveValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for LiveValue<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveValue")
            .field("id", &self.inner.id)
            .field("value", &self.get())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
