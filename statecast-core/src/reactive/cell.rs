//! Writable always-latest cell backing a [`SharedState`].

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;

use super::shared::SharedState;
use super::store::{Observer, ValueStore};
use super::subscriber::{SubscriberId, Subscription};
use crate::error::StoreError;

struct Inner<T> {
    tx: watch::Sender<T>,
    runtime: Handle,
}

/// A writable cell that always holds its latest value.
///
/// Unlike [`LiveValue`](super::LiveValue), observers are driven by tasks on
/// the cell's runtime, and a slow observer skips straight to the newest value
/// instead of seeing every intermediate one.
pub struct StateCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<T>>,
}

impl<T> StateCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cell seeded with `value`. Must be called inside a tokio runtime.
    pub fn new(value: T) -> Result<Self, StoreError> {
        let runtime = Handle::try_current()?;
        let (tx, _) = watch::channel(value);
        Ok(Self {
            inner: Arc::new(Inner { tx, runtime }),
        })
    }

    /// The current value.
    pub fn get(&self) -> T {
        self.inner.tx.borrow().clone()
    }

    /// Replace the value and wake every receiver.
    pub fn set(&self, value: T) {
        self.inner.tx.send_replace(value);
    }

    /// A raw receiver whose first `changed()` resolves immediately.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        let mut rx = self.inner.tx.subscribe();
        rx.mark_changed();
        rx
    }

    /// Attach a callback observer.
    pub fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.attach_observer(Arc::new(observer))
    }

    fn attach_observer(&self, observer: Observer<T>) -> Subscription {
        let mut rx = self.subscribe();
        let task = self.inner.runtime.spawn(async move {
            while rx.changed().await.is_ok() {
                let value = rx.borrow_and_update().clone();
                observer(&value);
            }
        });
        Subscription::new(SubscriberId::new(), move || task.abort())
    }

    /// Project the cell into a [`SharedState`] that forwards the cell's
    /// values while observed and idles after `grace` without observers.
    pub fn share(&self, initial: T, grace: Duration) -> Result<SharedState<T>, StoreError> {
        let source = self.clone();
        SharedState::new(initial, grace, move |emitter| {
            let mut rx = source.subscribe();
            async move {
                while rx.changed().await.is_ok() {
                    let value = rx.borrow_and_update().clone();
                    emitter.emit(value);
                }
            }
        })
    }

    /// Number of live receivers, including the ones behind observers.
    pub fn receiver_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }
}

impl<T> ValueStore<T> for StateCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        StateCell::get(self)
    }

    fn set(&self, value: T) {
        StateCell::set(self, value)
    }

    fn attach(&self, observer: Observer<T>) -> Subscription {
        self.attach_observer(observer)
    }
}

impl<T> Clone for StateCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for StateCell<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCell")
            .field("value", &self.get())
            .field("receiver_count", &self.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test(start_paused = true)]
    async fn observer_gets_current_then_updates() {
        let cell = StateCell::new("Initial".to_string()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let _sub = cell.observe(move |v: &String| sink.lock().push(v.clone()));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(*seen.lock(), vec!["Initial"]);

        cell.set("0007".to_string());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(*seen.lock(), vec!["Initial", "0007"]);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_observer_releases_receiver() {
        let cell = StateCell::new(0u32).unwrap();
        let sub = cell.observe(|_| {});
        tokio::task::yield_now().await;
        assert_eq!(cell.receiver_count(), 1);

        drop(sub);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(cell.receiver_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shared_projection_follows_cell() {
        let cell = StateCell::new("Initial".to_string()).unwrap();
        let shared = cell.share("Nothing".to_string(), Duration::from_secs(5)).unwrap();
        assert_eq!(shared.get(), "Nothing");

        let mut receiver = shared.subscribe();
        tokio::time::sleep(Duration::from_millis(1)).await;
        // The placeholder cached at attach time comes first.
        assert_eq!(receiver.next().await.unwrap(), "Nothing");
        assert_eq!(receiver.next().await.unwrap(), "Initial");

        cell.set("0500".to_string());
        assert_eq!(receiver.next().await.unwrap(), "0500");
    }
}
