//! The common value-store contract.

use std::sync::Arc;

use super::subscriber::Subscription;

/// Callback invoked with each value a store delivers.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A single-slot holder of the latest value.
///
/// Implemented by [`LiveValue`](super::LiveValue) and
/// [`StateCell`](super::StateCell). Writers like
/// [`FetchService::refresh_into`](crate::fetch::FetchService::refresh_into)
/// and [`Persisted`](crate::snapshot::Persisted) are written against this
/// trait so they work with either variant.
pub trait ValueStore<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Current value.
    fn get(&self) -> T;

    /// Replace the value and notify observers.
    fn set(&self, value: T);

    /// Attach an observer. It receives the current value right away and
    /// every later one until the returned subscription is dropped.
    fn attach(&self, observer: Observer<T>) -> Subscription;
}

impl<T, S> ValueStore<T> for Arc<S>
where
    T: Clone + Send + Sync + 'static,
    S: ValueStore<T> + ?Sized,
{
    fn get(&self) -> T {
        (**self).get()
    }

    fn set(&self, value: T) {
        (**self).set(value)
    }

    fn attach(&self, observer: Observer<T>) -> Subscription {
        (**self).attach(observer)
    }
}
