//! Subscriber identity and subscription handles.
//!
//! Every observer attached to a store gets a [`SubscriberId`]. The store
//! hands back a [`Subscription`]; dropping it detaches the observer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an attached observer.
///
/// IDs are process-wide, so an ID is never reused even across stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to an attached observer.
///
/// Dropping the handle detaches the observer. [`Subscription::detach`] does
/// the same thing explicitly.
#[must_use = "dropping a Subscription detaches the observer immediately"]
pub struct Subscription {
    id: SubscriberId,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create a subscription that runs `detach` exactly once when released.
    pub fn new<F>(id: SubscriberId, detach: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            id,
            detach: Some(Box::new(detach)),
        }
    }

    /// Get the observer's ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Detach the observer now.
    pub fn detach(mut self) {
        self.release();
    }

    /// Whether the observer is still attached.
    pub fn is_attached(&self) -> bool {
        self.detach.is_some()
    }

    fn release(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}
