//! Consecutive-duplicate suppression at the observer boundary.
//!
//! Stores notify on every write. A display that only wants to re-render on
//! change wraps its callback with [`distinct_until_changed`].

use std::sync::Arc;

use parking_lot::Mutex;

/// Remembers the last admitted value and rejects an equal successor.
#[derive(Debug, Clone)]
pub struct Distinct<T> {
    last: Option<T>,
}

impl<T> Distinct<T>
where
    T: Clone + PartialEq,
{
    /// A filter that admits the first value it sees.
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Returns `true` if `value` differs from the previously admitted one.
    pub fn admit(&mut self, value: &T) -> bool {
        if self.last.as_ref() == Some(value) {
            return false;
        }
        self.last = Some(value.clone());
        true
    }

    /// Forget the last value, so the next one is admitted unconditionally.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl<T> Default for Distinct<T>
where
    T: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap `observer` so it only sees values that differ from the previous one.
pub fn distinct_until_changed<T, F>(observer: F) -> impl Fn(&T) + Send + Sync + 'static
where
    T: Clone + PartialEq + Send + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    let filter = Arc::new(Mutex::new(Distinct::new()));
    move |value: &T| {
        let admitted = filter.lock().admit(value);
        if admitted {
            observer(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::LiveValue;

    #[test]
    fn admits_changes_only() {
        let mut distinct = Distinct::new();
        assert!(distinct.admit(&"a"));
        assert!(!distinct.admit(&"a"));
        assert!(distinct.admit(&"b"));
        assert!(distinct.admit(&"a"));
    }

    #[test]
    fn reset_readmits() {
        let mut distinct = Distinct::new();
        assert!(distinct.admit(&1));
        distinct.reset();
        assert!(distinct.admit(&1));
    }

    #[test]
    fn same_value_twice_renders_once() {
        let value = LiveValue::new("Initial".to_string());
        let renders = Arc::new(Mutex::new(Vec::new()));
        let sink = renders.clone();

        let _sub = value.observe(distinct_until_changed(move |v: &String| {
            sink.lock().push(v.clone());
        }));

        value.set("0123".to_string());
        value.set("0123".to_string());
        value.set("Initial".to_string());

        assert_eq!(*renders.lock(), vec!["Initial", "0123", "Initial"]);
    }
}
