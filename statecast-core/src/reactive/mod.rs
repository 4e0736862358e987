//! Reactive Value Stores
//!
//! This module implements the two single-slot value stores and the pieces
//! they share.
//!
//! # Concepts
//!
//! ## Live values
//!
//! A [`LiveValue`] holds the latest value and pushes it synchronously to
//! every observer: once on attach, then on each `set`. It never stops; it
//! lives as long as its owner does.
//!
//! ## Shared state
//!
//! A [`SharedState`] holds the latest value produced by an upstream task.
//! The upstream runs only while someone observes. After the last observer
//! leaves it lingers for a grace period, then stops; the next observer gets
//! the cached value replayed and a freshly started upstream. A
//! [`StateCell`] is the writable always-latest cell that usually feeds one.
//!
//! ## Duplicate suppression
//!
//! Neither store deduplicates. Observers that only care about changes wrap
//! their callback with [`distinct_until_changed`].

mod cell;
mod distinct;
mod gate;
mod live;
mod shared;
mod store;
mod subscriber;

pub use cell::StateCell;
pub use distinct::{distinct_until_changed, Distinct};
pub use gate::{Activation, ActivationGate, IdleTicket, Release};
pub use live::LiveValue;
pub use shared::{Emitter, SharedState, StateReceiver};
pub use store::{Observer, ValueStore};
pub use subscriber::{SubscriberId, Subscription};
