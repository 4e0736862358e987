//! Statecast Core
//!
//! This crate contrasts two ways of propagating a single piece of state to a
//! display:
//!
//! - A replaying live value: the latest value is pushed to every observer,
//!   immediately on attach and on each write, for as long as the owner lives.
//! - A duty-cycled shared state: the latest value of an upstream producer
//!   that runs only while observed, idles after a grace period without
//!   observers, and restarts on the next attach.
//!
//! A [`PresentationController`](controller::PresentationController) wires one
//! of each to a simulated remote source, and persists what it fetched so a
//! restarted process does not fetch it again.
//!
//! # Architecture
//!
//! - `reactive`: the value stores, the activation gate, subscriptions
//! - `fetch`: the simulated remote source
//! - `snapshot`: the key/value persistence port and its backends
//! - `controller`: the screen controller and its two tracks
//! - `config`: tunables loaded from JSON
//! - `error`: error types
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use statecast_core::config::Config;
//! use statecast_core::controller::PresentationController;
//! use statecast_core::fetch::{FetchService, SimulatedFetcher};
//! use statecast_core::reactive::distinct_until_changed;
//! use statecast_core::snapshot::MemorySnapshot;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), statecast_core::error::Error> {
//! let config = Config::default();
//! let controller = PresentationController::new(
//!     &config,
//!     FetchService::new(SimulatedFetcher::new(config.fetch_delay())),
//!     Arc::new(MemorySnapshot::new()),
//! )?;
//!
//! let _button = controller
//!     .triggered_live()
//!     .observe(distinct_until_changed(|v: &String| println!("live: {v}")));
//!
//! controller.trigger_live();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod reactive;
pub mod snapshot;

pub use controller::{PresentationController, Track, TrackPhase};
pub use error::{Error, Result};
