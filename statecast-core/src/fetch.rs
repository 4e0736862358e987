//! Fetch Service
//!
//! Simulates a remote load: wait a fixed latency, then produce a random
//! four-digit code. The [`Fetcher`] trait is the seam; [`SimulatedFetcher`]
//! is the only production implementation, and tests plug in their own.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use rand::Rng;

use crate::error::FetchError;
use crate::reactive::ValueStore;

/// Default simulated latency.
pub const DEFAULT_FETCH_DELAY: Duration = Duration::from_secs(2);

/// Lowest and highest code a fetch can produce.
pub const CODE_RANGE: std::ops::RangeInclusive<u32> = 1..=1000;

/// A source of string values.
pub trait Fetcher: Send + Sync + 'static {
    /// Produce one value.
    fn load(&self) -> BoxFuture<'_, Result<String, FetchError>>;
}

/// Produce a random code in [`CODE_RANGE`], zero-padded to four characters.
pub fn random_code() -> String {
    let n = rand::thread_rng().gen_range(CODE_RANGE);
    format_code(n)
}

/// Zero-pad `n` on the left to four characters.
pub fn format_code(n: u32) -> String {
    format!("{n:04}")
}

/// A fetcher that sleeps for a fixed delay and never fails.
#[derive(Debug, Clone)]
pub struct SimulatedFetcher {
    delay: Duration,
}

impl SimulatedFetcher {
    /// A fetcher that answers after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// How long each load takes.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for SimulatedFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_DELAY)
    }
}

impl Fetcher for SimulatedFetcher {
    fn load(&self) -> BoxFuture<'_, Result<String, FetchError>> {
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;
            Ok(random_code())
        }
        .boxed()
    }
}

/// Cheap, cloneable front end over a shared [`Fetcher`].
#[derive(Clone)]
pub struct FetchService {
    fetcher: Arc<dyn Fetcher>,
}

impl FetchService {
    pub fn new<F: Fetcher>(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn from_arc(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Load one value.
    pub async fn load(&self) -> Result<String, FetchError> {
        let value = self.fetcher.load().await?;
        tracing::info!(value = %value, "fetched value");
        Ok(value)
    }

    /// Load one value and write it into `store`.
    ///
    /// On failure the store keeps its previous value.
    pub async fn refresh_into<S>(&self, store: &S) -> Result<(), FetchError>
    where
        S: ValueStore<String> + ?Sized,
    {
        let value = self.load().await?;
        store.set(value);
        Ok(())
    }
}

impl std::fmt::Debug for FetchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchService").finish_non_exhaustive()
    }
}
