//! Read-through cache with stale-while-revalidate and request coalescing.
//!
//! `resolve` serves fresh entries directly, serves stale entries while a
//! background refresh runs, and otherwise waits on a fetch. At most one
//! producer runs per key at any time: later callers join the running one.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::entry::{CacheEntry, CachedValue, Freshness};
use super::keys::CacheKey;
use super::policy::ResolveOptions;
use super::store::{CacheStore, WriteOutcome};

pub(crate) const METRIC_CACHE_HIT_TOTAL: &str = "reelview_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS_TOTAL: &str = "reelview_cache_miss_total";
pub(crate) const METRIC_CACHE_COALESCED_TOTAL: &str = "reelview_cache_coalesced_total";
pub(crate) const METRIC_CACHE_REFRESH_FAILED_TOTAL: &str = "reelview_cache_refresh_failed_total";

/// A producer failure shared by every caller waiting on the same fetch.
#[derive(Clone)]
pub struct SharedError(Arc<dyn StdError + Send + Sync>);

impl SharedError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Access the producer's concrete error type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for SharedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("producer failed: {0}")]
    Produce(#[source] SharedError),
    #[error("producer panicked while refreshing `{key}`")]
    Panicked { key: CacheKey },
    #[error("cached value for `{key}` has an unexpected type")]
    TypeMismatch { key: CacheKey },
}

impl ResolveError {
    /// The producer's own error, if it failed with one of type `E`.
    pub fn producer_error<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            ResolveError::Produce(shared) => shared.downcast_ref::<E>(),
            _ => None,
        }
    }
}

type FlightOutput = Result<CachedValue, ResolveError>;
type FlightFuture = Shared<BoxFuture<'static, FlightOutput>>;

#[derive(Clone)]
struct Flight {
    id: u64,
    future: FlightFuture,
}

enum Joined<T> {
    Ready(Arc<T>),
    Waiting(FlightFuture),
}

pub struct ReadThrough {
    store: Arc<CacheStore>,
    enabled: bool,
    flights: Arc<DashMap<CacheKey, Flight>>,
    next_flight_id: AtomicU64,
}

impl ReadThrough {
    pub fn new(store: Arc<CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            enabled: config.enabled,
            flights: Arc::new(DashMap::new()),
            next_flight_id: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a producer for `key` is currently running.
    pub fn is_refreshing(&self, key: &CacheKey) -> bool {
        self.flights.contains_key(key)
    }

    /// Number of producers currently running.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Resolve `key`, invoking `produce` only when the cache cannot answer.
    ///
    /// * Fresh entry: returned as is.
    /// * Stale entry: returned as is; a background refresh starts unless one
    ///   is already running. Its failure is logged and dropped.
    /// * Expired or absent: waits on the running producer for `key`, or
    ///   starts one. A failure reaches every waiter and leaves no entry,
    ///   unless `options.fallback_to_cache` allows serving the old value.
    pub async fn resolve<T, F, Fut, E>(
        &self,
        key: &CacheKey,
        options: ResolveOptions,
        produce: F,
    ) -> Result<Arc<T>, ResolveError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        if !self.enabled {
            return produce()
                .await
                .map(Arc::new)
                .map_err(|err| ResolveError::Produce(SharedError::new(err)));
        }

        let previous = self.store.get(key);

        if !options.force_fresh
            && let Some(entry) = previous.as_ref()
        {
            let state = entry.freshness();
            if state != Freshness::Expired {
                match entry.value_as::<T>() {
                    Some(value) => {
                        counter!(METRIC_CACHE_HIT_TOTAL, "state" => state.as_str()).increment(1);
                        debug!(key = %key, state = state.as_str(), "cache hit");
                        if state == Freshness::Stale {
                            self.refresh_in_background(key, options, produce);
                        }
                        return Ok(value);
                    }
                    None => warn!(key = %key, "cached value has an unexpected type; refetching"),
                }
            }
        }

        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
        debug!(key = %key, force_fresh = options.force_fresh, "cache miss");

        let flight = match self.join_or_launch(key, options, produce) {
            Joined::Ready(value) => return Ok(value),
            Joined::Waiting(flight) => flight,
        };

        match flight.await {
            Ok(value) => value
                .downcast::<T>()
                .map_err(|_| ResolveError::TypeMismatch { key: key.clone() }),
            Err(err) => match fallback_value::<T>(options, previous.as_ref()) {
                Some(value) => {
                    warn!(key = %key, error = %err, "serving previously cached value after failed fetch");
                    Ok(value)
                }
                None => Err(err),
            },
        }
    }

    fn refresh_in_background<T, F, Fut, E>(&self, key: &CacheKey, options: ResolveOptions, produce: F)
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let driver = match self.flights.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!(key = %key, "refresh already in flight");
                None
            }
            // A refresh may have landed between the stale read and taking
            // the slot.
            Entry::Vacant(_) if self.is_fresh(key) => {
                debug!(key = %key, "entry refreshed concurrently; skipping refresh");
                None
            }
            Entry::Vacant(vacant) => {
                let flight = self.new_flight(key.clone(), options, produce);
                let driver = flight.future.clone();
                vacant.insert(flight);
                Some(driver)
            }
        };

        if let Some(driver) = driver {
            debug!(key = %key, "starting background refresh");
            tokio::spawn(driver);
        }
    }

    fn join_or_launch<T, F, Fut, E>(
        &self,
        key: &CacheKey,
        options: ResolveOptions,
        produce: F,
    ) -> Joined<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let (future, launched) = match self.flights.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                counter!(METRIC_CACHE_COALESCED_TOTAL).increment(1);
                debug!(key = %key, "joining in-flight fetch");
                (occupied.get().future.clone(), false)
            }
            Entry::Vacant(vacant) => {
                // A producer may have finished between our lookup and taking
                // the slot.
                if !options.force_fresh
                    && let Some(value) = self.servable::<T>(key)
                {
                    return Joined::Ready(value);
                }
                let flight = self.new_flight(key.clone(), options, produce);
                let future = flight.future.clone();
                vacant.insert(flight);
                (future, true)
            }
        };

        if launched {
            tokio::spawn(future.clone());
        }
        Joined::Waiting(future)
    }

    fn is_fresh(&self, key: &CacheKey) -> bool {
        self.store
            .peek(key)
            .is_some_and(|entry| entry.freshness() == Freshness::Fresh)
    }

    fn servable<T: Any + Send + Sync>(&self, key: &CacheKey) -> Option<Arc<T>> {
        self.store
            .peek(key)
            .filter(|entry| entry.freshness() != Freshness::Expired)
            .and_then(|entry| entry.value_as::<T>())
    }

    fn new_flight<T, F, Fut, E>(&self, key: CacheKey, options: ResolveOptions, produce: F) -> Flight
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let id = self.next_flight_id.fetch_add(1, Ordering::Relaxed);
        let started_at = Instant::now();
        let store = Arc::clone(&self.store);
        let flights = Arc::clone(&self.flights);

        let future = async move {
            let outcome = AssertUnwindSafe(async move { produce().await })
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(Ok(value)) => {
                    let value: CachedValue = Arc::new(value);
                    let write = store.set_if_current(
                        key.clone(),
                        Arc::clone(&value),
                        options.fresh_ttl,
                        options.stale_ttl,
                        started_at,
                    );
                    if write == WriteOutcome::Superseded {
                        debug!(key = %key, "refresh result superseded by a newer entry");
                    }
                    Ok(value)
                }
                Ok(Err(err)) => Err(ResolveError::Produce(SharedError::new(err))),
                Err(_) => Err(ResolveError::Panicked { key: key.clone() }),
            };

            if let Err(err) = &result {
                counter!(METRIC_CACHE_REFRESH_FAILED_TOTAL).increment(1);
                let removed_expired = store.remove_if_expired(&key, Instant::now());
                warn!(key = %key, error = %err, removed_expired, "cache refresh failed");
            }

            flights.remove_if(&key, |_, flight| flight.id == id);
            result
        }
        .boxed()
        .shared();

        Flight { id, future }
    }
}

fn fallback_value<T: Any + Send + Sync>(
    options: ResolveOptions,
    previous: Option<&CacheEntry>,
) -> Option<Arc<T>> {
    if !options.fallback_to_cache {
        return None;
    }
    previous.and_then(CacheEntry::value_as::<T>)
}
