//! Cache entries and their freshness lifecycle.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Type-erased cached payload.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Lifecycle state of an entry at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `now < created_at + fresh_ttl`
    Fresh,
    /// Past the fresh window, inside the stale window.
    Stale,
    /// Past both windows; equivalent to an absent entry.
    Expired,
}

impl Freshness {
    pub fn as_str(self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
            Freshness::Expired => "expired",
        }
    }
}

/// A stored value together with the timing data needed to classify it.
#[derive(Clone)]
pub struct CacheEntry {
    value: CachedValue,
    created_at: Instant,
    fresh_ttl: Duration,
    stale_ttl: Duration,
}

impl CacheEntry {
    pub(crate) fn new(
        value: CachedValue,
        created_at: Instant,
        fresh_ttl: Duration,
        stale_ttl: Duration,
    ) -> Self {
        Self {
            value,
            created_at,
            fresh_ttl,
            stale_ttl,
        }
    }

    pub fn value(&self) -> &CachedValue {
        &self.value
    }

    /// Downcast the payload to `T`, or `None` if it holds another type.
    pub fn value_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn fresh_ttl(&self) -> Duration {
        self.fresh_ttl
    }

    pub fn stale_ttl(&self) -> Duration {
        self.stale_ttl
    }

    pub fn fresh_until(&self) -> Instant {
        self.created_at + self.fresh_ttl
    }

    pub fn stale_until(&self) -> Instant {
        self.fresh_until() + self.stale_ttl
    }

    pub fn freshness_at(&self, now: Instant) -> Freshness {
        if now < self.fresh_until() {
            Freshness::Fresh
        } else if now < self.stale_until() {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness_at(Instant::now())
    }

    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("created_at", &self.created_at)
            .field("fresh_ttl", &self.fresh_ttl)
            .field("stale_ttl", &self.stale_ttl)
            .finish_non_exhaustive()
    }
}
