//! Bounded in-memory cache store.
//!
//! One instance per process, shared by reference. Entries are evicted in
//! least-recently-accessed order once `max_entries` is exceeded, whatever
//! their freshness.

use std::any::Any;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use super::config::CacheConfig;
use super::entry::{CacheEntry, CachedValue, Freshness};
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_EVICT_TOTAL: &str = "reelview_cache_evict_total";

/// Result of a guarded write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The entry was written; carries the key evicted to make room, if any.
    Written { evicted: Option<CacheKey> },
    /// A newer entry was already present; nothing changed.
    Superseded,
}

pub struct CacheStore {
    entries: RwLock<LruCache<CacheKey, CacheEntry>>,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
        }
    }

    pub fn capacity(&self) -> usize {
        rw_read(&self.entries, SOURCE, "capacity").cap().get()
    }

    /// Look up an entry, marking it as most recently accessed.
    ///
    /// Expired entries are returned as well; callers classify them.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        rw_write(&self.entries, SOURCE, "get").get(key).cloned()
    }

    /// Look up an entry without touching recency.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        rw_read(&self.entries, SOURCE, "peek").peek(key).cloned()
    }

    /// Store `value` under `key` with `created_at = now`.
    ///
    /// Returns the key evicted to stay within bounds, if any.
    pub fn set<V: Any + Send + Sync>(
        &self,
        key: CacheKey,
        value: V,
        fresh_ttl: Duration,
        stale_ttl: Duration,
    ) -> Option<CacheKey> {
        self.set_value(key, Arc::new(value), fresh_ttl, stale_ttl)
    }

    pub fn set_value(
        &self,
        key: CacheKey,
        value: CachedValue,
        fresh_ttl: Duration,
        stale_ttl: Duration,
    ) -> Option<CacheKey> {
        let entry = CacheEntry::new(value, Instant::now(), fresh_ttl, stale_ttl);
        let mut entries = rw_write(&self.entries, SOURCE, "set");
        insert_locked(&mut entries, key, entry)
    }

    /// Store `value` unless the current entry was created after `started_at`.
    ///
    /// Keeps a slow producer from overwriting data written by a producer
    /// that started later but finished first.
    pub fn set_if_current(
        &self,
        key: CacheKey,
        value: CachedValue,
        fresh_ttl: Duration,
        stale_ttl: Duration,
        started_at: Instant,
    ) -> WriteOutcome {
        let mut entries = rw_write(&self.entries, SOURCE, "set_if_current");
        if let Some(existing) = entries.peek(&key)
            && existing.created_at() > started_at
        {
            debug!(key = %key, "discarding superseded cache write");
            return WriteOutcome::Superseded;
        }

        let entry = CacheEntry::new(value, Instant::now(), fresh_ttl, stale_ttl);
        let evicted = insert_locked(&mut entries, key, entry);
        WriteOutcome::Written { evicted }
    }

    /// Remove an entry. Returns whether one was present.
    pub fn delete(&self, key: &CacheKey) -> bool {
        rw_write(&self.entries, SOURCE, "delete").pop(key).is_some()
    }

    /// Remove the entry for `key` only if it is expired at `now`.
    pub fn remove_if_expired(&self, key: &CacheKey, now: Instant) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "remove_if_expired");
        let expired = entries
            .peek(key)
            .is_some_and(|entry| entry.freshness_at(now) == Freshness::Expired);
        if expired {
            entries.pop(key);
        }
        expired
    }

    /// Current number of entries.
    pub fn size(&self) -> usize {
        rw_read(&self.entries, SOURCE, "size").len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }
}

fn insert_locked(
    entries: &mut LruCache<CacheKey, CacheEntry>,
    key: CacheKey,
    entry: CacheEntry,
) -> Option<CacheKey> {
    // `push` hands back the old pair on replacement too; only a different
    // key means something was evicted.
    match entries.push(key.clone(), entry) {
        Some((displaced, _)) if displaced != key => {
            counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
            debug!(evicted = %displaced, inserted = %key, "cache entry evicted");
            Some(displaced)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;
    use crate::cache_key;

    const FRESH: Duration = Duration::from_secs(60);
    const STALE: Duration = Duration::from_secs(600);

    fn store_with_limit(max_entries: usize) -> CacheStore {
        CacheStore::new(&CacheConfig {
            max_entries,
            ..Default::default()
        })
    }

    #[test]
    fn set_then_get_roundtrip() {
        let store = store_with_limit(4);
        let key = cache_key!["movies", "popular", 1];

        assert!(store.get(&key).is_none());
        store.set(key.clone(), "payload".to_string(), FRESH, STALE);

        let entry = store.get(&key).expect("cached entry");
        assert_eq!(
            entry.value_as::<String>().as_deref().map(String::as_str),
            Some("payload")
        );
        assert_eq!(entry.fresh_ttl(), FRESH);
        assert_eq!(entry.stale_ttl(), STALE);
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn overflow_evicts_exactly_the_least_recently_accessed_key() {
        let store = store_with_limit(3);
        let keys: Vec<CacheKey> = (1..=4).map(|n| cache_key!["k", n]).collect();

        for key in &keys[..3] {
            assert!(store.set(key.clone(), 0_u8, FRESH, STALE).is_none());
        }

        // Touch k:1 so k:2 becomes the least recently accessed.
        assert!(store.get(&keys[0]).is_some());

        let evicted = store.set(keys[3].clone(), 0_u8, FRESH, STALE);
        assert_eq!(evicted, Some(keys[1].clone()));
        assert_eq!(store.size(), 3);
        assert!(store.peek(&keys[1]).is_none());
        assert!(store.peek(&keys[0]).is_some());
    }

    #[test]
    fn overwrite_is_not_an_eviction() {
        let store = store_with_limit(1);
        let key = cache_key!["only"];
        store.set(key.clone(), 1_u8, FRESH, STALE);
        assert!(store.set(key.clone(), 2_u8, FRESH, STALE).is_none());
        assert_eq!(store.get(&key).and_then(|e| e.value_as::<u8>()).as_deref(), Some(&2));
    }

    #[test]
    fn peek_does_not_refresh_recency() {
        let store = store_with_limit(2);
        let a = cache_key!["a"];
        let b = cache_key!["b"];
        store.set(a.clone(), (), FRESH, STALE);
        store.set(b.clone(), (), FRESH, STALE);

        assert!(store.peek(&a).is_some());
        let evicted = store.set(cache_key!["c"], (), FRESH, STALE);
        assert_eq!(evicted, Some(a));
    }

    #[test]
    fn delete_removes_entry() {
        let store = store_with_limit(2);
        let key = cache_key!["gone"];
        store.set(key.clone(), (), FRESH, STALE);
        assert!(store.delete(&key));
        assert!(!store.delete(&key));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_current_discards_older_producers() {
        let store = store_with_limit(2);
        let key = cache_key!["race"];

        let slow_started = Instant::now();
        tokio::time::advance(Duration::from_millis(10)).await;
        store.set(key.clone(), "fast".to_string(), FRESH, STALE);
        tokio::time::advance(Duration::from_millis(10)).await;

        let outcome = store.set_if_current(
            key.clone(),
            Arc::new("slow".to_string()),
            FRESH,
            STALE,
            slow_started,
        );
        assert_eq!(outcome, WriteOutcome::Superseded);
        let current = store.get(&key).and_then(|e| e.value_as::<String>());
        assert_eq!(current.as_deref().map(String::as_str), Some("fast"));

        let outcome = store.set_if_current(
            key.clone(),
            Arc::new("newer".to_string()),
            FRESH,
            STALE,
            Instant::now(),
        );
        assert_eq!(outcome, WriteOutcome::Written { evicted: None });
    }

    #[tokio::test(start_paused = true)]
    async fn remove_if_expired_keeps_stale_entries() {
        let store = store_with_limit(2);
        let key = cache_key!["ttl"];
        store.set(
            key.clone(),
            (),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(!store.remove_if_expired(&key, Instant::now()));
        assert!(store.peek(&key).is_some());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(store.remove_if_expired(&key, Instant::now()));
        assert!(store.peek(&key).is_none());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = store_with_limit(2);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.set(cache_key!["after"], (), FRESH, STALE);
        assert_eq!(store.size(), 1);
    }
}
