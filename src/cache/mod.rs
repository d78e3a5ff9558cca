//! Reelview cache layer.
//!
//! Sits between the catalog service and the upstream metadata API:
//!
//! - **Key builder** (`keys`): deterministic keys from ordered parts
//! - **Store** (`store`): bounded LRU table of entries with fresh/stale windows
//! - **Read-through** (`read_through`): stale-while-revalidate resolution
//!   with one in-flight producer per key
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 100
//! ```
//!
//! Per-call freshness windows are passed as [`ResolveOptions`].

mod config;
mod entry;
mod keys;
mod lock;
mod policy;
mod read_through;
mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, CachedValue, Freshness};
pub use keys::{CacheKey, KEY_SEPARATOR, KeyPart, build_key};
pub use policy::ResolveOptions;
pub use read_through::{ReadThrough, ResolveError, SharedError};
pub use store::{CacheStore, WriteOutcome};

pub(crate) use read_through::{
    METRIC_CACHE_COALESCED_TOTAL, METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL,
    METRIC_CACHE_REFRESH_FAILED_TOTAL,
};
pub(crate) use store::METRIC_CACHE_EVICT_TOTAL;
