//! Per-call resolve options.

use std::time::Duration;

const DEFAULT_FRESH_TTL: Duration = Duration::from_secs(5 * 60);

/// How long a resolved value may be served, and what to do on failure.
///
/// Passed on every `resolve` call; nothing here is global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Window after a successful fetch during which the value is served
    /// without contacting upstream. Defaults to five minutes.
    pub fresh_ttl: Duration,
    /// Extra window after `fresh_ttl` during which the old value is served
    /// while a background refresh runs. Defaults to zero.
    pub stale_ttl: Duration,
    /// Serve a previously stored value when a synchronous fetch fails.
    /// Off by default.
    pub fallback_to_cache: bool,
    /// Ignore any stored value and fetch. Concurrent callers still share
    /// one fetch.
    pub force_fresh: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            fresh_ttl: DEFAULT_FRESH_TTL,
            stale_ttl: Duration::ZERO,
            fallback_to_cache: false,
            force_fresh: false,
        }
    }
}

impl ResolveOptions {
    pub const fn new(fresh_ttl: Duration, stale_ttl: Duration) -> Self {
        Self {
            fresh_ttl,
            stale_ttl,
            fallback_to_cache: false,
            force_fresh: false,
        }
    }

    pub const fn with_fallback_to_cache(mut self) -> Self {
        self.fallback_to_cache = true;
        self
    }

    pub const fn with_force_fresh(mut self) -> Self {
        self.force_fresh = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let options = ResolveOptions::default();
        assert_eq!(options.fresh_ttl, Duration::from_secs(300));
        assert_eq!(options.stale_ttl, Duration::ZERO);
        assert!(!options.fallback_to_cache);
        assert!(!options.force_fresh);
    }

    #[test]
    fn builders_toggle_flags() {
        let options = ResolveOptions::new(Duration::from_secs(1), Duration::from_secs(2))
            .with_fallback_to_cache()
            .with_force_fresh();
        assert!(options.fallback_to_cache);
        assert!(options.force_fresh);
        assert_eq!(options.stale_ttl, Duration::from_secs(2));
    }
}
