use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::join_all;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use reelview::cache::{CacheConfig, CacheStore, ReadThrough, ResolveOptions};
use reelview::cache_key;
use serial_test::serial;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("upstream unavailable")]
struct Unavailable;

fn snapshotter() -> &'static Snapshotter {
    static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
    SNAPSHOTTER.get_or_init(|| {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .expect("debug metrics recorder should install in this test process");
        snapshotter
    })
}

/// Sum of every counter series named `name`, across label sets.
fn counter_total(name: &str) -> u64 {
    snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, _, _, _)| key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(count) => count,
            _ => 0,
        })
        .sum()
}

fn read_through(max_entries: usize) -> ReadThrough {
    let config = CacheConfig {
        enabled: true,
        max_entries,
    };
    ReadThrough::new(Arc::new(CacheStore::new(&config)), &config)
}

#[tokio::test(start_paused = true)]
#[serial]
async fn resolve_paths_emit_hit_miss_coalesce_and_evict() {
    snapshotter();
    let hits = counter_total("reelview_cache_hit_total");
    let misses = counter_total("reelview_cache_miss_total");
    let coalesced = counter_total("reelview_cache_coalesced_total");
    let evictions = counter_total("reelview_cache_evict_total");

    let cache = read_through(1);
    let calls = Arc::new(AtomicUsize::new(0));
    let options = ResolveOptions::default();
    let first = cache_key!["movies", "popular", 1];

    let waiters = join_all((0..3).map(|_| {
        let calls = Arc::clone(&calls);
        cache.resolve(&first, options, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, Unavailable>(1_u32)
        })
    }))
    .await;
    assert!(waiters.iter().all(Result::is_ok));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache
        .resolve(&first, options, || async { Ok::<_, Unavailable>(1_u32) })
        .await
        .expect("fresh hit");

    let second = cache_key!["movies", "popular", 2];
    cache
        .resolve(&second, options, || async { Ok::<_, Unavailable>(2_u32) })
        .await
        .expect("miss evicts first entry");

    assert_eq!(counter_total("reelview_cache_hit_total") - hits, 1);
    assert_eq!(counter_total("reelview_cache_miss_total") - misses, 4);
    assert_eq!(counter_total("reelview_cache_coalesced_total") - coalesced, 2);
    assert_eq!(counter_total("reelview_cache_evict_total") - evictions, 1);
}

#[tokio::test(start_paused = true)]
#[serial]
async fn failed_fetch_counts_a_refresh_failure() {
    snapshotter();
    let failures = counter_total("reelview_cache_refresh_failed_total");

    let cache = read_through(4);
    let key = cache_key!["search", "multi", "heat", 1];
    let result = cache
        .resolve(&key, ResolveOptions::default(), || async {
            Err::<u32, _>(Unavailable)
        })
        .await;

    assert!(result.is_err());
    assert_eq!(counter_total("reelview_cache_refresh_failed_total") - failures, 1);
}
