//! Tile cache integration tests.
//!
//! Tests verify:
//! - Repeated requests share one tile and one provider load
//! - Provider swaps clear the cache and drop late completions
//! - Completions after a swap reach the ready handler exactly once
//! - Concurrent requests don't cause duplicate loads
//! - Bounded caches evict the least recently requested tile

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use globe_tile_cache::error::{IoError, TileError};
use globe_tile_cache::provider::TileProvider;
use globe_tile_cache::tile::{now_millis, TileCache, TileKey, TileState};

use super::test_utils::{
    create_png_tile, memory_provider, next_ready, png_tile_image, ready_channel,
    ManualTileProvider, MemoryFetcher,
};

const QUIET: Duration = Duration::from_millis(100);
const WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// Hits and Misses
// =============================================================================

#[tokio::test]
async fn test_repeat_request_shares_tile_and_updates_request_time() {
    let provider = ManualTileProvider::new("manual");
    let cache = TileCache::new(provider.clone());

    let first = cache.retrieve_tile(3, 1, 2, 100);
    let second = cache.retrieve_tile(3, 1, 2, 150);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.request_time(), 150);
    assert_eq!(provider.calls(), vec![(3, 1, 2, 100)]);
}

#[tokio::test]
async fn test_lookup_does_not_load() {
    let provider = ManualTileProvider::new("manual");
    let cache = TileCache::new(provider.clone());

    assert!(cache.get_tile_from_cache(&TileKey::new(3, 1, 2)).is_none());
    assert_eq!(provider.load_count(), 0);

    let tile = cache.retrieve_tile(3, 1, 2, 100);
    let cached = cache.get_tile_from_cache(&TileKey::new(3, 1, 2)).unwrap();
    assert!(Arc::ptr_eq(&tile, &cached));
    assert_eq!(provider.load_count(), 1);
}

#[tokio::test]
async fn test_placeholder_completes_in_place() {
    let fetcher = MemoryFetcher::new().with_object("4/3/2.png", create_png_tile(8, 8));
    let cache = TileCache::new(Arc::new(memory_provider("memory", fetcher)));
    let mut rx = ready_channel(&cache);

    let tile = cache.retrieve_tile(4, 3, 2, now_millis());

    let ready = next_ready(&mut rx, WAIT).await.expect("tile never became ready");
    assert!(Arc::ptr_eq(&tile, &ready));

    let image = tile.image().expect("tile should be loaded");
    assert_eq!((image.width, image.height), (8, 8));
    assert_eq!(image.content_type, "image/png");
}

#[tokio::test]
async fn test_failed_load_still_notifies() {
    let cache = TileCache::new(Arc::new(memory_provider("memory", MemoryFetcher::new())));
    let mut rx = ready_channel(&cache);

    cache.retrieve_tile(2, 0, 0, now_millis());

    let ready = next_ready(&mut rx, WAIT).await.expect("no completion");
    assert!(matches!(
        ready.state(),
        TileState::Failed(TileError::Io(IoError::NotFound(_)))
    ));
}

// =============================================================================
// Provider Swaps
// =============================================================================

#[tokio::test]
async fn test_swap_clears_every_key() {
    let first = ManualTileProvider::new("first");
    let second = ManualTileProvider::new("second");
    let cache = TileCache::new(first.clone());

    let keys = [(1, 0, 0), (2, 1, 1), (3, 4, 5)];
    for (z, x, y) in keys {
        cache.retrieve_tile(z, x, y, now_millis());
    }
    assert_eq!(cache.len(), 3);

    cache.set_tile_provider(second.clone());

    assert!(cache.is_empty());
    for (z, x, y) in keys {
        assert!(cache.get_tile_from_cache(&TileKey::new(z, x, y)).is_none());
    }
    assert_eq!(cache.provider().name(), "second");

    // Same address now loads from the new provider
    cache.retrieve_tile(1, 0, 0, now_millis());
    assert_eq!(second.load_count(), 1);
    assert_eq!(first.load_count(), 3);
}

#[tokio::test]
async fn test_late_completion_from_replaced_provider_is_dropped() {
    let fetcher = MemoryFetcher::new()
        .with_object("3/1/2.png", create_png_tile(4, 4))
        .gated();
    let old = Arc::new(memory_provider("old", fetcher.clone()));
    let new = Arc::new(memory_provider("new", MemoryFetcher::new()));

    let cache = TileCache::new(old);
    let mut rx = ready_channel(&cache);

    let stale = cache.retrieve_tile(3, 1, 2, now_millis());

    // Make sure the swap lands in a later millisecond
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.set_tile_provider(new);
    assert!(stale.request_time() < cache.epoch());

    fetcher.release(1);

    // The old provider still fills the tile in place
    let state = tokio::time::timeout(WAIT, stale.wait_ready())
        .await
        .expect("old load never finished");
    assert!(matches!(state, TileState::Loaded(_)));

    assert!(next_ready(&mut rx, QUIET).await.is_none());
    assert!(cache.get_tile_from_cache(&TileKey::new(3, 1, 2)).is_none());
    assert_eq!(cache.stats().stale_discards, 1);
    assert_eq!(cache.stats().ready_notifications, 0);
}

#[tokio::test]
async fn test_completion_after_swap_notifies_once() {
    let old = ManualTileProvider::new("old");
    let new = ManualTileProvider::new("new");
    let cache = TileCache::new(old);
    let mut rx = ready_channel(&cache);

    cache.set_tile_provider(new.clone());
    let tile = cache.retrieve_tile(5, 10, 12, now_millis());
    new.complete(TileKey::new(5, 10, 12), Ok(png_tile_image()));

    let ready = next_ready(&mut rx, WAIT).await.expect("no notification");
    assert!(Arc::ptr_eq(&tile, &ready));
    assert!(next_ready(&mut rx, QUIET).await.is_none());
    assert_eq!(cache.stats().ready_notifications, 1);
}

#[tokio::test]
async fn test_shared_provider_notifies_latest_cache_only() {
    let provider = ManualTileProvider::new("shared");
    let first = TileCache::new(provider.clone());
    let mut first_rx = ready_channel(&first);

    let second = TileCache::new(provider.clone());
    let mut second_rx = ready_channel(&second);

    first.retrieve_tile(1, 1, 1, now_millis());
    provider.complete(TileKey::new(1, 1, 1), Ok(png_tile_image()));

    assert!(next_ready(&mut first_rx, QUIET).await.is_none());
    let ready = next_ready(&mut second_rx, WAIT).await.expect("second cache not notified");
    assert_eq!(ready.key(), TileKey::new(1, 1, 1));
}

#[tokio::test]
async fn test_epoch_never_decreases() {
    let cache = TileCache::new(ManualTileProvider::new("a"));
    let mut last = cache.epoch();

    for name in ["b", "c", "d"] {
        cache.set_tile_provider(ManualTileProvider::new(name));
        assert!(cache.epoch() >= last);
        last = cache.epoch();
    }
}

// =============================================================================
// Concurrent Request Handling
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_same_tile() {
    let fetcher = MemoryFetcher::new().with_object("6/20/30.png", create_png_tile(4, 4));
    let cache = TileCache::new(Arc::new(memory_provider("memory", fetcher.clone())));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.retrieve_tile(6, 20, 30, now_millis())
        }));
    }

    let mut tiles = Vec::new();
    for handle in handles {
        tiles.push(handle.await.unwrap());
    }

    for tile in &tiles[1..] {
        assert!(Arc::ptr_eq(&tiles[0], tile));
    }

    tokio::time::timeout(WAIT, tiles[0].wait_ready())
        .await
        .expect("tile never loaded");
    assert_eq!(fetcher.request_count(), 1);

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 31);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_different_tiles() {
    let mut fetcher = MemoryFetcher::new();
    for x in 0..8 {
        fetcher = fetcher.with_object(&format!("3/{}/0.png", x), create_png_tile(4, 4));
    }
    let cache = TileCache::new(Arc::new(memory_provider("memory", fetcher.clone())));
    let mut rx = ready_channel(&cache);

    let mut handles = Vec::new();
    for x in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.retrieve_tile(3, x, 0, now_millis())
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for _ in 0..8 {
        let tile = next_ready(&mut rx, WAIT).await.expect("missing notification");
        assert!(tile.image().is_some());
    }
    assert_eq!(cache.len(), 8);
    assert_eq!(fetcher.request_count(), 8);
}

// =============================================================================
// Cache Capacity
// =============================================================================

#[tokio::test]
async fn test_bounded_cache_evicts_least_recently_requested() {
    let provider = ManualTileProvider::new("manual");
    let cache = TileCache::with_capacity(provider.clone(), NonZeroUsize::new(2).unwrap());
    assert_eq!(cache.capacity(), Some(2));

    cache.retrieve_tile(1, 0, 0, 1);
    cache.retrieve_tile(1, 1, 0, 2);
    // Refresh the first tile so the second becomes the oldest
    cache.retrieve_tile(1, 0, 0, 3);
    cache.retrieve_tile(1, 1, 1, 4);

    assert_eq!(cache.len(), 2);
    assert!(cache.get_tile_from_cache(&TileKey::new(1, 0, 0)).is_some());
    assert!(cache.get_tile_from_cache(&TileKey::new(1, 1, 0)).is_none());
    assert!(cache.get_tile_from_cache(&TileKey::new(1, 1, 1)).is_some());

    // Evicted tiles load again
    cache.retrieve_tile(1, 1, 0, 5);
    assert_eq!(provider.load_count(), 4);
}

#[tokio::test]
async fn test_unbounded_by_default() {
    let provider = ManualTileProvider::new("manual");
    let cache = TileCache::new(provider.clone());
    assert_eq!(cache.capacity(), None);

    for x in 0..500 {
        cache.retrieve_tile(10, x, 0, 1);
    }
    assert_eq!(cache.len(), 500);
    assert_eq!(provider.complete_all(), 500);
}
