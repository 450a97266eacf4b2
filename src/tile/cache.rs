//! Epoch-fenced tile cache.
//!
//! The cache maps [`TileKey`]s to shared [`Tile`] objects. A miss asks the
//! active [`TileProvider`] for a placeholder, stores it and returns it at
//! once; the provider fills the tile in later and reports completion back to
//! the cache, which forwards it to a single downstream subscriber.
//!
//! # Provider Swaps
//!
//! In-flight loads cannot be cancelled. Instead, every provider swap records
//! an epoch (the swap time in milliseconds) and clears the map. A completion
//! whose tile was requested before the current epoch belongs to a superseded
//! provider and is dropped without notifying anyone.
//!
//! # Capacity
//!
//! By default the map grows without bound. [`TileCache::with_capacity`]
//! bounds it and evicts the least recently requested tile on overflow;
//! [`TileCache::get_tile_from_cache`] never counts as a request.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, trace};

use super::data::Tile;
use super::key::TileKey;
use crate::provider::TileProvider;

/// Callback invoked for every accepted tile completion.
pub type TileReadyHandler = Arc<dyn Fn(Arc<Tile>) + Send + Sync>;

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of cache counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Name of the active provider
    pub provider: String,

    /// Number of tiles currently in the map
    pub entries: usize,

    /// Maximum number of tiles, if bounded
    pub capacity: Option<usize>,

    /// Current provider epoch (ms since the UNIX epoch)
    pub epoch: u64,

    /// Requests answered from the map
    pub hits: u64,

    /// Requests that issued a provider load
    pub misses: u64,

    /// Completions dropped because they predate the epoch
    pub stale_discards: u64,

    /// Completions forwarded to the ready handler
    pub ready_notifications: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_discards: AtomicU64,
    ready_notifications: AtomicU64,
}

// =============================================================================
// Tile Cache
// =============================================================================

/// Cache of tiles in front of a swappable tile provider.
///
/// Cloning is cheap and every clone refers to the same cache.
///
/// # Thread Safety
///
/// The map, the active provider and the epoch are updated together under a
/// single lock. No operation waits on I/O while holding it. The completion
/// path only reads the epoch, which is mirrored in an atomic, so providers
/// can report completions from any task.
///
/// # Example
///
/// ```ignore
/// use globe_tile_cache::tile::{now_millis, TileCache};
///
/// let cache = TileCache::new(provider);
/// cache.set_on_tile_ready(|tile| println!("ready: {}", tile.key()));
///
/// // Returns at once; the tile may still be loading
/// let tile = cache.retrieve_tile(3, 1, 2, now_millis());
/// let state = tile.wait_ready().await;
/// ```
#[derive(Clone)]
pub struct TileCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    state: Mutex<CacheState>,

    /// Mirror of the epoch for the completion path
    epoch: AtomicU64,

    on_tile_ready: RwLock<TileReadyHandler>,

    capacity: Option<NonZeroUsize>,

    counters: Counters,
}

struct CacheState {
    tiles: LruCache<TileKey, Arc<Tile>>,
    provider: Arc<dyn TileProvider>,
}

impl TileCache {
    /// Create an unbounded cache in front of `provider`.
    pub fn new(provider: Arc<dyn TileProvider>) -> Self {
        Self::build(provider, None)
    }

    /// Create a cache holding at most `max_tiles` tiles.
    pub fn with_capacity(provider: Arc<dyn TileProvider>, max_tiles: NonZeroUsize) -> Self {
        Self::build(provider, Some(max_tiles))
    }

    fn build(provider: Arc<dyn TileProvider>, capacity: Option<NonZeroUsize>) -> Self {
        let tiles = match capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };

        let cache = Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState {
                    tiles,
                    provider: Arc::clone(&provider),
                }),
                epoch: AtomicU64::new(0),
                on_tile_ready: RwLock::new(Arc::new(|_: Arc<Tile>| {})),
                capacity,
                counters: Counters::default(),
            }),
        };

        cache.set_tile_provider(provider);
        cache
    }

    /// Replace the tile provider.
    ///
    /// Bumps the epoch to now, routes the new provider's completions to this
    /// cache and drops every cached tile. Tiles already handed out stay
    /// valid but are no longer reachable through the cache, and completions
    /// for them are discarded.
    pub fn set_tile_provider(&self, provider: Arc<dyn TileProvider>) {
        let mut state = self.inner.state.lock();

        let epoch = self.inner.epoch.load(Ordering::Acquire).max(now_millis());
        self.inner.epoch.store(epoch, Ordering::Release);

        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        provider.set_tile_loaded_handler(Arc::new(move |tile: Arc<Tile>| {
            if let Some(inner) = weak.upgrade() {
                inner.tile_loaded(tile);
            }
        }));

        let dropped = state.tiles.len();
        state.tiles.clear();
        let previous = std::mem::replace(&mut state.provider, provider);

        info!(
            provider = state.provider.name(),
            previous = previous.name(),
            epoch,
            dropped,
            "Tile provider set"
        );
    }

    /// Look up a tile without loading it or touching its recency.
    pub fn get_tile_from_cache(&self, key: &TileKey) -> Option<Arc<Tile>> {
        self.inner.state.lock().tiles.peek(key).cloned()
    }

    /// Return the tile for `(zoom, x, y)`, loading it on a miss.
    ///
    /// On a hit the cached tile's request time is set to `request_time`. On
    /// a miss the provider's placeholder is stored and returned; it completes
    /// later. Either way the same tile object is returned for the same
    /// address until the cache is reset.
    pub fn retrieve_tile(&self, zoom: u32, x: i64, y: i64, request_time: u64) -> Arc<Tile> {
        let key = TileKey::new(zoom, x, y);
        let mut state = self.inner.state.lock();

        if let Some(tile) = state.tiles.get(&key) {
            tile.set_request_time(request_time);
            self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            trace!(tile = %key, request_time, "Tile cache hit");
            return Arc::clone(tile);
        }

        let tile = state.provider.load_tile(zoom, x, y, request_time);
        if let Some((evicted, _)) = state.tiles.push(key, Arc::clone(&tile)) {
            debug!(tile = %evicted, "Evicted tile");
        }
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            tile = %key,
            request_time,
            provider = state.provider.name(),
            "Tile cache miss, loading"
        );

        tile
    }

    /// Register the handler notified for every accepted completion.
    ///
    /// Replaces any previously registered handler.
    pub fn set_on_tile_ready<H>(&self, handler: H)
    where
        H: Fn(Arc<Tile>) + Send + Sync + 'static,
    {
        *self.inner.on_tile_ready.write() = Arc::new(handler);
    }

    /// The active provider.
    pub fn provider(&self) -> Arc<dyn TileProvider> {
        Arc::clone(&self.inner.state.lock().provider)
    }

    /// Current epoch in milliseconds since the UNIX epoch.
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().tiles.is_empty()
    }

    /// Maximum number of tiles, or `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity.map(NonZeroUsize::get)
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let (provider, entries) = {
            let state = self.inner.state.lock();
            (state.provider.name().to_string(), state.tiles.len())
        };
        let counters = &self.inner.counters;

        CacheStats {
            provider,
            entries,
            capacity: self.capacity(),
            epoch: self.epoch(),
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            stale_discards: counters.stale_discards.load(Ordering::Relaxed),
            ready_notifications: counters.ready_notifications.load(Ordering::Relaxed),
        }
    }
}

impl CacheInner {
    /// Completion path for tiles reported by a provider.
    fn tile_loaded(&self, tile: Arc<Tile>) {
        let epoch = self.epoch.load(Ordering::Acquire);
        let request_time = tile.request_time();

        // Late tile from a replaced provider
        if request_time < epoch {
            self.counters.stale_discards.fetch_add(1, Ordering::Relaxed);
            debug!(tile = %tile.key(), request_time, epoch, "Ignoring late tile");
            return;
        }

        self.counters
            .ready_notifications
            .fetch_add(1, Ordering::Relaxed);

        let handler = Arc::clone(&*self.on_tile_ready.read());
        handler(tile);
    }
}

impl fmt::Debug for TileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileCache")
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
