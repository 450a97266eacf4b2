//! Tile providers.
//!
//! A provider turns a tile address into a [`Tile`]: it hands back a
//! placeholder synchronously, fetches the payload in the background and
//! reports the finished tile through a single completion handler slot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                TileCache                │
//! └───────────┬─────────────────▲───────────┘
//!   load_tile │                 │ completion handler
//!             ▼                 │
//! ┌─────────────────────────────┴───────────┐
//! │           TileProvider Trait            │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │  FetchingTileProvider<F: TileFetcher>   │
//! │  (spawns fetch, decodes, completes)     │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   S3TileFetcher (GetObject per tile)    │
//! └─────────────────────────────────────────┘
//! ```

mod decode;
mod fetch;
mod s3;
mod template;

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::tile::Tile;

pub use decode::decode_tile_image;
pub use fetch::{FetchingTileProvider, TileFetcher, DEFAULT_MAX_ZOOM};
pub use s3::{create_s3_client, S3TileFetcher, S3TileProvider};
pub use template::{TilePathTemplate, DEFAULT_TILE_TEMPLATE};

/// Callback a provider invokes once per finished load.
pub type TileLoadedHandler = Arc<dyn Fn(Arc<Tile>) + Send + Sync>;

// =============================================================================
// TileProvider Trait
// =============================================================================

/// Source of tiles for the tile cache.
///
/// Implementations must uphold the following contract:
///
/// - [`load_tile`](TileProvider::load_tile) returns immediately with a tile
///   in the `Loading` state and starts fetching out of band.
/// - Every `load_tile` call eventually results in exactly one invocation of
///   the installed handler with that tile, unless the load never finishes.
/// - The handler is never invoked from inside `load_tile` itself.
/// - Only the most recently installed handler receives completions.
pub trait TileProvider: Send + Sync {
    /// Short name used in logs and statistics.
    fn name(&self) -> &str;

    /// Highest zoom level this provider serves.
    fn max_zoom_level(&self) -> u32;

    /// Begin loading a tile and return its placeholder.
    fn load_tile(&self, zoom: u32, x: i64, y: i64, request_time: u64) -> Arc<Tile>;

    /// Install the completion handler, replacing any previous one.
    fn set_tile_loaded_handler(&self, handler: TileLoadedHandler);
}

// =============================================================================
// LoadedHandlerSlot
// =============================================================================

/// Single-subscriber slot for a provider's completion handler.
///
/// Providers embed one of these to implement
/// [`TileProvider::set_tile_loaded_handler`]. Installing a handler replaces
/// the previous one, so only the latest subscriber is live.
#[derive(Default)]
pub struct LoadedHandlerSlot {
    handler: RwLock<Option<TileLoadedHandler>>,
}

impl LoadedHandlerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the installed handler.
    pub fn install(&self, handler: TileLoadedHandler) {
        *self.handler.write() = Some(handler);
    }

    pub fn is_installed(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Deliver a finished tile to the installed handler.
    ///
    /// Returns `false` if no handler is installed. The lock is released
    /// before the handler runs, so handlers may reinstall themselves.
    pub fn notify(&self, tile: Arc<Tile>) -> bool {
        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => {
                handler(tile);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for LoadedHandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedHandlerSlot")
            .field("installed", &self.is_installed())
            .finish()
    }
}
