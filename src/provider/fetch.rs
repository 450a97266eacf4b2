//! Generic fetch-based tile provider.
//!
//! [`FetchingTileProvider`] implements the [`TileProvider`] contract on top of
//! any [`TileFetcher`]: it creates the placeholder tile, spawns the fetch on a
//! tokio runtime, decodes the payload, completes the tile in place and then
//! reports it through the installed completion handler.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::decode::decode_tile_image;
use super::template::TilePathTemplate;
use super::{LoadedHandlerSlot, TileLoadedHandler, TileProvider};
use crate::error::{ConfigError, IoError, TileError};
use crate::tile::{Tile, TileKey};

/// Default maximum zoom level for fetched tile pyramids.
pub const DEFAULT_MAX_ZOOM: u32 = 19;

// =============================================================================
// TileFetcher Trait
// =============================================================================

/// Fetches raw tile payloads by object key.
///
/// This abstraction lets the provider work with different storage backends
/// (S3, in-memory fixtures, etc.) without being tied to one.
#[async_trait]
pub trait TileFetcher: Send + Sync + 'static {
    /// Fetch the payload stored under `object_key`.
    async fn fetch(&self, object_key: &str) -> Result<Bytes, IoError>;
}

// =============================================================================
// FetchingTileProvider
// =============================================================================

/// Tile provider that fetches payloads through a [`TileFetcher`].
pub struct FetchingTileProvider<F: TileFetcher> {
    name: String,
    fetcher: Arc<F>,
    template: TilePathTemplate,
    max_zoom: u32,
    handler: Arc<LoadedHandlerSlot>,
    runtime: Handle,
}

impl<F: TileFetcher> FetchingTileProvider<F> {
    /// Create a provider that spawns its fetches on the current tokio runtime.
    ///
    /// Fails if called outside a tokio runtime.
    pub fn new(
        name: impl Into<String>,
        fetcher: F,
        template: TilePathTemplate,
    ) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current()
            .map_err(|e| ConfigError::Invalid(format!("tile provider needs a tokio runtime: {}", e)))?;

        Ok(Self::with_runtime(name, fetcher, template, runtime))
    }

    /// Create a provider that spawns its fetches on the given runtime.
    pub fn with_runtime(
        name: impl Into<String>,
        fetcher: F,
        template: TilePathTemplate,
        runtime: Handle,
    ) -> Self {
        Self {
            name: name.into(),
            fetcher: Arc::new(fetcher),
            template,
            max_zoom: DEFAULT_MAX_ZOOM,
            handler: Arc::new(LoadedHandlerSlot::new()),
            runtime,
        }
    }

    /// Set the maximum zoom level reported to callers.
    pub fn with_max_zoom(mut self, max_zoom: u32) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn template(&self) -> &TilePathTemplate {
        &self.template
    }
}

impl<F: TileFetcher> TileProvider for FetchingTileProvider<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_zoom_level(&self) -> u32 {
        self.max_zoom
    }

    fn load_tile(&self, zoom: u32, x: i64, y: i64, request_time: u64) -> Arc<Tile> {
        let key = TileKey::new(zoom, x, y);
        let tile = Arc::new(Tile::new(key, request_time));
        let object_key = self.template.render(&key);

        debug!(provider = %self.name, tile = %key, object_key = %object_key, "Loading tile");

        let fetcher = Arc::clone(&self.fetcher);
        let handler = Arc::clone(&self.handler);
        let pending = Arc::clone(&tile);
        let provider = self.name.clone();

        self.runtime.spawn(async move {
            let outcome = match fetcher.fetch(&object_key).await {
                Ok(data) => decode_tile_image(data),
                Err(e) => Err(TileError::from(e)),
            };

            match &outcome {
                Ok(image) => debug!(
                    provider = %provider,
                    tile = %key,
                    bytes = image.data.len(),
                    "Tile loaded"
                ),
                Err(TileError::Io(IoError::NotFound(path))) => {
                    debug!(provider = %provider, tile = %key, "Tile not found: {}", path)
                }
                Err(e) => warn!(provider = %provider, tile = %key, "Tile load failed: {}", e),
            }

            pending.complete(outcome);
            handler.notify(pending);
        });

        tile
    }

    fn set_tile_loaded_handler(&self, handler: TileLoadedHandler) {
        self.handler.install(handler);
    }
}

// =============================================================================
// Tests
// =============================================================================
