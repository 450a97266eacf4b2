//! # Globe Tile Cache
//!
//! An epoch-fenced tile cache sitting between a 3D globe renderer and a
//! pluggable tile provider.
//!
//! Renderers ask the cache for tiles by `(zoom, x, y)`. On a miss the cache
//! asks the active provider for a placeholder tile, stores it and hands it
//! back immediately; the provider completes the same tile in place later.
//! Swapping the provider clears the cache and advances an epoch so that
//! loads still in flight from the previous provider are ignored when they
//! land.
//!
//! ## Features
//!
//! - **Single load per key**: repeated requests share one in-flight tile
//! - **Provider hot swap**: late completions from replaced providers are dropped
//! - **S3 tile pyramids**: object-per-tile layouts described by path templates
//! - **HTTP surface**: Axum routes for tiles, statistics and provider swaps
//!
//! ## Architecture
//!
//! - [`tile`] - Tile objects and the tile cache
//! - [`provider`] - Provider contract and the S3-backed provider
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use globe_tile_cache::{create_s3_client, S3TileFetcher, S3TileProvider, TileCache, TilePathTemplate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = create_s3_client(None, "us-east-1").await;
//!     let fetcher = S3TileFetcher::new(client, "my-tiles".to_string());
//!     let provider = S3TileProvider::new("osm", fetcher, TilePathTemplate::default())?;
//!
//!     let cache = TileCache::new(Arc::new(provider));
//!     cache.set_on_tile_ready(|tile| println!("tile {} ready", tile.key()));
//!
//!     let tile = cache.retrieve_tile(3, 1, 2, globe_tile_cache::now_millis());
//!     let _state = tile.wait_ready().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, ServeConfig};
pub use error::{ConfigError, IoError, TileError};
pub use provider::{
    create_s3_client, decode_tile_image, FetchingTileProvider, LoadedHandlerSlot, S3TileFetcher,
    S3TileProvider, TileFetcher, TileLoadedHandler, TilePathTemplate, TileProvider,
    DEFAULT_MAX_ZOOM, DEFAULT_TILE_TEMPLATE,
};
pub use server::{
    create_router, AppState, ErrorResponse, HealthResponse, ProviderFactory, ProviderUpdate,
    RouterConfig,
};
pub use tile::{
    now_millis, CacheStats, ParseTileKeyError, Tile, TileCache, TileImage, TileKey,
    TileReadyHandler, TileState,
};
