//! Tile cache layer.
//!
//! This module provides the tile objects handed to renderers and the cache
//! that sits between renderers and the active tile provider.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Renderer / HTTP Handlers          │
//! └────────────────────┬────────────────────┘
//!                      │ retrieve_tile(zoom, x, y, request_time)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TileCache                 │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  tile map    │  │  epoch fence    │  │
//! │  │  (TileKey →  │  │  (drops late    │  │
//! │  │   Arc<Tile>) │  │   completions)  │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             TileProvider                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCache`]: keyed tile map with provider hot-swap and epoch fencing
//! - [`TileKey`]: canonical `(zoom, x, y)` identity of a tile
//! - [`Tile`]: shared placeholder that the provider completes in place
//! - [`TileState`] / [`TileImage`]: load state and decoded payload
//! - [`CacheStats`]: counters exposed for monitoring

mod cache;
mod data;
mod key;

pub use cache::{now_millis, CacheStats, TileCache, TileReadyHandler};
pub use data::{Tile, TileImage, TileState};
pub use key::{ParseTileKeyError, TileKey};
