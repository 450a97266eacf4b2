//! HTTP server layer.
//!
//! This module exposes the tile cache to remote renderers over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │       GET /tiles/{z}/{x}/{y}.png     PUT /provider              │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (requests, error maps)   │  │  (router config, CORS)      │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, provider_handler, stats_handler, tile_handler, AppState, ErrorResponse,
    HandlerError, HealthResponse, ProviderFactory, ProviderUpdate, TilePathParams,
};
pub use routes::{create_router, RouterConfig};
