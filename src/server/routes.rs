//! Router configuration for the tile cache server.
//!
//! # Route Structure
//!
//! ```text
//! /health                      - Health check
//! /tiles/{z}/{x}/{y}.png       - Tile endpoint
//! /stats                       - Cache statistics
//! /provider                    - Provider hot swap (PUT)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use globe_tile_cache::server::{create_router, RouterConfig};
//! use globe_tile_cache::TileCache;
//!
//! let cache = TileCache::new(provider);
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(cache, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    routing::{get, put},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, provider_handler, stats_handler, tile_handler, AppState, ProviderFactory,
};
use crate::tile::TileCache;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// How long tile requests wait for a pending load
    pub ready_timeout: Duration,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Factory used by `PUT /provider`; swaps answer 501 without one
    pub provider_factory: Option<ProviderFactory>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tile requests wait up to 10 seconds
    /// - Tracing is enabled
    /// - Provider swaps are disabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            ready_timeout: Duration::from_secs(10),
            enable_tracing: true,
            provider_factory: None,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Set how long tile requests wait for a pending load.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Enable `PUT /provider` using the given factory.
    pub fn with_provider_factory(mut self, factory: ProviderFactory) -> Self {
        self.provider_factory = Some(factory);
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `cache` - The tile cache serving every tile request
/// * `config` - Router configuration
pub fn create_router(cache: TileCache, config: RouterConfig) -> Router {
    let mut app_state = AppState::new(cache)
        .with_cache_max_age(config.cache_max_age)
        .with_ready_timeout(config.ready_timeout);
    if let Some(factory) = config.provider_factory.clone() {
        app_state = app_state.with_provider_factory(factory);
    }

    let cors = build_cors_layer(&config);

    // {filename} captures both "{y}" and "{y}.{ext}"
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/tiles/{z}/{x}/{filename}", get(tile_handler))
        .route("/stats", get(stats_handler))
        .route("/provider", put(provider_handler))
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        // No origins allowed
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
