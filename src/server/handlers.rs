//! HTTP request handlers for the tile cache API.
//!
//! # Endpoints
//!
//! - `GET /tiles/{z}/{x}/{y}.png` - Serve a tile through the cache
//! - `GET /stats` - Cache statistics
//! - `PUT /provider` - Swap the active tile provider
//! - `GET /health` - Health check endpoint

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, IoError, TileError};
use crate::provider::TileProvider;
use crate::tile::{now_millis, CacheStats, TileCache, TileKey, TileState};

const TILE_CACHE_HIT: &str = "x-tile-cache-hit";

/// Builds a replacement provider from a `PUT /provider` request.
pub type ProviderFactory =
    Arc<dyn Fn(ProviderUpdate) -> Result<Arc<dyn TileProvider>, ConfigError> + Send + Sync>;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile cache.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// The cache every tile request goes through
    pub cache: TileCache,

    /// How long a tile request waits for a pending load
    pub ready_timeout: Duration,

    /// Default cache control max-age in seconds (defaults to 1 hour)
    pub cache_max_age: u32,

    /// Builds providers for hot swaps; swaps are rejected without one
    pub provider_factory: Option<ProviderFactory>,
}

impl AppState {
    /// Create a new application state around the given cache.
    pub fn new(cache: TileCache) -> Self {
        Self {
            cache,
            ready_timeout: Duration::from_secs(10),
            cache_max_age: 3600,
            provider_factory: None,
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_provider_factory(mut self, factory: ProviderFactory) -> Self {
        self.provider_factory = Some(factory);
        self
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/tiles/{z}/{x}/{filename}`
/// where filename is `{y}` or `{y}.{ext}`
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    /// Zoom level
    pub z: u32,

    /// Tile column
    pub x: i64,

    /// Tile row with optional extension (e.g., "3" or "3.png")
    pub filename: String,
}

impl TilePathParams {
    /// Parse the Y coordinate from the filename, stripping any extension.
    pub fn y(&self) -> Result<i64, std::num::ParseIntError> {
        let y_str = match self.filename.split_once('.') {
            Some((y, _ext)) => y,
            None => &self.filename,
        };
        y_str.parse()
    }
}

/// Body of a `PUT /provider` request.
///
/// Omitted fields fall back to the values the server was started with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderUpdate {
    /// Key prefix inside the bucket
    #[serde(default)]
    pub prefix: Option<String>,

    /// Object key template (e.g. `{z}/{x}/{y}.png`)
    #[serde(default)]
    pub template: Option<String>,

    /// Maximum zoom level served by the new provider
    #[serde(default)]
    pub max_zoom: Option<u32>,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
///
/// 5xx errors are logged at ERROR level, 404s at DEBUG and other client
/// errors at WARN.
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            TileError::Io(IoError::NotFound(path)) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Tile not found: {}", path),
            ),
            TileError::Io(IoError::S3(msg)) => (
                StatusCode::BAD_GATEWAY,
                "storage_error",
                format!("Storage error: {}", msg),
            ),
            TileError::Io(IoError::Connection(msg)) => (
                StatusCode::BAD_GATEWAY,
                "connection_error",
                format!("Connection error: {}", msg),
            ),

            TileError::InvalidAddress { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_address", self.to_string())
            }
            TileError::ZoomOutOfRange { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_zoom", self.to_string())
            }

            TileError::DecodeError { .. } => {
                (StatusCode::BAD_GATEWAY, "decode_error", self.to_string())
            }

            TileError::NotReady { .. } => {
                (StatusCode::GATEWAY_TIMEOUT, "not_ready", self.to_string())
            }
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

/// Convert ConfigError to HTTP response (always 400).
impl IntoResponse for ConfigError {
    fn into_response(self) -> Response {
        let status = StatusCode::BAD_REQUEST;
        let message = self.to_string();

        warn!(
            error_type = "invalid_provider",
            status = status.as_u16(),
            "Client error: {}",
            message
        );

        let error_response = ErrorResponse::with_status("invalid_provider", message, status);
        (status, Json(error_response)).into_response()
    }
}

/// Wrapper for handler errors to implement IntoResponse.
pub struct HandlerError(pub TileError);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

impl From<TileError> for HandlerError {
    fn from(err: TileError) -> Self {
        HandlerError(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /tiles/{z}/{x}/{y}.png`
///
/// The tile is retrieved through the cache with the current time as its
/// request time. A pending load is awaited for at most the configured ready
/// timeout.
///
/// # Response Headers
///
/// - `Content-Type`: MIME type of the stored payload
/// - `Cache-Control`: `public, max-age={cache_max_age}`
/// - `X-Tile-Cache-Hit`: `true` if the tile was already cached
///
/// # Errors
///
/// - `400 Bad Request`: Unparseable row, address off the zoom level's grid,
///   or zoom above the provider's maximum
/// - `404 Not Found`: The provider has no tile at this address
/// - `502 Bad Gateway`: The load failed
/// - `504 Gateway Timeout`: The load did not finish in time
pub async fn tile_handler(
    State(state): State<AppState>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, HandlerError> {
    let y = params.y().map_err(|_| TileError::InvalidAddress {
        address: format!("{}/{}/{}", params.z, params.x, params.filename),
    })?;

    let max_zoom = state.cache.provider().max_zoom_level();
    if params.z > max_zoom {
        return Err(TileError::ZoomOutOfRange {
            zoom: params.z,
            max_zoom,
        }
        .into());
    }

    let key = TileKey::new(params.z, params.x, y);
    if !key.is_on_grid() {
        return Err(TileError::InvalidAddress {
            address: key.to_string(),
        }
        .into());
    }

    let cache_hit = state.cache.get_tile_from_cache(&key).is_some();
    let tile = state.cache.retrieve_tile(key.zoom, key.x, key.y, now_millis());

    let ready = tokio::time::timeout(state.ready_timeout, tile.wait_ready())
        .await
        .map_err(|_| TileError::NotReady {
            key: key.to_string(),
        })?;

    let image = match ready {
        TileState::Loaded(image) => image,
        TileState::Failed(e) => return Err(e.into()),
        // wait_ready only returns complete states
        TileState::Loading => {
            return Err(TileError::NotReady {
                key: key.to_string(),
            }
            .into())
        }
    };

    let headers = [
        (header::CONTENT_TYPE, image.content_type.to_string()),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        ),
        (HeaderName::from_static(TILE_CACHE_HIT), cache_hit.to_string()),
    ];

    Ok((StatusCode::OK, headers, image.data).into_response())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle cache statistics requests.
///
/// `GET /stats` returns [`CacheStats`] as JSON.
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// Handle provider swap requests.
///
/// # Endpoint
///
/// `PUT /provider`
///
/// # Request Body
///
/// ```json
/// {
///   "prefix": "osm-2024",
///   "template": "{z}/{x}/{y}.png",
///   "max_zoom": 17
/// }
/// ```
///
/// All fields are optional. On success the cache is reset onto the new
/// provider and the fresh statistics are returned.
///
/// # Errors
///
/// - `400 Bad Request`: The factory rejected the update
/// - `501 Not Implemented`: The server was started without a provider factory
pub async fn provider_handler(
    State(state): State<AppState>,
    Json(update): Json<ProviderUpdate>,
) -> Response {
    let Some(factory) = state.provider_factory.as_ref() else {
        let status = StatusCode::NOT_IMPLEMENTED;
        let error_response = ErrorResponse::with_status(
            "not_supported",
            "Provider swaps are not enabled on this server",
            status,
        );
        return (status, Json(error_response)).into_response();
    };

    let provider = match factory(update) {
        Ok(provider) => provider,
        Err(e) => return e.into_response(),
    };

    info!(provider = provider.name(), "Swapping tile provider");
    state.cache.set_tile_provider(provider);

    Json(state.cache.stats()).into_response()
}

// =============================================================================
// Tests
// =============================================================================
