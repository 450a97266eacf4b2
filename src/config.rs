//! Configuration management for the globe tile cache server.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `GLOBE_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Environment Variables
//!
//! - `GLOBE_HOST` - Server bind address (default: 0.0.0.0)
//! - `GLOBE_PORT` - Server port (default: 3000)
//! - `GLOBE_S3_BUCKET` - Bucket holding the tile pyramid (required)
//! - `GLOBE_S3_PREFIX` - Key prefix of the tile pyramid inside the bucket
//! - `GLOBE_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `GLOBE_S3_REGION` - AWS region (default: us-east-1)
//! - `GLOBE_TILE_TEMPLATE` - Object key template (default: {z}/{x}/{y}.png)
//! - `GLOBE_MAX_ZOOM` - Highest zoom level served (default: 19)
//! - `GLOBE_CACHE_TILES` - Max tiles to keep, 0 for unbounded (default: 0)
//! - `GLOBE_READY_TIMEOUT_MS` - How long a request waits for a loading tile
//! - `GLOBE_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)

use std::num::NonZeroUsize;
use std::time::Duration;

use aws_sdk_s3::Client;
use clap::{Args, Parser, Subcommand};

use crate::error::ConfigError;
use crate::provider::{
    S3TileFetcher, S3TileProvider, TilePathTemplate, DEFAULT_MAX_ZOOM, DEFAULT_TILE_TEMPLATE,
};
use crate::tile::TileKey;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default number of cached tiles (0 = unbounded).
pub const DEFAULT_CACHE_TILES: usize = 0;

/// Default time a tile request waits for a loading tile, in milliseconds.
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 10_000;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Highest zoom level accepted in configuration.
pub const MAX_SUPPORTED_ZOOM: u32 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Globe tile cache - serves map tiles from S3 through an epoch-fenced cache.
#[derive(Parser, Debug, Clone)]
#[command(name = "globe-tile-cache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the tile server.
    Serve(ServeConfig),

    /// Check bucket connectivity and optionally fetch one tile.
    Check(CheckConfig),
}

// =============================================================================
// Serve Command
// =============================================================================

/// Options for `serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GLOBE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GLOBE_PORT")]
    pub port: u16,

    // =========================================================================
    // Tile Source Configuration
    // =========================================================================
    /// S3 bucket containing the tile pyramid.
    #[arg(long, env = "GLOBE_S3_BUCKET")]
    pub s3_bucket: String,

    /// Key prefix of the tile pyramid inside the bucket.
    #[arg(long, env = "GLOBE_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "GLOBE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "GLOBE_S3_REGION")]
    pub s3_region: String,

    /// Object key template with {z}, {x} and {y} or {-y} placeholders.
    #[arg(long, default_value = DEFAULT_TILE_TEMPLATE, env = "GLOBE_TILE_TEMPLATE")]
    pub tile_template: String,

    /// Highest zoom level served.
    #[arg(long, default_value_t = DEFAULT_MAX_ZOOM, env = "GLOBE_MAX_ZOOM")]
    pub max_zoom: u32,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of tiles to keep in the cache (0 = unbounded).
    #[arg(long, default_value_t = DEFAULT_CACHE_TILES, env = "GLOBE_CACHE_TILES")]
    pub cache_tiles: usize,

    /// How long a tile request waits for a loading tile, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_READY_TIMEOUT_MS, env = "GLOBE_READY_TIMEOUT_MS")]
    pub ready_timeout_ms: u64,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "GLOBE_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "GLOBE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.s3_bucket.is_empty() {
            return Err(
                "S3 bucket name is required. Set --s3-bucket or GLOBE_S3_BUCKET".to_string(),
            );
        }

        self.template().map_err(|e| e.to_string())?;

        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(format!("max_zoom must be at most {}", MAX_SUPPORTED_ZOOM));
        }

        if self.ready_timeout_ms == 0 || self.ready_timeout_ms > 300_000 {
            return Err("ready_timeout_ms must be between 1 and 300000".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Object key template rooted at the configured prefix.
    pub fn template(&self) -> Result<TilePathTemplate, ConfigError> {
        TilePathTemplate::new(self.tile_template.clone(), self.s3_prefix.as_deref())
    }

    /// Tile cache bound, `None` when unbounded.
    pub fn tile_capacity(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.cache_tiles)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Build an S3 provider for this bucket.
    ///
    /// Each override replaces the configured value when given. Must be
    /// called from within a tokio runtime.
    pub fn s3_provider(
        &self,
        client: Client,
        prefix: Option<&str>,
        template: Option<&str>,
        max_zoom: Option<u32>,
    ) -> Result<S3TileProvider, ConfigError> {
        let max_zoom = max_zoom.unwrap_or(self.max_zoom);
        if max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(ConfigError::Invalid(format!(
                "max_zoom must be at most {}",
                MAX_SUPPORTED_ZOOM
            )));
        }

        let prefix = prefix.or(self.s3_prefix.as_deref());
        let template = TilePathTemplate::new(template.unwrap_or(&self.tile_template), prefix)?;

        let name = match template.prefix() {
            Some(prefix) => format!("s3://{}/{}", self.s3_bucket, prefix),
            None => format!("s3://{}", self.s3_bucket),
        };
        let fetcher = S3TileFetcher::new(client, self.s3_bucket.clone());

        Ok(S3TileProvider::new(name, fetcher, template)?.with_max_zoom(max_zoom))
    }
}

// =============================================================================
// Check Command
// =============================================================================

/// Options for `check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// S3 bucket containing the tile pyramid.
    #[arg(long, env = "GLOBE_S3_BUCKET")]
    pub s3_bucket: String,

    /// Key prefix of the tile pyramid inside the bucket.
    #[arg(long, env = "GLOBE_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services.
    #[arg(long, env = "GLOBE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "GLOBE_S3_REGION")]
    pub s3_region: String,

    /// Object key template with {z}, {x} and {y} or {-y} placeholders.
    #[arg(long, default_value = DEFAULT_TILE_TEMPLATE, env = "GLOBE_TILE_TEMPLATE")]
    pub tile_template: String,

    /// Fetch and decode one tile, given as "zoom/x/y".
    #[arg(long)]
    pub test_tile: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    pub fn template(&self) -> Result<TilePathTemplate, ConfigError> {
        TilePathTemplate::new(self.tile_template.clone(), self.s3_prefix.as_deref())
    }

    /// Parse the `--test-tile` argument, if given.
    pub fn test_tile_key(&self) -> Result<Option<TileKey>, ConfigError> {
        self.test_tile
            .as_deref()
            .map(|s| {
                s.parse::<TileKey>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))
            })
            .transpose()
    }
}

// =============================================================================
// Tests
// =============================================================================
