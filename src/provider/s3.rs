//! S3-backed tile fetching.
//!
//! Tiles are stored as one object per tile in an S3 or S3-compatible bucket
//! (MinIO, GCS interop, etc.), laid out by a [`TilePathTemplate`](super::TilePathTemplate).

use async_trait::async_trait;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::fetch::{FetchingTileProvider, TileFetcher};
use crate::error::IoError;

/// Tile provider reading tile objects from S3.
pub type S3TileProvider = FetchingTileProvider<S3TileFetcher>;

/// S3-backed implementation of `TileFetcher`.
///
/// Each fetch is a single `GetObject` request for the rendered object key.
///
/// # Example
///
/// ```ignore
/// use globe_tile_cache::provider::{create_s3_client, S3TileFetcher, S3TileProvider, TilePathTemplate};
///
/// let client = create_s3_client(None, "us-east-1").await;
/// let fetcher = S3TileFetcher::new(client, "my-tiles".to_string());
/// let provider = S3TileProvider::new("osm", fetcher, TilePathTemplate::default())?;
/// ```
#[derive(Clone)]
pub struct S3TileFetcher {
    client: Client,
    bucket: String,
}

impl S3TileFetcher {
    /// Create a new fetcher for the given bucket.
    ///
    /// # Arguments
    /// * `client` - AWS S3 client to use for requests
    /// * `bucket` - S3 bucket name containing the tiles
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl TileFetcher for S3TileFetcher {
    async fn fetch(&self, object_key: &str) -> Result<Bytes, IoError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key)
            .send()
            .await
            .map_err(|e| {
                let location = format!("s3://{}/{}", self.bucket, object_key);

                let is_no_such_key = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if is_no_such_key {
                    return IoError::NotFound(location);
                }

                // Some S3-compatible services answer with a bare 404
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);
                if status_is_404 {
                    return IoError::NotFound(location);
                }

                IoError::S3(e.to_string())
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
            .into_bytes();

        Ok(data)
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
