//! Test utilities for integration tests.
//!
//! This module provides mock providers and fetchers plus helpers for creating
//! tile payloads.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use globe_tile_cache::error::{IoError, TileError};
use globe_tile_cache::provider::{
    FetchingTileProvider, LoadedHandlerSlot, TileFetcher, TileLoadedHandler, TilePathTemplate,
    TileProvider,
};
use globe_tile_cache::tile::{Tile, TileCache, TileImage, TileKey};

// =============================================================================
// In-Memory Fetcher
// =============================================================================

/// Fetcher serving objects from memory and tracking every request.
///
/// A gated fetcher holds every fetch until [`MemoryFetcher::release`] is
/// called, which lets tests decide when loads complete.
pub struct MemoryFetcher {
    objects: Arc<HashMap<String, Bytes>>,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(HashMap::new()),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// Store an object under `key`.
    pub fn with_object(mut self, key: &str, data: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.objects).insert(key.to_string(), Bytes::from(data));
        self
    }

    /// Hold fetches until released.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` held fetches proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl Clone for MemoryFetcher {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
            gate: self.gate.clone(),
        }
    }
}

#[async_trait]
impl TileFetcher for MemoryFetcher {
    async fn fetch(&self, object_key: &str) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(object_key.to_string());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| IoError::Connection(e.to_string()))?
                .forget();
        }

        self.objects
            .get(object_key)
            .cloned()
            .ok_or_else(|| IoError::NotFound(format!("memory://{}", object_key)))
    }
}

/// Provider fetching from a [`MemoryFetcher`] with the default `{z}/{x}/{y}.png` layout.
pub fn memory_provider(
    name: &str,
    fetcher: MemoryFetcher,
) -> FetchingTileProvider<MemoryFetcher> {
    FetchingTileProvider::new(name, fetcher, TilePathTemplate::default())
        .expect("tests run inside a tokio runtime")
}

// =============================================================================
// Manual Provider
// =============================================================================

/// Provider whose loads complete only when a test says so.
pub struct ManualTileProvider {
    name: String,
    max_zoom: u32,
    slot: LoadedHandlerSlot,
    calls: Mutex<Vec<(u32, i64, i64, u64)>>,
    pending: Mutex<Vec<Arc<Tile>>>,
}

impl ManualTileProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            max_zoom: 19,
            slot: LoadedHandlerSlot::new(),
            calls: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Every `load_tile` call, in order.
    pub fn calls(&self) -> Vec<(u32, i64, i64, u64)> {
        self.calls.lock().clone()
    }

    pub fn load_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Finish the pending load for `key` and report it.
    ///
    /// Returns the completed tile, or `None` if no load is pending for `key`.
    pub fn complete(
        &self,
        key: TileKey,
        outcome: Result<TileImage, TileError>,
    ) -> Option<Arc<Tile>> {
        let tile = {
            let mut pending = self.pending.lock();
            let index = pending.iter().position(|t| t.key() == key)?;
            pending.remove(index)
        };

        tile.complete(outcome);
        self.slot.notify(Arc::clone(&tile));
        Some(tile)
    }

    /// Finish every pending load with a small PNG.
    pub fn complete_all(&self) -> usize {
        let tiles: Vec<_> = self.pending.lock().drain(..).collect();
        for tile in &tiles {
            tile.complete(Ok(png_tile_image()));
            self.slot.notify(Arc::clone(tile));
        }
        tiles.len()
    }
}

impl TileProvider for ManualTileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_zoom_level(&self) -> u32 {
        self.max_zoom
    }

    fn load_tile(&self, zoom: u32, x: i64, y: i64, request_time: u64) -> Arc<Tile> {
        self.calls.lock().push((zoom, x, y, request_time));
        let tile = Arc::new(Tile::new(TileKey::new(zoom, x, y), request_time));
        self.pending.lock().push(Arc::clone(&tile));
        tile
    }

    fn set_tile_loaded_handler(&self, handler: TileLoadedHandler) {
        self.slot.install(handler);
    }
}

// =============================================================================
// Ready Notifications
// =============================================================================

/// Route the cache's ready notifications into a channel.
pub fn ready_channel(cache: &TileCache) -> mpsc::UnboundedReceiver<Arc<Tile>> {
    let (tx, rx) = mpsc::unbounded_channel();
    cache.set_on_tile_ready(move |tile| {
        let _ = tx.send(tile);
    });
    rx
}

/// Next ready notification, or `None` if none arrives within `wait`.
pub async fn next_ready(
    rx: &mut mpsc::UnboundedReceiver<Arc<Tile>>,
    wait: Duration,
) -> Option<Arc<Tile>> {
    tokio::time::timeout(wait, rx.recv()).await.ok().flatten()
}

// =============================================================================
// Tile Payloads
// =============================================================================

/// Create a small RGB PNG payload.
pub fn create_png_tile(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 8) as u8, (y * 8) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Create a small grayscale JPEG payload.
pub fn create_jpeg_tile() -> Vec<u8> {
    let img = GrayImage::from_fn(16, 16, |x, y| Luma([((x + y) * 8) as u8]));
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 85);
    encoder.encode_image(&img).unwrap();
    buf
}

/// A decoded 4x4 PNG tile image.
pub fn png_tile_image() -> TileImage {
    TileImage {
        data: Bytes::from(create_png_tile(4, 4)),
        width: 4,
        height: 4,
        content_type: "image/png",
    }
}

/// Check if data starts with the PNG signature.
pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
}
