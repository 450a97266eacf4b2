//! Shared tile objects.
//!
//! A [`Tile`] is created by a provider as a placeholder in the `Loading`
//! state, handed to the cache and its consumers behind an `Arc`, and later
//! completed in place by the same provider. Consumers that asked before the
//! data existed observe the data through the same object, either by polling
//! [`Tile::state`] or by awaiting [`Tile::wait_ready`].

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::watch;

use super::key::TileKey;
use crate::error::TileError;

/// Decoded tile payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileImage {
    /// Encoded payload as fetched from the source
    pub data: Bytes,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// MIME type of `data`
    pub content_type: &'static str,
}

/// Load state of a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileState {
    /// The provider has not finished the load yet
    Loading,

    /// The payload is available
    Loaded(TileImage),

    /// The load finished with an error
    Failed(TileError),
}

impl TileState {
    /// Whether the load has finished, successfully or not.
    pub fn is_complete(&self) -> bool {
        !matches!(self, TileState::Loading)
    }
}

/// A tile shared between the cache, its consumers and the loading provider.
///
/// Only two things ever change on a tile: the request time, rewritten by the
/// cache on every hit, and the load state, moved once out of `Loading` by the
/// provider.
#[derive(Debug)]
pub struct Tile {
    key: TileKey,
    request_time: AtomicU64,
    state: watch::Sender<TileState>,
}

impl Tile {
    /// Create a placeholder tile in the `Loading` state.
    pub fn new(key: TileKey, request_time: u64) -> Self {
        let (state, _) = watch::channel(TileState::Loading);
        Self {
            key,
            request_time: AtomicU64::new(request_time),
            state,
        }
    }

    /// The key this tile was created for.
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Timestamp (ms) of the most recent request for this tile.
    pub fn request_time(&self) -> u64 {
        self.request_time.load(Ordering::Acquire)
    }

    /// Record a newer request for this tile.
    pub fn set_request_time(&self, request_time: u64) {
        self.request_time.store(request_time, Ordering::Release);
    }

    /// Snapshot of the current load state.
    pub fn state(&self) -> TileState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        !self.state.borrow().is_complete()
    }

    /// The payload, if the tile has loaded.
    pub fn image(&self) -> Option<TileImage> {
        match &*self.state.borrow() {
            TileState::Loaded(image) => Some(image.clone()),
            _ => None,
        }
    }

    /// Finish the load with the given outcome.
    ///
    /// Only the first call has an effect; it returns `false` if the tile had
    /// already completed.
    pub fn complete(&self, outcome: Result<TileImage, TileError>) -> bool {
        let next = match outcome {
            Ok(image) => TileState::Loaded(image),
            Err(e) => TileState::Failed(e),
        };

        let mut next = Some(next);
        self.state.send_if_modified(|state| {
            if state.is_complete() {
                return false;
            }
            if let Some(next) = next.take() {
                *state = next;
            }
            true
        })
    }

    /// Wait until the provider finishes the load and return the final state.
    ///
    /// Resolves immediately if the tile is already complete. A tile whose
    /// provider never calls back never resolves; callers bound this with a
    /// timeout.
    pub async fn wait_ready(&self) -> TileState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(TileState::is_complete).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }
}
