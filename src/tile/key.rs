//! Tile addressing.
//!
//! A tile is addressed by `(zoom, x, y)`. The address is canonicalised into a
//! [`TileKey`], which is the sole identity used by the tile cache. Its string
//! form is `"{zoom}/{x}/{y}"` and parses back into the same key.

use std::fmt;
use std::str::FromStr;

/// Canonical key for a tile address.
///
/// Equal addresses always produce equal keys, and because every component is
/// kept verbatim, distinct addresses never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Zoom level (0 = whole world in one tile)
    pub zoom: u32,

    /// Tile column
    pub x: i64,

    /// Tile row
    pub y: i64,
}

impl TileKey {
    /// Derive the key for a tile address.
    #[inline]
    pub const fn new(zoom: u32, x: i64, y: i64) -> Self {
        Self { zoom, x, y }
    }

    /// Number of tiles along one axis at this key's zoom level.
    ///
    /// Saturates for zoom levels beyond what fits in an `i64`.
    pub fn tiles_per_axis(&self) -> i64 {
        if self.zoom >= 63 {
            i64::MAX
        } else {
            1i64 << self.zoom
        }
    }

    /// Row index counted from the bottom of the grid (TMS convention).
    ///
    /// Saturates instead of overflowing for rows far outside the grid.
    pub fn flipped_y(&self) -> i64 {
        (self.tiles_per_axis() - 1).saturating_sub(self.y)
    }

    /// Whether both column and row fall inside `0..tiles_per_axis()`.
    pub fn is_on_grid(&self) -> bool {
        let range = 0..self.tiles_per_axis();
        range.contains(&self.x) && range.contains(&self.y)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Error returned when a string is not a valid `"{zoom}/{x}/{y}"` key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid tile key: {0:?} (expected \"zoom/x/y\")")]
pub struct ParseTileKeyError(pub String);

impl FromStr for TileKey {
    type Err = ParseTileKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTileKeyError(s.to_string());

        let mut parts = s.split('/');
        let zoom = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let x = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let y = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;

        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Self { zoom, x, y })
    }
}
