//! Tile payload decoding.
//!
//! Fetched payloads are decoded once so that corrupt or truncated objects
//! surface as failed tiles instead of reaching the renderer. The encoded
//! bytes are kept as-is; only the format and pixel dimensions are recorded.

use std::io::Cursor;

use bytes::Bytes;
use image::{ImageFormat, ImageReader};

use crate::error::TileError;
use crate::tile::TileImage;

/// Decode a fetched payload into a [`TileImage`].
///
/// Supports PNG and JPEG payloads.
pub fn decode_tile_image(data: Bytes) -> Result<TileImage, TileError> {
    let format = image::guess_format(&data).map_err(|e| TileError::DecodeError {
        message: e.to_string(),
    })?;

    let content_type = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        other => {
            return Err(TileError::DecodeError {
                message: format!("unsupported image format: {:?}", other),
            })
        }
    };

    let img = ImageReader::with_format(Cursor::new(&data[..]), format)
        .decode()
        .map_err(|e| TileError::DecodeError {
            message: e.to_string(),
        })?;

    Ok(TileImage {
        width: img.width(),
        height: img.height(),
        content_type,
        data,
    })
}
