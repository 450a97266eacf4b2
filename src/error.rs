use thiserror::Error;

/// I/O errors that can occur when fetching tiles from remote storage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Errors that can occur while loading or serving a tile
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    /// I/O error while fetching the tile payload
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Payload could not be decoded as an image
    #[error("Failed to decode tile: {message}")]
    DecodeError { message: String },

    /// Tile address could not be parsed
    #[error("Invalid tile address: {address}")]
    InvalidAddress { address: String },

    /// Requested zoom is above what the active provider serves
    #[error("Zoom {zoom} out of range (max zoom: {max_zoom})")]
    ZoomOutOfRange { zoom: u32, max_zoom: u32 },

    /// Tile did not complete within the allowed time
    #[error("Tile {key} not ready")]
    NotReady { key: String },
}

/// Errors raised while building providers from configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A configuration value is out of range or missing
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The object key template is malformed
    #[error("Invalid tile template: {0}")]
    Template(String),
}
