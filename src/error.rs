use std::path::Path;

use thiserror::Error;

use crate::tile::TileCoordinate;

/// Errors raised by blob and staging file I/O.
#[derive(Debug, Clone, Error)]
pub enum BlobError {
    /// Failure to open, read or write a local file
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// Requested range exceeds the blob's current length.
    ///
    /// This means the index and the blob files disagree and is never retried.
    #[error(
        "Blob {blob_id} range out of bounds: requested {requested} bytes at offset {offset}, \
         blob size is {size}"
    )]
    RangeOutOfBounds {
        blob_id: u32,
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Staged tile is larger than a 32-bit block size can describe
    #[error("Tile too large: {size} bytes")]
    TileTooLarge { size: u64 },
}

impl BlobError {
    /// Wrap an `std::io::Error` together with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        BlobError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Errors from encoding or decoding tile payloads
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// No codec is registered for the format tag
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Encoding an image into the format failed
    #[error("Failed to encode {file_type} tile: {message}")]
    EncodeError { file_type: String, message: String },

    /// Decoding stored bytes back into an image failed
    #[error("Failed to decode {file_type} tile: {message}")]
    DecodeError { file_type: String, message: String },
}

/// Errors from the tile index
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// The coordinate was never allocated
    #[error("Tile not found: {0}")]
    TileNotFound(TileCoordinate),

    /// Column or row lies outside the `2^level` grid of its level
    #[error("Invalid tile coordinate: {0}")]
    InvalidCoordinate(TileCoordinate),

    /// The index snapshot could not be serialized or parsed
    #[error("Index serialization error: {0}")]
    Serialization(String),

    /// The snapshot was written by an incompatible version
    #[error("Unsupported index version: {0}")]
    UnsupportedVersion(u32),

    /// Failure reading or writing the index file
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}

impl IndexError {
    pub fn io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        IndexError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Top-level error returned by [`PlateStore`](crate::plate::PlateStore) operations.
#[derive(Debug, Clone, Error)]
pub enum PlateError {
    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// Store configuration was rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A queued write task did not run to completion
    #[error("Write task for {coord} failed: {message}")]
    TaskFailed {
        coord: TileCoordinate,
        message: String,
    },
}

impl PlateError {
    /// Returns `true` if this is the "coordinate never allocated" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlateError::Index(IndexError::TileNotFound(_)))
    }
}
