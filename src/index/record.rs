use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::tile::TileCoordinate;

/// Location of one tile's encoded bytes.
///
/// `valid == false` marks a coordinate that is allocated (an ancestor of
/// ingested data) but has no committed payload yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Blob file holding the bytes
    pub blob_id: u32,

    /// Byte offset of the tile inside the blob
    pub blob_offset: u64,

    /// Length of the encoded tile in bytes
    pub block_size: u32,

    /// Format tag the payload was encoded with
    pub file_type: String,

    /// Whether the range above holds a committed payload
    pub valid: bool,
}

impl IndexRecord {
    /// A record describing a freshly appended range, not yet committed.
    pub fn new(blob_id: u32, blob_offset: u64, block_size: u32, file_type: impl Into<String>) -> Self {
        Self {
            blob_id,
            blob_offset,
            block_size,
            file_type: file_type.into(),
            valid: false,
        }
    }

    /// Placeholder for an allocated coordinate with no payload.
    pub fn pending(file_type: impl Into<String>) -> Self {
        Self::new(0, 0, 0, file_type)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Exclusive end offset of the range inside the blob.
    pub fn blob_end(&self) -> u64 {
        self.blob_offset + u64::from(self.block_size)
    }
}

/// Outcome of looking a coordinate up in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileLookup {
    /// The coordinate lies outside anything ever written.
    NotAllocated,

    /// The coordinate exists; check [`IndexRecord::valid`] before reading.
    Allocated(IndexRecord),
}

impl TileLookup {
    /// `true` only for an allocated record with a committed payload.
    pub fn is_valid(&self) -> bool {
        matches!(self, TileLookup::Allocated(record) if record.valid)
    }

    pub fn is_allocated(&self) -> bool {
        matches!(self, TileLookup::Allocated(_))
    }

    /// Convert the sum type into the error-returning form used by `read_request`.
    pub fn into_record(self, coord: TileCoordinate) -> Result<IndexRecord, IndexError> {
        match self {
            TileLookup::Allocated(record) => Ok(record),
            TileLookup::NotAllocated => Err(IndexError::TileNotFound(coord)),
        }
    }
}
