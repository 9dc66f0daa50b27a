//! # Plate Store
//!
//! A tiled, multi-resolution image store.
//!
//! A plate maps `(col, row, level)` tile coordinates to encoded tile
//! payloads. Payloads are packed back to back into append-only blob files and
//! located through a persisted index, so very large rasters can be ingested
//! once and later read tile by tile.
//!
//! ## Features
//!
//! - **Quad-tree pyramid**: level 0 is a single root tile; level `L` has up to
//!   `2^L x 2^L` tiles
//! - **Parallel ingestion**: large images are split into blocks and written by
//!   a bounded worker pool
//! - **Mipmap generation**: coarser levels are built bottom-up from their four
//!   children, skipping tiles that already exist
//! - **Crash-tolerant index**: snapshots are written to a temp file and
//!   renamed into place
//!
//! ## Architecture
//!
//! - [`tile`] - coordinates, block partitioning, codecs and the compositor
//! - [`io`] - blob files and staging files
//! - [`index`] - coordinate to blob location mapping and allocation
//! - [`plate`] - the [`PlateStore`] façade and its write queue
//! - [`config`] - store configuration and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use plate_store::{PlateConfig, PlateStore, TileCoordinate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), plate_store::PlateError> {
//!     let store = PlateStore::open("moon.plate", PlateConfig::default()).await?;
//!
//!     let image = image::RgbaImage::new(1024, 768);
//!     let report = store.insert(&image).await?;
//!     println!("wrote {} tiles at level {}", report.written, report.level);
//!
//!     store.mipmap().await?;
//!     let root = store.read(TileCoordinate::ROOT).await?;
//!     assert!(root.is_valid());
//!
//!     store.close().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod io;
pub mod plate;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, PlateConfig, DEFAULT_BLOCK_SIZE, DEFAULT_FILE_TYPE};
pub use error::{BlobError, CodecError, IndexError, PlateError};
pub use index::{Index, IndexRecord, TileLookup};
pub use io::{Blob, BlobSet, StagingFile};
pub use plate::{
    InsertReport, MipmapReport, PlateStats, PlateStore, QueueReport, TileRead, WriteJob,
    WriteQueue,
};
pub use tile::{BBox, ImageCodec, TileCodec, TileCoordinate, MAX_LEVEL};
