//! Tile index: where every tile lives.
//!
//! The index maps [`TileCoordinate`](crate::tile::TileCoordinate)s to
//! [`IndexRecord`]s, decides which blob absorbs the next write, and persists
//! itself as a JSON snapshot next to the blob files.
//!
//! # Record states
//!
//! ```text
//!   NotAllocated ──write_complete──▶ Allocated(valid)
//!        │                                ▲    │
//!        │ (descendant committed)         │    │ regeneration
//!        ▼                                │    ▼
//!   Allocated(pending) ──write_complete───┘  Allocated(valid)
//! ```
//!
//! There is no way back to `NotAllocated`. Overwriting a record orphans its
//! old blob bytes; they are never reclaimed.

mod record;
mod snapshot;
mod table;

pub use record::{IndexRecord, TileLookup};
pub use snapshot::{INDEX_FILE_NAME, INDEX_VERSION};
pub use table::{Index, DEFAULT_MAX_BLOB_SIZE};
