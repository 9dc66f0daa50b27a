//! The plate store: the public face of the crate.
//!
//! [`PlateStore`] ties the index, the blob files, staging files and the
//! codec together. Bulk ingestion fans out over a [`WriteQueue`]; pyramid
//! construction walks the quad-tree in post-order.

mod mipmap;
mod queue;
mod store;

pub use mipmap::MipmapReport;
pub use queue::{QueueReport, WriteJob, WriteQueue};
pub use store::{InsertReport, PlateStats, PlateStore, TileRead};
