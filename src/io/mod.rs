//! Byte-level storage: append-only blob files and scoped staging files.

mod blob;
mod staging;

pub use blob::{blob_file_name, Blob, BlobSet};
pub use staging::{StagingFile, STAGING_PREFIX};
