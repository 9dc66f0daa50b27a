//! Tile geometry and pixel-level collaborators.
//!
//! Everything here is pure and stateless: coordinate arithmetic on the
//! implicit quad-tree, partitioning of source images into blocks, payload
//! codecs, and the compositor used to derive coarser levels. The stateful
//! parts of the store live in [`crate::index`], [`crate::io`] and
//! [`crate::plate`].
//!
//! # Components
//!
//! - [`TileCoordinate`]: `(col, row, level)` address with parent/child math
//! - [`BBox`]: half-open pixel rectangle
//! - [`bbox_tiles`] / [`image_blocks`]: split a region into tile-sized blocks
//! - [`TileCodec`] / [`ImageCodec`]: encode and decode tile payloads
//! - [`downsample_children`]: compose four children into one parent tile

mod codec;
mod compose;
mod coord;
mod partition;

pub use codec::{
    clamp_quality, is_valid_quality, normalize_file_type, ImageCodec, TileCodec,
    DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use compose::{compose_children, downsample_children, gaussian_smooth, subsample, MIPMAP_SIGMA};
pub use coord::{BBox, TileCoordinate, MAX_LEVEL};
pub use partition::{bbox_tiles, block_count, image_blocks, pyramid_levels};
