//! Splitting large images into tile-sized blocks.
//!
//! Blocks are produced in row-major order. Blocks on the right and bottom
//! edges are clipped to the source region, so they may be smaller than the
//! nominal block size but never larger.

use super::coord::BBox;

/// Tile `bbox` with blocks of at most `block_width x block_height` pixels.
///
/// Returns an empty list if the box or the block size is empty.
pub fn bbox_tiles(bbox: &BBox, block_width: u32, block_height: u32) -> Vec<BBox> {
    if bbox.is_empty() || block_width == 0 || block_height == 0 {
        return Vec::new();
    }

    let mut tiles = Vec::with_capacity(
        (block_count(bbox.width, block_width) * block_count(bbox.height, block_height)) as usize,
    );

    let mut y = bbox.y;
    while y < bbox.max_y() {
        let height = block_height.min(bbox.max_y() - y);
        let mut x = bbox.x;
        while x < bbox.max_x() {
            let width = block_width.min(bbox.max_x() - x);
            tiles.push(BBox::new(x, y, width, height));
            x += width;
        }
        y += height;
    }

    tiles
}

/// Tile a `width x height` image anchored at the origin.
pub fn image_blocks(width: u32, height: u32, block_width: u32, block_height: u32) -> Vec<BBox> {
    bbox_tiles(&BBox::new(0, 0, width, height), block_width, block_height)
}

/// Number of blocks needed to cover `extent` pixels.
#[inline]
pub fn block_count(extent: u32, block: u32) -> u32 {
    if block == 0 {
        return 0;
    }
    extent.div_ceil(block)
}

/// Pyramid level at which a `block_cols x block_rows` grid is stored.
///
/// This is `ceil(log2(max(block_cols, block_rows)))`, so a single block lives
/// at the root and a 3x2 grid needs two levels of subdivision.
pub fn pyramid_levels(block_cols: u32, block_rows: u32) -> u32 {
    let max = block_cols.max(block_rows);
    if max <= 1 {
        return 0;
    }
    max.next_power_of_two().trailing_zeros()
}

// =============================================================================
// Tests
// =============================================================================
