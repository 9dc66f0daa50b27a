//! Compositing and resampling used to build coarser pyramid levels.
//!
//! A parent tile is produced from its four children by placing them on a
//! double-size canvas, smoothing it, and keeping every second pixel in
//! each direction.

use image::{imageops, Rgba, RgbaImage};

/// Smoothing applied before subsampling.
pub const MIPMAP_SIGMA: f32 = 1.0;

/// Place up to four quadrant children on one transparent canvas.
///
/// Child `i` is drawn at `((i % 2) * block_size, (i / 2) * block_size)`.
/// The canvas covers the union of the placed children; missing children
/// leave their quadrant transparent. An all-missing input yields a 1x1
/// transparent canvas.
pub fn compose_children(children: &[Option<RgbaImage>; 4], block_size: u32) -> RgbaImage {
    let mut width = 0;
    let mut height = 0;
    for (i, child) in children.iter().enumerate() {
        if let Some(child) = child {
            let (ox, oy) = quadrant_offset(i, block_size);
            width = width.max(ox + child.width());
            height = height.max(oy + child.height());
        }
    }

    let mut canvas = RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([0, 0, 0, 0]));
    for (i, child) in children.iter().enumerate() {
        if let Some(child) = child {
            let (ox, oy) = quadrant_offset(i, block_size);
            imageops::replace(&mut canvas, child, i64::from(ox), i64::from(oy));
        }
    }
    canvas
}

/// Gaussian blur with standard deviation `sigma`.
pub fn gaussian_smooth(image: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    imageops::blur(image, sigma)
}

/// Keep pixel `(factor * x, factor * y)` for every output pixel.
///
/// The output is `ceil(w / factor) x ceil(h / factor)`.
pub fn subsample(image: &RgbaImage, factor: u32) -> RgbaImage {
    let factor = factor.max(1);
    let width = image.width().div_ceil(factor);
    let height = image.height().div_ceil(factor);
    RgbaImage::from_fn(width, height, |x, y| *image.get_pixel(x * factor, y * factor))
}

/// Build a parent tile from its four children.
pub fn downsample_children(children: &[Option<RgbaImage>; 4], block_size: u32) -> RgbaImage {
    let canvas = compose_children(children, block_size);
    subsample(&gaussian_smooth(&canvas, MIPMAP_SIGMA), 2)
}

fn quadrant_offset(index: usize, block_size: u32) -> (u32, u32) {
    let dx = (index % 2) as u32;
    let dy = (index / 2) as u32;
    (dx * block_size, dy * block_size)
}

// =============================================================================
// Tests
// =============================================================================
