//! Tile coordinates and pixel bounding boxes.
//!
//! The pyramid is an implicit quad-tree: level 0 holds the single root tile
//! and level `L` holds up to `2^L x 2^L` tiles. Parent/child relationships are
//! pure coordinate arithmetic; no node objects exist.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Tile Coordinate
// =============================================================================

/// Deepest addressable level. Level `L` has `2^L` columns, which must fit in `u32`.
pub const MAX_LEVEL: u32 = 31;

/// Address of one tile in the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoordinate {
    /// Column index (0-indexed from left)
    pub col: u32,

    /// Row index (0-indexed from top)
    pub row: u32,

    /// Pyramid level (0 = coarsest)
    pub level: u32,
}

impl TileCoordinate {
    pub const ROOT: TileCoordinate = TileCoordinate {
        col: 0,
        row: 0,
        level: 0,
    };

    pub fn new(col: u32, row: u32, level: u32) -> Self {
        Self { col, row, level }
    }

    /// The tile one level up that covers this one, or `None` at the root.
    pub fn parent(&self) -> Option<TileCoordinate> {
        if self.level == 0 {
            return None;
        }
        Some(TileCoordinate::new(
            self.col / 2,
            self.row / 2,
            self.level - 1,
        ))
    }

    /// The four tiles one level down, in quadrant order.
    ///
    /// Quadrant `i` sits at `(2*col + i % 2, 2*row + i / 2)`, so the order is
    /// top-left, top-right, bottom-left, bottom-right.
    pub fn children(&self) -> [TileCoordinate; 4] {
        let level = self.level + 1;
        let (c, r) = (self.col * 2, self.row * 2);
        [
            TileCoordinate::new(c, r, level),
            TileCoordinate::new(c + 1, r, level),
            TileCoordinate::new(c, r + 1, level),
            TileCoordinate::new(c + 1, r + 1, level),
        ]
    }

    /// Iterate over every ancestor, nearest first, ending at the root.
    pub fn ancestors(&self) -> impl Iterator<Item = TileCoordinate> {
        std::iter::successors(self.parent(), |c| c.parent())
    }

    /// Whether the coordinate fits inside the `2^level` grid of its level.
    ///
    /// Levels deeper than [`MAX_LEVEL`] are never valid.
    pub fn is_within_level(&self) -> bool {
        if self.level > MAX_LEVEL {
            return false;
        }
        let span = 1u64 << self.level;
        u64::from(self.col) < span && u64::from(self.row) < span
    }

    /// Key that orders coordinates level first, then row-major.
    pub fn sort_key(&self) -> (u32, u32, u32) {
        (self.level, self.row, self.col)
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} @ level {}]", self.col, self.row, self.level)
    }
}

// =============================================================================
// Bounding Box
// =============================================================================

/// Half-open pixel rectangle `[x, x + width) x [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge
    pub fn max_x(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn max_y(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether the two boxes share at least one pixel.
    pub fn intersects(&self, other: &BBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.max_x()
            && other.x < self.max_x()
            && self.y < other.max_y()
            && other.y < self.max_y()
    }

    /// Smallest box containing both. Empty boxes are ignored.
    pub fn union(&self, other: &BBox) -> BBox {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BBox::new(
            x,
            y,
            self.max_x().max(other.max_x()) - x,
            self.max_y().max(other.max_y()) - y,
        )
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
