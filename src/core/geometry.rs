//! # Plane, Cell and Tile Geometry
//!
//! All positions live in the layout plane `[-1, 1]²`. At depth `d` the plane
//! is covered by `2^(d+1)` tiles per axis, tile `(d, x, y)` spanning
//! `[x / 2^d, (x + 1) / 2^d)` horizontally (same for y). Tile indices are
//! therefore negative in the left/top half of the plane, and for negative
//! depths a single tile per quadrant is larger than the plane itself.
//!
//! Selection cells partition the same plane into an `n × n` grid using the
//! `lower < v <= upper` convention, so a point on a shared border belongs to
//! exactly one cell. The plane edge `v = -1` is closed and belongs to the
//! first cell of its axis.

use std::ops::Range;

/// Half-open rectangle of the selection grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub x: (f64, f64),
    pub y: (f64, f64),
    /// The single cell of an unsubdivided depth: contains every point.
    pub whole_plane: bool,
}

impl CellBounds {
    /// Bounds of cell `(cx, cy)` in a grid of `subdivisions` cells per axis.
    pub fn of(subdivisions: u32, cx: u32, cy: u32) -> Self {
        let n = f64::from(subdivisions.max(1));
        let edge = |i: u32| (-1.0 + 2.0 * f64::from(i) / n, -1.0 + 2.0 * f64::from(i + 1) / n);
        Self {
            x: edge(cx),
            y: edge(cy),
            whole_plane: subdivisions <= 1,
        }
    }

    /// `lower < v <= upper` on both axes, with `v = -1` inside the first cell.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        self.whole_plane || (within(p[0], self.x) && within(p[1], self.y))
    }
}

fn within(v: f64, (lower, upper): (f64, f64)) -> bool {
    (v > lower || (lower == -1.0 && v == -1.0)) && v <= upper
}

/// Address of one tile of the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileAddress {
    pub depth: i32,
    pub x: i64,
    pub y: i64,
}

impl TileAddress {
    pub fn new(depth: i32, x: i64, y: i64) -> Self {
        Self { depth, x, y }
    }

    /// Child at quadrant `(a, b)`, `a, b ∈ {0, 1}`, one depth finer.
    pub fn child(&self, a: i64, b: i64) -> Self {
        Self::new(self.depth + 1, self.x * 2 + a, self.y * 2 + b)
    }

    /// Plane-space box of this tile grown by `margin` tile widths on every side.
    pub fn expanded_box(&self, margin: f64) -> PlaneBox {
        let scale = scale(self.depth);
        PlaneBox {
            x: ((self.x as f64 - margin) / scale, (self.x as f64 + 1.0 + margin) / scale),
            y: ((self.y as f64 - margin) / scale, (self.y as f64 + 1.0 + margin) / scale),
        }
    }

    /// Pixel position inside this tile of the plane position `p`.
    pub fn to_pixels(&self, p: [f64; 2], tile_size: u32) -> [f64; 2] {
        let px_per_unit = scale(self.depth) * f64::from(tile_size);
        [
            p[0] * px_per_unit - self.x as f64 * f64::from(tile_size),
            p[1] * px_per_unit - self.y as f64 * f64::from(tile_size),
        ]
    }

    pub fn key(&self) -> (i32, i64, i64) {
        (self.depth, self.x, self.y)
    }
}

/// Axis-aligned box in plane coordinates with open bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneBox {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl PlaneBox {
    /// Strict containment on both axes.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] > self.x.0 && p[0] < self.x.1 && p[1] > self.y.0 && p[1] < self.y.1
    }
}

/// `2^depth`, valid for negative depths.
pub fn scale(depth: i32) -> f64 {
    2f64.powi(depth)
}

/// Tile indices issued per axis at `depth`: `[floor(-2^d), ceil(2^d))`.
pub fn tile_range(depth: i32) -> Range<i64> {
    let s = scale(depth);
    (-s).floor() as i64..s.ceil() as i64
}

/// Every tile address of `depth`, row-major, each exactly once.
pub fn tile_addresses(depth: i32) -> Vec<TileAddress> {
    let range = tile_range(depth);
    let mut out = Vec::with_capacity(range.clone().count().pow(2));
    for x in range.clone() {
        for y in range.clone() {
            out.push(TileAddress::new(depth, x, y));
        }
    }
    out
}
