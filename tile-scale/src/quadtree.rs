// SPDX-License-Identifier: MIT
//! # Quadtree Quadrant Packing
//!
//! This module builds a parent tile of a deep-zoom pyramid from its (up to)
//! four children one level deeper.
//!
//! ## Layout
//!
//! Child `(2x + a, 2y + b)` of parent `(x, y)` lands in quadrant `(a, b)`:
//!
//! ```text
//! ┌───────────┬───────────┐
//! │  (0, 0)   │  (1, 0)   │
//! ├───────────┼───────────┤
//! │  (0, 1)   │  (1, 1)   │
//! └───────────┴───────────┘
//! ```
//!
//! Each present child is shrunk to `tile_side / 2` square and copied into its
//! quadrant. Absent children leave the background colour in place.
//!
//! ## Performance Characteristics
//!
//! - **Single scratch buffer**: one half-tile staging buffer reused for all four quadrants
//! - **SIMD accelerated**: same scaling engine as sprite scaling
//! - **Row copies**: quadrant placement is a plain `copy_from_slice` per row

use anyhow::{ensure, Result};
use fast_image_resize::Resizer;

use crate::cpu::scale_rgba_cpu;
use crate::presets::{build_plan, ResampleFilter, ScaleTarget, Size};

/// Configuration for quadrant packing.
#[derive(Clone, Copy, Debug)]
pub struct QuadrantCfg {
    /// Edge length of parent and child tiles in pixels
    pub tile_side: u32,
    /// Fill colour for quadrants without a child
    pub background: [u8; 4],
    /// Kernel used to shrink the children
    pub filter: ResampleFilter,
}

/// Borrowed, tightly packed RGBA8 child tile.
#[derive(Clone, Copy)]
pub struct ChildTile<'a> {
    pub rgba: &'a [u8],
    pub size: Size,
}

/// Fill `dst` with the background and paste every present child into its quadrant.
///
/// `children[a][b]` is the child with x offset `a` and y offset `b`.
/// `dst` must hold `tile_side * tile_side * 4` bytes.
///
/// # Returns
/// The number of children that were placed.
pub fn pack_quadrants(
    resizer: &mut Resizer,
    children: &[[Option<ChildTile<'_>>; 2]; 2],
    cfg: QuadrantCfg,
    dst: &mut [u8],
) -> Result<usize> {
    let side = cfg.tile_side as usize;
    ensure!(dst.len() >= side * side * 4, "parent tile buffer too small");
    fill_rgba(&mut dst[..side * side * 4], cfg.background);

    let half = (cfg.tile_side / 2).max(1);
    let half_size = Size { w: half, h: half };
    let mut staging = vec![0u8; half_size.rgba_len()];
    let mut placed = 0;

    for (a, column) in children.iter().enumerate() {
        for (b, child) in column.iter().enumerate() {
            let Some(child) = child else { continue };
            let plan = build_plan(child.size, ScaleTarget::Exact(half_size), cfg.filter);
            scale_rgba_cpu(resizer, child.rgba, &plan, &mut staging, false)?;
            blit(&staging, half as usize, dst, side, a * half as usize, b * half as usize);
            placed += 1;
        }
    }

    Ok(placed)
}

/// Copy a `src_side`² block into `dst` at `(x0, y0)`, clipped to the destination.
fn blit(src: &[u8], src_side: usize, dst: &mut [u8], dst_side: usize, x0: usize, y0: usize) {
    let cols = src_side.min(dst_side.saturating_sub(x0));
    let rows = src_side.min(dst_side.saturating_sub(y0));
    for r in 0..rows {
        let s = &src[r * src_side * 4..(r * src_side + cols) * 4];
        let d_off = ((y0 + r) * dst_side + x0) * 4;
        dst[d_off..d_off + cols * 4].copy_from_slice(s);
    }
}

#[inline]
fn fill_rgba(dst: &mut [u8], bg: [u8; 4]) {
    for px in dst.chunks_exact_mut(4) {
        px.copy_from_slice(&bg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    fn solid(side: u32, rgba: [u8; 4]) -> Vec<u8> {
        rgba.repeat((side * side) as usize)
    }

    fn pixel(buf: &[u8], side: usize, x: usize, y: usize) -> [u8; 4] {
        let o = (y * side + x) * 4;
        [buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]
    }

    #[test]
    fn four_uniform_children_fill_every_quadrant() {
        let side = 16u32;
        let red = solid(side, [200, 10, 10, 255]);
        let child = ChildTile { rgba: &red, size: Size { w: side, h: side } };
        let cfg = QuadrantCfg { tile_side: side, background: WHITE, filter: ResampleFilter::Bicubic };
        let mut dst = vec![0u8; (side * side * 4) as usize];

        let placed = pack_quadrants(
            &mut Resizer::new(),
            &[[Some(child), Some(child)], [Some(child), Some(child)]],
            cfg,
            &mut dst,
        )
        .unwrap();

        assert_eq!(placed, 4);
        for (x, y) in [(2, 2), (13, 2), (2, 13), (13, 13)] {
            let px = pixel(&dst, side as usize, x, y);
            assert!(px[0].abs_diff(200) <= 1 && px[1].abs_diff(10) <= 1, "{px:?}");
        }
    }

    #[test]
    fn missing_children_leave_background() {
        let side = 8u32;
        let blue = solid(side, [0, 0, 255, 255]);
        let child = ChildTile { rgba: &blue, size: Size { w: side, h: side } };
        let cfg = QuadrantCfg { tile_side: side, background: WHITE, filter: ResampleFilter::Bilinear };
        let mut dst = vec![0u8; (side * side * 4) as usize];

        // Only the bottom-right child (a = 1, b = 1) exists.
        let placed =
            pack_quadrants(&mut Resizer::new(), &[[None, None], [None, Some(child)]], cfg, &mut dst).unwrap();

        assert_eq!(placed, 1);
        assert_eq!(pixel(&dst, 8, 1, 1), WHITE);
        assert_eq!(pixel(&dst, 8, 6, 1), WHITE);
        assert_eq!(pixel(&dst, 8, 1, 6), WHITE);
        assert_eq!(pixel(&dst, 8, 6, 6)[2], 255);
        assert_eq!(pixel(&dst, 8, 6, 6)[0], 0);
    }

    #[test]
    fn no_children_places_nothing() {
        let cfg = QuadrantCfg { tile_side: 4, background: WHITE, filter: ResampleFilter::Bicubic };
        let mut dst = vec![0u8; 64];
        let placed = pack_quadrants(&mut Resizer::new(), &[[None, None], [None, None]], cfg, &mut dst).unwrap();
        assert_eq!(placed, 0);
        assert!(dst.iter().all(|&v| v == 255));
    }
}
