// SPDX-License-Identifier: MIT
//! # tile-scale: RGBA Scaling for Deep-Zoom Tile Pyramids
//!
//! This crate provides the raster scaling primitives used when building a
//! quadtree tile pyramid: shrinking a sprite to its display size and packing
//! four child tiles into the quadrants of their parent tile.
//!
//! ## Architecture Overview
//!
//! The crate is designed around three core principles:
//! 1. **Caller-owned buffers**: every entry point writes into a slice the caller provides
//! 2. **SIMD acceleration**: all resampling goes through fast_image_resize
//! 3. **Tightly packed RGBA8**: one layout everywhere, no stride juggling at call sites
//!
//! ## Key Components
//!
//! - [`presets`]: Sizes, resampling filters and scale-plan computation
//! - [`cpu`]: CPU-based RGBA scaling using SIMD acceleration
//! - [`quadtree`]: Child → parent quadrant packing for pyramid downsampling
//!
//! ## Usage Example
//!
//! ```rust
//! use tile_scale::presets::{ResampleFilter, Size};
//! use tile_scale::quadtree::{pack_quadrants, ChildTile, QuadrantCfg};
//!
//! let cfg = QuadrantCfg { tile_side: 4, background: [255, 255, 255, 255], filter: ResampleFilter::Bicubic };
//! let red = vec![[255u8, 0, 0, 255]; 16].concat();
//! let child = ChildTile { rgba: &red, size: Size { w: 4, h: 4 } };
//!
//! let mut resizer = fast_image_resize::Resizer::new();
//! let mut parent = vec![0u8; 4 * 4 * 4];
//! let placed = pack_quadrants(&mut resizer, &[[Some(child), None], [None, None]], cfg, &mut parent)?;
//! assert_eq!(placed, 1);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cpu;
pub mod presets;
pub mod quadtree;
