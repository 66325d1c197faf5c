// SPDX-License-Identifier: MIT
//! # Sizes, Filters and Scale Plans
//!
//! This module computes output dimensions for the two scaling jobs of a tile
//! pyramid and names the resampling filters the CLI can choose from.
//!
//! ## Design Philosophy
//!
//! 1. **ScaleTarget**: what size constraint to apply (uniform factor vs exact dimensions)
//! 2. **ResampleFilter**: which convolution kernel performs the resampling
//! 3. **ScalePlan**: the computed output size plus the filter, ready for [`crate::cpu`]
//!
//! Sprites are scaled by a uniform factor so that rotated sprites keep the
//! same magnification as their unrotated original. Child tiles are scaled to an
//! exact half-tile square.

use fast_image_resize as fir;

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    /// Number of bytes of a tightly packed RGBA8 buffer of this size.
    pub fn rgba_len(self) -> usize {
        (self.w as usize) * (self.h as usize) * 4
    }
}

/// Defines the target size constraint for scaling operations.
#[derive(Clone, Copy, Debug)]
pub enum ScaleTarget {
    /// Multiply both sides by the same factor (rounded down, minimum 1px).
    Factor(f64),
    /// Force output to exact dimensions.
    Exact(Size),
}

/// Convolution kernel used for resampling.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    /// Fastest, slightly soft
    Bilinear,
    /// Catmull-Rom cubic, the pyramid default
    #[default]
    Bicubic,
    /// Sharpest, slowest
    Lanczos3,
}

impl ResampleFilter {
    /// Convert to the fast_image_resize resize algorithm.
    pub fn to_alg(self) -> fir::ResizeAlg {
        let filter = match self {
            ResampleFilter::Bilinear => fir::FilterType::Bilinear,
            ResampleFilter::Bicubic => fir::FilterType::CatmullRom,
            ResampleFilter::Lanczos3 => fir::FilterType::Lanczos3,
        };
        fir::ResizeAlg::Convolution(filter)
    }
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Final computed output dimensions
    pub out: Size,
    /// Kernel used for resampling
    pub filter: ResampleFilter,
}

/// Compute a scaling plan from input parameters.
///
/// # Performance
/// O(1) computation with minimal floating-point operations
pub fn build_plan(input: Size, target: ScaleTarget, filter: ResampleFilter) -> ScalePlan {
    let out = match target {
        ScaleTarget::Factor(factor) => Size {
            w: scale_side(input.w, factor),
            h: scale_side(input.h, factor),
        },
        ScaleTarget::Exact(out) => Size {
            w: out.w.max(1),
            h: out.h.max(1),
        },
    };
    ScalePlan { input, out, filter }
}

/// Uniform factor that makes the longest side of `original` equal `display_side`.
///
/// Applied to a rotated (and therefore enlarged) canvas this keeps the sprite
/// at the same magnification as the unrotated original.
pub fn display_factor(original: Size, display_side: u32) -> f64 {
    let long = original.w.max(original.h).max(1);
    f64::from(display_side) / f64::from(long)
}

fn scale_side(side: u32, factor: f64) -> u32 {
    ((f64::from(side) * factor).floor() as u32).max(1)
}
