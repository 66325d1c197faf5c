//! # Pyramid Configuration
//!
//! This module provides the configuration structure shared by the CLI and the
//! library entry points. Every option has a default, can be supplied through a
//! JSON file, and is checked by [`PyramidConfig::validate`] before any work starts.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Default | Description |
//! |-----------|------|---------|-------------|
//! | `tile_size` | `u32` | 256 | Edge length of every tile in pixels |
//! | `image_size` | `u32` | 128 | Display size of a leaf image (longest side) |
//! | `shadow_radius` | `u32` | 12 | Shadow offset/padding; blur sigma is half of it |
//! | `shadow_opacity` | `f32` | 0.8 | Brightness factor applied to the blurred shadow mask |
//! | `tile_depth` | `i32` | 8 | Number of clustered depths; the leaf level sits at this depth |
//! | `min_depth` | `i32` | -3 | Coarsest depth rendered |
//! | `min_composite_depth` | `i32` | 1 | Sprites are composited only at depths above this |
//! | `depth_offset` | `i32` | 3 | Added to depths in file names and manifest keys |
//! | `tile_quality` | `u8` | 90 | JPEG quality (1-100) |
//! | `base_density` | `f64` | 2.0 | Representatives at depth 0 for the whole plane |
//! | `density_growth` | `f64` | 4.0 | Factor between consecutive depths |
//! | `subdivision_start` | `i32` | 2 | Cells per axis are `max(1, 2^(depth - subdivision_start))` |
//! | `workers` | `usize` | 0 | Worker threads, 0 = one per core |
//!
//! The defaults reproduce `2^(2 * depth + 1)` representatives per depth.
//!
//! ## Examples
//!
//! ```rust
//! use embedding_pyramid::config::config::PyramidConfig;
//!
//! let mut config = PyramidConfig::default();
//! config.tile_depth = 4;
//! assert!(config.validate().is_ok());
//!
//! let path = config.tile_path(2, -1, 3);
//! assert!(path.ends_with("5/-1/3.jpg"));
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tile_scale::presets::ResampleFilter;
use tile_scale::quadtree::QuadrantCfg;

use crate::error::{PyramidError, PyramidResult};

/// Configuration structure for a pyramid build.
///
/// # Field Groups
///
/// - Raster geometry: `tile_size`, `image_size`, `shadow_radius`, `shadow_opacity`, `background`
/// - Depth policy: `tile_depth`, `min_depth`, `min_composite_depth`, `depth_offset`
/// - Selection policy: `base_density`, `density_growth`, `subdivision_start`, k-means limits, `seed`
/// - Inputs: `image_dir`, `image_extension`, `ids_file`, `layout_path`, `latent_path`, `rotations_path`
/// - Outputs: `tile_path_format`, `tile_quality`, `manifest_path`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    /// Edge length of every tile in pixels.
    pub tile_size: u32,

    /// Longest side, in tile pixels, of a sprite at its native depth.
    pub image_size: u32,

    /// Padding around a sprite reserved for its shadow. The Gaussian blur
    /// uses half of this value as sigma.
    pub shadow_radius: u32,

    /// Multiplier applied to the blurred shadow mask (0 = no shadow, 1 = black).
    pub shadow_opacity: f32,

    /// Number of clustered depths. Depths `0..tile_depth` come from the
    /// manifest; depth `tile_depth` holds every image at its layout position.
    pub tile_depth: i32,

    /// Coarsest depth that is rendered (may be negative).
    pub min_depth: i32,

    /// Sprites are composited only at depths strictly above this value.
    /// Coarser tiles are pure downsamples of their children.
    pub min_composite_depth: i32,

    /// Offset added to the depth in tile file names and manifest keys.
    pub depth_offset: i32,

    /// JPEG quality for `.jpg`/`.jpeg` tile paths.
    pub tile_quality: u8,

    /// Expected number of representatives at depth 0 when a single cell covers the plane.
    pub base_density: f64,

    /// Growth factor of the representative count per depth.
    pub density_growth: f64,

    /// Depth from which the selection grid starts to subdivide.
    pub subdivision_start: i32,

    /// Upper bound on Lloyd iterations per cell.
    pub kmeans_max_iterations: usize,

    /// Convergence threshold on the largest centroid movement.
    pub kmeans_tolerance: f64,

    /// Seed for k-means initialisation and tile shuffling.
    pub seed: u64,

    /// Worker threads; 0 selects one per available core.
    pub workers: usize,

    /// Tile background colour (RGB).
    pub background: [u8; 3],

    /// Resampling filter used to shrink child tiles.
    pub downsample_filter: ResampleFilter,

    /// Tile path template with `{depth}`, `{x}` and `{y}` placeholders.
    pub tile_path_format: String,

    /// Directory holding `<id>.<image_extension>` files with alpha.
    pub image_dir: PathBuf,

    /// Extension of the images in `image_dir`.
    pub image_extension: String,

    /// Optional file listing image ids, one per line, index-aligned with the numeric inputs.
    pub ids_file: Option<PathBuf>,

    /// `.npy` array of shape `(N, 2)` with layout coordinates in `[-1, 1]`.
    pub layout_path: PathBuf,

    /// `.npy` array of shape `(N, D)` with latent vectors.
    pub latent_path: PathBuf,

    /// `id,degrees` table of display rotations.
    pub rotations_path: PathBuf,

    /// Where the per-depth manifest is written.
    pub manifest_path: PathBuf,

    /// Load the manifest from `manifest_path` instead of recomputing it, when present.
    pub reuse_manifest: bool,
}

impl Default for PyramidConfig {
    /// Creates a default configuration laid out under `data/`.
    fn default() -> Self {
        Self::new("data")
    }
}

impl PyramidConfig {
    /// Creates a configuration with default parameters and every input and
    /// output placed under `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data = data_dir.as_ref();
        Self {
            tile_size: 256,
            image_size: 128,
            shadow_radius: 12,
            shadow_opacity: 0.8,
            tile_depth: 8,
            min_depth: -3,
            min_composite_depth: 1,
            depth_offset: 3,
            tile_quality: 90,
            base_density: 2.0,
            density_growth: 4.0,
            subdivision_start: 2,
            kmeans_max_iterations: 300,
            kmeans_tolerance: 1e-4,
            seed: 0,
            workers: 0,
            background: [255, 255, 255],
            downsample_filter: ResampleFilter::Bicubic,
            tile_path_format: format!("{}/tiles/{{depth}}/{{x}}/{{y}}.jpg", data.display()),
            image_dir: data.join("images_alpha"),
            image_extension: "png".to_string(),
            ids_file: None,
            layout_path: data.join("latent_codes_embedded_moved.npy"),
            latent_path: data.join("latent_codes.npy"),
            rotations_path: data.join("rotations_calculated.csv"),
            manifest_path: data.join("clusters.json"),
            reuse_manifest: false,
        }
    }

    /// Load a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> PyramidResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PyramidError::io_at("reading configuration", path, e).fatal())?;
        serde_json::from_str(&text)
            .map_err(|e| PyramidError::config(path.display().to_string(), e.to_string()))
    }

    /// Validates the configuration parameters.
    ///
    /// Time complexity: O(1).
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size < 2 {
            return Err("Tile size must be at least 2 pixels".to_string());
        }
        if self.image_size == 0 {
            return Err("Image size must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.shadow_opacity) {
            return Err("Shadow opacity must be between 0 and 1".to_string());
        }
        if self.tile_depth < 1 {
            return Err("Tile depth must be at least 1".to_string());
        }
        if self.min_depth > self.tile_depth {
            return Err("Minimum depth must not exceed the tile depth".to_string());
        }
        if !(1..=100).contains(&self.tile_quality) {
            return Err("Tile quality must be between 1 and 100".to_string());
        }
        if !(self.base_density.is_finite() && self.base_density >= 0.0) {
            return Err("Base density must be a non-negative number".to_string());
        }
        if !(self.density_growth.is_finite() && self.density_growth >= 1.0) {
            return Err("Density growth must be at least 1".to_string());
        }
        if self.kmeans_max_iterations == 0 {
            return Err("k-means iteration limit must be greater than 0".to_string());
        }
        if !(self.kmeans_tolerance.is_finite() && self.kmeans_tolerance > 0.0) {
            return Err("k-means tolerance must be a positive number".to_string());
        }
        for placeholder in ["{depth}", "{x}", "{y}"] {
            if !self.tile_path_format.contains(placeholder) {
                return Err(format!("Tile path format must contain {}", placeholder));
            }
        }
        Ok(())
    }

    /// Depth of the unclustered leaf level (one past the finest manifest depth).
    pub fn leaf_depth(&self) -> i32 {
        self.tile_depth
    }

    /// Depth label used in file names and manifest keys.
    pub fn file_depth(&self, depth: i32) -> i32 {
        depth + self.depth_offset
    }

    /// Path of the tile at `(depth, x, y)`. Stable and collision free per address.
    pub fn tile_path(&self, depth: i32, x: i64, y: i64) -> PathBuf {
        PathBuf::from(
            self.tile_path_format
                .replace("{depth}", &self.file_depth(depth).to_string())
                .replace("{x}", &x.to_string())
                .replace("{y}", &y.to_string()),
        )
    }

    /// Tile-relative margin that captures sprites overlapping from neighbouring tiles.
    pub fn margin(&self) -> f64 {
        (f64::from(self.image_size) / 2.0 + f64::from(self.shadow_radius)) / f64::from(self.tile_size)
    }

    /// Representatives expected at `depth` when one cell covers the whole plane.
    pub fn density(&self, depth: i32) -> f64 {
        self.base_density * self.density_growth.powi(depth)
    }

    /// Cells per axis of the selection grid at `depth`.
    pub fn subdivisions(&self, depth: i32) -> u32 {
        let exponent = depth - self.subdivision_start;
        if exponent <= 0 {
            1
        } else {
            1u32 << exponent.min(30)
        }
    }

    /// Quadrant packing settings for the downsample path.
    pub fn quadrant_cfg(&self) -> QuadrantCfg {
        let [r, g, b] = self.background;
        QuadrantCfg {
            tile_side: self.tile_size,
            background: [r, g, b, 255],
            filter: self.downsample_filter,
        }
    }
}
