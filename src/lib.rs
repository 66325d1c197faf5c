//! # Embedding Pyramid Library
//!
//! Builds a deep-zoom tile pyramid from a collection of images placed in a
//! 2-D embedding, so that zooming into the map reveals progressively more of
//! the collection.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `input`: point table (`.npy` layout and latent arrays), image store, rotation table
//! - `selection`: k-means over the layout and latent-medoid representative picking
//! - `manifest`: per-depth representative lists, built in parallel and persisted as JSON
//! - `processing`: sprite compositing and tile rendering
//! - `core`: plane, cell and tile geometry
//! - `config`: configuration management and validation
//! - `session`: two-phase orchestration on a worker pool
//!
//! ## Features
//!
//! - **Deterministic**: clustering and scheduling are seeded
//! - **Resumable**: finished tiles are skipped, new tiles are published atomically
//! - **Parallel**: cells and tiles run on a rayon pool, depths strictly in order
//! - **SIMD scaling**: child tiles and sprites are resized through `tile-scale`
//!
//! ## Example
//!
//! ```rust,no_run
//! use embedding_pyramid::{PyramidConfig, build_pyramid};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = PyramidConfig::default();
//! config.tile_depth = 6;
//! let report = build_pyramid(config)?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod input;
pub mod manifest;
pub mod processing;
pub mod selection;
pub mod session;

/// Re-export error types for convenience
pub use error::{HasSeverity, PyramidError, PyramidResult, Recoverable};

pub use config::PyramidConfig;
pub use crate::core::TileAddress;
pub use input::{DirectoryImageStore, ImageStore, PointSet, RotationTable};
pub use manifest::{DepthManifest, DepthManifestBuilder, ManifestEntry};
pub use processing::{TileOutcome, TileRenderer};
pub use selection::{Representative, RepresentativeSelector};
pub use session::{PyramidReport, PyramidSession};

/// Load every input named in `config` and run both phases.
///
/// # Errors
///
/// Returns an error when the configuration is invalid or an input cannot be
/// loaded. Failures of individual cells or tiles are logged and counted in
/// the report instead.
pub fn build_pyramid(config: PyramidConfig) -> PyramidResult<PyramidReport> {
    PyramidSession::load(config)?.run()
}
