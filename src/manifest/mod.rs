//! # Manifest Module
//!
//! Phase one of a pyramid build: choosing which images appear at which depth.

pub mod builder;
pub mod manifest;

pub use builder::{BuildSummary, CellJob, DepthManifestBuilder, ManifestBuild};
pub use manifest::{DepthManifest, ManifestEntry};
