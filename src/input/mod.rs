//! # Input Module
//!
//! Loaders for everything a pyramid build reads but never writes: the point
//! table (layout + latent arrays), the image store and the rotation table.
//! All of them are loaded once, before any work is dispatched, and failures
//! here are fatal.

pub mod images;
pub mod npy;
pub mod points;
pub mod rotations;

pub use images::{DirectoryImageStore, ImageStore};
pub use points::{Point, PointSet};
pub use rotations::RotationTable;
