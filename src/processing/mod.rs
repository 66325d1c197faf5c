//! # Processing Module
//!
//! Phase two of a pyramid build: turning the manifest into tile rasters.

pub mod composite;
pub mod tile;

pub use composite::ShadowStyle;
pub use tile::{TileLayers, TileOutcome, TileRenderer};
