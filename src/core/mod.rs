//! # Core Infrastructure Module
//!
//! Coordinate conventions shared by selection and rendering: the layout
//! plane, the per-depth selection grid and tile addressing.

pub mod geometry;

pub use geometry::{CellBounds, PlaneBox, TileAddress, tile_addresses, tile_range};
