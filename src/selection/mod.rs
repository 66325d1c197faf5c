//! # Selection Module
//!
//! Clustering and representative picking for a single spatial cell.
//! [`kmeans`] works purely on layout coordinates; [`representative`] turns
//! clusters into real data points using their latent vectors.

pub mod kmeans;
pub mod representative;

pub use kmeans::{KMeansConfig, KMeansError, KMeansResult};
pub use representative::{Representative, RepresentativeSelector, Selection, SelectionError, SelectionPath};
