//! Representative selection for one spatial cell.
//!
//! A representative is always a real data point, so its image can be
//! rendered, but it is placed at the refined cluster centroid, which spreads
//! the visible images more evenly than the raw point positions would.

use std::fmt;

use crate::input::PointSet;
use crate::selection::kmeans::{KMeansConfig, KMeansError, kmeans};

/// One chosen point and its authoritative position at this depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Representative {
    /// Index into the [`PointSet`].
    pub index: usize,
    /// Refined centroid, or the point's own layout coordinate on verbatim paths.
    pub position: [f64; 2],
}

/// Which branch of the selection produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPath {
    /// `k == 0`.
    Empty,
    /// The cell holds no more than `k` points; all are returned.
    Verbatim,
    /// K-means over the layout, latent medoid per cluster.
    Clustered,
    /// Fewer distinct positions than `k`; the first `k` points are returned.
    DegenerateFallback,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub representatives: Vec<Representative>,
    pub path: SelectionPath,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionError {
    KMeans(KMeansError),
    MemberOutOfRange { index: usize, len: usize },
    NonFiniteLatent { index: usize },
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::KMeans(e) => write!(f, "k-means failed: {}", e),
            SelectionError::MemberOutOfRange { index, len } => {
                write!(f, "member index {} outside point set of {}", index, len)
            }
            SelectionError::NonFiniteLatent { index } => {
                write!(f, "latent vector of point {} is not finite", index)
            }
        }
    }
}

impl std::error::Error for SelectionError {}

impl From<KMeansError> for SelectionError {
    fn from(e: KMeansError) -> Self {
        SelectionError::KMeans(e)
    }
}

/// Picks up to `k` representatives among the members of one cell.
#[derive(Debug, Clone, Copy)]
pub struct RepresentativeSelector {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl RepresentativeSelector {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self { max_iterations, tolerance }
    }

    /// Select representatives among `members` (indices into `points`).
    ///
    /// - `k == 0`: nothing.
    /// - `members.len() <= k`: every member at its own coordinate.
    /// - otherwise k-means over the members' layout coordinates; per cluster
    ///   the member whose latent vector is closest to the cluster's mean latent
    ///   vector, placed at the cluster centroid.
    /// - fewer than `k` distinct positions: the first `k` members at their own coordinates.
    pub fn select(
        &self,
        points: &PointSet,
        members: &[usize],
        k: usize,
        seed: u64,
    ) -> Result<Selection, SelectionError> {
        if let Some(&index) = members.iter().find(|&&i| i >= points.len()) {
            return Err(SelectionError::MemberOutOfRange { index, len: points.len() });
        }
        if k == 0 {
            return Ok(Selection {
                representatives: Vec::new(),
                path: SelectionPath::Empty,
            });
        }
        if members.len() <= k {
            return Ok(Selection {
                representatives: verbatim(points, members),
                path: SelectionPath::Verbatim,
            });
        }

        let layout: Vec<[f64; 2]> = members.iter().map(|&i| points.layout(i)).collect();
        let cfg = KMeansConfig {
            k,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            seed,
        };
        let clusters = match kmeans(&layout, &cfg) {
            Ok(clusters) => clusters,
            Err(KMeansError::EmptyCluster { .. }) => {
                return Ok(Selection {
                    representatives: verbatim(points, &members[..k]),
                    path: SelectionPath::DegenerateFallback,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut representatives = Vec::with_capacity(k);
        for (cluster, centroid) in clusters.centroids.iter().enumerate() {
            let cluster_members: Vec<usize> =
                clusters.members(cluster).into_iter().map(|local| members[local]).collect();
            let index = latent_medoid(points, &cluster_members)?;
            representatives.push(Representative {
                index,
                position: *centroid,
            });
        }

        Ok(Selection {
            representatives,
            path: SelectionPath::Clustered,
        })
    }
}

fn verbatim(points: &PointSet, members: &[usize]) -> Vec<Representative> {
    members
        .iter()
        .map(|&index| Representative {
            index,
            position: points.layout(index),
        })
        .collect()
}

/// Member closest (Euclidean) to the mean latent vector of `members`.
/// Ties go to the member listed first.
fn latent_medoid(points: &PointSet, members: &[usize]) -> Result<usize, SelectionError> {
    let dim = points.dim();
    let mut mean = vec![0.0f64; dim];
    for &i in members {
        let latent = points.latent(i);
        if latent.iter().any(|v| !v.is_finite()) {
            return Err(SelectionError::NonFiniteLatent { index: i });
        }
        for (m, v) in mean.iter_mut().zip(latent) {
            *m += v;
        }
    }
    let count = members.len() as f64;
    mean.iter_mut().for_each(|m| *m /= count);

    let mut best = members[0];
    let mut best_d = f64::MAX;
    for &i in members {
        let d: f64 = points
            .latent(i)
            .iter()
            .zip(&mean)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    Ok(best)
}
