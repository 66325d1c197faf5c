//! K-means clustering of 2-D layout coordinates.
//!
//! # Algorithm
//!
//! 1. Seed k centroids with k-means++ (D² sampling) from a seeded `StdRng`
//! 2. Assign each point to its nearest centroid (ties go to the lower index)
//! 3. Move every cluster left without members onto the point farthest from
//!    its own centroid, taken from a cluster that keeps at least one member
//! 4. Recompute centroids as the mean of their members
//! 5. Repeat until assignments stop changing, the largest centroid movement
//!    drops below the tolerance, or the iteration limit is reached
//!
//! The returned centroids are always the exact means of the returned
//! assignments and every cluster has members. Input with fewer distinct
//! positions than `k` cannot be split that way and is reported as
//! [`KMeansError::EmptyCluster`] before any iteration runs.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parameters of one clustering run.
#[derive(Debug, Clone, Copy)]
pub struct KMeansConfig {
    pub k: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
}

/// Outcome of a successful clustering run.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// One centroid per cluster.
    pub centroids: Vec<[f64; 2]>,
    /// Cluster index of every input point.
    pub assignments: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
}

impl KMeansResult {
    /// Indices of the points assigned to `cluster`, in input order.
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == cluster)
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KMeansError {
    /// `k` is zero or larger than the number of points.
    InvalidK { k: usize, n: usize },
    /// Fewer distinct positions than clusters; cluster `cluster` would stay empty.
    EmptyCluster { cluster: usize },
}

impl fmt::Display for KMeansError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KMeansError::InvalidK { k, n } => write!(f, "k ({}) must be in 1..={}", k, n),
            KMeansError::EmptyCluster { cluster } => write!(f, "cluster {} has no members", cluster),
        }
    }
}

impl std::error::Error for KMeansError {}

/// Cluster `points` into `cfg.k` groups.
pub fn kmeans(points: &[[f64; 2]], cfg: &KMeansConfig) -> Result<KMeansResult, KMeansError> {
    let n = points.len();
    if cfg.k == 0 || cfg.k > n {
        return Err(KMeansError::InvalidK { k: cfg.k, n });
    }
    let distinct = distinct_positions(points);
    if distinct < cfg.k {
        return Err(KMeansError::EmptyCluster { cluster: distinct });
    }

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut centroids = kmeans_plus_plus_init(points, cfg.k, &mut rng);
    let mut assignments = vec![usize::MAX; n];
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..cfg.max_iterations {
        iterations = iter + 1;
        let changed = assign(points, &centroids, &mut assignments);
        let relocated = relocate_empty_clusters(points, &mut centroids, &mut assignments);
        if !changed && relocated == 0 {
            converged = true;
            break;
        }
        let updated = compute_centroids(points, &assignments, &centroids);
        let movement = centroids
            .iter()
            .zip(&updated)
            .map(|(a, b)| distance_squared(*a, *b).sqrt())
            .fold(0.0f64, f64::max);
        centroids = updated;
        if movement < cfg.tolerance {
            converged = true;
            break;
        }
    }

    // Sync labels with the final centroids, then centroids with the labels.
    assign(points, &centroids, &mut assignments);
    relocate_empty_clusters(points, &mut centroids, &mut assignments);
    centroids = compute_centroids(points, &assignments, &centroids);

    Ok(KMeansResult {
        centroids,
        assignments,
        iterations,
        converged,
    })
}

#[inline]
fn distance_squared(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Number of distinct coordinates; `-0.0` and `0.0` count as one.
fn distinct_positions(points: &[[f64; 2]]) -> usize {
    let mut keys: Vec<(u64, u64)> = points
        .iter()
        .map(|p| ((p[0] + 0.0).to_bits(), (p[1] + 0.0).to_bits()))
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len()
}

/// Choose initial centroids with probability proportional to D².
///
/// When every point already coincides with a chosen centroid the remaining
/// centroids are drawn uniformly, which yields duplicates and later an empty
/// cluster.
fn kmeans_plus_plus_init(points: &[[f64; 2]], k: usize, rng: &mut StdRng) -> Vec<[f64; 2]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);
    let mut min_d2 = vec![f64::MAX; points.len()];

    while centroids.len() < k {
        let last = centroids[centroids.len() - 1];
        for (d, p) in min_d2.iter_mut().zip(points) {
            *d = d.min(distance_squared(*p, last));
        }
        let total: f64 = min_d2.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            let mut chosen = points.len() - 1;
            for (i, d) in min_d2.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            rng.gen_range(0..points.len())
        };
        centroids.push(points[next]);
    }
    centroids
}

/// Nearest-centroid assignment. Returns whether any label changed.
fn assign(points: &[[f64; 2]], centroids: &[[f64; 2]], assignments: &mut [usize]) -> bool {
    let mut changed = false;
    for (p, slot) in points.iter().zip(assignments.iter_mut()) {
        let mut best = 0;
        let mut best_d = f64::MAX;
        for (j, c) in centroids.iter().enumerate() {
            let d = distance_squared(*p, *c);
            if d < best_d {
                best_d = d;
                best = j;
            }
        }
        if *slot != best {
            *slot = best;
            changed = true;
        }
    }
    changed
}

/// Give every empty cluster the point lying farthest from its current
/// centroid, drawn only from clusters with more than one member. Returns the
/// number of clusters moved.
///
/// Needs `k <= points.len()`, which guarantees a donor for every empty cluster.
fn relocate_empty_clusters(points: &[[f64; 2]], centroids: &mut [[f64; 2]], assignments: &mut [usize]) -> usize {
    let mut counts = vec![0usize; centroids.len()];
    for &c in assignments.iter() {
        counts[c] += 1;
    }
    let mut moved = 0;
    for empty in 0..centroids.len() {
        if counts[empty] > 0 {
            continue;
        }
        let mut far = None;
        let mut far_d = -1.0f64;
        for (i, (p, &c)) in points.iter().zip(assignments.iter()).enumerate() {
            if counts[c] < 2 {
                continue;
            }
            let d = distance_squared(*p, centroids[c]);
            if d > far_d {
                far_d = d;
                far = Some(i);
            }
        }
        let Some(i) = far else { break };
        counts[assignments[i]] -= 1;
        counts[empty] = 1;
        assignments[i] = empty;
        centroids[empty] = points[i];
        moved += 1;
    }
    moved
}

/// Member means; a cluster without members keeps its previous centroid.
fn compute_centroids(points: &[[f64; 2]], assignments: &[usize], previous: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut sums = vec![[0.0f64; 2]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (p, &c) in points.iter().zip(assignments) {
        sums[c][0] += p[0];
        sums[c][1] += p[1];
        counts[c] += 1;
    }
    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), prev)| {
            if count == 0 {
                *prev
            } else {
                [sum[0] / count as f64, sum[1] / count as f64]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(k: usize) -> KMeansConfig {
        KMeansConfig {
            k,
            max_iterations: 100,
            tolerance: 1e-9,
            seed: 42,
        }
    }

    fn blobs() -> Vec<[f64; 2]> {
        vec![
            [-0.9, -0.9],
            [-0.8, -0.85],
            [-0.85, -0.8],
            [0.9, 0.9],
            [0.8, 0.85],
            [0.85, 0.8],
        ]
    }

    #[test]
    fn separates_obvious_blobs() {
        let result = kmeans(&blobs(), &cfg(2)).unwrap();
        assert!(result.converged);
        assert_eq!(result.assignments[0], result.assignments[1]);
        assert_eq!(result.assignments[0], result.assignments[2]);
        assert_eq!(result.assignments[3], result.assignments[5]);
        assert_ne!(result.assignments[0], result.assignments[3]);
    }

    #[test]
    fn centroids_are_member_means() {
        let points = blobs();
        let result = kmeans(&points, &cfg(2)).unwrap();
        for (c, centroid) in result.centroids.iter().enumerate() {
            let members = result.members(c);
            let mean_x = members.iter().map(|&i| points[i][0]).sum::<f64>() / members.len() as f64;
            let mean_y = members.iter().map(|&i| points[i][1]).sum::<f64>() / members.len() as f64;
            assert!((centroid[0] - mean_x).abs() < 1e-12);
            assert!((centroid[1] - mean_y).abs() < 1e-12);
        }
    }

    #[test]
    fn same_seed_same_result() {
        let points: Vec<[f64; 2]> = (0..40)
            .map(|i| [((i * 37) % 100) as f64 / 50.0 - 1.0, ((i * 11) % 100) as f64 / 50.0 - 1.0])
            .collect();
        let a = kmeans(&points, &cfg(5)).unwrap();
        let b = kmeans(&points, &cfg(5)).unwrap();
        assert_eq!(a.assignments, b.assignments);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn too_few_distinct_positions_leaves_a_cluster_empty() {
        let points = vec![[0.1, 0.1], [0.1, 0.1], [0.5, 0.5], [0.5, 0.5]];
        let err = kmeans(&points, &cfg(3)).unwrap_err();
        assert!(matches!(err, KMeansError::EmptyCluster { .. }));
    }

    #[test]
    fn empty_cluster_takes_the_farthest_point() {
        let points = vec![[0.0, 0.0], [0.1, 0.0], [0.5, 0.0]];
        let mut centroids = vec![[0.0, 0.0], [9.0, 9.0]];
        let mut assignments = vec![0, 0, 0];
        assert_eq!(relocate_empty_clusters(&points, &mut centroids, &mut assignments), 1);
        assert_eq!(assignments, vec![0, 0, 1]);
        assert_eq!(centroids[1], [0.5, 0.0]);
    }

    #[test]
    fn distinct_points_always_fill_every_cluster() {
        let mut rng = StdRng::seed_from_u64(7);
        for run in 0..2000u64 {
            // A few tight clumps; every position is distinct but many are close.
            let n = rng.gen_range(4..40);
            let clumps: Vec<[f64; 2]> = (0..rng.gen_range(1..4))
                .map(|_| [rng.gen_range(-0.9..0.9), rng.gen_range(-0.9..0.9)])
                .collect();
            let points: Vec<[f64; 2]> = (0..n)
                .map(|i| {
                    let c = clumps[i % clumps.len()];
                    [
                        c[0] + rng.gen_range(-1e-3..1e-3) + i as f64 * 1e-7,
                        c[1] + rng.gen_range(-1e-3..1e-3),
                    ]
                })
                .collect();
            let k = rng.gen_range(1..n);
            let cfg = KMeansConfig {
                k,
                max_iterations: 50,
                tolerance: 1e-6,
                seed: run,
            };
            let result = kmeans(&points, &cfg).unwrap_or_else(|e| panic!("run {}: {}", run, e));
            for cluster in 0..k {
                assert!(!result.members(cluster).is_empty(), "run {}: cluster {} empty", run, cluster);
            }
        }
    }

    #[test]
    fn invalid_k_is_rejected() {
        assert_eq!(kmeans(&blobs(), &cfg(0)).unwrap_err(), KMeansError::InvalidK { k: 0, n: 6 });
        assert!(kmeans(&blobs(), &cfg(7)).is_err());
    }
}
