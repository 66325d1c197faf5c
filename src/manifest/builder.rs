//! # Depth Manifest Builder
//!
//! Turns the point set into a [`DepthManifest`] for depths `0..tile_depth`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐    ┌──────────────┐    ┌───────────────────┐
//! │ cell_jobs()   │───▶│ rayon        │───▶│ fold per depth,    │
//! │ depth × cell  │    │ par_iter     │    │ ordered by cell    │
//! └───────────────┘    └──────────────┘    └───────────────────┘
//! ```
//!
//! Each job owns one `(depth, cell)` pair, gathers the points inside the cell,
//! and runs the [`RepresentativeSelector`]. Jobs are independent; results are
//! collected in job order, so the manifest does not depend on which worker
//! finished first. A failing cell is logged and contributes nothing.
//!
//! Every cell clusters with its own seed derived from the run seed and the
//! cell identity, which keeps reruns reproducible regardless of scheduling.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::PyramidConfig;
use crate::core::CellBounds;
use crate::error::PyramidError;
use crate::input::PointSet;
use crate::manifest::manifest::{DepthManifest, ManifestEntry};
use crate::selection::{RepresentativeSelector, SelectionPath};

/// One `(depth, cell)` unit of selection work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellJob {
    pub depth: i32,
    pub cell: (u32, u32),
    pub bounds: CellBounds,
    /// Cells per axis at this depth.
    pub subdivisions: u32,
    /// Representatives expected over the whole plane at this depth.
    pub density: f64,
    pub seed: u64,
}

/// Per-build tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub cells: usize,
    pub failed_cells: usize,
    pub degenerate_cells: usize,
}

/// Outcome of [`DepthManifestBuilder::build`].
#[derive(Debug, Clone)]
pub struct ManifestBuild {
    pub manifest: DepthManifest,
    pub summary: BuildSummary,
}

struct CellOutcome {
    depth: i32,
    entries: Vec<ManifestEntry>,
    path: Option<SelectionPath>,
}

pub struct DepthManifestBuilder<'a> {
    config: &'a PyramidConfig,
    selector: RepresentativeSelector,
}

impl<'a> DepthManifestBuilder<'a> {
    pub fn new(config: &'a PyramidConfig) -> Self {
        Self {
            config,
            selector: RepresentativeSelector::new(config.kmeans_max_iterations, config.kmeans_tolerance),
        }
    }

    /// Every `(depth, cell)` job, depth-major then `cx`, then `cy`.
    pub fn cell_jobs(&self) -> Vec<CellJob> {
        let mut jobs = Vec::new();
        for depth in 0..self.config.tile_depth {
            let n = self.config.subdivisions(depth);
            for cx in 0..n {
                for cy in 0..n {
                    jobs.push(CellJob {
                        depth,
                        cell: (cx, cy),
                        bounds: CellBounds::of(n, cx, cy),
                        subdivisions: n,
                        density: self.config.density(depth),
                        seed: cell_seed(self.config.seed, depth, cx, cy),
                    });
                }
            }
        }
        jobs
    }

    /// Number of representatives requested from a cell holding `n_cell` of `n_total` points.
    pub fn representative_count(job: &CellJob, n_cell: usize, n_total: usize) -> usize {
        if n_total == 0 {
            return 0;
        }
        let expected = if job.subdivisions <= 1 {
            job.density
        } else {
            job.density * n_cell as f64 / n_total as f64
        };
        expected.round().max(0.0) as usize
    }

    /// Select the representatives of one cell.
    pub fn run_job(&self, points: &PointSet, job: &CellJob) -> Result<(Vec<ManifestEntry>, SelectionPath), PyramidError> {
        let members: Vec<usize> = (0..points.len())
            .filter(|&i| job.bounds.contains(points.layout(i)))
            .collect();
        let k = Self::representative_count(job, members.len(), points.len());

        let selection = self
            .selector
            .select(points, &members, k, job.seed)
            .map_err(|e| {
                PyramidError::selection(job.depth, job.cell, e.to_string())
                    .with_metadata("members", members.len().to_string())
                    .with_metadata("k", k.to_string())
            })?;

        let entries = selection
            .representatives
            .iter()
            .map(|r| ManifestEntry::new(points.image_id(r.index), r.position))
            .collect();
        Ok((entries, selection.path))
    }

    /// Run every cell job on the current rayon pool and merge the results.
    pub fn build(&self, points: &PointSet) -> ManifestBuild {
        let jobs = self.cell_jobs();
        info!(
            "Selecting representatives for {} cells over depths 0..{}",
            jobs.len(),
            self.config.tile_depth
        );

        let outcomes: Vec<CellOutcome> = jobs
            .par_iter()
            .map(|job| match self.run_job(points, job) {
                Ok((entries, path)) => {
                    debug!(
                        "depth {} cell ({}, {}): {} representatives ({:?})",
                        job.depth,
                        job.cell.0,
                        job.cell.1,
                        entries.len(),
                        path
                    );
                    CellOutcome {
                        depth: job.depth,
                        entries,
                        path: Some(path),
                    }
                }
                Err(e) => {
                    warn!("{}", e);
                    CellOutcome {
                        depth: job.depth,
                        entries: Vec::new(),
                        path: None,
                    }
                }
            })
            .collect();

        let mut manifest = DepthManifest::new();
        let mut summary = BuildSummary {
            cells: outcomes.len(),
            ..BuildSummary::default()
        };
        for depth in 0..self.config.tile_depth {
            manifest.set_level(depth, Vec::new());
        }
        let mut levels: BTreeMap<i32, Vec<ManifestEntry>> = BTreeMap::new();
        for outcome in outcomes {
            match outcome.path {
                None => summary.failed_cells += 1,
                Some(SelectionPath::DegenerateFallback) => summary.degenerate_cells += 1,
                Some(_) => {}
            }
            levels.entry(outcome.depth).or_default().extend(outcome.entries);
        }
        for (depth, entries) in levels {
            info!("depth {}: {} representatives", depth, entries.len());
            manifest.set_level(depth, entries);
        }

        if summary.failed_cells > 0 {
            warn!("{} of {} cells failed selection", summary.failed_cells, summary.cells);
        }
        ManifestBuild { manifest, summary }
    }
}

/// Per-cell seed: SplitMix64 over the run seed and the cell identity.
pub fn cell_seed(seed: u64, depth: i32, cx: u32, cy: u32) -> u64 {
    let mut z = seed
        ^ (depth as u32 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ ((u64::from(cx) << 32) | u64::from(cy)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_points(side: usize) -> PointSet {
        let (ids, layout, latent) = grid_columns(side);
        PointSet::new(ids, layout, latent, 3).unwrap()
    }

    /// Ids, layout and 3-d latent rows of a `side × side` grid over the plane.
    fn grid_columns(side: usize) -> (Vec<String>, Vec<[f64; 2]>, Vec<f64>) {
        let mut ids = Vec::new();
        let mut layout = Vec::new();
        let mut latent = Vec::new();
        for i in 0..side {
            for j in 0..side {
                let x = -0.95 + 1.9 * i as f64 / (side - 1) as f64;
                let y = -0.95 + 1.9 * j as f64 / (side - 1) as f64;
                ids.push(format!("g{}_{}", i, j));
                layout.push([x, y]);
                latent.extend([x * 3.0, y * 3.0, 1.0]);
            }
        }
        (ids, layout, latent)
    }

    fn config(tile_depth: i32) -> PyramidConfig {
        PyramidConfig {
            tile_depth,
            ..PyramidConfig::default()
        }
    }

    #[test]
    fn jobs_cover_every_cell_once() {
        let config = config(5);
        let jobs = DepthManifestBuilder::new(&config).cell_jobs();
        // 1 + 1 + 1 + 4 + 16 cells for depths 0..5
        assert_eq!(jobs.len(), 23);
        assert_eq!(jobs.iter().filter(|j| j.depth == 4).count(), 16);
        assert!(jobs.iter().filter(|j| j.depth < 3).all(|j| j.bounds.whole_plane));
    }

    #[test]
    fn representative_count_scales_with_cell_share() {
        let config = config(5);
        let jobs = DepthManifestBuilder::new(&config).cell_jobs();
        let whole = jobs.iter().find(|j| j.depth == 1).unwrap();
        assert_eq!(DepthManifestBuilder::representative_count(whole, 10, 100), 8);
        let quarter = jobs.iter().find(|j| j.depth == 3).unwrap();
        assert_eq!(DepthManifestBuilder::representative_count(quarter, 25, 100), 32);
        assert_eq!(DepthManifestBuilder::representative_count(quarter, 0, 100), 0);
    }

    #[test]
    fn shallow_depths_hold_density_representatives() {
        let points = grid_points(12);
        let config = config(3);
        let build = DepthManifestBuilder::new(&config).build(&points);
        assert_eq!(build.manifest.level(0).len(), 2);
        assert_eq!(build.manifest.level(1).len(), 8);
        assert_eq!(build.manifest.level(2).len(), 32);
        assert_eq!(build.summary.failed_cells, 0);
        assert_eq!(build.summary.cells, 3);
    }

    #[test]
    fn failed_cell_contributes_nothing_and_build_continues() {
        let (ids, layout, mut latent) = grid_columns(12);
        // Point 0 sits at (-0.95, -0.95), inside cell (0, 0).
        latent[0] = f64::NAN;
        let points = PointSet::new(ids, layout, latent, 3).unwrap();
        let config = PyramidConfig {
            tile_depth: 1,
            subdivision_start: -1,
            base_density: 40.0,
            ..PyramidConfig::default()
        };

        let build = DepthManifestBuilder::new(&config).build(&points);
        assert_eq!(build.summary.cells, 4);
        assert_eq!(build.summary.failed_cells, 1);
        // 36 points per cell, round(40 * 36 / 144) = 10 from each healthy cell.
        let level = build.manifest.level(0);
        assert_eq!(level.len(), 30);
        assert!(level.iter().all(|e| !(e.x <= 0.0 && e.y <= 0.0)));
    }

    #[test]
    fn every_entry_names_a_known_image() {
        let points = grid_points(10);
        let config = config(4);
        let build = DepthManifestBuilder::new(&config).build(&points);
        for depth in 0..4 {
            for entry in build.manifest.level(depth) {
                assert!(points.ids().contains(&entry.image_id));
                assert!(entry.x.abs() <= 1.0 && entry.y.abs() <= 1.0);
            }
        }
    }

    #[test]
    fn builds_are_reproducible() {
        let points = grid_points(9);
        let config = config(4);
        let a = DepthManifestBuilder::new(&config).build(&points);
        let b = DepthManifestBuilder::new(&config).build(&points);
        assert_eq!(a.manifest, b.manifest);
    }

    #[test]
    fn cell_seeds_differ_between_cells() {
        let a = cell_seed(0, 3, 0, 1);
        let b = cell_seed(0, 3, 1, 0);
        let c = cell_seed(0, 4, 0, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, cell_seed(0, 3, 0, 1));
    }
}
