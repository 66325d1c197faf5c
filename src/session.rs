//! # Pyramid Session Management
//!
//! High-level orchestration of a pyramid build. A session owns the loaded
//! inputs and drives the two phases on one worker pool.
//!
//! ## Architecture
//!
//! 1. **Load**: point set, image store and rotation table (failures are fatal)
//! 2. **Phase 1**: build or reuse the depth manifest, write it, append the leaf level
//! 3. **Barrier**: the manifest is complete and read-only from here on
//! 4. **Phase 2**: render depths from the leaf depth down to `min_depth`
//!
//! ## Per-depth Ordering
//!
//! A parent tile reads its children from disk, so depth `d` starts only after
//! every tile of depth `d + 1` has finished. Inside a depth, tiles are
//! independent: their directories are created up front, the addresses are
//! shuffled to spread expensive regions over the workers, and each address is
//! dispatched exactly once.
//!
//! ## Resumability
//!
//! Existing tiles are skipped and tiles are published by rename, so rerunning
//! an interrupted build finishes the missing tiles and leaves the rest untouched.
//!
//! A recoverable tile error (a bad image, a failed composite) is logged and
//! counted. Any other error, such as an unwritable output file, stops the
//! build once the current depth has joined.

use std::fmt;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::ThreadPool;
use rayon::prelude::*;

use crate::config::PyramidConfig;
use crate::core::tile_addresses;
use crate::error::{PyramidError, PyramidResult, Recoverable};
use crate::input::{DirectoryImageStore, ImageStore, PointSet, RotationTable};
use crate::manifest::{BuildSummary, DepthManifest, DepthManifestBuilder};
use crate::processing::{TileOutcome, TileRenderer};

/// Tile counts for one depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepthReport {
    pub depth: i32,
    pub tiles: usize,
    pub written: usize,
    pub skipped: usize,
    pub empty: usize,
    pub failed: usize,
    /// Manifest entries available to this depth.
    pub entries: usize,
}

impl DepthReport {
    fn record(&mut self, outcome: &PyramidResult<TileOutcome>) {
        match outcome {
            Ok(TileOutcome::Written) => self.written += 1,
            Ok(TileOutcome::Skipped) => self.skipped += 1,
            Ok(TileOutcome::Empty) => self.empty += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default)]
pub struct PyramidReport {
    /// `None` when the manifest was reused from disk.
    pub selection: Option<BuildSummary>,
    pub manifest_entries: usize,
    /// Finest depth first.
    pub depths: Vec<DepthReport>,
    pub elapsed: Duration,
}

impl PyramidReport {
    pub fn written(&self) -> usize {
        self.depths.iter().map(|d| d.written).sum()
    }

    pub fn failed(&self) -> usize {
        self.depths.iter().map(|d| d.failed).sum()
    }

    pub fn depth(&self, depth: i32) -> Option<&DepthReport> {
        self.depths.iter().find(|d| d.depth == depth)
    }
}

impl fmt::Display for PyramidReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} manifest entries, finished in {:.1?}", self.manifest_entries, self.elapsed)?;
        for d in &self.depths {
            writeln!(
                f,
                "  depth {:>3}: {:>6} tiles, {:>6} written, {:>6} skipped, {:>6} empty, {:>4} failed",
                d.depth, d.tiles, d.written, d.skipped, d.empty, d.failed
            )?;
        }
        Ok(())
    }
}

/// Loaded inputs plus the configuration of one build.
pub struct PyramidSession {
    config: PyramidConfig,
    points: PointSet,
    images: Box<dyn ImageStore>,
    rotations: RotationTable,
}

impl PyramidSession {
    /// Create a session using the builder pattern.
    pub fn builder(config: PyramidConfig) -> PyramidSessionBuilder {
        PyramidSessionBuilder::new(config)
    }

    /// Load every input named in `config`.
    pub fn load(config: PyramidConfig) -> PyramidResult<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    pub fn points(&self) -> &PointSet {
        &self.points
    }

    /// Phase 1 and phase 2.
    pub fn run(&self) -> PyramidResult<PyramidReport> {
        self.execute(true)
    }

    /// Phase 1 only: the manifest is written and no tile is rendered.
    pub fn run_manifest_only(&self) -> PyramidResult<PyramidReport> {
        self.execute(false)
    }

    fn execute(&self, render: bool) -> PyramidResult<PyramidReport> {
        let started = Instant::now();
        let pool = self.thread_pool()?;

        let (manifest, selection) = self.prepare_manifest(&pool)?;
        let mut report = PyramidReport {
            selection,
            manifest_entries: manifest.total_entries(),
            ..PyramidReport::default()
        };

        if render {
            let renderer = TileRenderer::new(&self.config, &manifest, self.images.as_ref(), &self.rotations);
            let mut rng = StdRng::seed_from_u64(self.config.seed);
            for depth in (self.config.min_depth..=self.config.leaf_depth()).rev() {
                let depth_report = self.render_depth(&pool, &renderer, &manifest, depth, &mut rng)?;
                report.depths.push(depth_report);
            }
        }

        report.elapsed = started.elapsed();
        info!("Pyramid build complete: {} tiles written, {} failed", report.written(), report.failed());
        info!("{}", report);
        Ok(report)
    }

    fn thread_pool(&self) -> PyramidResult<ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("pyramid-worker-{}", i))
            .build()
            .map_err(|e| PyramidError::config("workers", e.to_string()))
    }

    /// Build (or reuse) the manifest, persist it, and add the leaf level.
    fn prepare_manifest(&self, pool: &ThreadPool) -> PyramidResult<(DepthManifest, Option<BuildSummary>)> {
        let path = &self.config.manifest_path;
        let (manifest, selection) = if self.config.reuse_manifest && path.exists() {
            info!("Reusing manifest at {}", path.display());
            (DepthManifest::load(path, self.config.depth_offset)?, None)
        } else {
            let builder = DepthManifestBuilder::new(&self.config);
            let build = pool.install(|| builder.build(&self.points));
            build.manifest.save(path, self.config.depth_offset)?;
            (build.manifest, Some(build.summary))
        };
        Ok((manifest.with_leaf_level(&self.points, self.config.leaf_depth()), selection))
    }

    fn render_depth(
        &self,
        pool: &ThreadPool,
        renderer: &TileRenderer<'_>,
        manifest: &DepthManifest,
        depth: i32,
        rng: &mut StdRng,
    ) -> PyramidResult<DepthReport> {
        let mut tiles = tile_addresses(depth);
        renderer.prepare_directories(&tiles)?;
        tiles.shuffle(rng);

        let mut report = DepthReport {
            depth,
            tiles: tiles.len(),
            entries: manifest.level(depth).len(),
            ..DepthReport::default()
        };
        info!("Rendering depth {}: {} tiles", depth, tiles.len());

        let outcomes: Vec<_> = pool.install(|| tiles.par_iter().map(|&tile| (tile, renderer.render(tile))).collect());
        let mut fatal = None;
        for (tile, outcome) in outcomes {
            report.record(&outcome);
            if let Err(e) = outcome {
                error!("tile ({}, {}, {}): {}", tile.depth, tile.x, tile.y, e);
                if fatal.is_none() && !e.is_recoverable() {
                    fatal = Some(e);
                }
            }
        }
        if report.failed > 0 {
            warn!("depth {}: {} of {} tiles failed", depth, report.failed, report.tiles);
        }
        if let Some(e) = fatal {
            error!("depth {}: aborting the build after an unrecoverable tile error", depth);
            return Err(e);
        }
        Ok(report)
    }
}

/// Builder for [`PyramidSession`]. Inputs not supplied explicitly are loaded
/// from the locations named in the configuration.
pub struct PyramidSessionBuilder {
    config: PyramidConfig,
    points: Option<PointSet>,
    images: Option<Box<dyn ImageStore>>,
    rotations: Option<RotationTable>,
}

impl PyramidSessionBuilder {
    pub fn new(config: PyramidConfig) -> Self {
        Self {
            config,
            points: None,
            images: None,
            rotations: None,
        }
    }

    pub fn with_points(mut self, points: PointSet) -> Self {
        self.points = Some(points);
        self
    }

    pub fn with_image_store<S: ImageStore + 'static>(mut self, store: S) -> Self {
        self.images = Some(Box::new(store));
        self
    }

    pub fn with_rotations(mut self, rotations: RotationTable) -> Self {
        self.rotations = Some(rotations);
        self
    }

    /// Validate the configuration and load the missing inputs.
    pub fn build(self) -> PyramidResult<PyramidSession> {
        let config = self.config;
        config
            .validate()
            .map_err(|reason| PyramidError::config("configuration", reason))?;

        let images: Box<dyn ImageStore> = match self.images {
            Some(images) => images,
            None => Box::new(DirectoryImageStore::open(
                &config.image_dir,
                &config.image_extension,
                config.ids_file.as_deref(),
            )?),
        };
        let points = match self.points {
            Some(points) => points,
            None => PointSet::load(&config, images.list_ids())?,
        };
        let rotations = match self.rotations {
            Some(rotations) => rotations,
            None => RotationTable::load(&config.rotations_path)?,
        };

        Ok(PyramidSession {
            config,
            points,
            images,
            rotations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_report_tallies_outcomes() {
        let mut report = DepthReport::default();
        report.record(&Ok(TileOutcome::Written));
        report.record(&Ok(TileOutcome::Written));
        report.record(&Ok(TileOutcome::Skipped));
        report.record(&Ok(TileOutcome::Empty));
        report.record(&Err(PyramidError::render((0, 0, 0), "boom")));
        assert_eq!((report.written, report.skipped, report.empty, report.failed), (2, 1, 1, 1));
    }

    #[test]
    fn invalid_configuration_is_rejected_before_loading() {
        let config = PyramidConfig {
            tile_size: 0,
            ..PyramidConfig::default()
        };
        let err = PyramidSession::load(config).err().unwrap();
        assert_eq!(err.category(), "config");
    }
}
