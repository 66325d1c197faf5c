use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use embedding_pyramid::{PyramidConfig, PyramidSession};
use log::info;
use tile_scale::presets::ResampleFilter;

/// Deep-zoom tile pyramid builder for images laid out in a 2-D embedding.
#[derive(Parser, Debug)]
#[command(name = "pyramid")]
#[command(about = "Build a zoomable tile pyramid from an embedded image collection")]
#[command(long_about = "Select representative images per depth with k-means over the 2-D layout,
write the per-depth manifest, then render every tile from the finest depth to the coarsest.
Existing tiles are kept, so an interrupted run can simply be started again.")]
struct Args {
    /// JSON configuration file; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads (0 = one per core)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Number of clustered depths; the leaf level sits at this depth
    #[arg(long, allow_negative_numbers = true)]
    tile_depth: Option<i32>,

    /// Coarsest depth to render
    #[arg(long, allow_negative_numbers = true)]
    min_depth: Option<i32>,

    /// Seed for clustering and tile scheduling
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after writing the manifest
    #[arg(long)]
    manifest_only: bool,

    /// Load the manifest from disk when it exists instead of recomputing it
    #[arg(long)]
    reuse_manifest: bool,

    /// Filter used to shrink child tiles
    #[arg(long, value_enum)]
    filter: Option<ResampleFilter>,
}

impl Args {
    fn into_config(self) -> Result<(PyramidConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => PyramidConfig::from_json_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => PyramidConfig::default(),
        };
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(depth) = self.tile_depth {
            config.tile_depth = depth;
        }
        if let Some(depth) = self.min_depth {
            config.min_depth = depth;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(filter) = self.filter {
            config.downsample_filter = filter;
        }
        config.reuse_manifest |= self.reuse_manifest;
        Ok((config, self.manifest_only))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, manifest_only) = Args::parse().into_config()?;
    info!(
        "Building pyramid: depths {}..={}, {}px tiles, manifest at {}",
        config.min_depth,
        config.tile_depth,
        config.tile_size,
        config.manifest_path.display()
    );

    let session = PyramidSession::load(config).context("loading inputs")?;
    let report = if manifest_only {
        session.run_manifest_only()?
    } else {
        session.run()?
    };

    if report.failed() > 0 {
        anyhow::bail!("{} tiles failed; rerun to retry them", report.failed());
    }
    Ok(())
}
