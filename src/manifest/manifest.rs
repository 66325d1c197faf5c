//! # Depth Manifest
//!
//! The manifest maps every depth to the images shown at that depth and where.
//! It is fully built before any tile is rendered and only read afterwards.
//!
//! ## File Format
//!
//! JSON object keyed by `depth + depth_offset`, each value an ordered list of
//! records:
//!
//! ```text
//! {"3": [{"image": "a17", "x": -0.41, "y": 0.12}, ...], "4": [...]}
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{PyramidError, PyramidResult};
use crate::input::PointSet;

/// One image placed at a depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "image")]
    pub image_id: String,
    pub x: f64,
    pub y: f64,
}

impl ManifestEntry {
    pub fn new(image_id: impl Into<String>, position: [f64; 2]) -> Self {
        Self {
            image_id: image_id.into(),
            x: position[0],
            y: position[1],
        }
    }

    pub fn position(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// Ordered entries per depth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthManifest {
    levels: BTreeMap<i32, Vec<ManifestEntry>>,
}

impl DepthManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entries of `depth`.
    pub fn set_level(&mut self, depth: i32, entries: Vec<ManifestEntry>) {
        self.levels.insert(depth, entries);
    }

    /// Entries of `depth`; empty when the depth has none.
    pub fn level(&self, depth: i32) -> &[ManifestEntry] {
        self.levels.get(&depth).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn depths(&self) -> impl Iterator<Item = i32> + '_ {
        self.levels.keys().copied()
    }

    pub fn total_entries(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }

    /// Add the unclustered level: every point at its own layout position.
    pub fn with_leaf_level(mut self, points: &PointSet, leaf_depth: i32) -> Self {
        let entries = points
            .iter()
            .map(|p| ManifestEntry::new(p.image_id, p.layout))
            .collect();
        self.levels.insert(leaf_depth, entries);
        self
    }

    /// Serialize with every depth shifted by `depth_offset`.
    pub fn to_json(&self, depth_offset: i32) -> PyramidResult<String> {
        let shifted: BTreeMap<i32, &Vec<ManifestEntry>> = self
            .levels
            .iter()
            .map(|(depth, entries)| (depth + depth_offset, entries))
            .collect();
        serde_json::to_string(&shifted)
            .map_err(|e| PyramidError::manifest("serializing manifest", Some(e)))
    }

    /// Parse a manifest written by [`DepthManifest::to_json`] with the same offset.
    pub fn from_json(text: &str, depth_offset: i32) -> PyramidResult<Self> {
        let shifted: BTreeMap<i32, Vec<ManifestEntry>> = serde_json::from_str(text)
            .map_err(|e| PyramidError::manifest("parsing manifest", Some(e)))?;
        let levels = shifted
            .into_iter()
            .map(|(file_depth, entries)| (file_depth - depth_offset, entries))
            .collect();
        Ok(Self { levels })
    }

    /// Write the manifest, creating parent directories as needed.
    pub fn save(&self, path: &Path, depth_offset: i32) -> PyramidResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| PyramidError::io_at("creating manifest directory", parent, e).fatal())?;
        }
        let json = self.to_json(depth_offset)?;
        let partial = path.with_extension("json.partial");
        fs::write(&partial, json)
            .map_err(|e| PyramidError::io_at("writing manifest", &partial, e).fatal())?;
        fs::rename(&partial, path)
            .map_err(|e| PyramidError::io_at("renaming manifest", path, e).fatal())?;
        info!(
            "Wrote manifest with {} entries over {} depths to {}",
            self.total_entries(),
            self.levels.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path, depth_offset: i32) -> PyramidResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| PyramidError::io_at("reading manifest", path, e).fatal())?;
        Self::from_json(&text, depth_offset)
    }
}
