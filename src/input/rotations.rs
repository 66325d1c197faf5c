//! Display rotation lookup: `id,degrees` per line, loaded fully before rendering.

use std::collections::HashMap;
use std::path::Path;

use log::info;

use crate::error::{PyramidError, PyramidResult};

/// Map from image id to its precomputed display rotation in degrees
/// (counter-clockwise).
#[derive(Debug, Clone, Default)]
pub struct RotationTable {
    angles: HashMap<String, f64>,
}

impl RotationTable {
    /// Load and parse a rotation table file. Any malformed row is fatal.
    pub fn load(path: &Path) -> PyramidResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PyramidError::io_at("reading rotation table", path, e).fatal())?;
        let table = Self::parse(&text)
            .map_err(|reason| PyramidError::input(path.display().to_string(), reason))?;
        info!("Loaded {} rotations from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse table text. Blank lines and lines starting with `#` are ignored.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut angles = HashMap::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (id, degrees) = line
                .split_once(',')
                .ok_or_else(|| format!("line {}: expected 'id,degrees'", n + 1))?;
            let degrees: f64 = degrees
                .trim()
                .parse()
                .map_err(|_| format!("line {}: '{}' is not a number", n + 1, degrees.trim()))?;
            angles.insert(id.trim().to_string(), degrees);
        }
        Ok(Self { angles })
    }

    /// Rotation of `id` in degrees, if the table has a row for it.
    pub fn angle(&self, id: &str) -> Option<f64> {
        self.angles.get(id).copied()
    }

    pub fn insert(&mut self, id: impl Into<String>, degrees: f64) {
        self.angles.insert(id.into(), degrees);
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }
}
