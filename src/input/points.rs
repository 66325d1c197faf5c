//! In-memory point table: one row per image with its layout coordinate and
//! latent vector, index-aligned with the image id list.

use std::collections::HashSet;

use log::{info, warn};

use crate::config::PyramidConfig;
use crate::error::{PyramidError, PyramidResult};
use crate::input::npy;

/// Borrowed view of one row of a [`PointSet`].
#[derive(Debug, Clone, Copy)]
pub struct Point<'a> {
    pub index: usize,
    pub image_id: &'a str,
    pub layout: [f64; 2],
    pub latent: &'a [f64],
}

/// Read-only table of N points. Index positions are stable for the whole run
/// and serve as back-references from selections to image ids.
#[derive(Debug, Clone)]
pub struct PointSet {
    ids: Vec<String>,
    layout: Vec<[f64; 2]>,
    latent: Vec<f64>,
    dim: usize,
}

impl PointSet {
    /// Build a point set from index-aligned columns.
    ///
    /// `latent` is row-major with `dim` values per point.
    ///
    /// # Errors
    ///
    /// Returns an `Input` error when the columns disagree in length, an id is
    /// duplicated, or a layout coordinate is not finite.
    pub fn new(ids: Vec<String>, layout: Vec<[f64; 2]>, latent: Vec<f64>, dim: usize) -> PyramidResult<Self> {
        if ids.len() != layout.len() {
            return Err(PyramidError::input(
                "layout",
                format!("{} coordinates for {} image ids", layout.len(), ids.len()),
            ));
        }
        if latent.len() != ids.len() * dim {
            return Err(PyramidError::input(
                "latent codes",
                format!("{} values do not make {} vectors of dimension {}", latent.len(), ids.len(), dim),
            ));
        }

        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(PyramidError::input("image ids", format!("duplicate id '{}'", dup)));
        }

        if let Some(i) = layout.iter().position(|p| !(p[0].is_finite() && p[1].is_finite())) {
            return Err(PyramidError::input("layout", format!("coordinate {} is not finite", i)));
        }
        let outside = layout
            .iter()
            .filter(|p| p.iter().any(|v| !(-1.0..=1.0).contains(v)))
            .count();
        if outside > 0 {
            warn!("{} layout coordinates lie outside [-1, 1] and may fall off the pyramid", outside);
        }

        Ok(Self { ids, layout, latent, dim })
    }

    /// Load the layout and latent arrays named in `config` and align them with `ids`.
    pub fn load(config: &PyramidConfig, ids: &[String]) -> PyramidResult<Self> {
        let layout = npy::read_matrix(&config.layout_path)?;
        if layout.cols != 2 {
            return Err(PyramidError::input(
                config.layout_path.display().to_string(),
                format!("layout must have 2 columns, found {}", layout.cols),
            ));
        }
        let latent = npy::read_matrix(&config.latent_path)?;
        if latent.rows != layout.rows {
            return Err(PyramidError::input(
                config.latent_path.display().to_string(),
                format!("{} latent rows for {} layout rows", latent.rows, layout.rows),
            ));
        }

        let coords = (0..layout.rows).map(|i| [layout.row(i)[0], layout.row(i)[1]]).collect();
        let set = Self::new(ids.to_vec(), coords, latent.data, latent.cols)?;
        info!("Loaded {} points with {}-dimensional latent codes", set.len(), set.dim());
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Latent dimension D.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn image_id(&self, index: usize) -> &str {
        &self.ids[index]
    }

    pub fn layout(&self, index: usize) -> [f64; 2] {
        self.layout[index]
    }

    pub fn latent(&self, index: usize) -> &[f64] {
        &self.latent[index * self.dim..(index + 1) * self.dim]
    }

    pub fn point(&self, index: usize) -> Point<'_> {
        Point {
            index,
            image_id: self.image_id(index),
            layout: self.layout(index),
            latent: self.latent(index),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Point<'_>> + '_ {
        (0..self.len()).map(move |i| self.point(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("img{}", i)).collect()
    }

    #[test]
    fn rows_are_index_aligned() {
        let set = PointSet::new(
            ids(2),
            vec![[0.1, 0.2], [-0.5, 0.5]],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            3,
        )
        .unwrap();
        let p = set.point(1);
        assert_eq!(p.image_id, "img1");
        assert_eq!(p.layout, [-0.5, 0.5]);
        assert_eq!(p.latent, &[4.0, 5.0, 6.0]);
        assert_eq!(set.iter().count(), 2);
    }

    #[test]
    fn duplicate_ids_are_fatal() {
        let err = PointSet::new(
            vec!["a".into(), "a".into()],
            vec![[0.0, 0.0], [0.1, 0.1]],
            vec![0.0, 0.0],
            1,
        )
        .unwrap_err();
        assert_eq!(err.category(), "input");
        assert!(err.to_string().contains("duplicate id 'a'"));
    }

    #[test]
    fn misaligned_columns_are_fatal() {
        assert!(PointSet::new(ids(3), vec![[0.0, 0.0]; 2], vec![0.0; 3], 1).is_err());
        assert!(PointSet::new(ids(2), vec![[0.0, 0.0]; 2], vec![0.0; 3], 2).is_err());
    }

    #[test]
    fn non_finite_layout_is_fatal() {
        assert!(PointSet::new(ids(1), vec![[f64::NAN, 0.0]], vec![0.0], 1).is_err());
    }
}
