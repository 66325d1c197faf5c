//! Image store abstraction and the directory-backed implementation.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use log::info;

use crate::error::{PyramidError, PyramidResult};

/// Source of decoded sprite images.
///
/// Implementations are shared by reference between worker threads and must
/// allow concurrent reads.
pub trait ImageStore: Send + Sync {
    /// Every image id, in the order the numeric inputs are aligned to.
    fn list_ids(&self) -> &[String];

    /// Decode the image for `id` with an alpha channel.
    ///
    /// A recoverable error only fails the tiles that draw `id`; any other
    /// error stops the build.
    fn get_image(&self, id: &str) -> PyramidResult<RgbaImage>;
}

/// Images stored as `<dir>/<id>.<extension>`.
#[derive(Debug, Clone)]
pub struct DirectoryImageStore {
    dir: PathBuf,
    extension: String,
    ids: Vec<String>,
}

impl DirectoryImageStore {
    /// Open a store.
    ///
    /// Ids come from `ids_file` (one per line, blank lines skipped) when given,
    /// otherwise from the sorted file stems of every `*.extension` in `dir`.
    pub fn open(dir: &Path, extension: &str, ids_file: Option<&Path>) -> PyramidResult<Self> {
        let ids = match ids_file {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| PyramidError::io_at("reading image id list", path, e).fatal())?
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            None => Self::scan(dir, extension)?,
        };
        if ids.is_empty() {
            return Err(PyramidError::input(dir.display().to_string(), "no image ids found"));
        }
        info!("Image store at {} lists {} ids", dir.display(), ids.len());
        Ok(Self {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
            ids,
        })
    }

    fn scan(dir: &Path, extension: &str) -> PyramidResult<Vec<String>> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| PyramidError::io_at("listing image directory", dir, e).fatal())?;
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| PyramidError::io_at("listing image directory", dir, e).fatal())?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// File backing `id`.
    pub fn image_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, self.extension))
    }
}

impl ImageStore for DirectoryImageStore {
    fn list_ids(&self) -> &[String] {
        &self.ids
    }

    fn get_image(&self, id: &str) -> PyramidResult<RgbaImage> {
        let path = self.image_path(id);
        let image = image::open(&path).map_err(|e| PyramidError::image(path.display().to_string(), e))?;
        Ok(image.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn scans_sorted_ids_with_matching_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let store = DirectoryImageStore::open(dir.path(), "png", None).unwrap();
        assert_eq!(store.list_ids(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn ids_file_wins_over_listing() {
        let dir = tempfile::tempdir().unwrap();
        let ids = dir.path().join("ids.txt");
        std::fs::write(&ids, "zeta\n\nalpha\n").unwrap();
        let store = DirectoryImageStore::open(dir.path(), "png", Some(&ids)).unwrap();
        assert_eq!(store.list_ids(), &["zeta".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn decodes_with_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 0]));
        img.put_pixel(1, 1, Rgba([9, 9, 9, 255]));
        img.save(dir.path().join("x.png")).unwrap();

        let store = DirectoryImageStore::open(dir.path(), "png", None).unwrap();
        let decoded = store.get_image("x").unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(1, 1), &Rgba([9, 9, 9, 255]));
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn missing_image_is_an_image_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.png"), b"").unwrap();
        let store = DirectoryImageStore::open(dir.path(), "png", None).unwrap();
        assert_eq!(store.get_image("absent").unwrap_err().category(), "image");
    }

    #[test]
    fn empty_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirectoryImageStore::open(dir.path(), "png", None).is_err());
    }
}
