//! # Tile Rendering
//!
//! Produces the raster for one `(depth, x, y)` address and writes it once.
//!
//! ## Layers
//!
//! A tile is built from up to two layers drawn in order onto a background
//! canvas:
//!
//! 1. **Downsample** (depths below the leaf depth): the four children one
//!    depth finer are read back from disk, shrunk to half size, and packed
//!    into their quadrants. Missing children leave background.
//! 2. **Composite** (depths above `min_composite_depth`): every manifest entry
//!    of this depth whose position lies strictly inside the tile box grown by
//!    the sprite margin is drawn with its shadow.
//!
//! A tile with no child and no entry is empty and is not written, so its
//! parent sees it as missing.
//!
//! ## Write-once Output
//!
//! An existing output file means the tile is done and it is skipped. New
//! tiles are encoded into a sibling `.partial` file and renamed into place.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fast_image_resize::Resizer;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat, Rgba, RgbaImage, RgbImage};
use log::{debug, trace};
use tile_scale::presets::{ResampleFilter, Size};
use tile_scale::quadtree::{ChildTile, pack_quadrants};

use crate::config::PyramidConfig;
use crate::core::TileAddress;
use crate::error::{PyramidError, PyramidResult};
use crate::input::{ImageStore, RotationTable};
use crate::manifest::DepthManifest;
use crate::processing::composite::{ShadowStyle, draw_sprite, prepare_sprite};

/// Result of one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOutcome {
    Written,
    /// The output file already existed.
    Skipped,
    /// Nothing to draw; no file was written.
    Empty,
}

/// Counts of what went onto a composed canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileLayers {
    pub children: usize,
    pub sprites: usize,
}

impl TileLayers {
    pub fn is_empty(&self) -> bool {
        self.children == 0 && self.sprites == 0
    }
}

/// Renders tiles from shared, read-only inputs. Cheap to share between threads.
pub struct TileRenderer<'a> {
    config: &'a PyramidConfig,
    manifest: &'a DepthManifest,
    images: &'a dyn ImageStore,
    rotations: &'a RotationTable,
    shadow: ShadowStyle,
}

impl<'a> TileRenderer<'a> {
    pub fn new(
        config: &'a PyramidConfig,
        manifest: &'a DepthManifest,
        images: &'a dyn ImageStore,
        rotations: &'a RotationTable,
    ) -> Self {
        Self {
            config,
            manifest,
            images,
            rotations,
            shadow: ShadowStyle {
                radius: config.shadow_radius,
                opacity: config.shadow_opacity,
            },
        }
    }

    /// Create the parent directory of every tile in `tiles`. Returns how many
    /// distinct directories were ensured.
    pub fn prepare_directories(&self, tiles: &[TileAddress]) -> PyramidResult<usize> {
        let mut dirs: Vec<PathBuf> = tiles
            .iter()
            .filter_map(|t| self.config.tile_path(t.depth, t.x, t.y).parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        dirs.sort();
        dirs.dedup();
        for dir in &dirs {
            fs::create_dir_all(dir)
                .map_err(|e| PyramidError::io_at("creating tile directory", dir, e).fatal())?;
        }
        Ok(dirs.len())
    }

    /// Render `tile` unless its file already exists.
    pub fn render(&self, tile: TileAddress) -> PyramidResult<TileOutcome> {
        let path = self.config.tile_path(tile.depth, tile.x, tile.y);
        if path.exists() {
            trace!("{} exists, skipping", path.display());
            return Ok(TileOutcome::Skipped);
        }

        let mut resizer = Resizer::new();
        let (canvas, layers) = self.compose(tile, &mut resizer)?;
        if layers.is_empty() {
            return Ok(TileOutcome::Empty);
        }

        self.save(tile, &path, &canvas)?;
        debug!(
            "tile ({}, {}, {}): {} children, {} sprites",
            tile.depth, tile.x, tile.y, layers.children, layers.sprites
        );
        Ok(TileOutcome::Written)
    }

    /// Build the canvas of `tile` without touching its output file.
    pub fn compose(&self, tile: TileAddress, resizer: &mut Resizer) -> PyramidResult<(RgbaImage, TileLayers)> {
        let mut layers = TileLayers::default();
        let mut canvas = if tile.depth < self.config.leaf_depth() {
            let (canvas, children) = self.downsample_layer(tile, resizer)?;
            layers.children = children;
            canvas
        } else {
            let [r, g, b] = self.config.background;
            RgbaImage::from_pixel(self.config.tile_size, self.config.tile_size, Rgba([r, g, b, 255]))
        };

        if tile.depth > self.config.min_composite_depth {
            layers.sprites = self.composite_layer(tile, &mut canvas, resizer)?;
        }
        Ok((canvas, layers))
    }

    fn downsample_layer(&self, tile: TileAddress, resizer: &mut Resizer) -> PyramidResult<(RgbaImage, usize)> {
        let loaded: [[Option<RgbaImage>; 2]; 2] = [
            [self.load_child(tile, 0, 0)?, self.load_child(tile, 0, 1)?],
            [self.load_child(tile, 1, 0)?, self.load_child(tile, 1, 1)?],
        ];
        let children = loaded.each_ref().map(|column| {
            column.each_ref().map(|child| {
                child.as_ref().map(|img| ChildTile {
                    rgba: img.as_raw(),
                    size: Size {
                        w: img.width(),
                        h: img.height(),
                    },
                })
            })
        });

        let cfg = self.config.quadrant_cfg();
        let mut buf = vec![0u8; Size { w: cfg.tile_side, h: cfg.tile_side }.rgba_len()];
        let placed = pack_quadrants(resizer, &children, cfg, &mut buf)
            .map_err(|e| PyramidError::render(tile.key(), format!("downsampling children: {:#}", e)))?;
        let canvas = RgbaImage::from_raw(cfg.tile_side, cfg.tile_side, buf)
            .ok_or_else(|| PyramidError::render(tile.key(), "tile buffer has the wrong size"))?;
        Ok((canvas, placed))
    }

    fn load_child(&self, tile: TileAddress, a: i64, b: i64) -> PyramidResult<Option<RgbaImage>> {
        let child = tile.child(a, b);
        let path = self.config.tile_path(child.depth, child.x, child.y);
        if !path.exists() {
            return Ok(None);
        }
        let img = image::open(&path)
            .map_err(|e| PyramidError::image(path.display().to_string(), e).with_context(format!("child of {:?}", tile.key())))?;
        Ok(Some(img.to_rgba8()))
    }

    fn composite_layer(&self, tile: TileAddress, canvas: &mut RgbaImage, resizer: &mut Resizer) -> PyramidResult<usize> {
        let bounds = tile.expanded_box(self.config.margin());
        let mut drawn = 0;
        for entry in self.manifest.level(tile.depth) {
            if !bounds.contains(entry.position()) {
                continue;
            }
            let original = self.images.get_image(&entry.image_id)?;
            let degrees = self.rotations.angle(&entry.image_id).unwrap_or_else(|| {
                debug!("no rotation for '{}', drawing unrotated", entry.image_id);
                0.0
            });
            let sprite = prepare_sprite(resizer, &original, degrees, self.config.image_size, ResampleFilter::Bicubic)
                .map_err(|e| PyramidError::render(tile.key(), format!("scaling '{}': {}", entry.image_id, e)))?;
            let center = tile.to_pixels(entry.position(), self.config.tile_size);
            draw_sprite(canvas, &sprite, center, &self.shadow);
            drawn += 1;
        }
        Ok(drawn)
    }

    fn save(&self, tile: TileAddress, path: &Path, canvas: &RgbaImage) -> PyramidResult<()> {
        let format = ImageFormat::from_path(path)
            .map_err(|e| PyramidError::image(path.display().to_string(), e))?;
        let rgb: RgbImage = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();

        let partial = partial_path(path);
        let file = File::create(&partial).map_err(|e| PyramidError::io_at("creating tile", &partial, e))?;
        let mut writer = BufWriter::new(file);
        let encoded = match format {
            ImageFormat::Jpeg => JpegEncoder::new_with_quality(&mut writer, self.config.tile_quality).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ColorType::Rgb8.into(),
            ),
            other => rgb.write_to(&mut writer, other),
        };
        encoded
            .map_err(|e| PyramidError::image(path.display().to_string(), e).with_context(format!("tile {:?}", tile.key())))?;
        writer
            .flush()
            .map_err(|e| PyramidError::io_at("flushing tile", &partial, e))?;
        drop(writer);

        fs::rename(&partial, path).map_err(|e| PyramidError::io_at("publishing tile", path, e))
    }
}

/// `<file>.partial` next to `path`.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestEntry;
    use std::collections::HashMap;

    struct SolidImages(HashMap<String, RgbaImage>, Vec<String>);

    impl SolidImages {
        fn new(ids: &[&str]) -> Self {
            let map = ids
                .iter()
                .map(|id| (id.to_string(), RgbaImage::from_pixel(32, 32, Rgba([0, 0, 255, 255]))))
                .collect();
            Self(map, ids.iter().map(|s| s.to_string()).collect())
        }
    }

    impl ImageStore for SolidImages {
        fn list_ids(&self) -> &[String] {
            &self.1
        }

        fn get_image(&self, id: &str) -> PyramidResult<RgbaImage> {
            self.0
                .get(id)
                .cloned()
                .ok_or_else(|| {
                    let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "unknown image");
                    PyramidError::image(id, image::ImageError::IoError(missing))
                })
        }
    }

    fn config(dir: &Path) -> PyramidConfig {
        PyramidConfig {
            tile_size: 64,
            image_size: 16,
            shadow_radius: 2,
            tile_depth: 2,
            min_depth: -1,
            tile_path_format: format!("{}/{{depth}}/{{x}}/{{y}}.png", dir.display()),
            ..PyramidConfig::default()
        }
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(partial_path(Path::new("a/b/3.jpg")), PathBuf::from("a/b/3.jpg.partial"));
    }

    #[test]
    fn leaf_tile_with_entry_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut manifest = DepthManifest::new();
        manifest.set_level(2, vec![ManifestEntry::new("a", [0.1, 0.1])]);
        let images = SolidImages::new(&["a"]);
        let rotations = RotationTable::default();
        let renderer = TileRenderer::new(&config, &manifest, &images, &rotations);

        let tile = TileAddress::new(2, 0, 0);
        renderer.prepare_directories(&[tile]).unwrap();
        assert_eq!(renderer.render(tile).unwrap(), TileOutcome::Written);
        assert_eq!(renderer.render(tile).unwrap(), TileOutcome::Skipped);

        let written = image::open(config.tile_path(2, 0, 0)).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (64, 64));
        // 0.1 * 4 * 64 = 25.6 px from the tile origin.
        let p = written.get_pixel(25, 25);
        assert!(p[2] > 200 && p[0] < 50, "{:?}", p);
        assert!(!partial_path(&config.tile_path(2, 0, 0)).exists());
    }

    #[test]
    fn tile_without_children_or_entries_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let manifest = DepthManifest::new();
        let images = SolidImages::new(&[]);
        let rotations = RotationTable::default();
        let renderer = TileRenderer::new(&config, &manifest, &images, &rotations);
        let tile = TileAddress::new(0, -1, -1);
        renderer.prepare_directories(&[tile]).unwrap();
        assert_eq!(renderer.render(tile).unwrap(), TileOutcome::Empty);
        assert!(!config.tile_path(0, -1, -1).exists());
    }

    #[test]
    fn missing_image_fails_the_tile() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut manifest = DepthManifest::new();
        manifest.set_level(2, vec![ManifestEntry::new("ghost", [0.1, 0.1])]);
        let images = SolidImages::new(&[]);
        let rotations = RotationTable::default();
        let renderer = TileRenderer::new(&config, &manifest, &images, &rotations);
        let tile = TileAddress::new(2, 0, 0);
        renderer.prepare_directories(&[tile]).unwrap();
        assert!(renderer.render(tile).is_err());
        assert!(!config.tile_path(2, 0, 0).exists());
    }

    #[test]
    fn entries_outside_the_margin_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut manifest = DepthManifest::new();
        manifest.set_level(2, vec![ManifestEntry::new("a", [0.9, 0.9])]);
        let images = SolidImages::new(&["a"]);
        let rotations = RotationTable::default();
        let renderer = TileRenderer::new(&config, &manifest, &images, &rotations);
        let (_, layers) = renderer.compose(TileAddress::new(2, 0, 0), &mut Resizer::new()).unwrap();
        assert_eq!(layers, TileLayers::default());
    }
}
