//! Common test utilities and helpers for the pyramid integration tests
//!
//! Builds small, fully synthetic inputs on disk: alpha images, `.npy` layout
//! and latent arrays, and a rotation table.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use embedding_pyramid::input::npy::write_matrix;
use embedding_pyramid::{ImageStore, PyramidConfig, PyramidError, PyramidResult};
use image::{Rgba, RgbaImage};
use tempfile::TempDir;

/// Edge length of the synthetic source images.
pub const SOURCE_SIDE: u32 = 16;

/// Number of points in the standard fixture.
pub const POINTS: usize = 12;

/// A temporary data directory and a configuration pointing into it.
pub struct Fixture {
    pub dir: TempDir,
    pub config: PyramidConfig,
}

impl Fixture {
    /// Standard fixture: 12 points spread over the plane, 32 px tiles,
    /// depths `-1..=3`, PNG tiles so pixel checks are exact.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path();
        let images = root.join("images");
        std::fs::create_dir_all(&images).expect("image dir");

        let layout = spread_layout(POINTS);
        let mut latent = Vec::with_capacity(POINTS * 3);
        let mut rotations = String::from("# id,degrees\n");
        for (i, p) in layout.iter().enumerate() {
            let id = image_id(i);
            sprite(i).save(images.join(format!("{}.png", id))).expect("write sprite");
            latent.extend([p[0], p[1], i as f64 * 0.1]);
            rotations.push_str(&format!("{},{}\n", id, (i * 30) % 360));
        }
        let flat: Vec<f64> = layout.iter().flat_map(|p| [p[0], p[1]]).collect();
        write_matrix(&root.join("layout.npy"), POINTS, 2, &flat).expect("layout");
        write_matrix(&root.join("latent.npy"), POINTS, 3, &latent).expect("latent");
        std::fs::write(root.join("rotations.csv"), rotations).expect("rotations");

        let config = PyramidConfig {
            tile_size: 32,
            image_size: 8,
            shadow_radius: 2,
            tile_depth: 3,
            min_depth: -1,
            workers: 2,
            seed: 11,
            tile_path_format: format!("{}/tiles/{{depth}}/{{x}}/{{y}}.png", root.display()),
            image_dir: images,
            layout_path: root.join("layout.npy"),
            latent_path: root.join("latent.npy"),
            rotations_path: root.join("rotations.csv"),
            manifest_path: root.join("clusters.json"),
            ..PyramidConfig::default()
        };
        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Ids sort in index order, matching a directory scan.
pub fn image_id(i: usize) -> String {
    format!("img{:03}", i)
}

/// Distinct positions covering all four quadrants of `[-0.8, 0.8]²`.
pub fn spread_layout(n: usize) -> Vec<[f64; 2]> {
    let span = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let x = -0.8 + 1.6 * ((i * 5) % n) as f64 / span;
            let y = -0.8 + 1.6 * ((i * 7) % n) as f64 / span;
            [x, y]
        })
        .collect()
}

/// Opaque disc on a transparent background, coloured by index.
pub fn sprite(i: usize) -> RgbaImage {
    let colour = Rgba([(40 * i % 256) as u8, 90, 200, 255]);
    let c = SOURCE_SIDE as f32 / 2.0;
    RgbaImage::from_fn(SOURCE_SIDE, SOURCE_SIDE, |x, y| {
        let (dx, dy) = (x as f32 + 0.5 - c, y as f32 + 0.5 - c);
        if dx * dx + dy * dy <= c * c {
            colour
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Write a solid tile at `(depth, x, y)` of `config`, creating directories.
pub fn write_solid_tile(config: &PyramidConfig, depth: i32, x: i64, y: i64, rgb: [u8; 3]) {
    let path = config.tile_path(depth, x, y);
    std::fs::create_dir_all(path.parent().expect("tile dir")).expect("create tile dir");
    let [r, g, b] = rgb;
    RgbaImage::from_pixel(config.tile_size, config.tile_size, Rgba([r, g, b, 255]))
        .save(&path)
        .expect("write tile");
}

/// Decode error reported for an id the store does not hold.
pub fn missing(id: &str) -> image::ImageError {
    image::ImageError::IoError(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("'{}' not in memory store", id),
    ))
}

/// In-memory image store.
#[derive(Default)]
pub struct MemoryImageStore {
    ids: Vec<String>,
    images: HashMap<String, RgbaImage>,
}

impl MemoryImageStore {
    pub fn insert(&mut self, id: impl Into<String>, image: RgbaImage) {
        let id = id.into();
        self.ids.push(id.clone());
        self.images.insert(id, image);
    }
}

impl ImageStore for MemoryImageStore {
    fn list_ids(&self) -> &[String] {
        &self.ids
    }

    fn get_image(&self, id: &str) -> PyramidResult<RgbaImage> {
        self.images
            .get(id)
            .cloned()
            .ok_or_else(|| PyramidError::image(id, missing(id)))
    }
}
