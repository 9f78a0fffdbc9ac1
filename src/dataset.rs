//! Training samples from annotated scenes.
//!
//! Expected layout under a dataset root:
//!
//! ```text
//! <root>/json/<scene>.json        { "scene": [ { "id", "description", "mask_path", "parent" } ] }
//! <root>/masks/<scene>/<mask>     one mask per shape
//! <root>/images/<scene>.png       the scene image (sets the canvas size)
//! ```
//!
//! Every shape with a parent becomes one sample: parent and child outlines as
//! segment tables on a shared square canvas, the parent's bounding box and a
//! set of context points sampled from the parent.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;
use kurbo::{Point, Vec2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bitmap::{full_mask, image_size, letterbox, load_mask, resize_mask};
use crate::codec::{normalizer, SegmentTable};
use crate::config::PipelineConfig;
use crate::error::ShapeError;
use crate::frame::BoundingBox;
use crate::sample::context_points;
use crate::fit_mask;

/// One shape of a scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneShape {
    pub id: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mask_path: Option<String>,
    /// Id of the enclosing shape; absent or negative for top-level shapes.
    #[serde(default)]
    pub parent: Option<i64>,
}

/// Contents of one `<scene>.json` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub scene: Vec<serde_json::Value>,
}

impl SceneFile {
    /// Shapes that parse; malformed entries are skipped.
    pub fn shapes(&self) -> Vec<SceneShape> {
        self.scene
            .iter()
            .filter_map(|value| match serde_json::from_value(value.clone()) {
                Ok(shape) => Some(shape),
                Err(e) => {
                    log::debug!("skipping scene entry {}: {}", value, e);
                    None
                }
            })
            .collect()
    }
}

/// A child shape with everything needed to build its sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry {
    pub scene: String,
    pub image: PathBuf,
    pub child_mask: PathBuf,
    /// `None` when the parent is the whole scene.
    pub parent_mask: Option<PathBuf>,
    pub child_description: String,
    pub parent_description: String,
}

/// One training sample. Coordinates are normalized by the canvas extent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeSample {
    pub scene: String,
    pub child_description: String,
    pub parent_description: String,
    /// Parent bounding box corners: (min, min), (min, max), (max, min), (max, max).
    pub parent_bbox: [Point; 4],
    pub parent: SegmentTable,
    pub child: SegmentTable,
    pub context_points: Vec<Point>,
}

/// Find all child shapes under `root`, in scene-name order.
pub fn collect_entries(root: &Path, max_samples: Option<usize>) -> Result<Vec<DatasetEntry>, ShapeError> {
    let json_dir = root.join("json");
    let masks_dir = root.join("masks");
    let images_dir = root.join("images");

    let available: BTreeSet<String> = list_with_extension(&images_dir, "png")?;
    let mut entries = Vec::new();

    for scene in list_with_extension(&json_dir, "json")? {
        if !available.contains(&scene) {
            continue;
        }
        let text = fs::read_to_string(json_dir.join(format!("{}.json", scene)))?;
        let file: SceneFile = match serde_json::from_str(&text) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("skipping scene {}: {}", scene, e);
                continue;
            }
        };
        let shapes = file.shapes();
        let by_id: HashMap<i64, &SceneShape> = shapes.iter().map(|s| (s.id, s)).collect();

        for shape in &shapes {
            let (Some(parent_id), Some(mask_name)) = (shape.parent, shape.mask_path.as_deref()) else {
                continue;
            };
            if parent_id < 0 || mask_name.is_empty() {
                continue;
            }
            let child_mask = masks_dir.join(&scene).join(mask_name);
            if !child_mask.exists() {
                continue;
            }

            let parent = by_id.get(&parent_id);
            let parent_mask = parent
                .and_then(|p| p.mask_path.as_deref())
                .filter(|name| !name.is_empty())
                .map(|name| masks_dir.join(&scene).join(name))
                .filter(|path| path.exists());

            entries.push(DatasetEntry {
                scene: scene.clone(),
                image: images_dir.join(format!("{}.png", scene)),
                child_mask,
                parent_mask,
                child_description: shape.description.clone(),
                parent_description: parent.map(|p| p.description.clone()).unwrap_or_default(),
            });
            if max_samples.is_some_and(|max| entries.len() >= max) {
                return Ok(entries);
            }
        }
    }
    Ok(entries)
}

/// Fit a mask and return only its table.
pub fn mask_to_table(mask: &GrayImage, config: &PipelineConfig) -> Result<SegmentTable, ShapeError> {
    Ok(fit_mask(mask, config)?.table)
}

/// Build the sample of one entry.
pub fn build_sample(entry: &DatasetEntry, config: &PipelineConfig) -> Result<ShapeSample, ShapeError> {
    let (w, h) = image_size(&entry.image)?;
    let canvas = w.max(h);

    let child = resize_mask(&load_mask(&entry.child_mask, config.threshold)?, w, h);
    let parent = match &entry.parent_mask {
        Some(path) => resize_mask(&load_mask(path, config.threshold)?, w, h),
        None => full_mask(w, h),
    };
    let parent = letterbox(&parent, canvas);
    let child = letterbox(&child, canvas);

    let bbox = BoundingBox::of_mask(&parent, normalizer(canvas, canvas));
    let parent_fit = fit_mask(&parent, config)?;
    let child_fit = fit_mask(&child, config)?;

    let polygon = parent_fit.normalized_polygon();
    let context = context_points(Some(&polygon), Some(&parent), config.sampling, Vec2::new(1.0, 1.0));

    Ok(ShapeSample {
        scene: entry.scene.clone(),
        child_description: entry.child_description.clone(),
        parent_description: entry.parent_description.clone(),
        parent_bbox: bbox.corners(),
        parent: parent_fit.table,
        child: child_fit.table,
        context_points: context,
    })
}

/// Build samples for every entry under `root` in parallel.
///
/// Entries that fail are logged and skipped; the rest keep entry order.
pub fn build_dataset(
    root: &Path,
    max_samples: Option<usize>,
    config: &PipelineConfig,
) -> Result<Vec<ShapeSample>, ShapeError> {
    let entries = collect_entries(root, max_samples)?;
    log::info!("building {} samples from {}", entries.len(), root.display());

    let samples: Vec<ShapeSample> = entries
        .par_iter()
        .filter_map(|entry| match build_sample(entry, config) {
            Ok(sample) => Some(sample),
            Err(e) => {
                log::warn!("skipping {}: {}", entry.child_mask.display(), e);
                None
            }
        })
        .collect();

    log::info!("built {} of {} samples", samples.len(), entries.len());
    Ok(samples)
}

/// File stems in `dir` with the given extension, sorted. A missing directory is empty.
fn list_with_extension(dir: &Path, extension: &str) -> Result<BTreeSet<String>, ShapeError> {
    if !dir.is_dir() {
        log::warn!("{} is not a directory", dir.display());
        return Ok(BTreeSet::new());
    }
    let mut stems = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            stems.insert(stem.to_string());
        }
    }
    Ok(stems)
}
