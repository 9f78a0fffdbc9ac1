//! shapeseq: raster masks → typed, padded Bezier segment sequences.
//!
//! Turns binary shape masks into compact sequences of line, quadratic and
//! cubic segments in a fixed-width tabular encoding, samples context points
//! from masks, renders sequences back to polylines and scores predicted
//! sequences against ground truth.
//!
//! # Example
//!
//! ```no_run
//! use shapeseq::{fit_file, PipelineConfig};
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let result = fit_file(Path::new("mask.png"), &config)?;
//! // result.table holds `max_segments` rows, the first `result.table.len()` are real
//! # Ok::<(), shapeseq::ShapeError>(())
//! ```

#![forbid(unsafe_code)]

mod geom;

pub mod bitmap;
pub mod codec;
pub mod config;
pub mod contour;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod fit;
pub mod frame;
pub mod optimize;
pub mod predict;
pub mod render;
pub mod sample;
pub mod segment;
pub mod spline;

// Re-export kurbo so downstream users get the same version
// used by `Segment` and the rendered polylines.
pub use kurbo;

pub use codec::{OverflowPolicy, SegmentTable};
pub use config::{PipelineConfig, ThresholdMethod};
pub use error::ShapeError;
pub use segment::{Segment, SegmentKind};

use std::path::Path;
use std::time::Instant;

use image::GrayImage;
use kurbo::Point;

/// The result of fitting one mask.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Number of points on the extracted contour.
    pub contour_points: usize,
    /// Simplified polygon, in pixel coordinates.
    pub polygon: Vec<Point>,
    /// Fitted segments, in pixel coordinates. The outline starts at `polygon[0]`.
    pub segments: Vec<Segment>,
    /// Normalized, padded encoding of `segments`.
    pub table: SegmentTable,
    /// Divisor that took pixel coordinates to table coordinates.
    pub normalizer: f64,
}

impl FitResult {
    /// Polygon vertices divided by the normalizer.
    pub fn normalized_polygon(&self) -> Vec<Point> {
        self.polygon
            .iter()
            .map(|p| Point::new(p.x / self.normalizer, p.y / self.normalizer))
            .collect()
    }
}

/// Full pipeline: binary mask → polygon → segments → table.
///
/// Pipeline: largest outer contour, perimeter-relative polygon
/// simplification, adaptive line/quadratic fitting of the closed polygon,
/// then normalization by the larger canvas side.
pub fn fit_mask(mask: &GrayImage, config: &PipelineConfig) -> Result<FitResult, ShapeError> {
    let t_start = Instant::now();
    let (w, h) = mask.dimensions();

    // ── Contour ───────────────────────────────────────────
    let contour = contour::largest_contour(mask)?;
    let polygon = contour::simplify(&contour, config.epsilon_ratio);
    log::debug!(
        "simplify: {} → {} vertices (epsilon ratio {})",
        contour.len(),
        polygon.len(),
        config.epsilon_ratio
    );

    // ── Fit ───────────────────────────────────────────────
    let segments: Vec<Segment> = fit::fit_closed(&polygon, &config.fit)
        .iter()
        .map(Segment::from_path_seg)
        .collect();

    // ── Encode ────────────────────────────────────────────
    let normalizer = codec::normalizer(w, h);
    let table = SegmentTable::encode(&segments, normalizer, config.max_segments, config.overflow)?;
    log::debug!(
        "fit: {} segments, {} encoded in {} rows ({}ms)",
        segments.len(),
        table.len(),
        table.capacity(),
        t_start.elapsed().as_millis()
    );

    Ok(FitResult {
        contour_points: contour.len(),
        polygon,
        segments,
        table,
        normalizer,
    })
}

/// Load and threshold a mask file, then [`fit_mask`] it.
pub fn fit_file(path: &Path, config: &PipelineConfig) -> Result<FitResult, ShapeError> {
    let mask = bitmap::load_mask(path, config.threshold)?;
    fit_mask(&mask, config)
}
