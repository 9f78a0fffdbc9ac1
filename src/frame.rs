//! Parent frames: bounding boxes and decoding of frame-relative predictions.

use image::GrayImage;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::codec::SegmentTable;
use crate::error::ShapeError;
use crate::eval::Prediction;
use crate::segment::{is_sentinel_pair, Row, Segment, SegmentKind, PADDING_ROW};

/// Smallest frame extent used when scaling into a frame.
const MIN_RANGE: f64 = 1e-6;

/// Axis-aligned extent in normalized canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// The whole unit canvas.
    pub const UNIT: BoundingBox = BoundingBox {
        min: Point::new(0.0, 0.0),
        max: Point::new(1.0, 1.0),
    };

    /// Pixel extent of the foreground, divided by `normalizer`.
    ///
    /// An empty mask covers the whole canvas.
    pub fn of_mask(mask: &GrayImage, normalizer: f64) -> Self {
        let (w, h) = mask.dimensions();
        let extent = mask
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 0)
            .fold(None, |acc: Option<(u32, u32, u32, u32)>, (x, y, _)| {
                Some(match acc {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                })
            });
        let (x0, y0, x1, y1) = extent.unwrap_or((0, 0, w.saturating_sub(1), h.saturating_sub(1)));
        let n = if normalizer > 0.0 { normalizer } else { 1.0 };
        Self {
            min: Point::new(x0 as f64 / n, y0 as f64 / n),
            max: Point::new(x1 as f64 / n, y1 as f64 / n),
        }
    }

    /// Extent of every used point (controls and endpoints) of the real rows.
    pub fn of_table(table: &SegmentTable) -> Option<Self> {
        let mut points = table
            .real_rows()
            .iter()
            .flat_map(|row| row.chunks_exact(2))
            .filter(|pair| !is_sentinel_pair(pair[0], pair[1]))
            .map(|pair| Point::new(pair[0] as f64, pair[1] as f64));
        let first = points.next()?;
        let rect = points.fold(Rect::from_points(first, first), |r, p| r.union_pt(p));
        Some(Self {
            min: Point::new(rect.x0, rect.y0),
            max: Point::new(rect.x1, rect.y1),
        })
    }

    /// Width and height, each at least `1e-6`.
    pub fn range(&self) -> Vec2 {
        Vec2::new(
            (self.max.x - self.min.x).max(MIN_RANGE),
            (self.max.y - self.min.y).max(MIN_RANGE),
        )
    }

    /// Map a frame-relative point in `[0, 1]` into the frame.
    pub fn to_frame(&self, p: Point) -> Point {
        let range = self.range();
        Point::new(p.x * range.x + self.min.x, p.y * range.y + self.min.y)
    }

    /// Corners as `[(min x, min y), (min x, max y), (max x, min y), (max x, max y)]`.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.min.x, self.max.y),
            Point::new(self.max.x, self.min.y),
            self.max,
        ]
    }
}

/// Parameters for turning raw predictions into tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeParams {
    /// Stop probability at which the sequence ends.
    pub stop_threshold: f64,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self { stop_threshold: 0.5 }
    }
}

/// Index of the last step: the first step whose stop probability reaches the
/// threshold, else the final step. `None` for zero steps.
pub fn stop_index(prediction: &Prediction, params: &DecodeParams) -> Option<usize> {
    let steps = prediction.steps();
    if steps == 0 {
        return None;
    }
    Some(
        prediction
            .stop_probs
            .iter()
            .position(|&p| p >= params.stop_threshold)
            .unwrap_or(steps - 1),
    )
}

/// Decode a frame-relative prediction into a table in the parent's frame.
///
/// Rows after the stop index become padding. Each kept row takes the argmax
/// kind of its type logits, and the control slots that kind leaves unused
/// are set to the sentinel.
pub fn decode_prediction(
    prediction: &Prediction,
    parent: &SegmentTable,
    params: &DecodeParams,
) -> Result<SegmentTable, ShapeError> {
    prediction.check_shape()?;
    let steps = prediction.steps();
    let frame = BoundingBox::of_table(parent).unwrap_or(BoundingBox::UNIT);
    let length = stop_index(prediction, params).map_or(0, |i| i + 1);

    let mut rows: Vec<Row> = (0..length)
        .map(|s| {
            let mut raw = PADDING_ROW;
            for (c, value) in raw.iter_mut().enumerate() {
                *value = prediction.segments[(s, c)] as f32;
            }
            let kind = argmax_kind(prediction, s);
            Segment::from_row_as(&raw, kind).map_points(|p| frame.to_frame(p)).to_row()
        })
        .collect();
    rows.resize(steps, PADDING_ROW);

    log::debug!("decoded {} of {} predicted steps", length, steps);
    SegmentTable::from_rows(rows, length)
}

fn argmax_kind(prediction: &Prediction, step: usize) -> SegmentKind {
    let logits = prediction.type_logits.row(step);
    let mut best = 0;
    for k in 1..logits.len() {
        if logits[k] > logits[best] {
            best = k;
        }
    }
    SegmentKind::from_index(best).unwrap_or(SegmentKind::Cubic)
}
