//! Polyline rendering of segment sequences, and PNG overlays for inspection.
//!
//! Sequences are sampled with the Bernstein form of each segment's degree and
//! concatenated without repeating joint points. Overlays are rasterized with
//! tiny-skia and encoded with `png`.

use std::path::Path;

use kurbo::{BezPath, ParamCurve, PathEl, Point, Rect, Shape};

use crate::codec::SegmentTable;
use crate::error::ShapeError;
use crate::frame::BoundingBox;
use crate::geom::linspace;
use crate::segment::{Segment, SegmentKind};

/// A rendered outline: dense polyline plus the kind of each source segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedShape {
    pub points: Vec<Point>,
    pub kinds: Vec<SegmentKind>,
}

/// Sample `n_points` evenly spaced parameters of one segment starting at `start`.
pub fn sample_segment(start: Point, segment: &Segment, n_points: usize) -> Vec<Point> {
    let curve = segment.with_start(start);
    linspace(0.0, 1.0, n_points).map(|t| curve.eval(t)).collect()
}

/// Render consecutive segments into one polyline.
///
/// Each segment starts at the previous one's end (`initial` for the first).
/// Joint points appear once. An empty sequence renders to nothing.
pub fn render_sequence(initial: Point, segments: &[Segment], n_points: usize) -> Vec<Point> {
    let mut points = Vec::new();
    let mut start = initial;
    for (i, segment) in segments.iter().enumerate() {
        let sampled = sample_segment(start, segment, n_points);
        let skip = if i == 0 { 0 } else { 1 };
        points.extend(sampled.into_iter().skip(skip));
        start = segment.end();
    }
    points
}

/// Render the real rows of a table.
///
/// Without an explicit `initial` point the outline is treated as closed and
/// starts at the last real endpoint.
pub fn render_table(table: &SegmentTable, initial: Option<Point>, n_points: usize) -> RenderedShape {
    let Some(start) = initial.or_else(|| closing_start(table)) else {
        return RenderedShape::default();
    };
    let segments = table.decode();
    RenderedShape {
        points: render_sequence(start, &segments, n_points),
        kinds: segments.iter().map(Segment::kind).collect(),
    }
}

/// Start point of a closed outline: the endpoint of its last real segment.
pub fn closing_start(table: &SegmentTable) -> Option<Point> {
    table.closing_point()
}

// ── PNG overlays ─────────────────────────────────────────

/// Margin around the unit square, as a fraction of it.
const OVERLAY_MARGIN: f64 = 0.05;

/// Draw ground truth (green), an optional prediction (red) and an optional
/// parent frame (dashed grey) over a white square and write it as PNG.
///
/// Points are in normalized `[0, 1]` coordinates, y down.
pub fn render_overlay(
    ground_truth: &RenderedShape,
    prediction: Option<&RenderedShape>,
    frame: Option<&BoundingBox>,
    output_path: &Path,
    size: u32,
) -> Result<(), ShapeError> {
    let mut pixmap = tiny_skia::Pixmap::new(size, size)
        .ok_or_else(|| ShapeError::Config(format!("invalid overlay size {}", size)))?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let s = size as f64 / (1.0 + 2.0 * OVERLAY_MARGIN);
    let transform = tiny_skia::Transform {
        sx: s as f32,
        kx: 0.0,
        ky: 0.0,
        sy: s as f32,
        tx: (OVERLAY_MARGIN * s) as f32,
        ty: (OVERLAY_MARGIN * s) as f32,
    };

    if let Some(frame) = frame {
        let rect = Rect::from_points(frame.min, frame.max);
        let mut stroke = tiny_skia::Stroke { width: 1.0, ..Default::default() };
        stroke.dash = tiny_skia::StrokeDash::new(vec![6.0, 4.0], 0.0);
        stroke_path(&mut pixmap, &rect.to_path(0.1), transform, (128, 128, 128), &stroke);
    }

    let stroke = tiny_skia::Stroke { width: 2.0, ..Default::default() };
    stroke_path(&mut pixmap, &polyline_path(&ground_truth.points), transform, (0, 160, 0), &stroke);
    if let Some(prediction) = prediction {
        let mut dashed = stroke.clone();
        dashed.dash = tiny_skia::StrokeDash::new(vec![8.0, 5.0], 0.0);
        stroke_path(&mut pixmap, &polyline_path(&prediction.points), transform, (220, 0, 0), &dashed);
    }

    std::fs::write(output_path, encode_png(&pixmap)?)?;
    Ok(())
}

fn polyline_path(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    if let Some((&first, rest)) = points.split_first() {
        path.move_to(first);
        for &p in rest {
            path.line_to(p);
        }
    }
    path
}

fn stroke_path(
    pixmap: &mut tiny_skia::Pixmap,
    path: &BezPath,
    transform: tiny_skia::Transform,
    (r, g, b): (u8, u8, u8),
    stroke: &tiny_skia::Stroke,
) {
    let mut paint = tiny_skia::Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = true;
    if let Some(sk_path) = kurbo_to_tinyskia(path, transform) {
        pixmap.stroke_path(&sk_path, &paint, stroke, tiny_skia::Transform::identity(), None);
    }
}

/// Convert a kurbo `BezPath` to a `tiny_skia::Path`.
fn kurbo_to_tinyskia(bezpath: &BezPath, transform: tiny_skia::Transform) -> Option<tiny_skia::Path> {
    let mut pb = tiny_skia::PathBuilder::new();
    for el in bezpath.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                let (x, y) = transform_point(p, transform);
                pb.move_to(x, y);
            }
            PathEl::LineTo(p) => {
                let (x, y) = transform_point(p, transform);
                pb.line_to(x, y);
            }
            PathEl::QuadTo(c, p) => {
                let (cx, cy) = transform_point(c, transform);
                let (px, py) = transform_point(p, transform);
                pb.quad_to(cx, cy, px, py);
            }
            PathEl::CurveTo(c1, c2, p) => {
                let (c1x, c1y) = transform_point(c1, transform);
                let (c2x, c2y) = transform_point(c2, transform);
                let (px, py) = transform_point(p, transform);
                pb.cubic_to(c1x, c1y, c2x, c2y, px, py);
            }
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

/// Apply transform manually to a point (f64 → f32).
fn transform_point(p: Point, t: tiny_skia::Transform) -> (f32, f32) {
    let x = p.x as f32;
    let y = p.y as f32;
    (t.sx * x + t.kx * y + t.tx, t.ky * x + t.sy * y + t.ty)
}

/// Encode a pixmap to PNG bytes.
fn encode_png(pixmap: &tiny_skia::Pixmap) -> Result<Vec<u8>, ShapeError> {
    let to_err = |e: png::EncodingError| ShapeError::Io(std::io::Error::other(e));
    let mut buf = Vec::new();
    let mut encoder = png::Encoder::new(&mut buf, pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(to_err)?;
    writer.write_image_data(pixmap.data()).map_err(to_err)?;
    writer.finish().map_err(to_err)?;
    Ok(buf)
}
