//! Typed Bezier segments and their fixed-width row encoding.
//!
//! Inside the crate a segment's degree is carried by the enum variant.
//! The sentinel convention (unused control points written as `(-1, -1)`)
//! only exists at the row boundary, in `to_row` / `from_row`.

use kurbo::{BezPath, CubicBez, Line, PathEl, PathSeg, Point, QuadBez};
use serde::{Deserialize, Serialize};

/// Value written into unused control-point slots and padding rows.
pub const SENTINEL: f32 = -1.0;

/// Values per row: `[c1x, c1y, c2x, c2y, ex, ey]`.
pub const SEGMENT_WIDTH: usize = 6;

/// One encoded segment row.
pub type Row = [f32; SEGMENT_WIDTH];

/// A row made only of sentinels.
pub const PADDING_ROW: Row = [SENTINEL; SEGMENT_WIDTH];

/// Segment degree, also the class index used by the type classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Line,
    Quadratic,
    Cubic,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 3] = [SegmentKind::Line, SegmentKind::Quadratic, SegmentKind::Cubic];

    /// Class index: Line = 0, Quadratic = 1, Cubic = 2.
    pub fn index(self) -> usize {
        match self {
            SegmentKind::Line => 0,
            SegmentKind::Quadratic => 1,
            SegmentKind::Cubic => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Infer the kind from a row's sentinel pattern.
    ///
    /// Line if both control pairs are sentinel, Quadratic if only the first
    /// one is, Cubic otherwise.
    pub fn of_row(row: &Row) -> Self {
        let first_unused = is_sentinel_pair(row[0], row[1]);
        let second_unused = is_sentinel_pair(row[2], row[3]);
        match (first_unused, second_unused) {
            (true, true) => SegmentKind::Line,
            (true, false) => SegmentKind::Quadratic,
            _ => SegmentKind::Cubic,
        }
    }

    /// Which control pairs this kind leaves unused: `(first, second)`.
    pub fn unused_controls(self) -> (bool, bool) {
        match self {
            SegmentKind::Line => (true, true),
            SegmentKind::Quadratic => (true, false),
            SegmentKind::Cubic => (false, false),
        }
    }

    /// Bezier degree (1, 2 or 3).
    pub fn degree(self) -> usize {
        self.index() + 1
    }
}

/// A coordinate pair is unused when both values are negative.
///
/// Real coordinates are normalized to `[0, 1]`, so any negative pair is a sentinel.
pub fn is_sentinel_pair(x: f32, y: f32) -> bool {
    x < 0.0 && y < 0.0
}

/// Whether a row past a table's length is padding (first pair sentinel).
///
/// Line rows share this pattern, so this is only meaningful for rows the
/// caller already knows lie beyond the real length.
pub fn is_padding_row(row: &Row) -> bool {
    is_sentinel_pair(row[0], row[1])
}

/// A Bezier segment whose start is the previous segment's end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line { end: Point },
    Quad { ctrl: Point, end: Point },
    Cubic { ctrl1: Point, ctrl2: Point, end: Point },
}

impl Segment {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Segment::Line { .. } => SegmentKind::Line,
            Segment::Quad { .. } => SegmentKind::Quadratic,
            Segment::Cubic { .. } => SegmentKind::Cubic,
        }
    }

    pub fn end(&self) -> Point {
        match *self {
            Segment::Line { end } | Segment::Quad { end, .. } | Segment::Cubic { end, .. } => end,
        }
    }

    /// Control points, in order, excluding the start and end.
    pub fn controls(&self) -> Vec<Point> {
        match *self {
            Segment::Line { .. } => vec![],
            Segment::Quad { ctrl, .. } => vec![ctrl],
            Segment::Cubic { ctrl1, ctrl2, .. } => vec![ctrl1, ctrl2],
        }
    }

    /// Attach a start point, giving a self-contained kurbo segment.
    pub fn with_start(&self, start: Point) -> PathSeg {
        match *self {
            Segment::Line { end } => PathSeg::Line(Line::new(start, end)),
            Segment::Quad { ctrl, end } => PathSeg::Quad(QuadBez::new(start, ctrl, end)),
            Segment::Cubic { ctrl1, ctrl2, end } => {
                PathSeg::Cubic(CubicBez::new(start, ctrl1, ctrl2, end))
            }
        }
    }

    /// Drop the start point of a kurbo segment.
    pub fn from_path_seg(seg: &PathSeg) -> Self {
        match *seg {
            PathSeg::Line(l) => Segment::Line { end: l.p1 },
            PathSeg::Quad(q) => Segment::Quad { ctrl: q.p1, end: q.p2 },
            PathSeg::Cubic(c) => Segment::Cubic { ctrl1: c.p1, ctrl2: c.p2, end: c.p3 },
        }
    }

    /// Apply `f` to every point of the segment.
    pub fn map_points(&self, f: impl Fn(Point) -> Point) -> Self {
        match *self {
            Segment::Line { end } => Segment::Line { end: f(end) },
            Segment::Quad { ctrl, end } => Segment::Quad { ctrl: f(ctrl), end: f(end) },
            Segment::Cubic { ctrl1, ctrl2, end } => Segment::Cubic {
                ctrl1: f(ctrl1),
                ctrl2: f(ctrl2),
                end: f(end),
            },
        }
    }

    /// Encode as `[c1x, c1y, c2x, c2y, ex, ey]` with unused controls as sentinels.
    ///
    /// A quadratic's single control goes in the second slot. Real coordinates
    /// are clamped to `>= 0`, so a used pair never reads back as a sentinel.
    pub fn to_row(&self) -> Row {
        let mut row = PADDING_ROW;
        let put = |row: &mut Row, slot: usize, p: Point| {
            row[slot * 2] = p.x.max(0.0) as f32;
            row[slot * 2 + 1] = p.y.max(0.0) as f32;
        };
        match *self {
            Segment::Line { end } => put(&mut row, 2, end),
            Segment::Quad { ctrl, end } => {
                put(&mut row, 1, ctrl);
                put(&mut row, 2, end);
            }
            Segment::Cubic { ctrl1, ctrl2, end } => {
                put(&mut row, 0, ctrl1);
                put(&mut row, 1, ctrl2);
                put(&mut row, 2, end);
            }
        }
        row
    }

    /// Decode a row, inferring the kind from its sentinel pattern.
    pub fn from_row(row: &Row) -> Self {
        Self::from_row_as(row, SegmentKind::of_row(row))
    }

    /// Decode a row as a given kind, ignoring whatever the control slots hold
    /// for unused controls.
    pub fn from_row_as(row: &Row, kind: SegmentKind) -> Self {
        let point = |slot: usize| Point::new(row[slot * 2] as f64, row[slot * 2 + 1] as f64);
        match kind {
            SegmentKind::Line => Segment::Line { end: point(2) },
            SegmentKind::Quadratic => Segment::Quad { ctrl: point(1), end: point(2) },
            SegmentKind::Cubic => Segment::Cubic {
                ctrl1: point(0),
                ctrl2: point(1),
                end: point(2),
            },
        }
    }
}

/// Build a closed kurbo path from a start point and segments.
pub fn to_bezpath(start: Point, segments: &[Segment]) -> BezPath {
    let mut path = BezPath::new();
    path.move_to(start);
    for seg in segments {
        path.push(match *seg {
            Segment::Line { end } => PathEl::LineTo(end),
            Segment::Quad { ctrl, end } => PathEl::QuadTo(ctrl, end),
            Segment::Cubic { ctrl1, ctrl2, end } => PathEl::CurveTo(ctrl1, ctrl2, end),
        });
    }
    path.push(PathEl::ClosePath);
    path
}
