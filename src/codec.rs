//! Fixed-width, padded segment tables.
//!
//! A table always holds `max_segments` rows. The first `length` rows are real
//! segments; the rest are padding rows made only of sentinels. `length` is
//! authoritative: Line rows also start with a sentinel pair, so padding cannot
//! be told apart from real rows by looking at a row alone.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::error::ShapeError;
use crate::segment::{is_padding_row, Row, Segment, SegmentKind, PADDING_ROW};

/// What to do when a shape has more segments than a table can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep the first `max_segments` segments.
    Truncate,
    /// Fail with `ShapeError::SequenceOverflow`.
    Reject,
}

/// A padded `(max_segments, 6)` segment table plus its real length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentTable {
    rows: Vec<Row>,
    length: usize,
}

impl SegmentTable {
    /// Encode segments, dividing every coordinate by `normalizer`.
    pub fn encode(
        segments: &[Segment],
        normalizer: f64,
        max_segments: usize,
        overflow: OverflowPolicy,
    ) -> Result<Self, ShapeError> {
        if segments.len() > max_segments {
            match overflow {
                OverflowPolicy::Reject => {
                    return Err(ShapeError::SequenceOverflow {
                        count: segments.len(),
                        max: max_segments,
                    })
                }
                OverflowPolicy::Truncate => log::warn!(
                    "truncating {} segments to {}",
                    segments.len(),
                    max_segments
                ),
            }
        }
        let scale = if normalizer > 0.0 { 1.0 / normalizer } else { 1.0 };
        let length = segments.len().min(max_segments);
        let mut rows: Vec<Row> = segments[..length]
            .iter()
            .map(|seg| seg.map_points(|p| Point::new(p.x * scale, p.y * scale)).to_row())
            .collect();
        rows.resize(max_segments, PADDING_ROW);
        Ok(Self { rows, length })
    }

    /// Wrap existing rows, checking that everything past `length` is padding.
    pub fn from_rows(rows: Vec<Row>, length: usize) -> Result<Self, ShapeError> {
        if length > rows.len() {
            return Err(ShapeError::InvalidTable(format!(
                "length {} exceeds {} rows",
                length,
                rows.len()
            )));
        }
        if let Some(i) = rows[length..].iter().position(|row| !is_padding_row(row)) {
            return Err(ShapeError::InvalidTable(format!(
                "row {} lies past length {} but is not padding",
                length + i,
                length
            )));
        }
        Ok(Self { rows, length })
    }

    /// A table of `max_segments` padding rows.
    pub fn empty(max_segments: usize) -> Self {
        Self {
            rows: vec![PADDING_ROW; max_segments],
            length: 0,
        }
    }

    /// Number of real segments.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Total number of rows including padding.
    pub fn capacity(&self) -> usize {
        self.rows.len()
    }

    /// All rows, padding included.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The real rows only.
    pub fn real_rows(&self) -> &[Row] {
        &self.rows[..self.length]
    }

    /// Decode the real rows into typed segments.
    pub fn decode(&self) -> Vec<Segment> {
        self.real_rows().iter().map(Segment::from_row).collect()
    }

    /// Kind of every real row.
    pub fn kinds(&self) -> Vec<SegmentKind> {
        self.real_rows().iter().map(SegmentKind::of_row).collect()
    }

    /// Endpoint of the last real row: where a closed outline starts.
    pub fn closing_point(&self) -> Option<Point> {
        self.real_rows()
            .last()
            .map(|row| Point::new(row[4] as f64, row[5] as f64))
    }

    /// Every used point (controls and endpoints) of the real rows.
    pub fn points(&self) -> Vec<Point> {
        self.decode()
            .iter()
            .flat_map(|seg| {
                let mut pts = seg.controls();
                pts.push(seg.end());
                pts
            })
            .collect()
    }

    /// Flatten to `max_segments * 6` values, row-major.
    pub fn to_flat(&self) -> Vec<f32> {
        self.rows.iter().flat_map(|row| row.iter().copied()).collect()
    }
}

/// Divisor that maps pixel coordinates of a `width x height` canvas to `[0, 1]`.
///
/// Uses the larger dimension's pixel extent, so the last pixel maps to 1.
pub fn normalizer(width: u32, height: u32) -> f64 {
    (width.max(height).saturating_sub(1)).max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x: f64, y: f64) -> Segment {
        Segment::Line { end: Point::new(x, y) }
    }

    #[test]
    fn encode_pads_with_sentinel_rows() {
        let segs = [line(10.0, 0.0), line(10.0, 10.0), line(0.0, 0.0)];
        let table = SegmentTable::encode(&segs, 10.0, 5, OverflowPolicy::Truncate).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.capacity(), 5);
        assert_eq!(table.rows()[1], [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0]);
        assert_eq!(table.rows()[3], PADDING_ROW);
        assert_eq!(table.rows()[4], PADDING_ROW);
        assert_eq!(table.closing_point(), Some(Point::new(0.0, 0.0)));
    }

    #[test]
    fn overflow_policies() {
        let segs: Vec<Segment> = (0..4).map(|i| line(i as f64, 0.0)).collect();
        let truncated = SegmentTable::encode(&segs, 1.0, 3, OverflowPolicy::Truncate).unwrap();
        assert_eq!(truncated.len(), 3);
        assert_eq!(truncated.decode(), segs[..3].to_vec());

        let rejected = SegmentTable::encode(&segs, 1.0, 3, OverflowPolicy::Reject);
        assert!(matches!(
            rejected,
            Err(ShapeError::SequenceOverflow { count: 4, max: 3 })
        ));
    }

    #[test]
    fn leading_line_rows_are_not_padding() {
        // A table of lines looks like padding row by row; only length tells them apart.
        let segs = [line(0.5, 0.5), line(0.25, 0.5)];
        let table = SegmentTable::encode(&segs, 1.0, 4, OverflowPolicy::Truncate).unwrap();
        assert!(table.real_rows().iter().all(is_padding_row));
        assert_eq!(table.decode().len(), 2);
        assert_eq!(table.kinds(), vec![SegmentKind::Line, SegmentKind::Line]);
    }

    #[test]
    fn from_rows_checks_trailing_padding() {
        let good = vec![[-1.0, -1.0, 0.1, 0.1, 0.2, 0.2], PADDING_ROW];
        assert!(SegmentTable::from_rows(good, 1).is_ok());

        let bad = vec![[-1.0, -1.0, 0.1, 0.1, 0.2, 0.2], [0.3, 0.3, 0.1, 0.1, 0.2, 0.2]];
        assert!(SegmentTable::from_rows(bad, 1).is_err());
        assert!(SegmentTable::from_rows(vec![PADDING_ROW], 2).is_err());
    }

    #[test]
    fn normalizer_uses_larger_extent() {
        assert_eq!(normalizer(100, 50), 99.0);
        assert_eq!(normalizer(1, 1), 1.0);
    }
}
