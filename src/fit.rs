//! Adaptive Bezier fitting: polyline → minimal typed segments.
//!
//! Per range of points:
//! 1. Nearly straight (arc/chord ratio within `threshold_complex`) → one line
//! 2. Small maximum deviation from the chord → one quadratic, control point
//!    found by a bounded Nelder-Mead search
//! 3. Otherwise split at the point of maximum deviation and fit both halves
//!
//! Ranges are processed from an explicit stack, so depth is tracked per range
//! and capped by `max_depth` instead of by the call stack.

use kurbo::{Line, ParamCurve, PathSeg, Point, QuadBez};
use serde::{Deserialize, Serialize};

use crate::geom::{farthest_from_first, linspace, perimeter};
use crate::optimize::nelder_mead;

/// Chords shorter than this are treated as closed loops.
const MIN_CHORD: f64 = 1e-8;

/// Parameters for adaptive fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitParams {
    /// Arc/chord ratio at or below which a range becomes a single line.
    pub threshold_complex: f64,
    /// Maximum perpendicular deviation (input units) a single quadratic may absorb.
    pub threshold_dev: f64,
    /// Split depth at which a range is fitted as-is instead of split again.
    pub max_depth: usize,
    /// Iteration cap of the control-point search.
    pub max_iterations: usize,
    /// Convergence tolerance of the control-point search.
    pub tolerance: f64,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            threshold_complex: 1.01,
            threshold_dev: 0.5,
            max_depth: 64,
            max_iterations: 200,
            tolerance: 1e-6,
        }
    }
}

/// Arc length over chord length; 1.0 for a perfect line or a closed loop.
pub fn complexity(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 1.0;
    }
    let chord = points[0].distance(points[points.len() - 1]);
    if chord <= MIN_CHORD {
        return 1.0;
    }
    perimeter(points, false) / chord
}

/// Index and size of the largest perpendicular deviation from the chord.
///
/// Ties go to the first index. `None` when the chord is degenerate.
pub fn max_deviation(points: &[Point]) -> Option<(usize, f64)> {
    let (&first, &last) = (points.first()?, points.last()?);
    let chord = last - first;
    let length = chord.hypot();
    if length <= MIN_CHORD {
        return None;
    }
    let normal = chord.turn_90() / length;

    let mut best = (0, f64::NEG_INFINITY);
    for (i, p) in points.iter().enumerate() {
        let deviation = (*p - first).dot(normal).abs();
        if deviation > best.1 {
            best = (i, deviation);
        }
    }
    Some(best)
}

/// Fit one quadratic with fixed endpoints to the points.
///
/// The control point minimizes the summed distance between `B(t_i)` and
/// `points[i]`, with `t_i` evenly spaced in `[0, 1]`. The search starts at
/// the chord midpoint; whatever it reaches within the iteration cap is used.
pub fn fit_quadratic(points: &[Point], params: &FitParams) -> QuadBez {
    let p0 = points[0];
    let p2 = points[points.len() - 1];
    let ts: Vec<f64> = linspace(0.0, 1.0, points.len()).collect();

    let cost = |ctrl: Point| -> f64 {
        let curve = QuadBez::new(p0, ctrl, p2);
        ts.iter()
            .zip(points)
            .map(|(&t, p)| curve.eval(t).distance(*p))
            .sum()
    };

    let step = (p0.distance(p2) * 0.1).max(1e-3);
    let result = nelder_mead(
        cost,
        p0.midpoint(p2),
        step,
        params.max_iterations,
        params.tolerance,
    );
    if !result.converged {
        log::debug!(
            "quadratic fit stopped after {} iterations (cost {:.4})",
            result.iterations,
            result.value
        );
    }
    QuadBez::new(p0, result.point, p2)
}

/// Recursively split and fit an open polyline.
///
/// Fewer than two points produce no segments; two points produce one line.
/// Segments come back in input order, each starting where the previous ended.
pub fn split_and_fit(points: &[Point], params: &FitParams) -> Vec<PathSeg> {
    let mut segments = Vec::new();
    if points.len() < 2 {
        return segments;
    }

    // Inclusive index ranges; popped in input order.
    let mut stack = vec![(0usize, points.len() - 1, 0usize)];
    while let Some((start, end, depth)) = stack.pop() {
        let range = &points[start..=end];

        if range.len() == 2 || complexity(range) <= params.threshold_complex {
            segments.push(PathSeg::Line(Line::new(range[0], range[range.len() - 1])));
            continue;
        }

        let (index, deviation) = max_deviation(range).unwrap_or((0, 0.0));
        let degenerate = index == 0 || index == range.len() - 1;
        if deviation <= params.threshold_dev || degenerate || depth >= params.max_depth {
            if depth >= params.max_depth && deviation > params.threshold_dev && !degenerate {
                log::debug!("fit depth cap {} reached, forcing a quadratic", params.max_depth);
            }
            segments.push(PathSeg::Quad(fit_quadratic(range, params)));
            continue;
        }

        let split = start + index;
        stack.push((split, end, depth + 1));
        stack.push((start, split, depth + 1));
    }
    segments
}

/// Fit a closed polygon.
///
/// The ring is opened at vertex 0 and at the vertex farthest from it; both
/// halves are fitted separately. The first segment starts at vertex 0, which
/// is also where the last segment ends.
pub fn fit_closed(polygon: &[Point], params: &FitParams) -> Vec<PathSeg> {
    if polygon.len() < 2 {
        return Vec::new();
    }
    let far = farthest_from_first(polygon);
    if far == 0 {
        return Vec::new();
    }

    let mut second_half = polygon[far..].to_vec();
    second_half.push(polygon[0]);

    let mut segments = split_and_fit(&polygon[..=far], params);
    segments.extend(split_and_fit(&second_half, params));
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn arc(radius: f64, n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| {
                let a = PI * i as f64 / (n - 1) as f64;
                Point::new(-radius * a.cos(), radius * a.sin())
            })
            .collect()
    }

    fn wiggle() -> Vec<Point> {
        (0..80)
            .map(|i| {
                let x = i as f64;
                Point::new(x, 6.0 * (x / 7.0).sin() + 2.0 * (x / 3.0).cos())
            })
            .collect()
    }

    #[test]
    fn collinear_points_give_one_line() {
        let points: Vec<Point> = (0..20).map(|i| Point::new(i as f64, 2.0 * i as f64)).collect();
        let segs = split_and_fit(&points, &FitParams::default());
        assert_eq!(segs.len(), 1);
        assert!(matches!(segs[0], PathSeg::Line(l) if l.p0 == points[0] && l.p1 == points[19]));
    }

    #[test]
    fn two_points_give_one_line() {
        let points = [Point::new(0.0, 0.0), Point::new(3.0, 4.0)];
        let segs = split_and_fit(&points, &FitParams::default());
        assert_eq!(segs.len(), 1);
        assert!(matches!(segs[0], PathSeg::Line(_)));
        assert!(split_and_fit(&points[..1], &FitParams::default()).is_empty());
    }

    #[test]
    fn gentle_arc_becomes_one_quadratic() {
        let points = arc(10.0, 21);
        let params = FitParams { threshold_dev: 50.0, ..FitParams::default() };
        let segs = split_and_fit(&points, &params);
        assert_eq!(segs.len(), 1);
        match segs[0] {
            PathSeg::Quad(q) => {
                assert_eq!(q.p0, points[0]);
                assert_eq!(q.p2, points[20]);
                assert!(q.p1.y > 10.0, "control should bulge past the apex: {:?}", q.p1);
            }
            other => panic!("expected a quadratic, got {:?}", other),
        }
    }

    #[test]
    fn quadratic_search_recovers_control() {
        let truth = QuadBez::new(Point::new(0.0, 0.0), Point::new(5.0, 10.0), Point::new(10.0, 0.0));
        let points: Vec<Point> = linspace(0.0, 1.0, 11).map(|t| truth.eval(t)).collect();
        let fitted = fit_quadratic(&points, &FitParams::default());
        assert!(fitted.p1.distance(truth.p1) < 1e-2, "{:?}", fitted.p1);
    }

    #[test]
    fn max_deviation_first_occurrence() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 2.0),
            Point::new(2.0, -2.0),
            Point::new(3.0, 0.0),
        ];
        assert_eq!(max_deviation(&points), Some((1, 2.0)));
        assert_eq!(max_deviation(&[Point::ZERO, Point::ZERO]), None);
    }

    #[test]
    fn segment_count_grows_as_tolerance_shrinks() {
        let points = wiggle();
        let mut previous = 0;
        for dev in [20.0, 8.0, 4.0, 2.0, 1.0, 0.5, 0.25, 0.1] {
            let params = FitParams { threshold_dev: dev, ..FitParams::default() };
            let count = split_and_fit(&points, &params).len();
            assert!(count >= previous, "dev {} gave {} < {}", dev, count, previous);
            previous = count;
        }
        assert!(previous > 1);
    }

    #[test]
    fn segments_chain_end_to_start() {
        let segs = split_and_fit(&wiggle(), &FitParams { threshold_dev: 0.5, ..FitParams::default() });
        for pair in segs.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
    }

    #[test]
    fn depth_cap_forces_single_segment() {
        let params = FitParams { max_depth: 0, threshold_dev: 0.0, ..FitParams::default() };
        let segs = split_and_fit(&wiggle(), &params);
        assert_eq!(segs.len(), 1);
        assert!(matches!(segs[0], PathSeg::Quad(_)));
    }

    #[test]
    fn closed_square_gives_four_lines() {
        let square = [
            Point::new(18.0, 18.0),
            Point::new(81.0, 18.0),
            Point::new(81.0, 81.0),
            Point::new(18.0, 81.0),
        ];
        let segs = fit_closed(&square, &FitParams::default());
        assert_eq!(segs.len(), 4);
        assert!(segs.iter().all(|s| matches!(s, PathSeg::Line(_))));
        let ends: Vec<Point> = segs.iter().map(|s| s.end()).collect();
        assert_eq!(ends, vec![square[1], square[2], square[3], square[0]]);
    }
}
