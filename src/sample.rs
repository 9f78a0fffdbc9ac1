//! Deterministic context points: a fixed-size set of boundary and interior
//! points describing a shape.
//!
//! The output always holds exactly `total` real points. Shortfalls are filled
//! through fallback tiers (polygon vertices, then a canvas grid) and never by
//! zero padding, so `(0, 0)` only appears when it was actually sampled.

use image::GrayImage;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

use crate::geom::linspace;

/// Guards the divisions by pixel extent and edge length.
const EPS_EXTENT: f64 = 1e-9;
const EPS_EDGE: f64 = 1e-12;

/// How many context points to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleCounts {
    /// Total number of points returned.
    pub total: usize,
    /// How many of them come from the polygon boundary. Clamped to `total`.
    pub boundary: usize,
}

impl Default for SampleCounts {
    fn default() -> Self {
        Self { total: 256, boundary: 64 }
    }
}

/// Sample exactly `counts.total` points from a polygon and its mask.
///
/// `polygon` is already in scaled space; mask pixels are mapped to it by
/// `x / (W - 1) * scale.x`, `y / (H - 1) * scale.y`.
pub fn context_points(
    polygon: Option<&[Point]>,
    mask: Option<&GrayImage>,
    counts: SampleCounts,
    scale: Vec2,
) -> Vec<Point> {
    let total = counts.total;
    let boundary = counts.boundary.min(total);
    let mut points = boundary_points(polygon, boundary);

    let needed = total.saturating_sub(points.len());
    if needed > 0 {
        points.extend(interior_or_fallback(polygon, mask, needed, scale));
    }

    points.truncate(total);
    points
}

/// Grid-based variant of [`context_points`].
///
/// Interior points come from a `ceil(sqrt(n))` grid over the canvas, kept only
/// where the mask is set; a shortfall repeats the last accepted point. When no
/// grid point lands in the mask the regular tiers of [`context_points`] apply.
pub fn context_points_grid(
    polygon: Option<&[Point]>,
    mask: &GrayImage,
    counts: SampleCounts,
    scale: Vec2,
) -> Vec<Point> {
    let total = counts.total;
    let boundary = counts.boundary.min(total);
    let mut points = boundary_points(polygon, boundary);
    let needed = total.saturating_sub(points.len());
    if needed == 0 {
        points.truncate(total);
        return points;
    }

    let (w, h) = mask.dimensions();
    let side = if w > 0 && h > 0 { (needed as f64).sqrt().ceil() as usize } else { 0 };
    let mut inside: Vec<Point> = Vec::with_capacity(needed);
    for y in linspace(0.0, h.saturating_sub(1) as f64, side) {
        for x in linspace(0.0, w.saturating_sub(1) as f64, side) {
            let (px, py) = (x as u32, y as u32);
            if mask.get_pixel(px, py).0[0] > 0 {
                inside.push(to_scaled(px as f64, py as f64, w, h, scale));
            }
        }
    }
    inside.truncate(needed);

    match inside.last().copied() {
        Some(nearest) => {
            inside.resize(needed, nearest);
            points.extend(inside);
        }
        None => points.extend(interior_or_fallback(polygon, Some(mask), needed, scale)),
    }

    points.truncate(total);
    points
}

/// For each point, whether the mask pixel it maps back to is foreground.
pub fn point_validity(points: &[Point], mask: &GrayImage, scale: Vec2) -> Vec<bool> {
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 {
        return vec![false; points.len()];
    }
    points
        .iter()
        .map(|p| {
            let x = ((p.x / scale.x * w as f64) as i64).clamp(0, w as i64 - 1) as u32;
            let y = ((p.y / scale.y * h as f64) as i64).clamp(0, h as i64 - 1) as u32;
            mask.get_pixel(x, y).0[0] > 0
        })
        .collect()
}

/// Up to `count` points on the polygon: vertices first, then evenly spaced
/// by arc length along the closed outline.
fn boundary_points(polygon: Option<&[Point]>, count: usize) -> Vec<Point> {
    let vertices = match polygon {
        Some(v) if count > 0 && v.len() >= 2 => v,
        _ => return Vec::new(),
    };

    let take = vertices.len().min(count);
    let mut points = vertices[..take].to_vec();
    let extra = count - take;
    if extra == 0 {
        return points;
    }

    let n = vertices.len();
    let edges: Vec<Vec2> = (0..n).map(|i| vertices[(i + 1) % n] - vertices[i]).collect();
    let lengths: Vec<f64> = edges.iter().map(|e| e.hypot()).collect();
    let mut cumulative = Vec::with_capacity(n + 1);
    cumulative.push(0.0);
    for len in &lengths {
        cumulative.push(cumulative[cumulative.len() - 1] + len);
    }
    let perimeter = cumulative[n];

    for k in 0..extra {
        let d = perimeter * k as f64 / extra as f64;
        // Last edge whose start distance is <= d.
        let edge = cumulative
            .partition_point(|&c| c <= d)
            .saturating_sub(1)
            .min(n - 1);
        let t = (d - cumulative[edge]) / (lengths[edge] + EPS_EDGE);
        points.push(vertices[edge] + edges[edge] * t);
    }
    points
}

/// `count` foreground pixels at evenly spaced positions in row-major order.
fn interior_points(mask: &GrayImage, count: usize, scale: Vec2) -> Vec<Point> {
    let (w, h) = mask.dimensions();
    let pixels: Vec<(u32, u32)> = mask
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > 0)
        .map(|(x, y, _)| (x, y))
        .collect();
    if pixels.is_empty() || count == 0 {
        return Vec::new();
    }

    let last = (pixels.len() - 1) as f64;
    linspace(0.0, last, count)
        .map(|i| {
            let (x, y) = pixels[i as usize];
            to_scaled(x as f64, y as f64, w, h, scale)
        })
        .collect()
}

/// Foreground pixels of the mask, else the last-resort tiers.
fn interior_or_fallback(
    polygon: Option<&[Point]>,
    mask: Option<&GrayImage>,
    count: usize,
    scale: Vec2,
) -> Vec<Point> {
    let interior = mask.map(|m| interior_points(m, count, scale)).unwrap_or_default();
    if interior.is_empty() {
        fallback_points(polygon, mask, count, scale)
    } else {
        interior
    }
}

/// Last-resort points: cycle the polygon vertices, else a grid over the canvas.
fn fallback_points(
    polygon: Option<&[Point]>,
    mask: Option<&GrayImage>,
    count: usize,
    scale: Vec2,
) -> Vec<Point> {
    if let Some(vertices) = polygon.filter(|v| !v.is_empty()) {
        return vertices.iter().copied().cycle().take(count).collect();
    }

    // Without a mask the canvas is the unit square of scaled space.
    let (w, h) = mask.map(|m| m.dimensions()).unwrap_or((2, 2));
    let side = (count as f64).sqrt().ceil() as usize;
    let mut grid = Vec::with_capacity(side * side);
    for y in linspace(0.0, h.saturating_sub(1) as f64, side) {
        for x in linspace(0.0, w.saturating_sub(1) as f64, side) {
            grid.push(to_scaled(x, y, w, h, scale));
        }
    }
    grid.truncate(count);
    grid
}

fn to_scaled(x: f64, y: f64, w: u32, h: u32, scale: Vec2) -> Point {
    Point::new(
        x / (w.saturating_sub(1) as f64 + EPS_EXTENT) * scale.x,
        y / (h.saturating_sub(1) as f64 + EPS_EXTENT) * scale.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn unit() -> Vec2 {
        Vec2::new(1.0, 1.0)
    }

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.2, 0.2),
            Point::new(0.8, 0.2),
            Point::new(0.8, 0.8),
            Point::new(0.2, 0.8),
        ]
    }

    fn disc(size: u32) -> GrayImage {
        let c = size as f64 / 2.0;
        GrayImage::from_fn(size, size, |x, y| {
            let d = (x as f64 - c).hypot(y as f64 - c);
            Luma([if d < c * 0.6 { 255 } else { 0 }])
        })
    }

    #[test]
    fn always_returns_total() {
        let poly = square();
        let mask = disc(40);
        let empty = GrayImage::new(40, 40);
        for (total, boundary) in [(0, 0), (1, 1), (10, 4), (64, 16), (100, 100), (7, 0)] {
            let counts = SampleCounts { total, boundary };
            assert_eq!(context_points(Some(&poly), Some(&mask), counts, unit()).len(), total);
            assert_eq!(context_points(Some(&poly), Some(&empty), counts, unit()).len(), total);
            assert_eq!(context_points(None, Some(&empty), counts, unit()).len(), total);
            assert_eq!(context_points(None, None, counts, unit()).len(), total);
            assert_eq!(context_points_grid(Some(&poly), &mask, counts, unit()).len(), total);
            assert_eq!(context_points_grid(None, &empty, counts, unit()).len(), total);
        }
    }

    #[test]
    fn deterministic_output() {
        let poly = square();
        let mask = disc(50);
        let counts = SampleCounts { total: 128, boundary: 32 };
        let a = context_points(Some(&poly), Some(&mask), counts, unit());
        let b = context_points(Some(&poly), Some(&mask), counts, unit());
        assert_eq!(a, b);
    }

    #[test]
    fn vertices_come_first_then_arc_length_points() {
        let poly = square();
        let counts = SampleCounts { total: 8, boundary: 8 };
        let points = context_points(Some(&poly), None, counts, unit());
        assert_eq!(&points[..4], &poly[..]);
        // 4 extra points at perimeter/4 spacing land on the corners again.
        for (p, v) in points[4..].iter().zip(&poly) {
            assert!(p.distance(*v) < 1e-9, "{:?} vs {:?}", p, v);
        }
    }

    #[test]
    fn interior_points_lie_in_mask() {
        let mask = disc(60);
        let counts = SampleCounts { total: 50, boundary: 0 };
        let points = context_points(None, Some(&mask), counts, unit());
        assert!(point_validity(&points, &mask, unit()).iter().all(|&v| v));
        let grid = context_points_grid(None, &mask, counts, unit());
        assert!(point_validity(&grid, &mask, unit()).iter().all(|&v| v));
    }

    #[test]
    fn empty_mask_cycles_vertices() {
        let poly = square();
        let counts = SampleCounts { total: 10, boundary: 2 };
        let points = context_points(Some(&poly), Some(&GrayImage::new(8, 8)), counts, unit());
        assert_eq!(&points[..2], &poly[..2]);
        assert_eq!(&points[2..6], &poly[..]);
        assert_eq!(&points[6..10], &poly[..]);
    }

    #[test]
    fn shortfalls_never_pad_with_origin() {
        let poly = square();
        let mask = disc(40);
        let empty = GrayImage::new(40, 40);
        let no_origin = |points: &[Point]| !points.contains(&Point::ZERO);
        for (total, boundary) in [(1, 0), (10, 4), (64, 16), (100, 2), (300, 300)] {
            let counts = SampleCounts { total, boundary };
            let cases = [
                context_points(Some(&poly), Some(&mask), counts, unit()),
                context_points(Some(&poly), Some(&empty), counts, unit()),
                context_points(Some(&poly), None, counts, unit()),
                context_points(None, Some(&mask), counts, unit()),
                context_points_grid(Some(&poly), &mask, counts, unit()),
                context_points_grid(Some(&poly), &empty, counts, unit()),
                context_points_grid(None, &mask, counts, unit()),
            ];
            for (i, points) in cases.iter().enumerate() {
                assert_eq!(points.len(), total, "case {}", i);
                assert!(no_origin(points.as_slice()), "case {} has (0, 0): total {} boundary {}", i, total, boundary);
            }
        }

        // A blob too small for a coarse grid still yields mask pixels.
        let mut blob = GrayImage::new(40, 40);
        blob.put_pixel(17, 23, Luma([255]));
        let counts = SampleCounts { total: 4, boundary: 0 };
        let points = context_points_grid(None, &blob, counts, unit());
        assert!(point_validity(&points, &blob, unit()).iter().all(|&v| v));
        assert!(no_origin(points.as_slice()));

        // With neither shape nor foreground the canvas grid starts at the origin
        // and holds it exactly once.
        let counts = SampleCounts { total: 9, boundary: 0 };
        let grid = context_points(None, Some(&empty), counts, unit());
        assert_eq!(grid.iter().filter(|p| **p == Point::ZERO).count(), 1);
        assert_eq!(grid[0], Point::ZERO);
    }

    #[test]
    fn nothing_at_all_gives_canvas_grid() {
        let counts = SampleCounts { total: 5, boundary: 0 };
        let points = context_points(None, Some(&GrayImage::new(11, 11)), counts, unit());
        assert_eq!(points.len(), 5);
        // 3x3 grid, row-major: (0,0), (0.5,0), (1,0), (0,0.5), (0.5,0.5)
        assert!(points[1].distance(Point::new(0.5, 0.0)) < 1e-6);
        assert!(points[4].distance(Point::new(0.5, 0.5)) < 1e-6);
    }
}
