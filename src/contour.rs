use geo::{LineString, Simplify};
use image::{imageops, GrayImage};
use imageproc::contours::{find_contours, BorderType};
use kurbo::Point;

use crate::error::ShapeError;
use crate::geom::{farthest_from_first, perimeter, signed_area};

/// Extract the largest external contour of a binary mask.
///
/// Points are in pixel coordinates (y=0 is the top row) and the contour is
/// implicitly closed: the first point is not repeated at the end.
/// Among several components the one with the largest area wins; ties go to
/// the first one traced. Foreground touching the image border is traced
/// like any other region.
pub fn largest_contour(mask: &GrayImage) -> Result<Vec<Point>, ShapeError> {
    // Border following needs a background frame around the image.
    let (w, h) = mask.dimensions();
    let mut framed = GrayImage::new(w + 2, h + 2);
    imageops::replace(&mut framed, mask, 1, 1);
    let contours = find_contours::<i32>(&framed);

    let mut best: Option<(f64, Vec<Point>)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        let points: Vec<Point> = contour
            .points
            .iter()
            .map(|p| Point::new((p.x - 1) as f64, (p.y - 1) as f64))
            .collect();
        let area = signed_area(&points).abs();
        match &best {
            Some((best_area, _)) if area <= *best_area => {}
            _ => best = Some((area, points)),
        }
    }

    let (area, points) = best.ok_or(ShapeError::DegenerateMask)?;
    log::debug!("contour: {} points, area {:.1} px", points.len(), area);
    Ok(points)
}

/// Simplify a closed contour with a tolerance proportional to its perimeter.
///
/// `epsilon = epsilon_ratio * perimeter`. The ring is opened at point 0 and at
/// the point farthest from it; both halves are Douglas-Peucker simplified and
/// rejoined, so point 0 always survives. Larger ratios never yield more points.
pub fn simplify(contour: &[Point], epsilon_ratio: f64) -> Vec<Point> {
    if contour.len() < 3 || epsilon_ratio <= 0.0 {
        return contour.to_vec();
    }
    let epsilon = epsilon_ratio * perimeter(contour, true);
    let split = farthest_from_first(contour);
    if split == 0 {
        return contour.to_vec();
    }

    let first_half = rdp_simplify(&contour[..=split], epsilon);
    let mut second_half: Vec<Point> = contour[split..].to_vec();
    second_half.push(contour[0]);
    let second_half = rdp_simplify(&second_half, epsilon);

    let mut result = first_half;
    // Both halves share the split point and point 0.
    result.extend_from_slice(&second_half[1..second_half.len() - 1]);
    result
}

/// Open-polyline Douglas-Peucker via geo. Endpoints are kept.
fn rdp_simplify(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 || epsilon <= 0.0 {
        return points.to_vec();
    }
    let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
    LineString::from(coords)
        .simplify(&epsilon)
        .into_inner()
        .into_iter()
        .map(|c| Point::new(c.x, c.y))
        .collect()
}
