//! Shared geometry utilities.

use kurbo::Point;

/// Signed area of a closed polygon via the shoelace formula.
///
/// Positive = counter-clockwise in y-up coordinates.
pub fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let j = (i + 1) % n;
            points[i].x * points[j].y - points[j].x * points[i].y
        })
        .sum::<f64>()
        / 2.0
}

/// Length of a polyline; `closed` adds the edge from the last point back to the first.
pub fn perimeter(points: &[Point], closed: bool) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let open: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    if closed {
        open + points[points.len() - 1].distance(points[0])
    } else {
        open
    }
}

/// Index of the point farthest from `points[0]` (first on ties).
pub fn farthest_from_first(points: &[Point]) -> usize {
    let Some(&origin) = points.first() else {
        return 0;
    };
    let mut best = 0;
    let mut best_dist = 0.0;
    for (i, p) in points.iter().enumerate().skip(1) {
        let d = origin.distance_squared(*p);
        if d > best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = if n > 1 { (end - start) / (n - 1) as f64 } else { 0.0 };
    (0..n).map(move |i| if i + 1 == n && n > 1 { end } else { start + step * i as f64 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_square_area_and_perimeter() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        assert_eq!(signed_area(&square), 1.0);
        assert_eq!(perimeter(&square, true), 4.0);
        assert_eq!(perimeter(&square, false), 3.0);
        assert_eq!(farthest_from_first(&square), 2);
    }

    #[test]
    fn linspace_hits_both_ends() {
        let values: Vec<f64> = linspace(0.0, 1.0, 5).collect();
        assert_eq!(values, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 7.0, 1).collect::<Vec<_>>(), vec![3.0]);
        assert_eq!(linspace(0.0, 1.0, 0).count(), 0);
    }
}
