//! Closed smoothing-spline resampling of a contour.
//!
//! A periodic uniform cubic B-spline is fitted by penalized least squares
//! (chord-length parametrization, second-difference roughness penalty on the
//! control points) and sampled at evenly spaced parameters. When the fit is
//! numerically unusable the raw contour is resampled by index instead, so
//! callers always get the number of points they asked for.

use image::GrayImage;
use kurbo::Point;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::contour::largest_contour;
use crate::error::ShapeError;
use crate::geom::{linspace, perimeter};

/// Parameters for spline resampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplineParams {
    /// Number of points returned.
    pub num_samples: usize,
    /// Weight of the roughness penalty. 0 = pure least squares.
    pub smoothing: f64,
    /// Number of spline control points (clamped to `4..=contour length`).
    pub control_points: usize,
}

impl Default for SplineParams {
    fn default() -> Self {
        Self {
            num_samples: 64,
            smoothing: 1.0,
            control_points: 32,
        }
    }
}

/// Extract the largest contour of `mask` and resample it with a closed spline.
///
/// Coordinates are divided by the mask width and height.
pub fn mask_to_spline_points(mask: &GrayImage, params: &SplineParams) -> Result<Vec<Point>, ShapeError> {
    let contour = largest_contour(mask)?;
    let (w, h) = mask.dimensions();
    Ok(resample_closed(&contour, w as f64, h as f64, params))
}

/// Resample a closed contour to `params.num_samples` points, divided by
/// `width` and `height`.
pub fn resample_closed(contour: &[Point], width: f64, height: f64, params: &SplineParams) -> Vec<Point> {
    let samples = match fit_periodic(contour, params) {
        Ok(samples) => samples,
        Err(reason) => {
            log::debug!("spline fit failed ({}), resampling contour by index", reason);
            index_resample(contour, params.num_samples)
        }
    };
    samples
        .into_iter()
        .map(|p| Point::new(p.x / width, p.y / height))
        .collect()
}

/// Pick `count` contour points at evenly spaced (truncated) indices.
///
/// Empty input gives empty output; there is nothing to resample.
pub fn index_resample(contour: &[Point], count: usize) -> Vec<Point> {
    if contour.is_empty() {
        return Vec::new();
    }
    linspace(0.0, (contour.len() - 1) as f64, count)
        .map(|i| contour[i as usize])
        .collect()
}

fn fit_periodic(contour: &[Point], params: &SplineParams) -> Result<Vec<Point>, &'static str> {
    let n = contour.len();
    if n < 4 {
        return Err("fewer than 4 points");
    }
    let total = perimeter(contour, true);
    if !(total > 1e-9) {
        return Err("zero perimeter");
    }

    // Chord-length parameters in [0, 1).
    let mut params_u = Vec::with_capacity(n);
    let mut run = 0.0;
    for i in 0..n {
        params_u.push(run / total);
        run += contour[i].distance(contour[(i + 1) % n]);
    }

    let m = params.control_points.clamp(4, n);
    let mut basis = DMatrix::<f64>::zeros(n, m);
    for (i, &u) in params_u.iter().enumerate() {
        for (j, weight) in basis_row(u, m) {
            basis[(i, j)] += weight;
        }
    }

    let mut roughness = DMatrix::<f64>::zeros(m, m);
    for j in 0..m {
        roughness[(j, (j + m - 1) % m)] += 1.0;
        roughness[(j, j)] -= 2.0;
        roughness[(j, (j + 1) % m)] += 1.0;
    }

    let data = DMatrix::<f64>::from_fn(n, 2, |i, c| if c == 0 { contour[i].x } else { contour[i].y });
    let basis_t = basis.transpose();
    let normal = &basis_t * &basis + roughness.transpose() * &roughness * params.smoothing.max(0.0);
    let rhs = &basis_t * data;

    let controls = normal.cholesky().ok_or("normal equations not positive definite")?.solve(&rhs);

    let samples: Vec<Point> = linspace(0.0, 1.0, params.num_samples)
        .map(|u| {
            let (mut x, mut y) = (0.0, 0.0);
            for (j, weight) in basis_row(u, m) {
                x += weight * controls[(j, 0)];
                y += weight * controls[(j, 1)];
            }
            Point::new(x, y)
        })
        .collect();

    if samples.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
        Ok(samples)
    } else {
        Err("non-finite spline samples")
    }
}

/// Non-zero periodic cubic B-spline weights at parameter `u` in `[0, 1]`.
fn basis_row(u: f64, m: usize) -> [(usize, f64); 4] {
    let s = u * m as f64;
    let floor = s.floor();
    let k = (floor as usize) % m;
    let t = s - floor;
    let t2 = t * t;
    let t3 = t2 * t;
    [
        ((k + m - 1) % m, (1.0 - t).powi(3) / 6.0),
        (k, (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0),
        ((k + 1) % m, (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0),
        ((k + 2) % m, t3 / 6.0),
    ]
}
