//! Derivative-free minimization of a function of one 2D point.

use kurbo::{Point, Vec2};

/// Result of a bounded Nelder-Mead search.
#[derive(Debug, Clone, Copy)]
pub struct Minimum {
    pub point: Point,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimize `f` with Nelder-Mead, starting from a simplex around `seed`.
///
/// `step` sizes the initial simplex. The search stops after `max_iterations`
/// or once both the spread of function values and the simplex diameter drop
/// below `tolerance`. The best vertex seen is returned either way.
pub fn nelder_mead(
    f: impl Fn(Point) -> f64,
    seed: Point,
    step: f64,
    max_iterations: usize,
    tolerance: f64,
) -> Minimum {
    let step = if step.abs() > 1e-12 { step } else { 1.0 };
    let mut simplex = [
        seed,
        seed + Vec2::new(step, 0.0),
        seed + Vec2::new(0.0, step),
    ];
    let mut values = simplex.map(&f);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        sort_simplex(&mut simplex, &mut values);

        let spread = (values[2] - values[0]).abs();
        let diameter = simplex[0]
            .distance(simplex[1])
            .max(simplex[0].distance(simplex[2]));
        if spread <= tolerance && diameter <= tolerance {
            converged = true;
            break;
        }
        iterations += 1;

        let centroid = simplex[0].midpoint(simplex[1]);
        let worst = simplex[2];

        let reflected = centroid + (centroid - worst) * REFLECT;
        let f_reflected = f(reflected);

        if f_reflected < values[0] {
            let expanded = centroid + (centroid - worst) * EXPAND;
            let f_expanded = f(expanded);
            if f_expanded < f_reflected {
                simplex[2] = expanded;
                values[2] = f_expanded;
            } else {
                simplex[2] = reflected;
                values[2] = f_reflected;
            }
            continue;
        }
        if f_reflected < values[1] {
            simplex[2] = reflected;
            values[2] = f_reflected;
            continue;
        }

        // Contract toward the better of the worst and reflected points.
        let (toward, f_toward) = if f_reflected < values[2] {
            (reflected, f_reflected)
        } else {
            (worst, values[2])
        };
        let contracted = centroid + (toward - centroid) * CONTRACT;
        let f_contracted = f(contracted);
        if f_contracted < f_toward {
            simplex[2] = contracted;
            values[2] = f_contracted;
            continue;
        }

        let best = simplex[0];
        for i in 1..3 {
            simplex[i] = best + (simplex[i] - best) * SHRINK;
            values[i] = f(simplex[i]);
        }
    }

    sort_simplex(&mut simplex, &mut values);
    Minimum {
        point: simplex[0],
        value: values[0],
        iterations,
        converged,
    }
}

fn sort_simplex(simplex: &mut [Point; 3], values: &mut [f64; 3]) {
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    *simplex = order.map(|i| simplex[i]);
    *values = order.map(|i| values[i]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_bowl_minimum() {
        let target = Point::new(3.0, -2.0);
        let result = nelder_mead(|p| p.distance_squared(target), Point::ZERO, 1.0, 1000, 1e-9);
        assert!(result.converged);
        assert!(result.point.distance(target) < 1e-4, "{:?}", result);
    }

    #[test]
    fn iteration_cap_returns_best_so_far() {
        let target = Point::new(100.0, 100.0);
        let start = Point::ZERO;
        let result = nelder_mead(|p| p.distance(target), start, 1.0, 5, 1e-12);
        assert_eq!(result.iterations, 5);
        assert!(!result.converged);
        assert!(result.value < start.distance(target));
    }
}
