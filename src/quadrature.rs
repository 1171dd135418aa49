//! Quadrature rules on the reference triangle and the reference square.
//!
//! The reference triangle is `{ξ, η ≥ 0, ξ + η ≤ 1}`, so triangle weights sum to `1/2`. The
//! reference square is `[-1, 1]²` and its weights sum to `4`.
use crate::element::CellType;
use itertools::iproduct;
use nalgebra::Point2;

pub type QuadraturePair1d = (Vec<f64>, Vec<f64>);
pub type QuadraturePair2d = (Vec<f64>, Vec<Point2<f64>>);

/// Gauss–Legendre rule on `[-1, 1]` with `n` points, exact for polynomials of degree `2n - 1`.
///
/// Returns `None` for `n` outside `1..=5`.
pub fn gauss_legendre(n: usize) -> Option<QuadraturePair1d> {
    let (weights, points) = match n {
        1 => (vec![2.0], vec![0.0]),
        2 => {
            let p = 0.577_350_269_189_625_8;
            (vec![1.0, 1.0], vec![-p, p])
        }
        3 => {
            let p = 0.774_596_669_241_483_4;
            (vec![5.0 / 9.0, 8.0 / 9.0, 5.0 / 9.0], vec![-p, 0.0, p])
        }
        4 => {
            let (p1, w1) = (0.339_981_043_584_856_3, 0.652_145_154_862_546_1);
            let (p2, w2) = (0.861_136_311_594_052_6, 0.347_854_845_137_453_9);
            (vec![w2, w1, w1, w2], vec![-p2, -p1, p1, p2])
        }
        5 => {
            let (p1, w1) = (0.538_469_310_105_683_1, 0.478_628_670_499_366_5);
            let (p2, w2) = (0.906_179_845_938_664_0, 0.236_926_885_056_189_1);
            let w0 = 128.0 / 225.0;
            (vec![w2, w1, w0, w1, w2], vec![-p2, -p1, 0.0, p1, p2])
        }
        _ => return None,
    };
    Some((weights, points))
}

/// Tensor-product Gauss rule on `[-1, 1]²` with `n × n` points.
pub fn quadrilateral_gauss(n: usize) -> Option<QuadraturePair2d> {
    let (w, p) = gauss_legendre(n)?;
    let weights = iproduct!(0..n, 0..n).map(|(j, i)| w[i] * w[j]).collect();
    let points = iproduct!(0..n, 0..n).map(|(j, i)| Point2::new(p[i], p[j])).collect();
    Some((weights, points))
}

/// Symmetric triangle rule exact for polynomials of the given degree.
///
/// Supports degrees up to 5, using 1, 3, 6 and 7 points. Returns `None` for higher degrees.
pub fn triangle_rule(degree: usize) -> Option<QuadraturePair2d> {
    let mut weights = Vec::new();
    let mut points = Vec::new();
    // Orbit of the barycentric point (a, a, 1 - 2a)
    let mut push_orbit = |a: f64, w: f64| {
        for p in [Point2::new(a, a), Point2::new(1.0 - 2.0 * a, a), Point2::new(a, 1.0 - 2.0 * a)] {
            weights.push(w);
            points.push(p);
        }
    };
    match degree {
        0 | 1 => return Some((vec![0.5], vec![Point2::new(1.0 / 3.0, 1.0 / 3.0)])),
        2 => push_orbit(1.0 / 6.0, 1.0 / 6.0),
        3 | 4 => {
            push_orbit(0.445_948_490_915_965, 0.5 * 0.223_381_589_678_011);
            push_orbit(0.091_576_213_509_771, 0.5 * 0.109_951_743_655_322);
        }
        5 => {
            push_orbit(0.470_142_064_105_115, 0.5 * 0.132_394_152_788_506);
            push_orbit(0.101_286_507_323_456, 0.5 * 0.125_939_180_544_827);
            weights.push(0.5 * 0.225);
            points.push(Point2::new(1.0 / 3.0, 1.0 / 3.0));
        }
        _ => return None,
    }
    Some((weights, points))
}

/// A rule for the reference domain of the cell type that is exact for polynomials of the given degree,
/// capped at the highest degree available.
pub fn rule_for_cell(cell: CellType, degree: usize) -> QuadraturePair2d {
    let rule = if cell.is_triangle() {
        triangle_rule(degree.min(5))
    } else {
        quadrilateral_gauss(((degree + 2) / 2).clamp(1, 5))
    };
    // Both branches request supported rules
    rule.unwrap_or_else(|| unreachable!("quadrature rule for degree {} not available", degree))
}

/// Integrates `f` with the given rule.
pub fn integrate(rule: &QuadraturePair2d, f: impl Fn(&Point2<f64>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights.iter().zip(points).map(|(w, p)| w * f(p)).sum()
}
