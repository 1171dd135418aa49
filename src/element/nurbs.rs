use nalgebra::Point2;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

use crate::element::ShapeFunctions;
use crate::Real;

/// Knot vectors and control point weights of a biquadratic NURBS element.
///
/// The element covers the single knot span `[knots[d][2], knots[d][3]]` in each parametric direction
/// `d`, mapped onto `[-1, 1]`. Control point `k` has indices `(k % 3, k / 3)` in the control net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurbsData {
    pub knots: [[f64; 6]; 2],
    pub weights: [f64; 9],
}

impl NurbsData {
    /// Open uniform knot vectors with unit weights, for which the element reduces to a quadratic
    /// Bézier patch.
    pub fn bezier() -> Self {
        let knots = [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
        Self {
            knots: [knots, knots],
            weights: [1.0; 9],
        }
    }

    pub fn shape_functions(&self, xi: &Point2<f64>) -> ShapeFunctions<f64> {
        nurbs9_shape_functions(&self.knots, &self.weights, xi)
    }
}

/// Quadratic B-spline basis functions of the span `[u[2], u[3]]`, with first and second derivatives
/// with respect to the element parameter `s ∈ [-1, 1]`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn bspline_basis_1d<T: Real>(u: &[T; 6], s: T) -> [[T; 3]; 3] {
    let (u1, u2, u3, u4) = (u[1], u[2], u[3], u[4]);
    let h = u3 - u2;
    let t = (u2 + u3) / 2.0 + s * h / 2.0;
    let dt = h / 2.0;
    let c0 = (u3 - u1) * h;
    let c2 = (u4 - u2) * h;

    let n0 = (u3 - t) * (u3 - t) / c0;
    let n1 = (t - u1) * (u3 - t) / c0 + (u4 - t) * (t - u2) / c2;
    let n2 = (t - u2) * (t - u2) / c2;

    let dn0 = -2.0 * (u3 - t) / c0;
    let dn1 = ((u3 - t) - (t - u1)) / c0 + ((u4 - t) - (t - u2)) / c2;
    let dn2 = 2.0 * (t - u2) / c2;

    let ddn0 = 2.0 / c0;
    let ddn1 = -2.0 / c0 - 2.0 / c2;
    let ddn2 = 2.0 / c2;

    [
        [n0, dn0 * dt, ddn0 * dt * dt],
        [n1, dn1 * dt, ddn1 * dt * dt],
        [n2, dn2 * dt, ddn2 * dt * dt],
    ]
}

/// Rational biquadratic shape functions `R_k = w_k B_k / Σ_j w_j B_j`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn nurbs9_shape_functions<T: Real>(knots: &[[f64; 6]; 2], weights: &[f64; 9], xi: &Point2<T>) -> ShapeFunctions<T> {
    let to_t = |v: &[f64; 6]| v.map(|x| T::from_f64(x).unwrap());
    let bx = bspline_basis_1d(&to_t(&knots[0]), xi.x);
    let by = bspline_basis_1d(&to_t(&knots[1]), xi.y);

    // Weighted tensor-product basis f_k = w_k B_k with derivatives [f, f_x, f_y, f_xx, f_yy, f_xy]
    let f: Vec<[T; 6]> = (0..9)
        .map(|k| {
            let w = T::from_f64(weights[k]).unwrap();
            let ([nx, dnx, ddnx], [ny, dny, ddny]) = (bx[k % 3], by[k / 3]);
            [nx * ny, dnx * ny, nx * dny, ddnx * ny, nx * ddny, dnx * dny].map(|v| w * v)
        })
        .collect();

    let mut total = [0.0; 6];
    for fk in &f {
        for (acc, v) in total.iter_mut().zip(fk) {
            *acc += *v;
        }
    }
    let [w, wx, wy, wxx, wyy, wxy] = total;

    let mut shape = ShapeFunctions::zeros(9);
    for (k, &[fk, fx, fy, fxx, fyy, fxy]) in f.iter().enumerate() {
        let value = fk / w;
        let gradient = [(fx * w - fk * wx) / (w * w), (fy * w - fk * wy) / (w * w)];
        // ∂_ij (f / W) = f_ij / W - (f_i W_j + f_j W_i) / W² - f W_ij / W² + 2 f W_i W_j / W³
        let second = |fij: T, fi: T, fj: T, wi: T, wj: T, wij: T| {
            fij / w - (fi * wj + fj * wi) / (w * w) - fk * wij / (w * w) + 2.0 * fk * wi * wj / (w * w * w)
        };
        shape.set(
            k,
            value,
            gradient,
            [
                second(fxx, fx, fx, wx, wx, wxx),
                second(fyy, fy, fy, wy, wy, wyy),
                second(fxy, fx, fy, wx, wy, wxy),
            ],
        );
    }
    shape
}
