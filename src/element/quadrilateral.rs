use nalgebra::Point2;
use numeric_literals::replace_float_literals;

use crate::element::ShapeFunctions;
use crate::Real;

/// Signs of the corner coordinates of the reference square, in node order.
const CORNER_SIGNS: [(f64, f64); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

/// Bilinear shape functions on `[-1, 1]²`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn quad4_shape_functions<T: Real>(xi: &Point2<T>) -> ShapeFunctions<T> {
    let mut shape = ShapeFunctions::zeros(4);
    for (k, &(a, b)) in CORNER_SIGNS.iter().enumerate() {
        // Shape function k is one at (a, b)
        let (a, b) = (T::from_f64(a).unwrap(), T::from_f64(b).unwrap());
        let (fx, fy) = (1.0 + a * xi.x, 1.0 + b * xi.y);
        shape.set(
            k,
            fx * fy / 4.0,
            [a * fy / 4.0, b * fx / 4.0],
            [0.0, 0.0, a * b / 4.0],
        );
    }
    shape
}

/// Serendipity shape functions on `[-1, 1]²`.
///
/// Nodes 0-3 are the corners, nodes 4-7 the midpoints of the edges `0-1`, `1-2`, `2-3`, `3-0`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn quad8_shape_functions<T: Real>(xi: &Point2<T>) -> ShapeFunctions<T> {
    let (x, y) = (xi.x, xi.y);
    let mut shape = ShapeFunctions::zeros(8);
    for (k, &(a, b)) in CORNER_SIGNS.iter().enumerate() {
        let (a, b) = (T::from_f64(a).unwrap(), T::from_f64(b).unwrap());
        let (fx, fy) = (1.0 + a * x, 1.0 + b * y);
        shape.set(
            k,
            fx * fy * (a * x + b * y - 1.0) / 4.0,
            [a * fy * (2.0 * a * x + b * y) / 4.0, b * fx * (a * x + 2.0 * b * y) / 4.0],
            [fy / 2.0, fx / 2.0, a * b * (2.0 * a * x + 2.0 * b * y + 1.0) / 4.0],
        );
    }
    // Midpoints of the edges with constant η = ∓1
    for (k, b) in [(4, -1.0), (6, 1.0)] {
        let fy = 1.0 + b * y;
        shape.set(
            k,
            (1.0 - x * x) * fy / 2.0,
            [-x * fy, b * (1.0 - x * x) / 2.0],
            [-fy, 0.0, -b * x],
        );
    }
    // Midpoints of the edges with constant ξ = ±1
    for (k, a) in [(5, 1.0), (7, -1.0)] {
        let fx = 1.0 + a * x;
        shape.set(
            k,
            fx * (1.0 - y * y) / 2.0,
            [a * (1.0 - y * y) / 2.0, -y * fx],
            [0.0, -fx, -a * y],
        );
    }
    shape
}

/// One-dimensional quadratic Lagrange polynomial associated with the node at `s = alpha`,
/// `alpha ∈ {-1, 0, 1}`, with its first and second derivatives.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn lagrange_1d<T: Real>(alpha: i8, s: T) -> [T; 3] {
    match alpha {
        -1 => [s * (s - 1.0) / 2.0, (2.0 * s - 1.0) / 2.0, 1.0],
        0 => [1.0 - s * s, -2.0 * s, -2.0],
        _ => [s * (s + 1.0) / 2.0, (2.0 * s + 1.0) / 2.0, 1.0],
    }
}

/// Biquadratic Lagrange shape functions on `[-1, 1]²`.
///
/// Node ordering as for [`quad8_shape_functions`], with node 8 at the center.
pub fn quad9_shape_functions<T: Real>(xi: &Point2<T>) -> ShapeFunctions<T> {
    const NODES: [(i8, i8); 9] = [(-1, -1), (1, -1), (1, 1), (-1, 1), (0, -1), (1, 0), (0, 1), (-1, 0), (0, 0)];
    let mut shape = ShapeFunctions::zeros(9);
    for (k, &(a, b)) in NODES.iter().enumerate() {
        let [lx, dlx, ddlx] = lagrange_1d(a, xi.x);
        let [ly, dly, ddly] = lagrange_1d(b, xi.y);
        shape.set(k, lx * ly, [dlx * ly, lx * dly], [ddlx * ly, lx * ddly, dlx * dly]);
    }
    shape
}
