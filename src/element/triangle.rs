use nalgebra::Point2;
use numeric_literals::replace_float_literals;

use crate::element::ShapeFunctions;
use crate::Real;

/// Linear shape functions on the reference triangle `(0, 0), (1, 0), (0, 1)`.
#[rustfmt::skip]
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn tri3_shape_functions<T: Real>(xi: &Point2<T>) -> ShapeFunctions<T> {
    let mut shape = ShapeFunctions::zeros(3);
    shape.set(0, 1.0 - xi.x - xi.y, [-1.0, -1.0], [0.0, 0.0, 0.0]);
    shape.set(1, xi.x,              [ 1.0,  0.0], [0.0, 0.0, 0.0]);
    shape.set(2, xi.y,              [ 0.0,  1.0], [0.0, 0.0, 0.0]);
    shape
}

/// Quadratic shape functions on the reference triangle.
///
/// Nodes 0-2 are the corners and nodes 3, 4, 5 the midpoints of the edges `0-1`, `1-2`, `2-0`.
#[rustfmt::skip]
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn tri6_shape_functions<T: Real>(xi: &Point2<T>) -> ShapeFunctions<T> {
    let (x, y) = (xi.x, xi.y);
    let l0 = 1.0 - x - y;
    let mut shape = ShapeFunctions::zeros(6);
    shape.set(0, l0 * (2.0 * l0 - 1.0), [1.0 - 4.0 * l0, 1.0 - 4.0 * l0], [ 4.0,  4.0,  4.0]);
    shape.set(1, x * (2.0 * x - 1.0),   [4.0 * x - 1.0, 0.0],             [ 4.0,  0.0,  0.0]);
    shape.set(2, y * (2.0 * y - 1.0),   [0.0, 4.0 * y - 1.0],             [ 0.0,  4.0,  0.0]);
    shape.set(3, 4.0 * l0 * x,          [4.0 * (l0 - x), -4.0 * x],       [-8.0,  0.0, -4.0]);
    shape.set(4, 4.0 * x * y,           [4.0 * y, 4.0 * x],               [ 0.0,  0.0,  4.0]);
    shape.set(5, 4.0 * y * l0,          [-4.0 * y, 4.0 * (l0 - y)],       [ 0.0, -8.0, -4.0]);
    shape
}
