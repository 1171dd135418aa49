use crate::Real;
use nalgebra::{matrix, Point2};

/// Twice the signed area of the triangle `(a, b, c)`.
///
/// Positive if the points are ordered counter-clockwise.
pub fn orient2d_inexact<T: Real>(a: &Point2<T>, b: &Point2<T>, c: &Point2<T>) -> T {
    matrix![a.x, a.y, T::one();
            b.x, b.y, T::one();
            c.x, c.y, T::one()]
    .determinant()
}

/// Positive if `d` lies strictly inside the circumcircle of the counter-clockwise triangle `(a, b, c)`,
/// negative if it lies outside and zero if the four points are co-circular.
pub fn incircle_inexact<T: Real>(a: &Point2<T>, b: &Point2<T>, c: &Point2<T>, d: &Point2<T>) -> T {
    let ad = a - d;
    let bd = b - d;
    let cd = c - d;
    matrix![ad.x, ad.y, ad.norm_squared();
            bd.x, bd.y, bd.norm_squared();
            cd.x, cd.y, cd.norm_squared()]
    .determinant()
}

/// Signed distance of `p` from the infinite line through `a` and `b`.
///
/// Positive on the left of the directed line `a -> b`. Returns `None` if `a` and `b` coincide.
pub fn signed_line_distance<T: Real>(a: &Point2<T>, b: &Point2<T>, p: &Point2<T>) -> Option<T> {
    let edge = b - a;
    let length = edge.norm();
    if length <= T::default_epsilon() {
        None
    } else {
        let rel = p - a;
        Some((edge.x * rel.y - edge.y * rel.x) / length)
    }
}
