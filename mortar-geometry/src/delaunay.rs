use crate::predicates::incircle_inexact;
use crate::Real;
use nalgebra::Point2;
use numeric_literals::replace_float_literals;

/// Delaunay triangulation of a convex counter-clockwise polygon.
///
/// An `N`-gon always yields exactly `N - 2` counter-clockwise triangles, given as indices into
/// `vertices`. The triangulation starts from a fan and applies Lawson edge flips until every
/// interior edge is locally Delaunay, which maximizes the smallest interior angle.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn triangulate_convex_delaunay<T: Real>(vertices: &[Point2<T>]) -> Vec<[usize; 3]> {
    let n = vertices.len();
    if n < 3 {
        return Vec::new();
    }
    let mut triangles: Vec<[usize; 3]> = (1..n - 1).map(|i| [0, i, i + 1]).collect();
    if n == 3 {
        return triangles;
    }

    // Incircle determinants scale with length^4
    let extent = vertices
        .iter()
        .map(|v| (v - vertices[0]).norm())
        .fold(T::zero(), T::max);
    let tol = 1e-12 * extent.powi(4);

    // Near co-circular configurations may oscillate under round-off
    let max_sweeps = n * n;
    for _ in 0..max_sweeps {
        let mut flipped = false;
        for t in 0..triangles.len() {
            for s in (t + 1)..triangles.len() {
                if let Some((a, b, c, d)) = shared_edge(&triangles[t], &triangles[s]) {
                    let [pa, pb, pc, pd] = [a, b, c, d].map(|i| &vertices[i]);
                    if incircle_inexact(pa, pb, pc, pd) > tol {
                        triangles[t] = [c, a, d];
                        triangles[s] = [d, b, c];
                        flipped = true;
                    }
                }
            }
        }
        if !flipped {
            break;
        }
    }
    triangles
}

/// If `t` contains the directed edge `a -> b` and `s` the reversed edge `b -> a`, returns `(a, b, c, d)`
/// where `c` is the vertex of `t` and `d` the vertex of `s` opposite the edge.
fn shared_edge(t: &[usize; 3], s: &[usize; 3]) -> Option<(usize, usize, usize, usize)> {
    for k in 0..3 {
        let (a, b, c) = (t[k], t[(k + 1) % 3], t[(k + 2) % 3]);
        for l in 0..3 {
            if s[l] == b && s[(l + 1) % 3] == a {
                return Some((a, b, c, s[(l + 2) % 3]));
            }
        }
    }
    None
}
