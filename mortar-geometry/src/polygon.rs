use crate::predicates::signed_line_distance;
use crate::Real;
use itertools::Itertools;
use nalgebra::{Point2, Scalar};
use numeric_literals::replace_float_literals;
use std::cmp::Ordering;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Identifies which of the two clipped polygons a statement refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PolygonRole {
    First,
    Second,
}

/// Where a vertex of a clip polygon came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClipSource {
    /// Vertex `i` of the first polygon, lying inside the second.
    First(usize),
    /// Vertex `j` of the second polygon, lying inside the first.
    Second(usize),
    /// Intersection of the edge `(i, i + 1)` of the first polygon with the edge
    /// `(j, j + 1)` of the second polygon.
    EdgeIntersection { first_edge: usize, second_edge: usize },
}

/// A vertex of the intersection of two convex polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipVertex<T: Scalar> {
    pub point: Point2<T>,
    pub source: ClipSource,
    /// Position along the edge of the first polygon, for edge intersections.
    pub alpha: Option<T>,
    /// Provenance of candidates that coincided with this vertex and were discarded.
    pub merged: Vec<ClipSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipError {
    /// The polygon has (numerically) zero or negative area in counter-clockwise orientation.
    Degenerate(PolygonRole),
    NonConvex(PolygonRole),
}

impl Display for ClipError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degenerate(role) => write!(f, "{:?} polygon is degenerate or clockwise", role),
            Self::NonConvex(role) => write!(f, "{:?} polygon is not convex", role),
        }
    }
}

impl std::error::Error for ClipError {}

/// Signed area of a simple polygon (shoelace formula). Positive for counter-clockwise order.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn signed_area<T: Real>(vertices: &[Point2<T>]) -> T {
    if vertices.len() < 3 {
        return T::zero();
    }
    let twice_area = vertices
        .iter()
        .circular_tuple_windows()
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .fold(T::zero(), |acc, x| acc + x);
    0.5 * twice_area
}

/// Longest edge of the closed polygon.
pub fn max_edge_length<T: Real>(vertices: &[Point2<T>]) -> T {
    vertices
        .iter()
        .circular_tuple_windows()
        .map(|(a, b)| (b - a).norm())
        .fold(T::zero(), T::max)
}

/// Checks that a counter-clockwise polygon is convex, allowing turns of up to `tol` in the wrong direction.
pub fn is_convex<T: Real>(vertices: &[Point2<T>], tol: T) -> bool {
    if vertices.len() < 3 {
        return false;
    }
    vertices
        .iter()
        .circular_tuple_windows()
        .all(|(a, b, c)| match signed_line_distance(a, b, c) {
            Some(d) => d >= -tol,
            None => true,
        })
}

/// Whether `point` lies inside (or within `tol` of the boundary of) a convex counter-clockwise polygon.
pub fn convex_polygon_contains_point<T: Real>(vertices: &[Point2<T>], point: &Point2<T>, tol: T) -> bool {
    vertices
        .iter()
        .circular_tuple_windows()
        .all(|(a, b)| match signed_line_distance(a, b, point) {
            Some(d) => d >= -tol,
            None => true,
        })
}

/// Intersection parameters `(alpha, beta)` of the segments `a0 -> a1` and `b0 -> b1`, such that
/// the intersection point is `a0 + alpha (a1 - a0) = b0 + beta (b1 - b0)`.
///
/// Returns `None` for (numerically) parallel segments. The parameters are not restricted to `[0, 1]`.
pub fn line_intersection_parameters<T: Real>(
    a0: &Point2<T>,
    a1: &Point2<T>,
    b0: &Point2<T>,
    b1: &Point2<T>,
) -> Option<(T, T)> {
    let da = a1 - a0;
    let db = b1 - b0;
    let denom = da.x * db.y - da.y * db.x;
    let scale = da.norm() * db.norm();
    if denom.abs() <= T::default_epsilon() * scale || scale == T::zero() {
        return None;
    }
    let r = b0 - a0;
    let alpha = (r.x * db.y - r.y * db.x) / denom;
    let beta = (r.x * da.y - r.y * da.x) / denom;
    Some((alpha, beta))
}

/// Computes the intersection of two convex counter-clockwise polygons.
///
/// The result is the convex hull of all vertices of one polygon lying inside the other, together
/// with all pairwise edge intersections. Candidates closer than `tol` to an already accepted vertex
/// are merged into it, and vertices lying within `tol` of the line through their neighbors are removed.
/// The returned ring is counter-clockwise. An empty ring means the polygons do not overlap.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn clip_convex_polygons<T: Real>(
    first: &[Point2<T>],
    second: &[Point2<T>],
    tol: T,
) -> Result<Vec<ClipVertex<T>>, ClipError> {
    for (polygon, role) in [(first, PolygonRole::First), (second, PolygonRole::Second)] {
        if polygon.len() < 3 || signed_area(polygon) <= tol * tol {
            return Err(ClipError::Degenerate(role));
        }
        if !is_convex(polygon, tol) {
            return Err(ClipError::NonConvex(role));
        }
    }

    let mut candidates = Vec::new();
    for (i, p) in first.iter().enumerate() {
        if convex_polygon_contains_point(second, p, tol) {
            candidates.push((*p, ClipSource::First(i), None));
        }
    }
    for (j, q) in second.iter().enumerate() {
        if convex_polygon_contains_point(first, q, tol) {
            candidates.push((*q, ClipSource::Second(j), None));
        }
    }

    let n = first.len();
    let m = second.len();
    for i in 0..n {
        let (a0, a1) = (&first[i], &first[(i + 1) % n]);
        for j in 0..m {
            let (b0, b1) = (&second[j], &second[(j + 1) % m]);
            if let Some((alpha, beta)) = line_intersection_parameters(a0, a1, b0, b1) {
                let inside = |t: T| t >= 0.0 && t <= 1.0;
                if inside(alpha) && inside(beta) {
                    let point = a0 + (a1 - a0) * alpha;
                    let source = ClipSource::EdgeIntersection {
                        first_edge: i,
                        second_edge: j,
                    };
                    candidates.push((point, source, Some(alpha)));
                }
            }
        }
    }

    let mut vertices: Vec<ClipVertex<T>> = Vec::with_capacity(candidates.len());
    for (point, source, alpha) in candidates {
        let existing = vertices
            .iter_mut()
            .find(|v| (v.point - point).norm() <= tol);
        match existing {
            Some(vertex) => vertex.merged.push(source),
            None => vertices.push(ClipVertex {
                point,
                source,
                alpha,
                merged: Vec::new(),
            }),
        }
    }

    if vertices.len() < 3 {
        return Ok(Vec::new());
    }

    let centroid = vertices
        .iter()
        .fold(Point2::origin(), |acc: Point2<T>, v| acc + v.point.coords)
        / T::from_usize(vertices.len()).unwrap();
    let angle = |p: &Point2<T>| (p.y - centroid.y).atan2(p.x - centroid.x);
    vertices.sort_by(|a, b| {
        angle(&a.point)
            .partial_cmp(&angle(&b.point))
            .unwrap_or(Ordering::Equal)
    });

    remove_colinear_vertices(&mut vertices, tol);

    if vertices.len() < 3 || signed_area(&vertices.iter().map(|v| v.point).collect_vec()) <= tol * tol {
        Ok(Vec::new())
    } else {
        Ok(vertices)
    }
}

fn remove_colinear_vertices<T: Real>(vertices: &mut Vec<ClipVertex<T>>, tol: T) {
    loop {
        let n = vertices.len();
        if n < 3 {
            return;
        }
        let colinear = (0..n).find(|&i| {
            let prev = &vertices[(i + n - 1) % n].point;
            let next = &vertices[(i + 1) % n].point;
            match signed_line_distance(prev, next, &vertices[i].point) {
                Some(d) => d.abs() <= tol,
                None => true,
            }
        });
        match colinear {
            Some(i) => {
                vertices.remove(i);
            }
            None => return,
        }
    }
}
