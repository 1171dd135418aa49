//! Strategies for generating planar test geometry.
use nalgebra::{Point2, Vector2};
use proptest::collection::vec;
use proptest::prelude::*;
use std::f64::consts::PI;

/// Counter-clockwise convex polygons with 3 to `max_vertices` vertices on a randomly placed ellipse.
///
/// Consecutive vertices are separated by at least a tenth of the uniform angular spacing, so the
/// polygons are never degenerate.
pub fn convex_polygon2d_strategy_f64(max_vertices: usize) -> impl Strategy<Value = Vec<Point2<f64>>> {
    assert!(max_vertices >= 3);
    let center = [-2.0..2.0, -2.0..2.0].prop_map(|[x, y]| Vector2::new(x, y));
    let axes = [0.2..2.0, 0.2..2.0];
    let rotation = 0.0..(2.0 * PI);
    (3..=max_vertices)
        .prop_flat_map(|n| vec(0.1..1.0f64, n))
        .prop_flat_map(move |gaps| (Just(gaps), center.clone(), axes.clone(), rotation.clone()))
        .prop_map(|(gaps, center, [a, b], rotation)| {
            let total: f64 = gaps.iter().sum();
            let mut angle = rotation;
            gaps.iter()
                .map(|gap| {
                    let (s, c) = angle.sin_cos();
                    let local = Vector2::new(a * c, b * s);
                    let (rs, rc) = rotation.sin_cos();
                    let rotated = Vector2::new(rc * local.x - rs * local.y, rs * local.x + rc * local.y);
                    angle += 2.0 * PI * gap / total;
                    Point2::from(center + rotated)
                })
                .collect()
        })
}
