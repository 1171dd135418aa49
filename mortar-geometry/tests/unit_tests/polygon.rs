use matrixcompare::assert_scalar_eq;
use mortar_geometry::proptest::convex_polygon2d_strategy_f64;
use mortar_geometry::{
    clip_convex_polygons, convex_polygon_contains_point, is_convex, signed_area, ClipError, ClipSource, PolygonRole,
};
use nalgebra::{point, Point2};
use proptest::prelude::*;

fn square(x0: f64, y0: f64, size: f64) -> Vec<Point2<f64>> {
    vec![
        point![x0, y0],
        point![x0 + size, y0],
        point![x0 + size, y0 + size],
        point![x0, y0 + size],
    ]
}

fn clip_area(first: &[Point2<f64>], second: &[Point2<f64>]) -> f64 {
    let clipped = clip_convex_polygons(first, second, 1e-10).unwrap();
    let points: Vec<_> = clipped.iter().map(|v| v.point).collect();
    signed_area(&points)
}

#[test]
fn signed_area_of_unit_square() {
    let mut s = square(0.0, 0.0, 1.0);
    assert_scalar_eq!(signed_area(&s), 1.0, comp = abs, tol = 1e-15);
    s.reverse();
    assert_scalar_eq!(signed_area(&s), -1.0, comp = abs, tol = 1e-15);
}

#[test]
fn convexity_check() {
    assert!(is_convex(&square(0.0, 0.0, 1.0), 1e-12));
    let dart = vec![point![0.0, 0.0], point![2.0, 1.0], point![0.0, 2.0], point![0.5, 1.0]];
    assert!(!is_convex(&dart, 1e-12));
}

#[test]
fn containment_respects_tolerance() {
    let s = square(0.0, 0.0, 1.0);
    assert!(convex_polygon_contains_point(&s, &point![0.5, 0.5], 0.0));
    assert!(convex_polygon_contains_point(&s, &point![1.0 + 1e-9, 0.5], 1e-8));
    assert!(!convex_polygon_contains_point(&s, &point![1.0 + 1e-6, 0.5], 1e-8));
}

#[test]
fn overlapping_squares_produce_square_intersection() {
    let first = square(0.0, 0.0, 1.0);
    let second = square(0.5, 0.25, 1.0);
    let clipped = clip_convex_polygons(&first, &second, 1e-10).unwrap();
    assert_eq!(clipped.len(), 4);
    let points: Vec<_> = clipped.iter().map(|v| v.point).collect();
    assert_scalar_eq!(signed_area(&points), 0.5 * 0.75, comp = abs, tol = 1e-14);

    let num_first = clipped.iter().filter(|v| matches!(v.source, ClipSource::First(_))).count();
    let num_second = clipped.iter().filter(|v| matches!(v.source, ClipSource::Second(_))).count();
    let num_intersections = clipped
        .iter()
        .filter(|v| matches!(v.source, ClipSource::EdgeIntersection { .. }))
        .count();
    assert_eq!((num_first, num_second, num_intersections), (1, 1, 2));
}

#[test]
fn edge_intersection_carries_alpha() {
    let first = square(0.0, 0.0, 1.0);
    let second = square(0.5, -0.5, 1.0);
    let clipped = clip_convex_polygons(&first, &second, 1e-10).unwrap();
    for vertex in &clipped {
        if let ClipSource::EdgeIntersection { first_edge, .. } = vertex.source {
            let alpha = vertex.alpha.unwrap();
            let a = first[first_edge];
            let b = first[(first_edge + 1) % 4];
            let expected = a + (b - a) * alpha;
            assert_scalar_eq!((expected - vertex.point).norm(), 0.0, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn identical_polygons_merge_coincident_vertices() {
    let s = square(0.0, 0.0, 1.0);
    let clipped = clip_convex_polygons(&s, &s, 1e-10).unwrap();
    assert_eq!(clipped.len(), 4);
    assert!(clipped.iter().all(|v| matches!(v.source, ClipSource::First(_))));
    assert!(clipped.iter().all(|v| !v.merged.is_empty()));
}

#[test]
fn touching_polygons_do_not_overlap() {
    let first = square(0.0, 0.0, 1.0);
    let second = square(1.0, 0.0, 1.0);
    assert!(clip_convex_polygons(&first, &second, 1e-10).unwrap().is_empty());
    let far = square(3.0, 3.0, 1.0);
    assert!(clip_convex_polygons(&first, &far, 1e-10).unwrap().is_empty());
}

#[test]
fn invalid_input_is_reported() {
    let s = square(0.0, 0.0, 1.0);
    let mut clockwise = s.clone();
    clockwise.reverse();
    assert_eq!(
        clip_convex_polygons(&s, &clockwise, 1e-10),
        Err(ClipError::Degenerate(PolygonRole::Second))
    );
    let dart = vec![point![0.0, 0.0], point![2.0, 1.0], point![0.0, 2.0], point![0.5, 1.0]];
    assert_eq!(clip_convex_polygons(&dart, &s, 1e-10), Err(ClipError::NonConvex(PolygonRole::First)));
}

proptest! {
    #[test]
    fn clipping_is_symmetric_in_area(
        first in convex_polygon2d_strategy_f64(7),
        second in convex_polygon2d_strategy_f64(7)
    ) {
        let a = clip_area(&first, &second);
        let b = clip_area(&second, &first);
        prop_assert!((a - b).abs() <= 1e-9);
        prop_assert!(a <= signed_area(&first) + 1e-9);
        prop_assert!(a <= signed_area(&second) + 1e-9);
    }

    #[test]
    fn clip_result_is_convex_and_contained(
        first in convex_polygon2d_strategy_f64(7),
        second in convex_polygon2d_strategy_f64(7)
    ) {
        let clipped = clip_convex_polygons(&first, &second, 1e-10).unwrap();
        let points: Vec<_> = clipped.iter().map(|v| v.point).collect();
        if !points.is_empty() {
            prop_assert!(is_convex(&points, 1e-9));
            for p in &points {
                prop_assert!(convex_polygon_contains_point(&first, p, 1e-8));
                prop_assert!(convex_polygon_contains_point(&second, p, 1e-8));
            }
        }
    }

    #[test]
    fn polygon_clipped_with_itself_is_unchanged(polygon in convex_polygon2d_strategy_f64(8)) {
        let a = clip_area(&polygon, &polygon);
        prop_assert!((a - signed_area(&polygon)).abs() <= 1e-9);
    }
}
