use mortar_geometry::predicates::{incircle_inexact, orient2d_inexact, signed_line_distance};
use nalgebra::point;

#[test]
fn orient2d_sign_follows_winding() {
    let a = point![0.0, 0.0];
    let b = point![1.0, 0.0];
    let c = point![0.0, 1.0];
    assert_eq!(orient2d_inexact(&a, &b, &c), 1.0);
    assert_eq!(orient2d_inexact(&a, &c, &b), -1.0);
    assert_eq!(orient2d_inexact(&a, &b, &point![2.0, 0.0]), 0.0);
}

#[test]
fn incircle_classifies_points() {
    let a = point![1.0_f64, 0.0];
    let b = point![0.0, 1.0];
    let c = point![-1.0, 0.0];
    assert!(incircle_inexact(&a, &b, &c, &point![0.0, 0.0]) > 0.0);
    assert!(incircle_inexact(&a, &b, &c, &point![0.0, 2.0]) < 0.0);
    assert!(incircle_inexact(&a, &b, &c, &point![0.0, -1.0]).abs() < 1e-14);
}

#[test]
fn signed_line_distance_is_positive_on_the_left() {
    let a = point![0.0, 0.0];
    let b = point![2.0, 0.0];
    assert_eq!(signed_line_distance(&a, &b, &point![1.0, 0.5]), Some(0.5));
    assert_eq!(signed_line_distance(&a, &b, &point![5.0, -3.0]), Some(-3.0));
    assert_eq!(signed_line_distance(&a, &a, &point![5.0, -3.0]), None);
}
