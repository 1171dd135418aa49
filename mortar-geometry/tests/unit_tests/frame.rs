use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use mortar_geometry::{orthonormal_tangents, PlaneFrame};
use nalgebra::{point, vector, Point2, Unit, Vector3};
use proptest::prelude::*;

#[test]
fn frame_round_trips_points_in_the_plane() {
    let frame = PlaneFrame::new(point![1.0, 2.0, 3.0], &vector![0.0, 0.0, 2.0]).unwrap();
    let local = Point2::new(0.3, -0.7);
    let global = frame.to_global(&local);
    assert_scalar_eq!(frame.signed_distance(&global), 0.0, comp = abs, tol = 1e-14);
    assert_matrix_eq!(frame.to_local(&global).coords, local.coords, comp = abs, tol = 1e-14);
}

#[test]
fn projection_removes_normal_component() {
    let frame = PlaneFrame::new(point![0.0, 0.0, 1.0], &vector![0.0, 0.0, 1.0]).unwrap();
    let projected = frame.project(&point![0.5, 0.25, 4.0]);
    assert_matrix_eq!(projected.coords, vector![0.5, 0.25, 1.0], comp = abs, tol = 1e-14);
}

#[test]
fn degenerate_normal_is_rejected() {
    assert!(PlaneFrame::new(point![0.0, 0.0, 0.0], &Vector3::zeros()).is_none());
}

proptest! {
    #[test]
    fn tangents_form_right_handed_basis(x in -1.0..1.0f64, y in -1.0..1.0f64, z in -1.0..1.0f64) {
        prop_assume!(vector![x, y, z].norm() > 1e-3);
        let n = Unit::new_normalize(vector![x, y, z]);
        let [t1, t2] = orthonormal_tangents(&n);
        prop_assert!(t1.dot(&n).abs() < 1e-12);
        prop_assert!(t2.dot(&n).abs() < 1e-12);
        prop_assert!(t1.dot(&t2).abs() < 1e-12);
        prop_assert!((t1.cross(&t2) - n.into_inner()).norm() < 1e-12);
    }
}
