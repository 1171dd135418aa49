use super::element::{curved_tri6, perturbed};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use mortar::coupling::{
    project_along_direction, project_along_direction_deriv, project_along_element_normal,
    project_along_element_normal_deriv, project_along_interpolated_normal, projector_for, MORTAR_MAX_ITER,
};
use mortar::deriv::DerivVec3;
use mortar::element::CellType;
use nalgebra::{Point2, Point3, Vector3};
use util::{assert_derivative_eq, central_difference};

#[test]
fn projector_table_enables_curvature_terms_for_curved_cells() {
    let flat = projector_for(CellType::Tri3, CellType::Tri3);
    assert!(!flat.onto_slave.normal_curvature);
    assert!(!flat.onto_master.normal_curvature);
    let mixed = projector_for(CellType::Tri3, CellType::Quad9);
    assert!(!mixed.onto_slave.normal_curvature);
    assert!(mixed.onto_master.normal_curvature);
    assert_eq!(mixed.onto_master.max_iter, MORTAR_MAX_ITER);
}

#[test]
fn projection_along_fixed_direction_onto_curved_element() {
    let target = curved_tri6(0.0);
    let settings = projector_for(CellType::Tri3, CellType::Tri6).onto_master;
    let point = Point3::new(0.3, 0.2, 0.5);
    let direction = -Vector3::z();
    let projection = project_along_direction(&point, &direction, &target, None, &settings);
    assert!(projection.converged);
    assert!(projection.iterations <= 5);

    let expected_z = 0.1 * (0.3 * 0.3 + 0.2 * 0.2);
    let hit = target.position(&projection.xi);
    assert_matrix_eq!(hit.coords, Vector3::new(0.3, 0.2, expected_z), comp = abs, tol = 1e-12);
    assert_scalar_eq!(projection.alpha, 0.5 - expected_z, comp = abs, tol = 1e-12);
}

#[test]
fn projection_along_element_normal_recovers_offset_point() {
    let target = curved_tri6(0.1);
    let settings = projector_for(CellType::Tri6, CellType::Tri6).onto_slave;
    let xi = Point2::new(0.25, 0.4);
    let offset = 0.05;
    let point = target.position(&xi) + target.unit_normal(&xi).unwrap().into_inner() * offset;
    let projection = project_along_element_normal(&point, &target, &settings);
    assert!(projection.converged);
    assert!(projection.iterations <= 5);
    assert_matrix_eq!(projection.xi.coords, xi.coords, comp = abs, tol = 1e-10);
    assert_scalar_eq!(projection.alpha, offset, comp = abs, tol = 1e-10);
}

#[test]
fn projection_along_interpolated_normal_with_constant_normals_is_vertical() {
    let target = curved_tri6(0.0);
    let settings = projector_for(CellType::Tri6, CellType::Tri6).onto_slave;
    let normals = vec![Vector3::z(); 6];
    let point = Point3::new(0.2, 0.3, 0.4);
    let projection = project_along_interpolated_normal(&point, &target, &normals, &settings);
    assert!(projection.converged);
    let hit = target.position(&projection.xi);
    assert_scalar_eq!(hit.x, 0.2, comp = abs, tol = 1e-12);
    assert_scalar_eq!(hit.y, 0.3, comp = abs, tol = 1e-12);
}

#[test]
fn projection_fails_for_vanishing_direction() {
    let target = curved_tri6(0.0);
    let settings = projector_for(CellType::Tri3, CellType::Tri6).onto_master;
    // The Newton matrix is singular
    let point = Point3::new(0.3, 0.2, 0.5);
    let projection = project_along_direction(&point, &Vector3::zeros(), &target, None, &settings);
    assert!(!projection.converged);
}

#[test]
fn direction_projection_derivatives_match_finite_differences() {
    let target = curved_tri6(0.0);
    let settings = projector_for(CellType::Tri3, CellType::Tri6).onto_master;
    let point = Point3::new(0.3, 0.2, 0.5);
    let direction = Vector3::new(0.1, -0.05, -1.0).normalize();
    let projection = project_along_direction(&point, &direction, &target, None, &settings);
    assert!(projection.converged);
    let deriv = project_along_direction_deriv(
        &projection,
        &DerivVec3::default(),
        &direction,
        &DerivVec3::default(),
        &target,
    )
    .unwrap();

    for dof in target.dofs().collect::<Vec<_>>() {
        let project = |t: f64| project_along_direction(&point, &direction, &perturbed(&target, dof, t), None, &settings);
        for d in 0..2 {
            let fd = central_difference(|t| project(t).xi[d], 0.0, 1e-7);
            assert_derivative_eq(deriv.xi[d].get(dof), fd, 1e-6, &format!("xi[{}] dof {}", d, dof));
        }
        let fd = central_difference(|t| project(t).alpha, 0.0, 1e-7);
        assert_derivative_eq(deriv.alpha.get(dof), fd, 1e-6, &format!("alpha dof {}", dof));
    }
}

#[test]
fn element_normal_projection_derivatives_match_finite_differences() {
    let target = curved_tri6(0.1);
    let settings = projector_for(CellType::Tri6, CellType::Tri6).onto_slave;
    let point = Point3::new(0.35, 0.3, 0.2);
    let projection = project_along_element_normal(&point, &target, &settings);
    assert!(projection.converged);
    let deriv = project_along_element_normal_deriv(&projection, &DerivVec3::default(), &target, &settings).unwrap();

    for dof in target.dofs().collect::<Vec<_>>() {
        let project = |t: f64| project_along_element_normal(&point, &perturbed(&target, dof, t), &settings);
        for d in 0..2 {
            let fd = central_difference(|t| project(t).xi[d], 0.0, 1e-7);
            assert_derivative_eq(deriv.xi[d].get(dof), fd, 1e-6, &format!("xi[{}] dof {}", d, dof));
        }
        let fd = central_difference(|t| project(t).alpha, 0.0, 1e-7);
        assert_derivative_eq(deriv.alpha.get(dof), fd, 1e-6, &format!("alpha dof {}", dof));
    }
}
