use crate::common::{tied_patches, Grid, LM_OFFSET};
use matrixcompare::assert_scalar_eq;
use mortar::condensation::CondensationError;
use mortar::config::{MeshRelation, MortarParameters, ShapeFunction, Strategy};
use mortar::nln::{
    advance_with_step_cutting, LinearStructuralModel, LinearSystem, MortarStructuralSystem, NewtonResult,
    NewtonSettings, NewtonSolver, StepControl,
};
use mortar::strategy::MeshtyingStrategy;
use mortar_sparse::{DirectSolver, Map, SerialCommunicator, SparseMatrix, Vector};
use nalgebra::{Point3, Vector3};
use std::sync::Arc;

type TiedSystem = MortarStructuralSystem<LinearStructuralModel, DirectSolver, SerialCommunicator>;

type Field = fn(&Point3<f64>) -> Vector3<f64>;

fn uniform_shift(_: &Point3<f64>) -> Vector3<f64> {
    Vector3::new(0.1, 0.0, 0.0)
}

fn normal_lift(_: &Point3<f64>) -> Vector3<f64> {
    Vector3::new(0.0, 0.0, 0.05)
}

fn oblique_shift(_: &Point3<f64>) -> Vector3<f64> {
    Vector3::new(0.1, 0.05, 0.05)
}

fn linear_field(x: &Point3<f64>) -> Vector3<f64> {
    Vector3::new(0.1 * x.x, 0.02 - 0.05 * x.y, 0.03 * x.x + 0.01 * x.y)
}

/// Two unconnected patches with unit stiffness, tied at `z = 0`. The master patch has the
/// displacement `t field(X)` prescribed at every node, so the slave patch moves only through the tying.
fn tied_system(n_slave: usize, n_master: usize, params: MortarParameters, field: Field) -> (TiedSystem, Grid) {
    let (interface, slave, _) = tied_patches(n_slave, n_master);
    let master_dofs = Arc::new(interface.master_dofs());
    let dofs = Arc::new(interface.slave_dofs().union(&master_dofs));
    let prescribed = Vector::from_fn(master_dofs, |dof| {
        let node = interface.node(dof / 3).unwrap();
        field(&node.reference)[dof % 3]
    });
    let model = LinearStructuralModel::new(SparseMatrix::identity(dofs.clone()), Vector::zeros(dofs))
        .unwrap()
        .with_dirichlet(prescribed);
    let strategy = MeshtyingStrategy::new(params, interface).unwrap();
    let system = TiedSystem::new(model, strategy, DirectSolver, SerialCommunicator).unwrap();
    (system, slave)
}

fn newton(system: &TiedSystem) -> NewtonSolver {
    NewtonSolver::new(NewtonSettings::from_parameters(&system.strategy().params().nonlinear))
}

fn solve_step(system: &mut TiedSystem, x: &mut Vector, time: f64) -> NewtonResult {
    let solver = newton(system);
    system.begin_step(time, x).unwrap();
    solver.solve(system, x).unwrap()
}

fn assert_slave_follows(x: &Vector, slave: &Grid, field: Field, scale: f64, tol: f64) {
    for j in 0..=slave.n {
        for i in 0..=slave.n {
            let gid = slave.node(i, j);
            let expected = scale * field(&slave.position(i, j));
            for k in 0..3 {
                assert_scalar_eq!(x.get(3 * gid + k).unwrap(), expected[k], comp = abs, tol = tol);
            }
        }
    }
}

#[test]
fn condensed_tying_carries_a_master_translation() {
    let (mut system, slave) = tied_system(2, 2, MortarParameters::default(), uniform_shift);
    let mut x = Vector::zeros(system.map().clone());
    let result = solve_step(&mut system, &mut x, 1.0);
    assert_eq!(result.iterations, 1);
    assert_slave_follows(&x, &slave, uniform_shift, 1.0, 1e-12);

    // The slave patch is held by the interface force alone
    let strategy = system.strategy();
    let force = strategy.mortar_force().unwrap();
    for gid in slave.nodes() {
        assert_scalar_eq!(force.get(3 * gid).unwrap(), -0.1, comp = abs, tol = 1e-12);
    }
}

#[test]
fn condensed_tying_of_non_matching_meshes_reproduces_linear_fields() {
    for (n_slave, n_master) in [(2, 3), (3, 2)] {
        let (mut system, slave) = tied_system(n_slave, n_master, MortarParameters::default(), linear_field);
        let mut x = Vector::zeros(system.map().clone());
        let result = solve_step(&mut system, &mut x, 1.0);
        assert_eq!(result.iterations, 1);
        assert_slave_follows(&x, &slave, linear_field, 1.0, 1e-10);
    }
}

#[test]
fn saddle_point_and_condensed_tying_agree() {
    let saddle_point = MortarParameters {
        strategy: Strategy::SaddlePoint,
        ..MortarParameters::default()
    };
    let (mut condensed, slave) = tied_system(3, 2, MortarParameters::default(), linear_field);
    let (mut coupled, _) = tied_system(3, 2, saddle_point, linear_field);
    assert!(coupled.strategy().is_saddle_point());
    assert!(!coupled.strategy().is_condensed());

    let mut x_condensed = Vector::zeros(condensed.map().clone());
    let mut x_coupled = Vector::zeros(coupled.map().clone());
    solve_step(&mut condensed, &mut x_condensed, 1.0);
    let result = solve_step(&mut coupled, &mut x_coupled, 1.0);
    assert_eq!(result.iterations, 1);
    assert_slave_follows(&x_coupled, &slave, linear_field, 1.0, 1e-10);

    let lambda_condensed = condensed.strategy().lambda();
    let lambda_coupled = coupled.strategy().lambda();
    for (dof, value) in lambda_coupled.iter() {
        assert_scalar_eq!(value, lambda_condensed.get(dof).unwrap(), comp = abs, tol = 1e-9);
    }
}

#[test]
fn standard_multipliers_tie_with_the_saddle_point_system() {
    let params = MortarParameters {
        shape_function: ShapeFunction::Standard,
        strategy: Strategy::SaddlePoint,
        ..MortarParameters::default()
    };
    let (mut system, slave) = tied_system(2, 3, params, linear_field);
    let mut x = Vector::zeros(system.map().clone());
    let result = solve_step(&mut system, &mut x, 1.0);
    assert_eq!(result.iterations, 1);
    assert_slave_follows(&x, &slave, linear_field, 1.0, 1e-10);
}

#[test]
fn penalty_tying_approaches_the_constraint_with_growing_penalty() {
    let violation = |penalty_param: f64| {
        let params = MortarParameters {
            strategy: Strategy::Penalty,
            penalty_param,
            ..MortarParameters::default()
        };
        let (mut system, slave) = tied_system(2, 2, params, uniform_shift);
        let mut x = Vector::zeros(system.map().clone());
        solve_step(&mut system, &mut x, 1.0);
        slave
            .nodes()
            .map(|gid| (x.get(3 * gid).unwrap() - 0.1).abs())
            .fold(0.0, f64::max)
    };
    let soft = violation(1e3);
    let stiff = violation(1e6);
    assert!(stiff < 1e-3);
    assert!(stiff < soft);
}

#[test]
fn load_steps_accumulate_the_prescribed_motion() {
    let (mut system, slave) = tied_system(2, 3, MortarParameters::default(), linear_field);
    let solver = newton(&system);
    let mut x = Vector::zeros(system.map().clone());

    let half = solve_step(&mut system, &mut x, 0.5);
    assert_eq!(half.iterations, 1);
    assert_slave_follows(&x, &slave, linear_field, 0.5, 1e-10);

    let control = StepControl { dt: 0.25, max_cuts: 2 };
    let report = advance_with_step_cutting(&solver, &mut system, &mut x, 0.5, 1.0, control).unwrap();
    assert_eq!(report.cuts, 0);
    assert_eq!(report.times.len(), 2);
    assert_eq!(report.total_iterations, 2);
    assert_slave_follows(&x, &slave, linear_field, 1.0, 1e-10);
}

#[test]
fn condensation_rejects_dirichlet_conditions_on_slave_dofs() {
    let (interface, slave, _) = tied_patches(1, 1);
    let dofs = Arc::new(interface.slave_dofs().union(&interface.master_dofs()));
    let slave_dof = 3 * slave.node(0, 0);
    let prescribed = Vector::zeros(Arc::new(Map::new(vec![slave_dof]).unwrap()));
    let model = LinearStructuralModel::new(SparseMatrix::identity(dofs.clone()), Vector::zeros(dofs))
        .unwrap()
        .with_dirichlet(prescribed);
    let strategy = MeshtyingStrategy::new(MortarParameters::default(), interface).unwrap();
    let mut system = TiedSystem::new(model, strategy, DirectSolver, SerialCommunicator).unwrap();

    let mut x = Vector::zeros(system.map().clone());
    let err = system.begin_step(1.0, &mut x).unwrap_err();
    assert_eq!(
        err.downcast_ref::<CondensationError>(),
        Some(&CondensationError::SlaveDirichlet(slave_dof))
    );
}

#[test]
fn sliding_closes_the_normal_gap_without_tangential_multipliers() {
    let sliding = MortarParameters {
        mesh_relation: MeshRelation::Sliding,
        ..MortarParameters::default()
    };
    for field in [normal_lift as Field, oblique_shift] {
        let (mut system, slave) = tied_system(2, 3, sliding.clone(), field);
        let mut x = Vector::zeros(system.map().clone());
        let result = solve_step(&mut system, &mut x, 1.0);
        assert_eq!(result.iterations, 1);

        // The slave follows the master along the normal and is free to stay put tangentially
        assert_slave_follows(&x, &slave, normal_lift, 1.0, 1e-12);

        let strategy = system.strategy();
        let operators = strategy.operators().unwrap();
        let lambda = strategy.lambda();
        let mut normal_traction = 0.0;
        for gid in slave.nodes() {
            assert_scalar_eq!(operators.gap(gid), 0.0, comp = abs, tol = 1e-12);
            let lm = |k: usize| lambda.get(LM_OFFSET + 3 * gid + k).unwrap();
            assert_scalar_eq!(lm(0), 0.0, comp = abs, tol = 1e-10);
            assert_scalar_eq!(lm(1), 0.0, comp = abs, tol = 1e-10);
            normal_traction += lm(2).abs();
        }
        assert!(normal_traction > 0.0);
    }
}
