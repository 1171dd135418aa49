use crate::common::tied_patches;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use mortar::assembly::MortarOperators;
use mortar::condensation::{
    check_dirichlet, CondensationError, DofPartition, MeshtyingCondenser, NoPenetrationCondenser,
    TimeIntegrationScheme,
};
use mortar::config::MortarParameters;
use mortar::coupling::couple_interface;
use mortar_sparse::{DirectSolver, LinearSolver, Map, SerialCommunicator, SparseMatrix, Vector};
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

struct Tying {
    ops: MortarOperators,
    partition: DofPartition,
    k: SparseMatrix,
    b: Vector,
}

/// A 1 × 1 slave patch tied to a 2 × 2 master patch, with six additional interior DOFs and a
/// diagonally dominant symmetric system matrix.
fn tying() -> Tying {
    let (mut interface, _, _) = tied_patches(1, 2);
    interface.evaluate_nodal_normals().unwrap();
    let coupling = couple_interface(&mut interface, &MortarParameters::default()).unwrap();
    let ops = MortarOperators::assemble(&interface, coupling.contributions).unwrap();

    let interior = Map::contiguous(9000, 6);
    let system = Arc::new(Map::union_all([&interface.slave_dofs(), &interface.master_dofs(), &interior]));
    let n = system.num_local_elements();
    let dense = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            10.0 + 0.1 * i as f64
        } else {
            1.0 / (1.0 + (i as f64 - j as f64).abs())
        }
    });
    let k = SparseMatrix::from_dense(system.clone(), system.clone(), &dense);
    let b = Vector::from_fn(system.clone(), |dof| (dof % 7) as f64 - 3.0);
    let partition = DofPartition::from_interface(system, &interface).unwrap();
    Tying {
        ops,
        partition,
        k,
        b,
    }
}

#[test]
fn time_integration_factors() {
    assert_eq!(TimeIntegrationScheme::Static.recovery_factor(), Ok(1.0));
    let gen_alpha = TimeIntegrationScheme::GenAlpha { alpha_f: 0.5 };
    assert_scalar_eq!(gen_alpha.recovery_factor().unwrap(), 2.0, comp = abs, tol = 1e-15);
    let theta = TimeIntegrationScheme::OneStepTheta { theta: 0.5 };
    assert_eq!(theta.alpha(), 0.5);
    let explicit = TimeIntegrationScheme::OneStepTheta { theta: 0.0 };
    assert_eq!(explicit.recovery_factor(), Err(CondensationError::SingularTimeFactor));
}

#[test]
fn partition_rejects_foreign_and_overlapping_dofs() {
    let system = Arc::new(Map::contiguous(0, 10));
    let partition = DofPartition::new(system.clone(), Map::contiguous(3, 3), Map::contiguous(6, 3)).unwrap();
    assert_eq!(partition.interior().gids(), &[0, 1, 2, 9]);

    assert!(matches!(
        DofPartition::new(system.clone(), Map::contiguous(8, 3), Map::empty()),
        Err(CondensationError::InvalidPartition(_))
    ));
    assert!(matches!(
        DofPartition::new(system, Map::contiguous(2, 3), Map::contiguous(4, 3)),
        Err(CondensationError::InvalidPartition(_))
    ));
}

#[test]
fn dirichlet_rows_on_slave_dofs_are_rejected() {
    let Tying { ops, partition, .. } = tying();
    let comm = SerialCommunicator;
    let slave_dof = partition.slave().gid(4);
    let master_dof = partition.master().gid(0);
    let interior_dof = partition.interior().gid(0);

    let dirichlet = Map::new(vec![slave_dof, master_dof]).unwrap();
    assert_eq!(
        check_dirichlet(&dirichlet, &partition, &comm),
        Err(CondensationError::SlaveDirichlet(slave_dof))
    );
    assert_eq!(check_dirichlet(&Map::new(vec![master_dof]).unwrap(), &partition, &comm), Ok(true));
    assert_eq!(check_dirichlet(&Map::new(vec![interior_dof]).unwrap(), &partition, &comm), Ok(false));

    let mut condenser = MeshtyingCondenser::new(&ops, partition).unwrap();
    assert_eq!(
        condenser.begin_step(&dirichlet, &comm),
        Err(CondensationError::SlaveDirichlet(slave_dof))
    );
}

#[test]
fn condenser_rejects_mismatching_partition() {
    let Tying { ops, partition, .. } = tying();
    let swapped = DofPartition::new(
        partition.system().clone(),
        partition.slave().as_ref().clone(),
        partition.master().as_ref().clone(),
    )
    .unwrap();
    assert!(matches!(
        MeshtyingCondenser::new(&ops, swapped),
        Err(CondensationError::InvalidPartition(_))
    ));
}

#[test]
fn meshtying_condensation_matches_dense_transformation() {
    let Tying { ops, partition, k, b, .. } = tying();
    let (n, m, s) = (
        partition.interior().clone(),
        partition.master().clone(),
        partition.slave().clone(),
    );
    let mut condenser = MeshtyingCondenser::new(&ops, partition).unwrap();
    let (condensed, _) = condenser.condense(&k, &b, None).unwrap();

    let p = condenser.projector().to_dense(&s, &m);
    let block = |rows: &Map, cols: &Map| k.to_dense(rows, cols);
    let result = |rows: &Map, cols: &Map| condensed.matrix.to_dense(rows, cols);

    let expected_nm = block(&n, &m) + block(&n, &s) * &p;
    let expected_mn = block(&m, &n) + p.transpose() * block(&s, &n);
    let expected_mm = block(&m, &m)
        + block(&m, &s) * &p
        + p.transpose() * block(&s, &m)
        + p.transpose() * block(&s, &s) * &p;
    assert_matrix_eq!(result(&n, &n), block(&n, &n), comp = abs, tol = 1e-12);
    assert_matrix_eq!(result(&n, &m), expected_nm, comp = abs, tol = 1e-12);
    assert_matrix_eq!(result(&m, &n), expected_mn, comp = abs, tol = 1e-12);
    assert_matrix_eq!(result(&m, &m), expected_mm, comp = abs, tol = 1e-12);

    let num_slave = s.num_local_elements();
    assert_matrix_eq!(result(&s, &s), DMatrix::<f64>::identity(num_slave, num_slave), comp = exact);
    assert_eq!(result(&s, &m).amax(), 0.0);
    assert_eq!(result(&n, &s).amax(), 0.0);

    let rhs = |map: &Arc<Map>| condensed.rhs.extract(map).unwrap().values().clone();
    let b_part = |map: &Arc<Map>| b.extract(map).unwrap().values().clone();
    assert_matrix_eq!(rhs(&n), b_part(&n), comp = exact);
    assert_matrix_eq!(rhs(&m), b_part(&m) + p.transpose() * b_part(&s), comp = abs, tol = 1e-12);
    assert_eq!(rhs(&s).amax(), 0.0);
}

#[test]
fn recovered_increment_solves_the_saddle_point_system() {
    let Tying { ops, partition, k, b, .. } = tying();
    let system = partition.system().clone();
    let (m, s) = (partition.master().clone(), partition.slave().clone());
    let mut condenser = MeshtyingCondenser::new(&ops, partition).unwrap();
    let (condensed, cache) = condenser.condense(&k, &b, None).unwrap();

    let mut dx = Vector::zeros(system.clone());
    DirectSolver
        .solve(&condensed.matrix, &mut dx, &condensed.rhs)
        .unwrap();
    let state = Vector::zeros(system.clone());
    let lambda = condenser.recover(&cache, &mut dx, &state).unwrap();
    assert_eq!(lambda.map().as_ref(), ops.lm_dofs().as_ref());

    // The slave increment follows the master increment
    let p = condenser.projector();
    let p_dx_m = p.matvec(&dx.extract(&m).unwrap()).unwrap();
    assert_matrix_eq!(
        dx.extract(&s).unwrap().values().clone(),
        p_dx_m.values().clone(),
        comp = abs,
        tol = 1e-12
    );

    // K Δx + Bᵀ λ = b with B = [D, -M]
    let b_matrix = ops.constraint_matrix().unwrap().to_dense(ops.lm_dofs(), &system);
    let residual: DVector<f64> =
        k.to_dense(&system, &system) * dx.values() + b_matrix.transpose() * lambda.values() - b.values();
    assert!(residual.amax() < 1e-10, "residual {}", residual.amax());
}

#[test]
fn tied_increment_accounts_for_the_current_state() {
    let Tying { ops, partition, k, b, .. } = tying();
    let system = partition.system().clone();
    let (m, s) = (partition.master().clone(), partition.slave().clone());
    let mut condenser = MeshtyingCondenser::new(&ops, partition).unwrap();
    let (condensed, cache) = condenser.condense(&k, &b, None).unwrap();
    let mut dx = Vector::zeros(system.clone());
    DirectSolver
        .solve(&condensed.matrix, &mut dx, &condensed.rhs)
        .unwrap();

    // A state violating the tying is corrected by the slave increment
    let state = Vector::from_fn(system.clone(), |dof| if s.contains(dof) { 0.2 } else { 0.01 * dof as f64 });
    condenser.recover(&cache, &mut dx, &state).unwrap();
    let mut u = state.clone();
    u.update(1.0, &dx, 1.0);
    let p_u_m = condenser.projector().matvec(&u.extract(&m).unwrap()).unwrap();
    assert_matrix_eq!(
        u.extract(&s).unwrap().values().clone(),
        p_u_m.values().clone(),
        comp = abs,
        tol = 1e-12
    );
}

#[test]
fn master_dirichlet_correction_applies_once_per_step() {
    let Tying { ops, partition, k, b, .. } = tying();
    let comm = SerialCommunicator;
    let system = partition.system().clone();
    let (n, m, s) = (
        partition.interior().clone(),
        partition.master().clone(),
        partition.slave().clone(),
    );
    let prescribed = m.gid(1);
    let increment = Vector::from_fn(system, |dof| if dof == prescribed { 0.05 } else { 0.0 });

    let mut condenser = MeshtyingCondenser::new(&ops, partition).unwrap();
    assert!(!condenser.master_dirichlet_active());
    condenser
        .begin_step(&Map::new(vec![prescribed]).unwrap(), &comm)
        .unwrap();
    assert!(condenser.master_dirichlet_active());

    let (corrected, _) = condenser.condense(&k, &b, Some(&increment)).unwrap();
    assert!(!condenser.master_dirichlet_active());
    let (plain, _) = condenser.condense(&k, &b, Some(&increment)).unwrap();

    let p = condenser.projector().to_dense(&s, &m);
    let du_m = increment.extract(&m).unwrap().values().clone();
    let p_du = &p * &du_m;
    let difference = |map: &Arc<Map>| {
        corrected.rhs.extract(map).unwrap().values() - plain.rhs.extract(map).unwrap().values()
    };
    assert_matrix_eq!(difference(&n), -(k.to_dense(&n, &s) * &p_du), comp = abs, tol = 1e-12);
    assert_matrix_eq!(
        difference(&m),
        -(p.transpose() * k.to_dense(&s, &s) * &p_du),
        comp = abs,
        tol = 1e-12
    );
    assert_eq!(difference(&s).amax(), 0.0);
}

/// Rows `Γ = {0, 1}`, fluid master rows `{2, 3, 4}` and structure columns `{10, 11, 12}`.
fn no_penetration_setup(scheme: TimeIntegrationScheme) -> (NoPenetrationCondenser, SparseMatrix, DMatrix<f64>) {
    let gamma = Arc::new(Map::contiguous(0, 2));
    let master = Arc::new(Map::contiguous(2, 3));
    let rows = Arc::new(Map::contiguous(0, 5));
    let cols = Arc::new(Map::contiguous(10, 3));
    let lm = Arc::new(Map::contiguous(100, 2));

    let p = DMatrix::from_row_slice(2, 3, &[0.5, 0.5, 0.0, 0.0, 0.25, 0.75]);
    let d_inverse_transpose = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 2.0]);
    let coupling = DMatrix::from_fn(5, 3, |i, j| (1 + i + 2 * j) as f64);
    let condenser = NoPenetrationCondenser::new(
        SparseMatrix::from_dense(gamma.clone(), master, &p),
        SparseMatrix::from_dense(lm, gamma, &d_inverse_transpose),
        scheme,
    )
    .unwrap();
    (condenser, SparseMatrix::from_dense(rows, cols, &coupling), coupling)
}

#[test]
fn no_penetration_rows_are_moved_to_master_rows_and_zeroed() {
    let (condenser, coupling, dense) = no_penetration_setup(TimeIntegrationScheme::Static);
    let (condensed, _) = condenser.condense(&coupling).unwrap();
    let rows = Map::contiguous(0, 5);
    let cols = Map::contiguous(10, 3);
    let result = condensed.to_dense(&rows, &cols);

    let p = DMatrix::from_row_slice(2, 3, &[0.5, 0.5, 0.0, 0.0, 0.25, 0.75]);
    let moved = p.transpose() * dense.rows(0, 2);
    assert_eq!(result.rows(0, 2).amax(), 0.0);
    assert_matrix_eq!(
        result.rows(2, 3).clone_owned(),
        dense.rows(2, 3) + moved,
        comp = abs,
        tol = 1e-14
    );
}

#[test]
fn no_penetration_multipliers_scale_with_time_integration() {
    let (condenser, coupling, dense) = no_penetration_setup(TimeIntegrationScheme::GenAlpha { alpha_f: 0.5 });
    let (_, cache) = condenser.condense(&coupling).unwrap();
    let dx = Vector::from_values(Arc::new(Map::contiguous(10, 3)), DVector::from_vec(vec![1.0, -1.0, 0.5]));
    let mut lambda = Vector::from_fn(Arc::new(Map::contiguous(100, 2)), |_| 1.0);
    condenser.recover(&cache, &dx, &mut lambda).unwrap();

    // λ = λ₀ - 1/(1-a) D⁻ᵀ C_Γ Δx
    let c_dx = dense.rows(0, 2) * dx.values();
    let d_inverse_transpose = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 2.0]);
    let expected = DVector::from_element(2, 1.0) - 2.0 * d_inverse_transpose * c_dx;
    assert_matrix_eq!(lambda.values().clone(), expected, comp = abs, tol = 1e-12);
}

#[test]
fn no_penetration_requires_matching_rows() {
    let p = SparseMatrix::from_dense(
        Arc::new(Map::contiguous(0, 2)),
        Arc::new(Map::contiguous(2, 1)),
        &DMatrix::from_element(2, 1, 1.0),
    );
    let d_inverse_transpose = SparseMatrix::from_dense(
        Arc::new(Map::contiguous(100, 2)),
        Arc::new(Map::contiguous(5, 2)),
        &DMatrix::identity(2, 2),
    );
    assert!(matches!(
        NoPenetrationCondenser::new(p.clone(), d_inverse_transpose, TimeIntegrationScheme::Static),
        Err(CondensationError::InvalidPartition(_))
    ));
    let identity = SparseMatrix::from_dense(
        Arc::new(Map::contiguous(100, 2)),
        Arc::new(Map::contiguous(0, 2)),
        &DMatrix::identity(2, 2),
    );
    assert_eq!(
        NoPenetrationCondenser::new(p, identity, TimeIntegrationScheme::OneStepTheta { theta: 0.0 }).err(),
        Some(CondensationError::SingularTimeFactor)
    );
}
