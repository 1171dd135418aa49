use matrixcompare::assert_matrix_eq;
use mortar_sparse::{DirectSolver, IterativeSolver, LinearSolver, Map, SolverError, SparseMatrix, Vector};
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

fn laplacian_1d(n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            2.0
        } else if i.abs_diff(j) == 1 {
            -1.0
        } else {
            0.0
        }
    })
}

#[test]
fn direct_solver_solves_spd_system() {
    let n = 6;
    let map = Arc::new(Map::contiguous(0, n));
    let dense = laplacian_1d(n);
    let a = SparseMatrix::from_dense(map.clone(), map.clone(), &dense);
    let expected = DVector::from_fn(n, |i, _| (i as f64 + 1.0).sin());
    let b = Vector::from_values(map.clone(), &dense * &expected);
    let mut x = Vector::zeros(map);
    DirectSolver.solve(&a, &mut x, &b).unwrap();
    assert_matrix_eq!(x.values(), &expected, comp = abs, tol = 1e-12);
}

#[test]
fn direct_solver_detects_singular_matrix() {
    let map = Arc::new(Map::contiguous(0, 2));
    let a = SparseMatrix::from_dense(map.clone(), map.clone(), &DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]));
    let b = Vector::from_values(map.clone(), DVector::from_column_slice(&[1.0, 2.0]));
    let mut x = Vector::zeros(map);
    assert_eq!(DirectSolver.solve(&a, &mut x, &b), Err(SolverError::Singular));
}

#[test]
fn iterative_solver_matches_direct_solver() {
    let n = 20;
    let map = Arc::new(Map::contiguous(100, n));
    let dense = laplacian_1d(n) + DMatrix::identity(n, n);
    let a = SparseMatrix::from_dense(map.clone(), map.clone(), &dense);
    let b = Vector::from_fn(map.clone(), |gid| (gid as f64).cos());

    let mut x_direct = Vector::zeros(map.clone());
    DirectSolver.solve(&a, &mut x_direct, &b).unwrap();
    let mut x_cg = Vector::zeros(map);
    let info = IterativeSolver::default().solve(&a, &mut x_cg, &b).unwrap();
    assert!(info.num_iterations <= n);
    assert_matrix_eq!(x_cg.values(), x_direct.values(), comp = abs, tol = 1e-8);
}

#[test]
fn iterative_solver_reports_max_iterations() {
    let n = 30;
    let map = Arc::new(Map::contiguous(0, n));
    let a = SparseMatrix::from_dense(map.clone(), map.clone(), &laplacian_1d(n));
    let b = Vector::from_fn(map.clone(), |_| 1.0);
    let mut x = Vector::zeros(map);
    let mut solver = IterativeSolver {
        tolerance: 1e-14,
        max_iter: 2,
    };
    assert_eq!(
        solver.solve(&a, &mut x, &b),
        Err(SolverError::MaxIterationsReached { max_iter: 2 })
    );
}
