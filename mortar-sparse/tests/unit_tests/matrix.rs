use mortar_sparse::{AlgebraError, Map, SparseMatrix, Vector};
use nalgebra::{dmatrix, DMatrix, DVector};
use std::sync::Arc;
use util::assert_approx_matrix_eq;

fn map(gids: Vec<usize>) -> Arc<Map> {
    Arc::new(Map::new(gids).unwrap())
}

fn sample_matrix() -> SparseMatrix {
    // Rows 10, 11 and columns 0, 1, 2
    let mut a = SparseMatrix::new(map(vec![10, 11]));
    a.add_value(10, 0, 1.0).unwrap();
    a.add_value(10, 2, 2.0).unwrap();
    a.add_value(11, 1, 3.0).unwrap();
    a.add_value(10, 0, 0.5).unwrap();
    a.fill().unwrap();
    a
}

#[test]
fn assembling_sums_duplicates_on_fill() {
    let a = sample_matrix();
    assert!(a.is_filled());
    assert_eq!(a.nnz(), 3);
    assert_eq!(a.get(10, 0), 1.5);
    assert_eq!(a.get(11, 1), 3.0);
    assert_eq!(a.get(11, 2), 0.0);
    assert_eq!(a.col_map().unwrap().gids(), &[0, 1, 2]);
}

#[test]
fn insertion_outside_row_map_fails() {
    let mut a = SparseMatrix::new(map(vec![0]));
    assert_eq!(a.add_value(1, 0, 1.0), Err(AlgebraError::RowNotOwned(1)));
    a.add_value(0, 0, 1.0).unwrap();
    a.fill().unwrap();
    assert_eq!(a.add_value(0, 0, 1.0), Err(AlgebraError::NotAssembling));
}

#[test]
fn unfill_then_fill_preserves_entries_including_zeros() {
    let mut a = SparseMatrix::new(map(vec![0, 1]));
    a.add_value(0, 0, 2.0).unwrap();
    a.add_value(1, 0, 0.0).unwrap();
    a.add_value(1, 1, -1.0).unwrap();
    a.fill().unwrap();
    let before = a.to_dense(a.row_map(), &Map::contiguous(0, 2));
    let nnz = a.nnz();

    a.unfill();
    assert!(!a.is_filled());
    a.add_value(1, 1, 4.0).unwrap();
    a.fill().unwrap();
    assert_eq!(a.nnz(), nnz);
    let after = a.to_dense(a.row_map(), &Map::contiguous(0, 2));
    assert_approx_matrix_eq!(&after - &before, dmatrix![0.0, 0.0; 0.0, 4.0], abstol = 1e-15);
}

#[test]
fn fill_with_col_map_rejects_foreign_columns() {
    let mut a = SparseMatrix::new(map(vec![0]));
    a.add_value(0, 5, 1.0).unwrap();
    assert_eq!(
        a.fill_with_col_map(map(vec![0, 1])),
        Err(AlgebraError::ColumnNotInMap(5))
    );
}

#[test]
fn matvec_matches_dense() {
    let a = sample_matrix();
    let x = Vector::from_values(map(vec![2, 1, 0]), DVector::from_column_slice(&[1.0, 2.0, 3.0]));
    let y = a.matvec(&x).unwrap();
    assert_eq!(y.values().as_slice(), &[1.5 * 3.0 + 2.0 * 1.0, 3.0 * 2.0]);
}

#[test]
fn matvec_requires_filled() {
    let a = SparseMatrix::new(map(vec![0]));
    let x = Vector::zeros(map(vec![0]));
    assert_eq!(a.matvec(&x), Err(AlgebraError::NotFilled));
}

#[test]
fn transpose_swaps_maps() {
    let a = sample_matrix();
    let at = a.transpose().unwrap();
    assert_eq!(at.row_map().gids(), &[0, 1, 2]);
    assert_eq!(at.col_map().unwrap().gids(), &[10, 11]);
    assert_eq!(at.get(2, 10), 2.0);
    assert_eq!(at.get(1, 11), 3.0);
}

#[test]
fn multiply_matches_gids_between_operands() {
    let rows = map(vec![0, 1]);
    let cols = map(vec![5, 6]);
    let a = SparseMatrix::from_dense(rows.clone(), cols.clone(), &dmatrix![1.0, 2.0; 3.0, 4.0]);
    // B is labeled with rows 6, 5 so that the product must permute by gid
    let b = SparseMatrix::from_dense(map(vec![6, 5]), rows.clone(), &dmatrix![1.0, 0.0; 0.0, 2.0]);

    let ab = SparseMatrix::multiply(&a, false, &b, false).unwrap();
    let dense = ab.to_dense(&rows, &rows);
    // B in (5, 6) ordering is [[0, 2], [1, 0]]
    assert_approx_matrix_eq!(dense.clone(), dmatrix![2.0, 2.0; 4.0, 6.0], abstol = 1e-14);

    let atb = SparseMatrix::multiply(&a, true, &a, false).unwrap();
    let a_dense = a.to_dense(&rows, &cols);
    assert_approx_matrix_eq!(
        atb.to_dense(&cols, &cols),
        a_dense.transpose() * &a_dense,
        abstol = 1e-14
    );
}

#[test]
fn row_sums_and_diagonal() {
    let m = map(vec![0, 1]);
    let a = SparseMatrix::from_dense(m.clone(), m.clone(), &dmatrix![2.0, 1.0; 0.0, 3.0]);
    assert_eq!(a.row_sums().unwrap().values().as_slice(), &[3.0, 3.0]);
    assert_eq!(a.diagonal().unwrap().values().as_slice(), &[2.0, 3.0]);
}

#[test]
fn replace_diagonal_requires_stored_entries() {
    let m = map(vec![0, 1]);
    let mut a = SparseMatrix::from_dense(m.clone(), m.clone(), &dmatrix![2.0, 1.0; 1.0, 0.0]);
    let d = Vector::from_values(m.clone(), DVector::from_column_slice(&[5.0, 0.0]));
    a.replace_diagonal(&d).unwrap();
    assert_eq!(a.get(0, 0), 5.0);

    let d = Vector::from_values(m.clone(), DVector::from_column_slice(&[5.0, 1.0]));
    assert_eq!(a.replace_diagonal(&d), Err(AlgebraError::MissingEntry { row: 1, col: 1 }));
}

#[test]
fn left_and_right_scaling() {
    let m = map(vec![0, 1]);
    let mut a = SparseMatrix::from_dense(m.clone(), m.clone(), &dmatrix![1.0, 2.0; 3.0, 4.0]);
    let d = Vector::from_values(m.clone(), DVector::from_column_slice(&[2.0, -1.0]));
    a.left_scale(&d).unwrap();
    assert_approx_matrix_eq!(a.to_dense(&m, &m), dmatrix![2.0, 4.0; -3.0, -4.0], abstol = 1e-15);
    a.right_scale(&d).unwrap();
    assert_approx_matrix_eq!(a.to_dense(&m, &m), dmatrix![4.0, -4.0; -6.0, 4.0], abstol = 1e-15);
}

#[test]
fn dirichlet_rows_become_identity() {
    let m = map(vec![0, 1, 2]);
    let dense = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 4.0, 1.0, 0.0, 1.0, 4.0]);
    let mut a = SparseMatrix::from_dense(m.clone(), m.clone(), &dense);
    a.apply_dirichlet(&Map::new(vec![1]).unwrap(), true).unwrap();
    let expected = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 4.0]);
    assert_approx_matrix_eq!(a.to_dense(&m, &m), expected.clone(), abstol = 1e-15);

    a.apply_dirichlet(&Map::new(vec![0]).unwrap(), false).unwrap();
    assert_eq!(a.row_sums().unwrap().values()[0], 0.0);
}

#[test]
fn dirichlet_with_trafo_copies_rows() {
    let m = map(vec![0, 1]);
    let mut a = SparseMatrix::from_dense(m.clone(), m.clone(), &dmatrix![4.0, 1.0; 1.0, 4.0]);
    let c = std::f64::consts::FRAC_1_SQRT_2;
    let trafo = SparseMatrix::from_dense(m.clone(), m.clone(), &dmatrix![c, c; -c, c]);
    a.apply_dirichlet_with_trafo(&trafo, &Map::new(vec![1]).unwrap()).unwrap();
    assert_approx_matrix_eq!(a.to_dense(&m, &m), dmatrix![4.0, 1.0; -c, c], abstol = 1e-15);
}

#[test]
fn extract_splits_by_maps() {
    let m = map(vec![0, 1, 2]);
    let dense = DMatrix::from_fn(3, 3, |i, j| (3 * i + j) as f64 + 1.0);
    let a = SparseMatrix::from_dense(m.clone(), m.clone(), &dense);
    let rows = map(vec![2, 0]);
    let cols = map(vec![1]);
    let block = a.extract(&rows, &cols).unwrap();
    assert_eq!(block.row_map().gids(), &[2, 0]);
    assert_approx_matrix_eq!(block.to_dense(&rows, &cols), dmatrix![8.0; 2.0], abstol = 1e-15);
}

#[test]
fn add_scaled_into_assembling_matrix() {
    let m = map(vec![0, 1]);
    let a = SparseMatrix::identity(m.clone());
    let mut b = SparseMatrix::new(m.clone());
    b.add_value(0, 1, 1.0).unwrap();
    b.add(&a, 3.0).unwrap();
    b.fill().unwrap();
    assert_approx_matrix_eq!(b.to_dense(&m, &m), dmatrix![3.0, 1.0; 0.0, 3.0], abstol = 1e-15);

    let mut filled = SparseMatrix::identity(m.clone());
    assert_eq!(filled.add(&a, 1.0), Err(AlgebraError::NotAssembling));
}
