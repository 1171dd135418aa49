use matrixcompare::assert_scalar_eq;
use mortar_sparse::{AlgebraError, Map, Vector};
use nalgebra::DVector;
use std::sync::Arc;

fn vector(gids: Vec<usize>, values: &[f64]) -> Vector {
    Vector::from_values(Arc::new(Map::new(gids).unwrap()), DVector::from_column_slice(values))
}

#[test]
fn vector_norms() {
    let v = vector(vec![0, 1, 2], &[3.0, -4.0, 0.0]);
    assert_scalar_eq!(v.norm1(), 7.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(v.norm2(), 5.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(v.norm_inf(), 4.0, comp = abs, tol = 1e-15);
}

#[test]
fn vector_update_and_dot() {
    let mut y = vector(vec![0, 1], &[1.0, 2.0]);
    let x = vector(vec![0, 1], &[3.0, 5.0]);
    y.update(2.0, &x, -1.0);
    assert_eq!(y.values().as_slice(), &[5.0, 8.0]);
    assert_scalar_eq!(y.dot(&x), 55.0, comp = abs, tol = 1e-14);
}

#[test]
fn vector_update_with_different_maps_panics() {
    let mut y = vector(vec![0, 1], &[1.0, 2.0]);
    let x = vector(vec![1, 2], &[3.0, 5.0]);
    util::assert_panics!(y.update(1.0, &x, 1.0));
}

#[test]
fn vector_extract_and_export() {
    let v = vector(vec![0, 1, 2, 3], &[1.0, 2.0, 3.0, 4.0]);
    let sub = Arc::new(Map::new(vec![3, 1]).unwrap());
    let extracted = v.extract(&sub).unwrap();
    assert_eq!(extracted.values().as_slice(), &[4.0, 2.0]);

    let not_subset = Arc::new(Map::new(vec![1, 7]).unwrap());
    assert_eq!(v.extract(&not_subset), Err(AlgebraError::NotASubset));

    let mut target = vector(vec![1, 3, 5], &[0.0, 0.0, 9.0]);
    extracted.export_into(&mut target);
    assert_eq!(target.values().as_slice(), &[2.0, 4.0, 9.0]);
    extracted.add_into(&mut target, 0.5);
    assert_eq!(target.values().as_slice(), &[3.0, 6.0, 9.0]);
}

#[test]
fn vector_from_parts_gathers_on_union() {
    let a = vector(vec![0, 1], &[1.0, 2.0]);
    let b = vector(vec![4], &[5.0]);
    let full = Arc::new(Map::contiguous(0, 5));
    let gathered = Vector::from_parts(full, &[&a, &b]);
    assert_eq!(gathered.values().as_slice(), &[1.0, 2.0, 0.0, 0.0, 5.0]);
}

#[test]
fn vector_set_outside_map_fails() {
    let mut v = vector(vec![0, 1], &[1.0, 2.0]);
    assert_eq!(v.set(4, 1.0), Err(AlgebraError::RowNotOwned(4)));
    v.add_to(1, 3.0).unwrap();
    assert_eq!(v.get(1), Some(5.0));
}
