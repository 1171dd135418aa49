use crate::{AlgebraError, Gid, Map};
use nalgebra::DVector;
use std::sync::Arc;

/// A vector of doubles keyed by a [`Map`].
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    map: Arc<Map>,
    values: DVector<f64>,
}

impl Vector {
    pub fn zeros(map: Arc<Map>) -> Self {
        let n = map.num_local_elements();
        Self {
            map,
            values: DVector::zeros(n),
        }
    }

    /// # Panics
    ///
    /// Panics if the number of values does not match the map.
    pub fn from_values(map: Arc<Map>, values: DVector<f64>) -> Self {
        assert_eq!(
            map.num_local_elements(),
            values.len(),
            "number of values must match the number of map elements"
        );
        Self { map, values }
    }

    pub fn from_fn(map: Arc<Map>, f: impl Fn(Gid) -> f64) -> Self {
        let values = DVector::from_iterator(map.num_local_elements(), map.iter().map(f));
        Self { map, values }
    }

    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut DVector<f64> {
        &mut self.values
    }

    pub fn get(&self, gid: Gid) -> Option<f64> {
        self.map.lid(gid).map(|lid| self.values[lid])
    }

    pub fn set(&mut self, gid: Gid, value: f64) -> Result<(), AlgebraError> {
        let lid = self.map.lid(gid).ok_or(AlgebraError::RowNotOwned(gid))?;
        self.values[lid] = value;
        Ok(())
    }

    pub fn add_to(&mut self, gid: Gid, value: f64) -> Result<(), AlgebraError> {
        let lid = self.map.lid(gid).ok_or(AlgebraError::RowNotOwned(gid))?;
        self.values[lid] += value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Gid, f64)> + '_ {
        self.map.iter().zip(self.values.iter().copied())
    }

    /// Computes `self = a * x + b * self`.
    ///
    /// # Panics
    ///
    /// Panics if `x` is keyed by a different map.
    pub fn update(&mut self, a: f64, x: &Vector, b: f64) {
        assert_eq!(self.map.as_ref(), x.map.as_ref(), "vector update requires identical maps");
        self.values *= b;
        self.values.axpy(a, &x.values, 1.0);
    }

    pub fn scale(&mut self, s: f64) {
        self.values *= s;
    }

    pub fn fill(&mut self, value: f64) {
        self.values.fill(value);
    }

    /// # Panics
    ///
    /// Panics if `other` is keyed by a different map.
    pub fn dot(&self, other: &Vector) -> f64 {
        assert_eq!(self.map.as_ref(), other.map.as_ref(), "dot product requires identical maps");
        self.values.dot(&other.values)
    }

    pub fn norm1(&self) -> f64 {
        self.values.lp_norm(1)
    }

    pub fn norm2(&self) -> f64 {
        self.values.norm()
    }

    pub fn norm_inf(&self) -> f64 {
        self.values.iter().fold(0.0_f64, |max, v| max.max(v.abs()))
    }

    /// Extracts the sub-vector on `sub_map`, which must be a subset of this vector's map.
    pub fn extract(&self, sub_map: &Arc<Map>) -> Result<Vector, AlgebraError> {
        let values = sub_map
            .iter()
            .map(|gid| self.get(gid).ok_or(AlgebraError::NotASubset))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Vector::from_values(sub_map.clone(), DVector::from_vec(values)))
    }

    /// Writes every entry of `self` whose id is present in `target` into `target`.
    pub fn export_into(&self, target: &mut Vector) {
        for (gid, value) in self.iter() {
            if let Some(lid) = target.map.lid(gid) {
                target.values[lid] = value;
            }
        }
    }

    /// Adds `scale * self` to the entries of `target` with matching ids.
    pub fn add_into(&self, target: &mut Vector, scale: f64) {
        for (gid, value) in self.iter() {
            if let Some(lid) = target.map.lid(gid) {
                target.values[lid] += scale * value;
            }
        }
    }

    /// Gathers several vectors into a single vector on `map`.
    ///
    /// Entries of `map` that are covered by none of the parts are zero.
    pub fn from_parts(map: Arc<Map>, parts: &[&Vector]) -> Vector {
        let mut result = Vector::zeros(map);
        for part in parts {
            part.export_into(&mut result);
        }
        result
    }
}
