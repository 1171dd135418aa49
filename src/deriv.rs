//! Sparse derivative maps.
//!
//! Every geometric quantity in the coupling pipeline carries its exact sensitivity with respect
//! to the nodal coordinates of the slave and master elements involved. A sensitivity is stored as a
//! [`DerivMap`], a sparse map from the global id of a coordinate degree of freedom to the partial
//! derivative with respect to that coordinate. Vector-valued quantities use one map per spatial
//! component ([`DerivVec3`]).
use mortar_sparse::Gid;
use nalgebra::{Matrix3, Vector3};

/// Sparse map from DOF id to partial derivative, kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivMap {
    entries: Vec<(Gid, f64)>,
}

/// Derivatives of the three components of a vector.
pub type DerivVec3 = [DerivMap; 3];

impl DerivMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Accumulates `value` into the entry for `key`.
    pub fn add(&mut self, key: Gid, value: f64) {
        match self.entries.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(idx) => self.entries[idx].1 += value,
            Err(idx) => self.entries.insert(idx, (key, value)),
        }
    }

    /// The derivative with respect to `key`, zero if absent.
    pub fn get(&self, key: Gid) -> f64 {
        self.entries
            .binary_search_by_key(&key, |&(k, _)| k)
            .map(|idx| self.entries[idx].1)
            .unwrap_or(0.0)
    }

    /// Entries in increasing key order.
    pub fn iter(&self) -> impl Iterator<Item = (Gid, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = Gid> + '_ {
        self.entries.iter().map(|&(k, _)| k)
    }

    /// Computes `self += s * other`.
    pub fn add_scaled(&mut self, other: &DerivMap, s: f64) {
        if s == 0.0 {
            return;
        }
        if self.entries.is_empty() {
            self.entries = other.entries.iter().map(|&(k, v)| (k, s * v)).collect();
            return;
        }
        // Merge of two sorted sequences
        let mut merged = Vec::with_capacity(self.entries.len() + other.entries.len());
        let (mut i, mut j) = (0, 0);
        while i < self.entries.len() && j < other.entries.len() {
            let (ka, va) = self.entries[i];
            let (kb, vb) = other.entries[j];
            if ka < kb {
                merged.push((ka, va));
                i += 1;
            } else if kb < ka {
                merged.push((kb, s * vb));
                j += 1;
            } else {
                merged.push((ka, va + s * vb));
                i += 1;
                j += 1;
            }
        }
        merged.extend_from_slice(&self.entries[i..]);
        merged.extend(other.entries[j..].iter().map(|&(k, v)| (k, s * v)));
        self.entries = merged;
    }

    pub fn scale(&mut self, s: f64) {
        self.entries.iter_mut().for_each(|(_, v)| *v *= s);
    }

    pub fn scaled(&self, s: f64) -> DerivMap {
        let mut result = self.clone();
        result.scale(s);
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest absolute derivative.
    pub fn max_abs(&self) -> f64 {
        self.entries.iter().fold(0.0_f64, |max, &(_, v)| max.max(v.abs()))
    }
}

impl FromIterator<(Gid, f64)> for DerivMap {
    fn from_iter<I: IntoIterator<Item = (Gid, f64)>>(iter: I) -> Self {
        let mut map = DerivMap::new();
        for (k, v) in iter {
            map.add(k, v);
        }
        map
    }
}

/// `Σ c_k dv_k` for scalar derivative maps.
pub fn combine(terms: &[(f64, &DerivMap)]) -> DerivMap {
    let mut result = DerivMap::with_capacity(terms.iter().map(|(_, d)| d.len()).max().unwrap_or(0));
    for &(c, d) in terms {
        result.add_scaled(d, c);
    }
    result
}

/// `Σ c_k dv_k` for vector derivative maps.
pub fn combine_vec3(terms: &[(f64, &DerivVec3)]) -> DerivVec3 {
    let mut result = DerivVec3::default();
    for &(c, dv) in terms {
        add_scaled_vec3(&mut result, dv, c);
    }
    result
}

pub fn add_scaled_vec3(target: &mut DerivVec3, source: &DerivVec3, s: f64) {
    for (t, d) in target.iter_mut().zip(source) {
        t.add_scaled(d, s);
    }
}

pub fn scale_vec3(dv: &mut DerivVec3, s: f64) {
    dv.iter_mut().for_each(|d| d.scale(s));
}

/// Derivative of `a · b` where only `b` varies.
pub fn dot_const(a: &Vector3<f64>, db: &DerivVec3) -> DerivMap {
    combine(&[(a.x, &db[0]), (a.y, &db[1]), (a.z, &db[2])])
}

/// Derivative of `a · b`.
pub fn dot_deriv(a: &Vector3<f64>, da: &DerivVec3, b: &Vector3<f64>, db: &DerivVec3) -> DerivMap {
    let mut result = dot_const(a, db);
    result.add_scaled(&dot_const(b, da), 1.0);
    result
}

/// Derivative of `a × b`.
pub fn cross_deriv(a: &Vector3<f64>, da: &DerivVec3, b: &Vector3<f64>, db: &DerivVec3) -> DerivVec3 {
    // (a × b)_i = a_j b_k - a_k b_j for cyclic (i, j, k)
    let component = |i: usize| {
        let (j, k) = ((i + 1) % 3, (i + 2) % 3);
        combine(&[(b[k], &da[j]), (a[j], &db[k]), (-b[j], &da[k]), (-a[k], &db[j])])
    };
    [component(0), component(1), component(2)]
}

/// Derivative of `v / |v|`, given the derivative of `v`.
pub fn normalize_deriv(v: &Vector3<f64>, dv: &DerivVec3) -> DerivVec3 {
    let length = v.norm();
    let n = v / length;
    let projector = (Matrix3::identity() - n * n.transpose()) / length;
    mat_mul(&projector, dv)
}

/// Derivative of `|v|`, given the derivative of `v`.
pub fn norm_deriv(v: &Vector3<f64>, dv: &DerivVec3) -> DerivMap {
    dot_const(&(v / v.norm()), dv)
}

/// Derivative of `m v` for a constant matrix `m`.
pub fn mat_mul(m: &Matrix3<f64>, dv: &DerivVec3) -> DerivVec3 {
    let row = |i: usize| combine(&[(m[(i, 0)], &dv[0]), (m[(i, 1)], &dv[1]), (m[(i, 2)], &dv[2])]);
    [row(0), row(1), row(2)]
}

/// Derivative of `s v` for a constant vector `v` and a varying scalar `s`.
pub fn outer(v: &Vector3<f64>, ds: &DerivMap) -> DerivVec3 {
    [ds.scaled(v.x), ds.scaled(v.y), ds.scaled(v.z)]
}
