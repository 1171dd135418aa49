use crate::{AlgebraError, Gid, Map, Vector};
use itertools::Itertools;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix, SparseEntryMut};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Storage {
    /// Unsummed (row lid, column gid, value) triplets.
    Assembling { triplets: Vec<(usize, Gid, f64)> },
    /// Compressed rows, with column indices local to `col_map`.
    Filled { col_map: Arc<Map>, csr: CsrMatrix<f64> },
}

/// A sparse matrix whose rows are keyed by a row map.
///
/// The matrix is either *assembling*, in which case entries are inserted by global ids and
/// duplicates accumulate, or *filled*, in which case the sparsity pattern is frozen into CSR storage
/// with a compacted column map. [`fill`](Self::fill) and [`unfill`](Self::unfill) move between the
/// two states. Explicitly stored zeros survive both transitions.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    row_map: Arc<Map>,
    storage: Storage,
}

fn csr_from_triplets(
    nrows: usize,
    ncols: usize,
    triplets: impl IntoIterator<Item = (usize, usize, f64)>,
) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(nrows, ncols);
    for (i, j, v) in triplets {
        coo.push(i, j, v);
    }
    CsrMatrix::from(&coo)
}

impl SparseMatrix {
    /// An empty matrix in the assembling state.
    pub fn new(row_map: Arc<Map>) -> Self {
        Self::with_capacity(row_map, 0)
    }

    pub fn with_capacity(row_map: Arc<Map>, capacity: usize) -> Self {
        Self {
            row_map,
            storage: Storage::Assembling {
                triplets: Vec::with_capacity(capacity),
            },
        }
    }

    /// A filled matrix without entries.
    pub fn zeros(row_map: Arc<Map>, col_map: Arc<Map>) -> Self {
        let csr = CsrMatrix::zeros(row_map.num_local_elements(), col_map.num_local_elements());
        Self {
            row_map,
            storage: Storage::Filled { col_map, csr },
        }
    }

    pub fn identity(map: Arc<Map>) -> Self {
        let csr = CsrMatrix::identity(map.num_local_elements());
        Self {
            row_map: map.clone(),
            storage: Storage::Filled { col_map: map, csr },
        }
    }

    /// A filled diagonal matrix whose diagonal is given by `diagonal`.
    pub fn from_diagonal(diagonal: &Vector) -> Self {
        let map = diagonal.map().clone();
        let n = map.num_local_elements();
        let csr = csr_from_triplets(n, n, diagonal.values().iter().enumerate().map(|(i, &v)| (i, i, v)));
        Self {
            row_map: map.clone(),
            storage: Storage::Filled { col_map: map, csr },
        }
    }

    /// A filled matrix holding the non-zero entries of a dense matrix with the given row and column labels.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions of `dense` do not match the maps.
    pub fn from_dense(row_map: Arc<Map>, col_map: Arc<Map>, dense: &DMatrix<f64>) -> Self {
        assert_eq!(dense.nrows(), row_map.num_local_elements());
        assert_eq!(dense.ncols(), col_map.num_local_elements());
        let triplets = (0..dense.nrows())
            .cartesian_product(0..dense.ncols())
            .filter(|&(i, j)| dense[(i, j)] != 0.0)
            .map(|(i, j)| (i, j, dense[(i, j)]));
        let csr = csr_from_triplets(dense.nrows(), dense.ncols(), triplets);
        Self {
            row_map,
            storage: Storage::Filled { col_map, csr },
        }
    }

    pub fn row_map(&self) -> &Arc<Map> {
        &self.row_map
    }

    /// The column map, available once the matrix is filled.
    pub fn col_map(&self) -> Option<&Arc<Map>> {
        match &self.storage {
            Storage::Filled { col_map, .. } => Some(col_map),
            Storage::Assembling { .. } => None,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self.storage, Storage::Filled { .. })
    }

    /// Number of stored entries (unsummed while assembling).
    pub fn nnz(&self) -> usize {
        match &self.storage {
            Storage::Assembling { triplets } => triplets.len(),
            Storage::Filled { csr, .. } => csr.nnz(),
        }
    }

    pub fn add_value(&mut self, row: Gid, col: Gid, value: f64) -> Result<(), AlgebraError> {
        let lid = self.row_map.lid(row).ok_or(AlgebraError::RowNotOwned(row))?;
        match &mut self.storage {
            Storage::Assembling { triplets } => {
                triplets.push((lid, col, value));
                Ok(())
            }
            Storage::Filled { .. } => Err(AlgebraError::NotAssembling),
        }
    }

    /// Adds the dense block `values` at the given global rows and columns.
    pub fn add_values(&mut self, rows: &[Gid], cols: &[Gid], values: &DMatrix<f64>) -> Result<(), AlgebraError> {
        assert_eq!(values.shape(), (rows.len(), cols.len()), "block dimensions must match the ids");
        for (i, &row) in rows.iter().enumerate() {
            for (j, &col) in cols.iter().enumerate() {
                self.add_value(row, col, values[(i, j)])?;
            }
        }
        Ok(())
    }

    /// Adds `scale * other` to this matrix, which must be assembling.
    ///
    /// Every row of `other` holding entries must be owned by this matrix.
    pub fn add(&mut self, other: &SparseMatrix, scale: f64) -> Result<(), AlgebraError> {
        if self.is_filled() {
            return Err(AlgebraError::NotAssembling);
        }
        for (row, col, value) in other.triplets() {
            self.add_value(row, col, scale * value)?;
        }
        Ok(())
    }

    /// Freezes the sparsity pattern. The column map consists of all columns that received entries.
    pub fn fill(&mut self) -> Result<(), AlgebraError> {
        if let Storage::Assembling { triplets } = &self.storage {
            let col_map = Arc::new(Map::from_unsorted(triplets.iter().map(|&(_, col, _)| col)));
            self.fill_with_col_map(col_map)
        } else {
            Ok(())
        }
    }

    /// Freezes the sparsity pattern against a prescribed column map.
    ///
    /// A filled matrix is re-keyed to the new column map, which must contain all stored columns.
    pub fn fill_with_col_map(&mut self, col_map: Arc<Map>) -> Result<(), AlgebraError> {
        let nrows = self.row_map.num_local_elements();
        let triplets = match &self.storage {
            Storage::Assembling { triplets } => triplets
                .iter()
                .map(|&(i, col, v)| {
                    let j = col_map.lid(col).ok_or(AlgebraError::ColumnNotInMap(col))?;
                    Ok((i, j, v))
                })
                .collect::<Result<Vec<_>, AlgebraError>>()?,
            Storage::Filled { col_map: old, csr } => {
                if old == &col_map {
                    return Ok(());
                }
                csr.triplet_iter()
                    .map(|(i, j, &v)| {
                        let col = old.gid(j);
                        let j = col_map.lid(col).ok_or(AlgebraError::ColumnNotInMap(col))?;
                        Ok((i, j, v))
                    })
                    .collect::<Result<Vec<_>, AlgebraError>>()?
            }
        };
        let csr = csr_from_triplets(nrows, col_map.num_local_elements(), triplets);
        self.storage = Storage::Filled { col_map, csr };
        Ok(())
    }

    /// Returns to the assembling state, keeping all current entries.
    pub fn unfill(&mut self) {
        if let Storage::Filled { col_map, csr } = &self.storage {
            let triplets = csr
                .triplet_iter()
                .map(|(i, j, &v)| (i, col_map.gid(j), v))
                .collect();
            self.storage = Storage::Assembling { triplets };
        }
    }

    /// All stored entries as `(row gid, col gid, value)`. Duplicates are not summed while assembling.
    pub fn triplets(&self) -> Vec<(Gid, Gid, f64)> {
        match &self.storage {
            Storage::Assembling { triplets } => triplets
                .iter()
                .map(|&(i, col, v)| (self.row_map.gid(i), col, v))
                .collect(),
            Storage::Filled { col_map, csr } => csr
                .triplet_iter()
                .map(|(i, j, &v)| (self.row_map.gid(i), col_map.gid(j), v))
                .collect(),
        }
    }

    /// The (summed) value at the given position, zero if nothing is stored there.
    pub fn get(&self, row: Gid, col: Gid) -> f64 {
        let Some(i) = self.row_map.lid(row) else {
            return 0.0;
        };
        match &self.storage {
            Storage::Assembling { triplets } => triplets
                .iter()
                .filter(|&&(r, c, _)| r == i && c == col)
                .map(|&(_, _, v)| v)
                .sum(),
            Storage::Filled { col_map, csr } => col_map
                .lid(col)
                .and_then(|j| csr.get_entry(i, j))
                .map(|entry| entry.into_value())
                .unwrap_or(0.0),
        }
    }

    pub fn scale(&mut self, s: f64) {
        match &mut self.storage {
            Storage::Assembling { triplets } => triplets.iter_mut().for_each(|t| t.2 *= s),
            Storage::Filled { csr, .. } => csr.values_mut().iter_mut().for_each(|v| *v *= s),
        }
    }

    fn filled(&self) -> Result<(&Arc<Map>, &CsrMatrix<f64>), AlgebraError> {
        match &self.storage {
            Storage::Filled { col_map, csr } => Ok((col_map, csr)),
            Storage::Assembling { .. } => Err(AlgebraError::NotFilled),
        }
    }

    fn filled_mut(&mut self) -> Result<(&Arc<Map>, &mut CsrMatrix<f64>), AlgebraError> {
        match &mut self.storage {
            Storage::Filled { col_map, csr } => Ok((col_map, csr)),
            Storage::Assembling { .. } => Err(AlgebraError::NotFilled),
        }
    }

    /// The underlying CSR storage of a filled matrix.
    pub fn csr(&self) -> Result<&CsrMatrix<f64>, AlgebraError> {
        self.filled().map(|(_, csr)| csr)
    }

    /// Computes `A x`. The vector must hold an entry for every column of the matrix.
    pub fn matvec(&self, x: &Vector) -> Result<Vector, AlgebraError> {
        let (col_map, csr) = self.filled()?;
        let x_lids = col_map
            .iter()
            .map(|gid| x.map().lid(gid).ok_or(AlgebraError::ColumnNotInMap(gid)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut y = Vector::zeros(self.row_map.clone());
        for (i, row) in csr.row_iter().enumerate() {
            y.values_mut()[i] = row
                .col_indices()
                .iter()
                .zip(row.values())
                .map(|(&j, &v)| v * x.values()[x_lids[j]])
                .sum();
        }
        Ok(y)
    }

    pub fn transpose(&self) -> Result<SparseMatrix, AlgebraError> {
        let (col_map, csr) = self.filled()?;
        Ok(SparseMatrix {
            row_map: col_map.clone(),
            storage: Storage::Filled {
                col_map: self.row_map.clone(),
                csr: csr.transpose(),
            },
        })
    }

    /// Computes `op(A) op(B)`, where `op` optionally transposes its argument.
    ///
    /// Columns of `op(A)` are matched with rows of `op(B)` by global id. The product is filled,
    /// with the row map of `op(A)` and the column map of `op(B)`.
    pub fn multiply(
        a: &SparseMatrix,
        transpose_a: bool,
        b: &SparseMatrix,
        transpose_b: bool,
    ) -> Result<SparseMatrix, AlgebraError> {
        let a = if transpose_a { a.transpose()? } else { a.clone() };
        let b = if transpose_b { b.transpose()? } else { b.clone() };
        let (a_cols, a_csr) = a.filled()?;
        let (b_cols, b_csr) = b.filled()?;
        let reindexed = a_csr
            .triplet_iter()
            .filter_map(|(i, j, &v)| b.row_map.lid(a_cols.gid(j)).map(|k| (i, k, v)));
        let a_csr = csr_from_triplets(
            a.row_map.num_local_elements(),
            b.row_map.num_local_elements(),
            reindexed,
        );
        let product = &a_csr * b_csr;
        Ok(SparseMatrix {
            row_map: a.row_map.clone(),
            storage: Storage::Filled {
                col_map: b_cols.clone(),
                csr: product,
            },
        })
    }

    pub fn row_sums(&self) -> Result<Vector, AlgebraError> {
        let (_, csr) = self.filled()?;
        let mut sums = Vector::zeros(self.row_map.clone());
        for (i, row) in csr.row_iter().enumerate() {
            sums.values_mut()[i] = row.values().iter().sum();
        }
        Ok(sums)
    }

    pub fn diagonal(&self) -> Result<Vector, AlgebraError> {
        let diagonal = Vector::from_fn(self.row_map.clone(), |gid| self.get(gid, gid));
        self.filled()?;
        Ok(diagonal)
    }

    /// Overwrites the diagonal. Non-zero values require the diagonal entry to be stored.
    pub fn replace_diagonal(&mut self, diagonal: &Vector) -> Result<(), AlgebraError> {
        let row_map = self.row_map.clone();
        let (col_map, csr) = self.filled_mut()?;
        let col_map = col_map.clone();
        for (i, gid) in row_map.iter().enumerate() {
            let value = diagonal
                .get(gid)
                .ok_or(AlgebraError::MapMismatch("diagonal must cover the row map"))?;
            let entry = col_map.lid(gid).and_then(|j| csr.get_entry_mut(i, j));
            match entry {
                Some(SparseEntryMut::NonZero(stored)) => *stored = value,
                _ if value == 0.0 => {}
                _ => return Err(AlgebraError::MissingEntry { row: gid, col: gid }),
            }
        }
        Ok(())
    }

    /// Computes `diag(d) A`. The vector must cover the row map.
    pub fn left_scale(&mut self, d: &Vector) -> Result<(), AlgebraError> {
        let factors = self
            .row_map
            .iter()
            .map(|gid| d.get(gid).ok_or(AlgebraError::MapMismatch("left scaling must cover the row map")))
            .collect::<Result<Vec<_>, _>>()?;
        let (_, csr) = self.filled_mut()?;
        for (i, mut row) in csr.row_iter_mut().enumerate() {
            row.values_mut().iter_mut().for_each(|v| *v *= factors[i]);
        }
        Ok(())
    }

    /// Computes `A diag(d)`. The vector must cover the column map.
    pub fn right_scale(&mut self, d: &Vector) -> Result<(), AlgebraError> {
        let (col_map, csr) = self.filled_mut()?;
        let factors = col_map
            .iter()
            .map(|gid| d.get(gid).ok_or(AlgebraError::MapMismatch("right scaling must cover the column map")))
            .collect::<Result<Vec<_>, _>>()?;
        for mut row in csr.row_iter_mut() {
            let (cols, values) = row.cols_and_values_mut();
            for (&j, v) in cols.iter().zip(values) {
                *v *= factors[j];
            }
        }
        Ok(())
    }

    /// Zeros every row in `rows` (that is owned by this matrix), optionally writing one on the diagonal.
    pub fn apply_dirichlet(&mut self, rows: &Map, diagonal_one: bool) -> Result<(), AlgebraError> {
        let (col_map, csr) = self.filled()?;
        let is_dirichlet = |i: usize| rows.contains(self.row_map.gid(i));
        let mut triplets = csr
            .triplet_iter()
            .filter(|&(i, _, _)| !is_dirichlet(i))
            .map(|(i, j, &v)| (i, col_map.gid(j), v))
            .collect_vec();
        if diagonal_one {
            for (i, gid) in self.row_map.iter().enumerate() {
                if rows.contains(gid) {
                    triplets.push((i, gid, 1.0));
                }
            }
        }
        self.rebuild(triplets)
    }

    /// Replaces every row in `rows` by the corresponding row of `trafo`.
    ///
    /// Used for Dirichlet conditions in rotated nodal frames.
    pub fn apply_dirichlet_with_trafo(&mut self, trafo: &SparseMatrix, rows: &Map) -> Result<(), AlgebraError> {
        let (col_map, csr) = self.filled()?;
        trafo.filled()?;
        let mut triplets = csr
            .triplet_iter()
            .filter(|&(i, _, _)| !rows.contains(self.row_map.gid(i)))
            .map(|(i, j, &v)| (i, col_map.gid(j), v))
            .collect_vec();
        for (row, col, value) in trafo.triplets() {
            if rows.contains(row) {
                if let Some(i) = self.row_map.lid(row) {
                    triplets.push((i, col, value));
                }
            }
        }
        self.rebuild(triplets)
    }

    /// Rebuilds filled storage from (row lid, col gid, value) triplets, extending the column map only if needed.
    fn rebuild(&mut self, triplets: Vec<(usize, Gid, f64)>) -> Result<(), AlgebraError> {
        let (col_map, _) = self.filled()?;
        let col_map = if triplets.iter().all(|&(_, col, _)| col_map.contains(col)) {
            col_map.clone()
        } else {
            let extra = Map::from_unsorted(triplets.iter().map(|&(_, col, _)| col));
            Arc::new(col_map.union(&extra))
        };
        self.storage = Storage::Assembling { triplets };
        self.fill_with_col_map(col_map)
    }

    /// The filled sub-matrix of entries whose row lies in `row_map` and whose column lies in `col_map`.
    pub fn extract(&self, row_map: &Arc<Map>, col_map: &Arc<Map>) -> Result<SparseMatrix, AlgebraError> {
        let (own_cols, csr) = self.filled()?;
        let triplets = csr.triplet_iter().filter_map(|(i, j, &v)| {
            let r = row_map.lid(self.row_map.gid(i))?;
            let c = col_map.lid(own_cols.gid(j))?;
            Some((r, c, v))
        });
        let csr = csr_from_triplets(row_map.num_local_elements(), col_map.num_local_elements(), triplets);
        Ok(SparseMatrix {
            row_map: row_map.clone(),
            storage: Storage::Filled {
                col_map: col_map.clone(),
                csr,
            },
        })
    }

    /// Dense copy with rows and columns labeled by the given maps. Entries outside the maps are dropped.
    pub fn to_dense(&self, row_map: &Map, col_map: &Map) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(row_map.num_local_elements(), col_map.num_local_elements());
        for (row, col, value) in self.triplets() {
            if let (Some(i), Some(j)) = (row_map.lid(row), col_map.lid(col)) {
                dense[(i, j)] += value;
            }
        }
        dense
    }

    /// Largest absolute stored value.
    pub fn max_abs(&self) -> f64 {
        self.triplets()
            .iter()
            .fold(0.0_f64, |max, &(_, _, v)| max.max(v.abs()))
    }
}
