use crate::assembly::MortarOperators;
use crate::condensation::{
    check_dirichlet, linear_combination, product, product_transpose_a, CondensationError, CondensedSystem,
    DofPartition, RecoveryCache, INTERIOR, MASTER, SLAVE,
};
use crate::sliding::SlidingOperators;
use mortar_sparse::{Communicator, Map, SparseMatrix, Vector};
use std::sync::Arc;

/// Condensation of frictionless sliding.
///
/// The multipliers are eliminated through the slave rows `Dᵀλ = b_s - K_s Δx`. The slave rows of
/// the condensed system are then replaced by the constraint rows: the linearized weighted gap on
/// the first DOF of each slave node and the vanishing tangential multiplier on the other two.
#[derive(Debug, Clone)]
pub struct MeshslidingCondenser {
    partition: DofPartition,
    projector: SparseMatrix,
    d_inverse_transpose: SparseMatrix,
}

impl MeshslidingCondenser {
    pub fn new(operators: &MortarOperators, partition: DofPartition) -> Result<Self, CondensationError> {
        if operators.slave_dofs().as_ref() != partition.slave().as_ref()
            || operators.master_dofs().as_ref() != partition.master().as_ref()
        {
            return Err(CondensationError::InvalidPartition("partition does not match the mortar operators"));
        }
        Ok(Self {
            partition,
            projector: operators.projector()?,
            d_inverse_transpose: operators.d_inverse()?.transpose()?,
        })
    }

    pub fn partition(&self) -> &DofPartition {
        &self.partition
    }

    pub fn projector(&self) -> &SparseMatrix {
        &self.projector
    }

    /// Rejects Dirichlet rows on slave DOFs.
    pub fn begin_step(&self, dirichlet: &Map, comm: &dyn Communicator) -> Result<(), CondensationError> {
        check_dirichlet(dirichlet, &self.partition, comm).map(|_| ())
    }

    /// Condenses `K Δx = b` at the multiplier `lambda` of the previous iteration.
    ///
    /// `K` must not contain the mortar terms; their linearization `∂(Dᵀλ)/∂X` and `-∂(Mᵀλ)/∂X`
    /// is added here.
    pub fn condense(
        &self,
        k: &SparseMatrix,
        b: &Vector,
        operators: &MortarOperators,
        sliding: &SlidingOperators,
        lambda: &Vector,
    ) -> Result<(CondensedSystem, RecoveryCache), CondensationError> {
        let partition = &self.partition;
        let system = partition.system();
        let (n, m, s) = (partition.interior(), partition.master(), partition.slave());

        let d_lin = operators.d_lin(lambda)?;
        let m_lin = operators.m_lin(lambda)?;
        let col_map = match k.col_map() {
            Some(cols) => Arc::new(cols.union(system)),
            None => system.clone(),
        };
        let mut k_co = linear_combination(&[(1.0, k), (1.0, &d_lin), (-1.0, &m_lin)], k.row_map(), &col_map)?;
        k_co.fill_with_col_map(system.clone())?;

        let original = partition.split_matrix(&k_co)?;
        let [b_n, b_m, b_s] = partition.split_vector(b)?;
        let cache = RecoveryCache {
            d_inverse_transpose: self.d_inverse_transpose.clone(),
            rows: k_co.extract(s, system)?,
            rhs: b_s.clone(),
            scale: 1.0,
        };

        let p = &self.projector;
        let t_d_inverse = product(&sliding.t, &self.d_inverse_transpose)?;
        let mut blocks = original.clone();
        for (col, col_map) in [(INTERIOR, n), (MASTER, m), (SLAVE, s)] {
            let k_s = original.block(SLAVE, col);
            let pt_k_s = product_transpose_a(p, k_s)?;
            blocks.set_block(
                MASTER,
                col,
                linear_combination(&[(1.0, original.block(MASTER, col)), (1.0, &pt_k_s)], m, col_map)?,
            );

            let t_d_k = product(&t_d_inverse, k_s)?;
            let replaced = match col {
                INTERIOR => linear_combination(&[(-1.0, &t_d_k)], s, col_map)?,
                MASTER => linear_combination(&[(-1.0, &t_d_k), (1.0, &sliding.n_m)], s, col_map)?,
                _ => linear_combination(&[(-1.0, &t_d_k), (1.0, &sliding.n_s), (1.0, &sliding.h)], s, col_map)?,
            };
            blocks.set_block(SLAVE, col, replaced);
        }

        let mut b_m = b_m;
        p.transpose()?.matvec(&b_s)?.add_into(&mut b_m, 1.0);
        let mut b_constraint = t_d_inverse.matvec(&b_s)?;
        b_constraint.scale(-1.0);
        sliding.gap_rhs.add_into(&mut b_constraint, 1.0);

        let condensed = CondensedSystem::from_blocks(blocks, [b_n, b_m, b_constraint], system)?;
        Ok((condensed, cache))
    }

    /// The multipliers `λ = D⁻ᵀ (b_s - K_s Δx)` for the solved increment.
    pub fn recover(&self, cache: &RecoveryCache, dx: &Vector) -> Result<Vector, CondensationError> {
        Ok(cache.multiplier(dx)?)
    }
}
