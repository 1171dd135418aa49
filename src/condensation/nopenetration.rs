use crate::condensation::{linear_combination, product_transpose_a, CondensationError, RecoveryCache, TimeIntegrationScheme};
use mortar_sparse::{Map, SparseMatrix, Vector};
use std::sync::Arc;

/// Row condensation of the fluid-structure coupling block for the no-penetration condition of
/// poroelastic mesh tying.
///
/// The rows `Γ` of the coupling block `C = K_fs` on which the condition is imposed are moved to
/// the fluid master rows through `Pᵀ` and then zeroed. `P` has the rows `Γ` and fluid master
/// columns, and `D⁻ᵀ` maps the rows `Γ` to the multiplier DOFs of the condition.
#[derive(Debug, Clone)]
pub struct NoPenetrationCondenser {
    rows: Arc<Map>,
    projector: SparseMatrix,
    d_inverse_transpose: SparseMatrix,
    scheme: TimeIntegrationScheme,
}

impl NoPenetrationCondenser {
    pub fn new(
        projector: SparseMatrix,
        d_inverse_transpose: SparseMatrix,
        scheme: TimeIntegrationScheme,
    ) -> Result<Self, CondensationError> {
        let rows = projector.row_map().clone();
        let d_cols = d_inverse_transpose
            .col_map()
            .ok_or(CondensationError::InvalidPartition("D⁻ᵀ must be filled"))?;
        if !d_cols.is_subset_of(&rows) {
            return Err(CondensationError::InvalidPartition("D⁻ᵀ must act on the no-penetration rows"));
        }
        scheme.recovery_factor()?;
        Ok(Self {
            rows,
            projector,
            d_inverse_transpose,
            scheme,
        })
    }

    /// The rows `Γ` carrying the condition.
    pub fn rows(&self) -> &Arc<Map> {
        &self.rows
    }

    pub fn scheme(&self) -> TimeIntegrationScheme {
        self.scheme
    }

    /// Returns the condensed coupling block. The rows of `coupling` must contain `Γ` and the fluid
    /// master rows.
    pub fn condense(&self, coupling: &SparseMatrix) -> Result<(SparseMatrix, RecoveryCache), CondensationError> {
        let cols = coupling
            .col_map()
            .cloned()
            .ok_or(CondensationError::InvalidPartition("coupling block must be filled"))?;
        let constrained = coupling.extract(&self.rows, &cols)?;
        let moved = product_transpose_a(&self.projector, &constrained)?;

        let mut condensed = linear_combination(&[(1.0, coupling), (1.0, &moved)], coupling.row_map(), &cols)?;
        condensed.apply_dirichlet(&self.rows, false)?;

        let cache = RecoveryCache {
            d_inverse_transpose: self.d_inverse_transpose.clone(),
            rows: constrained,
            rhs: Vector::zeros(self.rows.clone()),
            scale: self.scheme.recovery_factor()?,
        };
        Ok((condensed, cache))
    }

    /// Adds `-1/(1-a) D⁻ᵀ C_Γ Δx` to the multipliers.
    pub fn recover(&self, cache: &RecoveryCache, dx: &Vector, lambda: &mut Vector) -> Result<(), CondensationError> {
        cache.multiplier(dx)?.add_into(lambda, 1.0);
        Ok(())
    }
}
