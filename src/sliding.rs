//! Constraint operators of frictionless mesh sliding.
//!
//! Every slave node contributes three constraint rows placed on its own DOFs: the first DOF row
//! holds the linearized weighted gap, the other two require the tangential components of the
//! multiplier to vanish.
use crate::assembly::{AssemblyError, MortarOperators};
use crate::interface::{MortarInterface, Side};
use mortar_sparse::{Map, SparseMatrix, Vector};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SlidingOperators {
    /// Tangent rows `t₁ᵀ`, `t₂ᵀ` acting on the multipliers.
    pub t: SparseMatrix,
    /// Gap linearization with respect to slave coordinates.
    pub n_s: SparseMatrix,
    /// Gap linearization with respect to master coordinates.
    pub n_m: SparseMatrix,
    /// `∂(t_k · λ)/∂X` at the multiplier the operators were built with.
    pub h: SparseMatrix,
    /// `-g` on the gap rows, zero elsewhere.
    pub gap_rhs: Vector,
}

impl SlidingOperators {
    /// Builds the sliding operators from the nodal frames of the interface, which must be current.
    pub fn assemble(
        interface: &MortarInterface,
        operators: &MortarOperators,
        lambda: &Vector,
    ) -> Result<Self, AssemblyError> {
        let slave_dofs = operators.slave_dofs().clone();
        let master_dofs = operators.master_dofs().clone();
        let lm_dofs = operators.lm_dofs().clone();

        let mut t = SparseMatrix::new(slave_dofs.clone());
        let mut n = SparseMatrix::new(slave_dofs.clone());
        let mut h = SparseMatrix::new(slave_dofs.clone());
        let mut gap_rhs = Vector::zeros(slave_dofs.clone());

        for node in interface.nodes_on(Side::Slave) {
            let frame = node.frame.as_ref().ok_or(AssemblyError::MissingFrame(node.gid))?;
            let rows = node.dofs;
            let lm = interface.lm_dofs(node);
            let lambda_i = lm.map(|dof| lambda.get(dof).unwrap_or(0.0));

            gap_rhs.set(rows[0], -operators.gap(node.gid))?;
            if let Some(coupling) = operators.contributions().node(node.gid) {
                for (coordinate, value) in coupling.gap_deriv.iter() {
                    n.add_value(rows[0], coordinate, value)?;
                }
            }

            for (k, (tangent, tangent_deriv)) in frame.tangents.iter().zip(&frame.tangent_derivs).enumerate() {
                let row = rows[k + 1];
                for d in 0..3 {
                    t.add_value(row, lm[d], tangent[d])?;
                    if lambda_i[d] != 0.0 {
                        for (coordinate, value) in tangent_deriv[d].iter() {
                            h.add_value(row, coordinate, lambda_i[d] * value)?;
                        }
                    }
                }
            }
        }

        t.fill_with_col_map(lm_dofs)?;
        let all_dofs = Arc::new(slave_dofs.union(&master_dofs));
        n.fill_with_col_map(all_dofs.clone())?;
        h.fill_with_col_map(all_dofs)?;
        let n_s = n.extract(&slave_dofs, &slave_dofs)?;
        let n_m = n.extract(&slave_dofs, &master_dofs)?;
        let h = h.extract(&slave_dofs, &slave_dofs)?;

        Ok(Self {
            t,
            n_s,
            n_m,
            h,
            gap_rhs,
        })
    }

    pub fn slave_dofs(&self) -> &Arc<Map> {
        self.t.row_map()
    }
}
