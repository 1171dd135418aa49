//! Global mortar operators assembled from per-node coupling contributions.
use crate::coupling::CouplingContributions;
use crate::interface::{MortarInterface, Side};
use mortar_sparse::{AlgebraError, Gid, Map, SparseMatrix, Vector};
use rustc_hash::FxHashMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AssemblyError {
    /// A diagonal entry of `D` vanishes, e.g. because the slave node is not coupled to any master.
    SingularD { dof: Gid },
    /// `D` is not diagonal and its dense factorization failed.
    SingularDenseD,
    /// A coupled node is not part of the interface.
    UnknownNode(Gid),
    /// A slave node has no nodal frame. Call `MortarInterface::evaluate_nodal_normals` first.
    MissingFrame(Gid),
    Algebra(AlgebraError),
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingularD { dof } => write!(f, "D has a vanishing diagonal entry for slave DOF {}", dof),
            Self::SingularDenseD => write!(f, "D is singular"),
            Self::UnknownNode(gid) => write!(f, "node {} is not part of the interface", gid),
            Self::MissingFrame(gid) => write!(f, "slave node {} has no nodal frame", gid),
            Self::Algebra(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AssemblyError {}

impl From<AlgebraError> for AssemblyError {
    fn from(err: AlgebraError) -> Self {
        Self::Algebra(err)
    }
}

/// `D` (multiplier rows × slave columns) and `M` (multiplier rows × master columns), together with
/// the weighted gaps and the coupling derivatives they were assembled from.
///
/// Every node-level entry `D_ij` expands to `D_ij I₃` over the three spatial components.
#[derive(Debug, Clone)]
pub struct MortarOperators {
    slave_dofs: Arc<Map>,
    master_dofs: Arc<Map>,
    lm_dofs: Arc<Map>,
    lm_dof_offset: Gid,
    node_dofs: FxHashMap<Gid, [Gid; 3]>,
    d: SparseMatrix,
    m: SparseMatrix,
    contributions: CouplingContributions,
}

impl MortarOperators {
    pub fn assemble(interface: &MortarInterface, contributions: CouplingContributions) -> Result<Self, AssemblyError> {
        let slave_dofs = Arc::new(interface.slave_dofs());
        let master_dofs = Arc::new(interface.master_dofs());
        let lm_dofs = Arc::new(interface.slave_lm_dofs());
        let node_dofs: FxHashMap<Gid, [Gid; 3]> = interface.nodes().iter().map(|node| (node.gid, node.dofs)).collect();
        let dofs_of = |gid: Gid| node_dofs.get(&gid).copied().ok_or(AssemblyError::UnknownNode(gid));

        let mut d = SparseMatrix::new(lm_dofs.clone());
        let mut m = SparseMatrix::new(lm_dofs.clone());
        for (gid, node) in contributions.iter() {
            let lm = dofs_of(gid)?.map(|dof| dof + interface.lm_dof_offset());
            for (&j, &value) in &node.d {
                let cols = dofs_of(j)?;
                for k in 0..3 {
                    d.add_value(lm[k], cols[k], value)?;
                }
            }
            for (&j, &value) in &node.m {
                let cols = dofs_of(j)?;
                for k in 0..3 {
                    m.add_value(lm[k], cols[k], value)?;
                }
            }
        }
        d.fill_with_col_map(slave_dofs.clone())?;
        m.fill_with_col_map(master_dofs.clone())?;

        Ok(Self {
            slave_dofs,
            master_dofs,
            lm_dofs,
            lm_dof_offset: interface.lm_dof_offset(),
            node_dofs,
            d,
            m,
            contributions,
        })
    }

    pub fn slave_dofs(&self) -> &Arc<Map> {
        &self.slave_dofs
    }

    pub fn master_dofs(&self) -> &Arc<Map> {
        &self.master_dofs
    }

    pub fn lm_dofs(&self) -> &Arc<Map> {
        &self.lm_dofs
    }

    pub fn d(&self) -> &SparseMatrix {
        &self.d
    }

    pub fn m(&self) -> &SparseMatrix {
        &self.m
    }

    pub fn contributions(&self) -> &CouplingContributions {
        &self.contributions
    }

    /// Weighted gap of a slave node, zero if the node is not coupled.
    pub fn gap(&self, node: Gid) -> f64 {
        self.contributions.node(node).map_or(0.0, |n| n.gap)
    }

    /// The slave DOF paired with a multiplier DOF.
    pub fn slave_dof_of(&self, lm_dof: Gid) -> Gid {
        lm_dof - self.lm_dof_offset
    }

    fn dofs_of(&self, node: Gid) -> Result<[Gid; 3], AssemblyError> {
        self.node_dofs.get(&node).copied().ok_or(AssemblyError::UnknownNode(node))
    }

    pub fn is_diagonal(&self) -> bool {
        self.d
            .triplets()
            .iter()
            .all(|&(row, col, value)| value == 0.0 || col == self.slave_dof_of(row))
    }

    /// The constraint matrix `B = [D, -M]` with multiplier rows.
    pub fn constraint_matrix(&self) -> Result<SparseMatrix, AssemblyError> {
        let mut b = SparseMatrix::with_capacity(self.lm_dofs.clone(), self.d.nnz() + self.m.nnz());
        b.add(&self.d, 1.0)?;
        b.add(&self.m, -1.0)?;
        b.fill_with_col_map(Arc::new(self.slave_dofs.union(&self.master_dofs)))?;
        Ok(b)
    }

    /// `D⁻¹` with slave rows and multiplier columns.
    pub fn d_inverse(&self) -> Result<SparseMatrix, AssemblyError> {
        if self.is_diagonal() {
            let mut inverse = SparseMatrix::with_capacity(self.slave_dofs.clone(), self.lm_dofs.num_local_elements());
            for lm in self.lm_dofs.iter() {
                let dof = self.slave_dof_of(lm);
                let value = self.d.get(lm, dof);
                if value == 0.0 {
                    return Err(AssemblyError::SingularD { dof });
                }
                inverse.add_value(dof, lm, 1.0 / value)?;
            }
            inverse.fill_with_col_map(self.lm_dofs.clone())?;
            Ok(inverse)
        } else {
            let dense = self.d.to_dense(&self.lm_dofs, &self.slave_dofs);
            let inverse = dense.try_inverse().ok_or(AssemblyError::SingularDenseD)?;
            Ok(SparseMatrix::from_dense(
                self.slave_dofs.clone(),
                self.lm_dofs.clone(),
                &inverse,
            ))
        }
    }

    /// The mortar projector `P = D⁻¹ M` with slave rows and master columns.
    pub fn projector(&self) -> Result<SparseMatrix, AssemblyError> {
        let d_inverse = self.d_inverse()?;
        let mut p = SparseMatrix::multiply(&d_inverse, false, &self.m, false)?;
        p.fill_with_col_map(self.master_dofs.clone())?;
        Ok(p)
    }

    /// `∂(Σ_i λ_i D_ij)/∂X` or `∂(Σ_i λ_i M_ij)/∂X`, with rows on the DOFs of `j`.
    fn linearization(&self, lambda: &Vector, side: Side) -> Result<SparseMatrix, AssemblyError> {
        let rows = match side {
            Side::Slave => self.slave_dofs.clone(),
            Side::Master => self.master_dofs.clone(),
        };
        let mut lin = SparseMatrix::new(rows);
        for (gid, node) in self.contributions.iter() {
            let lm = self.dofs_of(gid)?.map(|dof| dof + self.lm_dof_offset);
            let values = lm.map(|dof| lambda.get(dof).unwrap_or(0.0));
            if values.iter().all(|&v| v == 0.0) {
                continue;
            }
            let derivs = match side {
                Side::Slave => &node.d_derivs,
                Side::Master => &node.m_derivs,
            };
            for (&j, deriv) in derivs {
                let row_dofs = self.dofs_of(j)?;
                for (coordinate, value) in deriv.iter() {
                    for k in 0..3 {
                        if values[k] != 0.0 {
                            lin.add_value(row_dofs[k], coordinate, values[k] * value)?;
                        }
                    }
                }
            }
        }
        lin.fill()?;
        Ok(lin)
    }

    /// `∂(Dᵀλ)/∂X` with slave rows and coordinate DOF columns.
    pub fn d_lin(&self, lambda: &Vector) -> Result<SparseMatrix, AssemblyError> {
        self.linearization(lambda, Side::Slave)
    }

    /// `∂(Mᵀλ)/∂X` with master rows and coordinate DOF columns.
    pub fn m_lin(&self, lambda: &Vector) -> Result<SparseMatrix, AssemblyError> {
        self.linearization(lambda, Side::Master)
    }
}
