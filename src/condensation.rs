//! Static condensation of mortar-constrained linear systems.
//!
//! The condensers act on the linearized system `K Δx = b` with `b = -F`. The system is split
//! into interior (`n`), master (`m`) and slave (`s`) DOFs; the slave DOFs and the Lagrange
//! multipliers are eliminated and recovered after the solve.
use crate::assembly::AssemblyError;
use crate::interface::MortarInterface;
use mortar_sparse::{AlgebraError, BlockMatrix, Communicator, Gid, Map, SparseMatrix, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

mod meshsliding;
mod meshtying;
mod nopenetration;

pub use meshsliding::*;
pub use meshtying::*;
pub use nopenetration::*;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CondensationError {
    /// A Dirichlet condition is imposed on a slave DOF, which is eliminated by the condensation.
    SlaveDirichlet(Gid),
    /// The DOF sets of the partition are not contained in the system map or overlap.
    InvalidPartition(&'static str),
    /// The time integration factor `1 - a` vanishes.
    SingularTimeFactor,
    Assembly(AssemblyError),
    Algebra(AlgebraError),
}

impl Display for CondensationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlaveDirichlet(dof) => write!(f, "Dirichlet condition on slave DOF {} is not supported", dof),
            Self::InvalidPartition(reason) => write!(f, "invalid DOF partition: {}", reason),
            Self::SingularTimeFactor => write!(f, "time integration factor 1 - a vanishes"),
            Self::Assembly(err) => write!(f, "{}", err),
            Self::Algebra(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CondensationError {}

impl From<AssemblyError> for CondensationError {
    fn from(err: AssemblyError) -> Self {
        Self::Assembly(err)
    }
}

impl From<AlgebraError> for CondensationError {
    fn from(err: AlgebraError) -> Self {
        Self::Algebra(err)
    }
}

/// The time integrator driving the coupled problem, which fixes the factor `a` in the
/// no-penetration multiplier recovery `λ = -1/(1-a) D⁻ᵀ C Δx`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeIntegrationScheme {
    Static,
    GenAlpha { alpha_f: f64 },
    OneStepTheta { theta: f64 },
}

impl TimeIntegrationScheme {
    pub fn alpha(&self) -> f64 {
        match *self {
            Self::Static => 0.0,
            Self::GenAlpha { alpha_f } => alpha_f,
            Self::OneStepTheta { theta } => 1.0 - theta,
        }
    }

    /// `1 / (1 - a)`.
    pub fn recovery_factor(&self) -> Result<f64, CondensationError> {
        let denominator = 1.0 - self.alpha();
        if denominator.abs() <= f64::EPSILON {
            Err(CondensationError::SingularTimeFactor)
        } else {
            Ok(1.0 / denominator)
        }
    }
}

/// Block indices of a [`DofPartition`].
pub const INTERIOR: usize = 0;
pub const MASTER: usize = 1;
pub const SLAVE: usize = 2;

/// Interior, master and slave DOFs of a system map.
#[derive(Debug, Clone)]
pub struct DofPartition {
    system: Arc<Map>,
    blocks: [Arc<Map>; 3],
}

impl DofPartition {
    pub fn new(system: Arc<Map>, master: Map, slave: Map) -> Result<Self, CondensationError> {
        if !master.is_subset_of(&system) || !slave.is_subset_of(&system) {
            return Err(CondensationError::InvalidPartition("interface DOFs must belong to the system"));
        }
        if !master.intersection(&slave).is_empty() {
            return Err(CondensationError::InvalidPartition("master and slave DOFs overlap"));
        }
        let interior = system.difference(&master).difference(&slave);
        Ok(Self {
            system,
            blocks: [Arc::new(interior), Arc::new(master), Arc::new(slave)],
        })
    }

    pub fn from_interface(system: Arc<Map>, interface: &MortarInterface) -> Result<Self, CondensationError> {
        Self::new(system, interface.master_dofs(), interface.slave_dofs())
    }

    pub fn system(&self) -> &Arc<Map> {
        &self.system
    }

    pub fn interior(&self) -> &Arc<Map> {
        &self.blocks[INTERIOR]
    }

    pub fn master(&self) -> &Arc<Map> {
        &self.blocks[MASTER]
    }

    pub fn slave(&self) -> &Arc<Map> {
        &self.blocks[SLAVE]
    }

    pub fn block(&self, index: usize) -> &Arc<Map> {
        &self.blocks[index]
    }

    pub fn split_matrix(&self, matrix: &SparseMatrix) -> Result<BlockMatrix, AlgebraError> {
        BlockMatrix::split(matrix, self.blocks.to_vec(), self.blocks.to_vec())
    }

    pub fn split_vector(&self, vector: &Vector) -> Result<[Vector; 3], AlgebraError> {
        Ok([
            vector.extract(self.interior())?,
            vector.extract(self.master())?,
            vector.extract(self.slave())?,
        ])
    }
}

/// Fails if a Dirichlet row is a slave DOF and reports whether any rank holds a Dirichlet row on
/// a master DOF.
pub fn check_dirichlet(
    dirichlet: &Map,
    partition: &DofPartition,
    comm: &dyn Communicator,
) -> Result<bool, CondensationError> {
    if let Some(dof) = dirichlet.iter().find(|&dof| partition.slave().contains(dof)) {
        return Err(CondensationError::SlaveDirichlet(dof));
    }
    let local = dirichlet.iter().any(|dof| partition.master().contains(dof));
    Ok(comm.any(local))
}

/// `Σ cₖ Aₖ` as a filled matrix with the given maps.
pub(crate) fn linear_combination(
    terms: &[(f64, &SparseMatrix)],
    row_map: &Arc<Map>,
    col_map: &Arc<Map>,
) -> Result<SparseMatrix, AlgebraError> {
    let nnz = terms.iter().map(|(_, a)| a.nnz()).sum();
    let mut result = SparseMatrix::with_capacity(row_map.clone(), nnz);
    for (c, a) in terms {
        result.add(a, *c)?;
    }
    result.fill_with_col_map(col_map.clone())?;
    Ok(result)
}

pub(crate) fn product(a: &SparseMatrix, b: &SparseMatrix) -> Result<SparseMatrix, AlgebraError> {
    SparseMatrix::multiply(a, false, b, false)
}

pub(crate) fn product_transpose_a(a: &SparseMatrix, b: &SparseMatrix) -> Result<SparseMatrix, AlgebraError> {
    SparseMatrix::multiply(a, true, b, false)
}

/// The condensed system handed to the linear solver.
#[derive(Debug, Clone)]
pub struct CondensedSystem {
    /// The modified blocks over the interior, master and slave DOFs.
    pub blocks: BlockMatrix,
    /// The merged matrix over the system map.
    pub matrix: SparseMatrix,
    pub rhs: Vector,
}

impl CondensedSystem {
    fn from_blocks(blocks: BlockMatrix, rhs: [Vector; 3], system: &Arc<Map>) -> Result<Self, AlgebraError> {
        let mut matrix = blocks.merge()?;
        matrix.fill_with_col_map(system.clone())?;
        let rhs = Vector::from_parts(system.clone(), &[&rhs[0], &rhs[1], &rhs[2]]);
        Ok(Self { blocks, matrix, rhs })
    }
}

/// Data kept from a condensation pass to recover the multipliers after the solve.
///
/// The multipliers are `λ = s D⁻ᵀ (b_c - K_c Δx)`, where `K_c` and `b_c` are the eliminated
/// constraint rows as they were before the condensation.
#[derive(Debug, Clone)]
pub struct RecoveryCache {
    /// `D⁻ᵀ` with multiplier rows.
    pub d_inverse_transpose: SparseMatrix,
    pub rows: SparseMatrix,
    pub rhs: Vector,
    pub scale: f64,
}

impl RecoveryCache {
    /// The multipliers for the increment `dx`, which must cover the columns of the cached rows.
    pub fn multiplier(&self, dx: &Vector) -> Result<Vector, AlgebraError> {
        let mut residual = self.rows.matvec(dx)?;
        residual.update(1.0, &self.rhs, -1.0);
        let mut lambda = self.d_inverse_transpose.matvec(&residual)?;
        lambda.scale(self.scale);
        Ok(lambda)
    }
}
