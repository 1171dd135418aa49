use crate::assembly::MortarOperators;
use crate::condensation::{
    check_dirichlet, linear_combination, product, product_transpose_a, CondensationError, CondensedSystem,
    DofPartition, RecoveryCache, INTERIOR, MASTER, SLAVE,
};
use log::debug;
use mortar_sparse::{Communicator, Map, SparseMatrix, Vector};

/// Condensation of the tying constraint `u_s = P u_m`.
///
/// The slave rows of the condensed system are identity rows with zero right-hand side, and the
/// slave columns are zeroed so that a symmetric `K` stays symmetric. The slave increment is
/// recovered from the master increment after the solve.
#[derive(Debug, Clone)]
pub struct MeshtyingCondenser {
    partition: DofPartition,
    projector: SparseMatrix,
    d_inverse_transpose: SparseMatrix,
    master_dirichlet: bool,
}

impl MeshtyingCondenser {
    pub fn new(operators: &MortarOperators, partition: DofPartition) -> Result<Self, CondensationError> {
        if operators.slave_dofs().as_ref() != partition.slave().as_ref()
            || operators.master_dofs().as_ref() != partition.master().as_ref()
        {
            return Err(CondensationError::InvalidPartition("partition does not match the mortar operators"));
        }
        let projector = operators.projector()?;
        let d_inverse_transpose = operators.d_inverse()?.transpose()?;
        Ok(Self {
            partition,
            projector,
            d_inverse_transpose,
            master_dirichlet: false,
        })
    }

    pub fn partition(&self) -> &DofPartition {
        &self.partition
    }

    /// `P = D⁻¹ M` with slave rows and master columns.
    pub fn projector(&self) -> &SparseMatrix {
        &self.projector
    }

    /// Starts a load or time step with the given Dirichlet rows.
    ///
    /// Arms the master Dirichlet correction of the first condensation in the step if any rank
    /// holds a Dirichlet row on a master DOF.
    pub fn begin_step(&mut self, dirichlet: &Map, comm: &dyn Communicator) -> Result<(), CondensationError> {
        self.master_dirichlet = check_dirichlet(dirichlet, &self.partition, comm)?;
        if self.master_dirichlet {
            debug!("Master Dirichlet correction armed for the first iteration");
        }
        Ok(())
    }

    pub fn master_dirichlet_active(&self) -> bool {
        self.master_dirichlet
    }

    /// Condenses `K Δx = b`.
    ///
    /// `dirichlet_increment` is the prescribed master increment `Δu_m^D` of the step. It enters
    /// only while the master Dirichlet correction is armed, and the correction is disarmed
    /// afterwards.
    pub fn condense(
        &mut self,
        k: &SparseMatrix,
        b: &Vector,
        dirichlet_increment: Option<&Vector>,
    ) -> Result<(CondensedSystem, RecoveryCache), CondensationError> {
        let partition = &self.partition;
        let (n, m, s) = (partition.interior(), partition.master(), partition.slave());
        let p = &self.projector;
        let original = partition.split_matrix(k)?;
        let [b_n, b_m, b_s] = partition.split_vector(b)?;

        let cache = RecoveryCache {
            d_inverse_transpose: self.d_inverse_transpose.clone(),
            rows: k.extract(s, partition.system())?,
            rhs: b_s.clone(),
            scale: 1.0,
        };

        let k_ns_p = product(original.block(INTERIOR, SLAVE), p)?;
        let pt_k_sn = product_transpose_a(p, original.block(SLAVE, INTERIOR))?;
        let k_ms_p = product(original.block(MASTER, SLAVE), p)?;
        let pt_k_sm = product_transpose_a(p, original.block(SLAVE, MASTER))?;
        let k_ss_p = product(original.block(SLAVE, SLAVE), p)?;
        let pt_k_ss_p = product_transpose_a(p, &k_ss_p)?;

        let mut blocks = original.clone();
        blocks.set_block(
            INTERIOR,
            MASTER,
            linear_combination(&[(1.0, original.block(INTERIOR, MASTER)), (1.0, &k_ns_p)], n, m)?,
        );
        blocks.set_block(
            MASTER,
            INTERIOR,
            linear_combination(&[(1.0, original.block(MASTER, INTERIOR)), (1.0, &pt_k_sn)], m, n)?,
        );
        blocks.set_block(
            MASTER,
            MASTER,
            linear_combination(
                &[
                    (1.0, original.block(MASTER, MASTER)),
                    (1.0, &k_ms_p),
                    (1.0, &pt_k_sm),
                    (1.0, &pt_k_ss_p),
                ],
                m,
                m,
            )?,
        );
        blocks.set_block(INTERIOR, SLAVE, SparseMatrix::zeros(n.clone(), s.clone()));
        blocks.set_block(MASTER, SLAVE, SparseMatrix::zeros(m.clone(), s.clone()));
        blocks.set_block(SLAVE, INTERIOR, SparseMatrix::zeros(s.clone(), n.clone()));
        blocks.set_block(SLAVE, MASTER, SparseMatrix::zeros(s.clone(), m.clone()));
        blocks.set_block(SLAVE, SLAVE, SparseMatrix::identity(s.clone()));

        let mut b_n = b_n;
        let mut b_m = b_m;
        p.transpose()?.matvec(&b_s)?.add_into(&mut b_m, 1.0);

        if self.master_dirichlet {
            if let Some(increment) = dirichlet_increment {
                let du_m = increment.extract(m)?;
                let p_du = p.matvec(&du_m)?;
                original
                    .block(INTERIOR, SLAVE)
                    .matvec(&p_du)?
                    .add_into(&mut b_n, -1.0);
                pt_k_ss_p.matvec(&du_m)?.add_into(&mut b_m, -1.0);
                debug!("Applied master Dirichlet correction to the condensed right-hand side");
            }
            self.master_dirichlet = false;
        }

        let b_s = Vector::zeros(s.clone());
        let system = CondensedSystem::from_blocks(blocks, [b_n, b_m, b_s], partition.system())?;
        Ok((system, cache))
    }

    /// Overwrites the slave part of the increment so that the tying holds at the new state,
    /// `Δu_s = P (u_m + Δu_m) - u_s`, and returns the multipliers.
    ///
    /// `state` is the displacement before the increment `dx` is added.
    pub fn recover(&self, cache: &RecoveryCache, dx: &mut Vector, state: &Vector) -> Result<Vector, CondensationError> {
        let (m, s) = (self.partition.master(), self.partition.slave());
        let mut u_m = state.extract(m)?;
        u_m.update(1.0, &dx.extract(m)?, 1.0);
        let mut du_s = self.projector.matvec(&u_m)?;
        du_s.update(-1.0, &state.extract(s)?, 1.0);
        du_s.export_into(dx);
        Ok(cache.multiplier(dx)?)
    }
}
