//! Global constraint handling for mortar mesh tying and mesh sliding.
use crate::assembly::MortarOperators;
use crate::condensation::{check_dirichlet, DofPartition, MeshslidingCondenser, MeshtyingCondenser, RecoveryCache};
use crate::config::{MeshRelation, MortarParameters, Strategy};
use crate::coupling::couple_interface;
use crate::interface::{MortarInterface, Side};
use crate::sliding::SlidingOperators;
use eyre::eyre;
use itertools::Itertools;
use log::{debug, warn};
use mortar_sparse::{Communicator, Map, SparseMatrix, Vector};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// A linear system `A x = b` handed to the linear solver.
#[derive(Debug, Clone)]
pub struct MortarSystem {
    pub matrix: SparseMatrix,
    pub rhs: Vector,
}

#[derive(Debug, Clone)]
enum Condenser {
    Tying(MeshtyingCondenser),
    Sliding(MeshslidingCondenser),
}

/// Owns the interface and its mortar operators, and turns the structural system `K Δu = -F` into
/// the system the linear solver sees.
#[derive(Debug, Clone)]
pub struct MeshtyingStrategy {
    params: MortarParameters,
    interface: MortarInterface,
    operators: Option<MortarOperators>,
    partition: Option<DofPartition>,
    condenser: Option<Condenser>,
    cache: Option<RecoveryCache>,
    lambda: Vector,
    dirichlet_increment: Option<Vector>,
}

impl MeshtyingStrategy {
    pub fn new(params: MortarParameters, interface: MortarInterface) -> eyre::Result<Self> {
        params.validate_for_cells(interface.elements_on(Side::Slave).map(|element| element.cell))?;
        let lambda = Vector::zeros(Arc::new(interface.slave_lm_dofs()));
        Ok(Self {
            params,
            interface,
            operators: None,
            partition: None,
            condenser: None,
            cache: None,
            lambda,
            dirichlet_increment: None,
        })
    }

    pub fn params(&self) -> &MortarParameters {
        &self.params
    }

    pub fn interface(&self) -> &MortarInterface {
        &self.interface
    }

    pub fn operators(&self) -> Option<&MortarOperators> {
        self.operators.as_ref()
    }

    /// The current Lagrange multipliers on the slave multiplier DOFs.
    pub fn lambda(&self) -> &Vector {
        &self.lambda
    }

    pub fn set_lambda(&mut self, lambda: Vector) {
        self.lambda = lambda;
    }

    pub fn is_saddle_point(&self) -> bool {
        matches!(self.params.strategy, Strategy::SaddlePoint | Strategy::Lagrange)
    }

    pub fn is_condensed(&self) -> bool {
        self.params.is_condensed()
    }

    fn operators_or_err(&self) -> eyre::Result<&MortarOperators> {
        self.operators
            .as_ref()
            .ok_or_else(|| eyre!("mortar operators have not been evaluated"))
    }

    fn partition_or_err(&self) -> eyre::Result<&DofPartition> {
        self.partition
            .as_ref()
            .ok_or_else(|| eyre!("strategy has not been set up"))
    }

    /// Couples the interface at the given displacement, or at the current node positions, and
    /// assembles the mortar operators.
    pub fn evaluate_coupling(&mut self, displacement: Option<&Vector>) -> eyre::Result<()> {
        if let Some(displacement) = displacement {
            self.interface.set_current_positions(displacement)?;
        }
        self.interface.evaluate_nodal_normals()?;
        let coupling = couple_interface(&mut self.interface, &self.params)?;
        if !coupling.uncoupled.is_empty() {
            warn!("{} slave elements are not coupled", coupling.uncoupled.len());
        }
        debug!("Coupled interface with {} integration cells", coupling.num_cells);
        self.operators = Some(MortarOperators::assemble(&self.interface, coupling.contributions)?);
        Ok(())
    }

    /// Partitions the structural system and evaluates the coupling in the reference configuration.
    pub fn setup(&mut self, system: Arc<Map>) -> eyre::Result<()> {
        self.partition = Some(DofPartition::from_interface(system, &self.interface)?);
        self.evaluate_coupling(None)?;
        if self.is_condensed() && self.params.mesh_relation == MeshRelation::Tying {
            let condenser = MeshtyingCondenser::new(self.operators_or_err()?, self.partition_or_err()?.clone())?;
            self.condenser = Some(Condenser::Tying(condenser));
        }
        Ok(())
    }

    /// Starts a load or time step. `increment` is the prescribed Dirichlet increment of the step.
    pub fn begin_step(
        &mut self,
        dirichlet: &Map,
        increment: Option<Vector>,
        comm: &dyn Communicator,
    ) -> eyre::Result<()> {
        match &mut self.condenser {
            Some(Condenser::Tying(condenser)) => condenser.begin_step(dirichlet, comm)?,
            Some(Condenser::Sliding(condenser)) => condenser.begin_step(dirichlet, comm)?,
            None if self.params.is_condensed() => {
                let partition = self
                    .partition
                    .as_ref()
                    .ok_or_else(|| eyre!("strategy has not been set up"))?;
                check_dirichlet(dirichlet, partition, comm)?;
            }
            None => {}
        }
        self.dirichlet_increment = increment;
        Ok(())
    }

    /// Builds the system for the next Newton correction from the structural stiffness and residual.
    pub fn linear_system(&mut self, k: &SparseMatrix, residual: &Vector, state: &Vector) -> eyre::Result<MortarSystem> {
        let mut b = residual.clone();
        b.scale(-1.0);
        match self.params.strategy {
            Strategy::Condensed => match self.params.mesh_relation {
                MeshRelation::Tying => self.condensed_tying(k, &b),
                MeshRelation::Sliding => self.condensed_sliding(k, &b, state),
            },
            Strategy::SaddlePoint | Strategy::Lagrange => self.saddle_point(k, &b, state),
            Strategy::Penalty => self.penalty(k, &b, state),
            other => Err(eyre!("strategy {} is not supported", other)),
        }
    }

    fn condensed_tying(&mut self, k: &SparseMatrix, b: &Vector) -> eyre::Result<MortarSystem> {
        let Some(Condenser::Tying(condenser)) = &mut self.condenser else {
            return Err(eyre!("mesh tying condenser has not been set up"));
        };
        let (system, cache) = condenser.condense(k, b, self.dirichlet_increment.as_ref())?;
        self.cache = Some(cache);
        Ok(MortarSystem {
            matrix: system.matrix,
            rhs: system.rhs,
        })
    }

    fn condensed_sliding(&mut self, k: &SparseMatrix, b: &Vector, state: &Vector) -> eyre::Result<MortarSystem> {
        self.evaluate_coupling(Some(state))?;
        let operators = self.operators_or_err()?;
        let sliding = SlidingOperators::assemble(&self.interface, operators, &self.lambda)?;
        let condenser = MeshslidingCondenser::new(operators, self.partition_or_err()?.clone())?;
        let (system, cache) = condenser.condense(k, b, operators, &sliding, &self.lambda)?;
        self.condenser = Some(Condenser::Sliding(condenser));
        self.cache = Some(cache);
        Ok(MortarSystem {
            matrix: system.matrix,
            rhs: system.rhs,
        })
    }

    /// The saddle point system over the structural and multiplier DOFs. Multiplier rows of
    /// uncoupled slave nodes get an identity row.
    fn saddle_point(&self, k: &SparseMatrix, b: &Vector, state: &Vector) -> eyre::Result<MortarSystem> {
        let operators = self.operators_or_err()?;
        let system = self.partition_or_err()?.system();
        let lm_dofs = operators.lm_dofs();
        let extended = Arc::new(system.union(lm_dofs));

        let constraint = operators.constraint_matrix()?;
        let constraint_t = constraint.transpose()?;
        let active: FxHashSet<_> = constraint
            .triplets()
            .into_iter()
            .filter(|&(_, _, value)| value != 0.0)
            .map(|(row, _, _)| row)
            .collect();
        let inactive = lm_dofs.iter().filter(|dof| !active.contains(dof)).collect_vec();

        let mut matrix = SparseMatrix::with_capacity(extended.clone(), k.nnz() + 2 * constraint.nnz() + inactive.len());
        matrix.add(k, 1.0)?;
        matrix.add(&constraint, 1.0)?;
        matrix.add(&constraint_t, 1.0)?;
        for &dof in &inactive {
            matrix.add_value(dof, dof, 1.0)?;
        }
        matrix.fill_with_col_map(extended.clone())?;

        let mut constraint_rhs = constraint.matvec(state)?;
        constraint_rhs.scale(-1.0);
        let rhs = Vector::from_parts(extended, &[b, &constraint_rhs]);
        Ok(MortarSystem { matrix, rhs })
    }

    /// `K + ε BᵀB` and `b - ε BᵀB u`.
    fn penalty(&self, k: &SparseMatrix, b: &Vector, state: &Vector) -> eyre::Result<MortarSystem> {
        let operators = self.operators_or_err()?;
        let system = self.partition_or_err()?.system();
        let epsilon = self.params.penalty_param;
        let constraint = operators.constraint_matrix()?;
        let btb = SparseMatrix::multiply(&constraint, true, &constraint, false)?;

        let mut matrix = SparseMatrix::with_capacity(system.clone(), k.nnz() + btb.nnz());
        matrix.add(k, 1.0)?;
        matrix.add(&btb, epsilon)?;
        matrix.fill_with_col_map(system.clone())?;

        let mut rhs = b.clone();
        btb.matvec(state)?.add_into(&mut rhs, -epsilon);
        Ok(MortarSystem { matrix, rhs })
    }

    /// The interface force `Bᵀλ` on the slave and master DOFs.
    pub fn mortar_force(&self) -> eyre::Result<Vector> {
        let constraint = self.operators_or_err()?.constraint_matrix()?;
        Ok(constraint.transpose()?.matvec(&self.lambda)?)
    }

    /// The residual of the constraint on the multiplier DOFs.
    ///
    /// For tying this is `B u`. For sliding the first multiplier DOF of each slave node holds the
    /// weighted gap and the other two the tangential components `t_k · λ`.
    pub fn constraint_residual(&self, state: &Vector) -> eyre::Result<Vector> {
        let operators = self.operators_or_err()?;
        match self.params.mesh_relation {
            MeshRelation::Tying => Ok(operators.constraint_matrix()?.matvec(state)?),
            MeshRelation::Sliding => {
                let mut residual = Vector::zeros(operators.lm_dofs().clone());
                for node in self.interface.nodes_on(Side::Slave) {
                    let frame = node
                        .frame
                        .as_ref()
                        .ok_or_else(|| eyre!("slave node {} has no nodal frame", node.gid))?;
                    let lm = self.interface.lm_dofs(node);
                    let lambda_i = lm.map(|dof| self.lambda.get(dof).unwrap_or(0.0));
                    residual.set(lm[0], operators.gap(node.gid))?;
                    for (k, tangent) in frame.tangents.iter().enumerate() {
                        let value: f64 = (0..3).map(|d| tangent[d] * lambda_i[d]).sum();
                        residual.set(lm[k + 1], value)?;
                    }
                }
                Ok(residual)
            }
        }
    }

    /// Recovers the structural increment and the multipliers from the solution of the system
    /// built by [`linear_system`](Self::linear_system).
    pub fn recover(&mut self, solution: &Vector, state: &Vector) -> eyre::Result<Vector> {
        let system = self.partition_or_err()?.system().clone();
        let mut dx = solution.extract(&system)?;
        match self.params.strategy {
            Strategy::Condensed => {
                let cache = self
                    .cache
                    .take()
                    .ok_or_else(|| eyre!("no condensation to recover from"))?;
                self.lambda = match &self.condenser {
                    Some(Condenser::Tying(condenser)) => condenser.recover(&cache, &mut dx, state)?,
                    Some(Condenser::Sliding(condenser)) => condenser.recover(&cache, &dx)?,
                    None => return Err(eyre!("strategy has not been set up")),
                };
            }
            Strategy::SaddlePoint | Strategy::Lagrange => {
                self.lambda = solution.extract(self.lambda.map())?;
            }
            Strategy::Penalty => {
                let mut u = state.clone();
                u.update(1.0, &dx, 1.0);
                let mut lambda = self.operators_or_err()?.constraint_matrix()?.matvec(&u)?;
                lambda.scale(self.params.penalty_param);
                self.lambda = lambda;
            }
            other => return Err(eyre!("strategy {} is not supported", other)),
        }
        Ok(dx)
    }
}
