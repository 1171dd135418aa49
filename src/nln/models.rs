use crate::config::{MeshRelation, Strategy};
use crate::nln::{CorrectionType, NlnInterface, QuantityType};
use crate::strategy::MeshtyingStrategy;
use eyre::eyre;
use mortar_sparse::{Map, SparseMatrix, Vector};
use std::sync::Arc;

/// The structural field of a problem, `F(u) = F_int(u) - F_ext(t)`.
pub trait StructuralModel {
    /// The displacement DOFs of the model.
    fn dofs(&self) -> Arc<Map>;

    /// The residual `F(u)` on [`dofs`](Self::dofs).
    fn residual(&self, u: &Vector) -> eyre::Result<Vector>;

    /// The tangent stiffness `∂F/∂u` as a filled matrix on [`dofs`](Self::dofs).
    fn stiffness(&self, u: &Vector) -> eyre::Result<SparseMatrix>;

    /// DOFs with a prescribed displacement.
    fn dirichlet_dofs(&self) -> Arc<Map> {
        Arc::new(Map::empty())
    }

    /// The prescribed displacement on [`dirichlet_dofs`](Self::dirichlet_dofs) at `time`.
    fn prescribed_displacement(&self, _time: f64) -> Vector {
        Vector::zeros(self.dirichlet_dofs())
    }

    /// Rows replacing the Dirichlet rows of the linearized system for conditions in rotated nodal
    /// frames. A Dirichlet DOF without a row here is fixed in the global frame.
    fn dirichlet_trafo(&self) -> Option<&SparseMatrix> {
        None
    }

    fn set_time(&mut self, _time: f64) {}
}

/// A linear structure `F(u) = K u - t f`, with prescribed displacements `t ū` growing linearly
/// in the load factor `t`.
#[derive(Debug, Clone)]
pub struct LinearStructuralModel {
    stiffness: SparseMatrix,
    load: Vector,
    prescribed: Vector,
    trafo: Option<SparseMatrix>,
    time: f64,
}

impl LinearStructuralModel {
    /// `stiffness` must be filled, and `load` must be keyed by its row map.
    pub fn new(stiffness: SparseMatrix, load: Vector) -> eyre::Result<Self> {
        if !stiffness.is_filled() {
            return Err(eyre!("stiffness matrix must be filled"));
        }
        if load.map().as_ref() != stiffness.row_map().as_ref() {
            return Err(eyre!("load vector must be keyed by the rows of the stiffness matrix"));
        }
        Ok(Self {
            stiffness,
            load,
            prescribed: Vector::zeros(Arc::new(Map::empty())),
            trafo: None,
            time: 1.0,
        })
    }

    /// Prescribes the displacement `t ū` on the DOFs of `values`.
    pub fn with_dirichlet(mut self, values: Vector) -> Self {
        self.prescribed = values;
        self
    }

    /// Constrains the increment of each Dirichlet DOF along the matching row of `trafo` instead of
    /// along its global axis.
    pub fn with_dirichlet_trafo(mut self, trafo: SparseMatrix) -> eyre::Result<Self> {
        if !trafo.is_filled() {
            return Err(eyre!("Dirichlet transformation must be filled"));
        }
        self.trafo = Some(trafo);
        Ok(self)
    }

    pub fn time(&self) -> f64 {
        self.time
    }
}

impl StructuralModel for LinearStructuralModel {
    fn dofs(&self) -> Arc<Map> {
        self.stiffness.row_map().clone()
    }

    fn residual(&self, u: &Vector) -> eyre::Result<Vector> {
        let mut f = self.stiffness.matvec(u)?;
        f.update(-self.time, &self.load, 1.0);
        Ok(f)
    }

    fn stiffness(&self, _u: &Vector) -> eyre::Result<SparseMatrix> {
        Ok(self.stiffness.clone())
    }

    fn dirichlet_dofs(&self) -> Arc<Map> {
        self.prescribed.map().clone()
    }

    fn prescribed_displacement(&self, time: f64) -> Vector {
        let mut values = self.prescribed.clone();
        values.scale(time);
        values
    }

    fn dirichlet_trafo(&self) -> Option<&SparseMatrix> {
        self.trafo.as_ref()
    }

    fn set_time(&mut self, time: f64) {
        self.time = time;
    }
}

/// The structural field as an [`NlnInterface`] owning [`QuantityType::Structure`].
#[derive(Debug, Clone)]
pub struct StructureInterface<M> {
    model: M,
    dofs: Arc<Map>,
    jacobian: Option<SparseMatrix>,
}

impl<M: StructuralModel> StructureInterface<M> {
    pub fn new(model: M) -> Self {
        let dofs = model.dofs();
        Self {
            model,
            dofs,
            jacobian: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn dofs(&self) -> &Arc<Map> {
        &self.dofs
    }

    /// The structural residual alone, keyed by the structural DOFs.
    pub fn residual(&self, x: &Vector) -> eyre::Result<Vector> {
        self.model.residual(&x.extract(&self.dofs)?)
    }
}

impl<M: StructuralModel> NlnInterface for StructureInterface<M> {
    fn quantities(&self) -> &[QuantityType] {
        &[QuantityType::Structure]
    }

    fn quantity_dofs(&self, quantity: QuantityType) -> Option<&Arc<Map>> {
        (quantity == QuantityType::Structure).then_some(&self.dofs)
    }

    fn compute_residual(&mut self, x: &Vector, f: &mut Vector) -> eyre::Result<()> {
        self.residual(x)?.export_into(f);
        Ok(())
    }

    fn compute_jacobian(&mut self, x: &Vector) -> eyre::Result<()> {
        self.jacobian = Some(self.model.stiffness(&x.extract(&self.dofs)?)?);
        Ok(())
    }

    fn jacobian(&self) -> Option<&SparseMatrix> {
        self.jacobian.as_ref()
    }

    fn compute_correction_system(&mut self, kind: CorrectionType, x: &Vector) -> eyre::Result<SparseMatrix> {
        match kind {
            CorrectionType::SecondOrder => self.model.stiffness(&x.extract(&self.dofs)?),
            CorrectionType::ConstraintOnly => Ok(SparseMatrix::zeros(self.dofs.clone(), self.dofs.clone())),
        }
    }
}

/// The mortar constraint as an [`NlnInterface`] owning [`QuantityType::LagrangeMultiplier`].
///
/// The multipliers are part of the global solution vector. Computing the residual adds the
/// interface force `Bᵀλ` to the structural rows and writes the constraint residual to the
/// multiplier rows, so it must run after the structural interface has written its residual.
#[derive(Debug, Clone)]
pub struct MeshtyingInterface {
    strategy: MeshtyingStrategy,
    system: Arc<Map>,
    lm_dofs: Arc<Map>,
    constraint: Option<SparseMatrix>,
}

impl MeshtyingInterface {
    /// Sets up `strategy` on the structural DOFs `system`.
    pub fn new(mut strategy: MeshtyingStrategy, system: Arc<Map>) -> eyre::Result<Self> {
        strategy.setup(system.clone())?;
        let lm_dofs = strategy.lambda().map().clone();
        Ok(Self {
            strategy,
            system,
            lm_dofs,
            constraint: None,
        })
    }

    pub fn strategy(&self) -> &MeshtyingStrategy {
        &self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut MeshtyingStrategy {
        &mut self.strategy
    }

    pub fn lm_dofs(&self) -> &Arc<Map> {
        &self.lm_dofs
    }

    /// The constraint matrix `B` at `x`. Sliding interfaces are coupled on a copy of the strategy,
    /// so the stored operators still belong to the last Jacobian.
    fn constraint_at(&self, x: &Vector) -> eyre::Result<SparseMatrix> {
        let missing = || eyre!("mortar operators have not been evaluated");
        if self.strategy.params().mesh_relation == MeshRelation::Sliding {
            let mut trial = self.strategy.clone();
            trial.evaluate_coupling(Some(&x.extract(&self.system)?))?;
            return Ok(trial.operators().ok_or_else(missing)?.constraint_matrix()?);
        }
        Ok(self.strategy.operators().ok_or_else(missing)?.constraint_matrix()?)
    }

    /// Takes the multipliers from the global solution vector.
    fn sync_lambda(&mut self, x: &Vector) -> eyre::Result<()> {
        if self.lm_dofs.is_subset_of(x.map()) {
            self.strategy.set_lambda(x.extract(&self.lm_dofs)?);
        }
        Ok(())
    }
}

impl NlnInterface for MeshtyingInterface {
    fn quantities(&self) -> &[QuantityType] {
        &[QuantityType::LagrangeMultiplier]
    }

    fn quantity_dofs(&self, quantity: QuantityType) -> Option<&Arc<Map>> {
        (quantity == QuantityType::LagrangeMultiplier).then_some(&self.lm_dofs)
    }

    fn compute_residual(&mut self, x: &Vector, f: &mut Vector) -> eyre::Result<()> {
        let u = x.extract(&self.system)?;
        self.sync_lambda(x)?;
        if self.strategy.params().mesh_relation == MeshRelation::Sliding {
            self.strategy.evaluate_coupling(Some(&u))?;
        }
        self.strategy.mortar_force()?.add_into(f, 1.0);
        // Penalty multipliers are not unknowns
        if self.strategy.params().strategy == Strategy::Penalty {
            Vector::zeros(self.lm_dofs.clone()).export_into(f);
        } else {
            self.strategy.constraint_residual(&u)?.export_into(f);
        }
        Ok(())
    }

    fn compute_jacobian(&mut self, x: &Vector) -> eyre::Result<()> {
        self.sync_lambda(x)?;
        let operators = self
            .strategy
            .operators()
            .ok_or_else(|| eyre!("mortar operators have not been evaluated"))?;
        self.constraint = Some(operators.constraint_matrix()?);
        Ok(())
    }

    fn jacobian(&self) -> Option<&SparseMatrix> {
        self.constraint.as_ref()
    }

    fn compute_correction_system(&mut self, kind: CorrectionType, x: &Vector) -> eyre::Result<SparseMatrix> {
        let b = self.constraint_at(x)?;
        match kind {
            CorrectionType::ConstraintOnly => Ok(b),
            CorrectionType::SecondOrder => {
                let map = Arc::new(self.system.union(&self.lm_dofs));
                let mut block = SparseMatrix::with_capacity(map.clone(), 2 * b.nnz());
                for (row, col, value) in b.triplets() {
                    block.add_value(row, col, value)?;
                    block.add_value(col, row, value)?;
                }
                block.fill_with_col_map(map)?;
                Ok(block)
            }
        }
    }

    fn is_saddle_point_system(&self) -> bool {
        self.strategy.is_saddle_point()
    }

    fn is_condensed_system(&self) -> bool {
        self.strategy.is_condensed()
    }
}
