use crate::nln::{MeshtyingInterface, NlnInterface, StructuralModel, StructureInterface};
use crate::strategy::{MeshtyingStrategy, MortarSystem};
use eyre::eyre;
use mortar_sparse::{Communicator, LinearSolver, Map, SparseMatrix, Vector};
use std::sync::Arc;

/// The nonlinear system driven by [`NewtonSolver`](crate::nln::NewtonSolver).
pub trait LinearSystem {
    /// The map of the solution vector.
    fn map(&self) -> &Arc<Map>;

    fn interfaces(&self) -> Vec<&dyn NlnInterface>;

    /// Starts a step at `time` and writes the prescribed displacements into `x`.
    fn begin_step(&mut self, time: f64, x: &mut Vector) -> eyre::Result<()>;

    /// The residual `F(x)`. Rows with a prescribed value are zero.
    fn residual(&mut self, x: &Vector) -> eyre::Result<Vector>;

    /// Solves the linearized system at `x` with residual `f` for the Newton increment.
    fn correction(&mut self, x: &Vector, f: &Vector) -> eyre::Result<Vector>;
}

/// Zeros the Dirichlet rows of `matrix` with a unit diagonal and the matching entries of `rhs`.
///
/// With a transformation, Dirichlet rows it holds are replaced by its rows instead, which fixes the
/// increment along a rotated nodal axis.
fn apply_dirichlet(
    matrix: &mut SparseMatrix,
    rhs: &mut Vector,
    dirichlet: &Map,
    trafo: Option<&SparseMatrix>,
) -> eyre::Result<()> {
    match trafo {
        Some(trafo) => {
            let rotated = dirichlet.intersection(trafo.row_map());
            matrix.apply_dirichlet_with_trafo(trafo, &rotated)?;
            matrix.apply_dirichlet(&dirichlet.difference(&rotated), true)?;
        }
        None => matrix.apply_dirichlet(dirichlet, true)?,
    }
    Vector::zeros(Arc::new(dirichlet.clone())).export_into(rhs);
    Ok(())
}

/// A structure without interface constraints.
#[derive(Debug, Clone)]
pub struct StructuralSystem<M, S> {
    structure: StructureInterface<M>,
    solver: S,
}

impl<M: StructuralModel, S: LinearSolver> StructuralSystem<M, S> {
    pub fn new(model: M, solver: S) -> Self {
        Self {
            structure: StructureInterface::new(model),
            solver,
        }
    }

    pub fn structure(&self) -> &StructureInterface<M> {
        &self.structure
    }
}

impl<M: StructuralModel, S: LinearSolver> LinearSystem for StructuralSystem<M, S> {
    fn map(&self) -> &Arc<Map> {
        self.structure.dofs()
    }

    fn interfaces(&self) -> Vec<&dyn NlnInterface> {
        vec![&self.structure as &dyn NlnInterface]
    }

    fn begin_step(&mut self, time: f64, x: &mut Vector) -> eyre::Result<()> {
        let model = self.structure.model_mut();
        model.set_time(time);
        model.prescribed_displacement(time).export_into(x);
        Ok(())
    }

    fn residual(&mut self, x: &Vector) -> eyre::Result<Vector> {
        let mut f = Vector::zeros(self.map().clone());
        self.structure.compute_residual(x, &mut f)?;
        Vector::zeros(self.structure.model().dirichlet_dofs()).export_into(&mut f);
        Ok(f)
    }

    fn correction(&mut self, x: &Vector, f: &Vector) -> eyre::Result<Vector> {
        self.structure.compute_jacobian(x)?;
        let mut matrix = self
            .structure
            .jacobian()
            .cloned()
            .ok_or_else(|| eyre!("structural stiffness is missing"))?;
        let mut rhs = f.clone();
        rhs.scale(-1.0);
        let model = self.structure.model();
        apply_dirichlet(&mut matrix, &mut rhs, &model.dirichlet_dofs(), model.dirichlet_trafo())?;

        let mut dx = Vector::zeros(matrix.row_map().clone());
        self.solver.solve(&matrix, &mut dx, &rhs)?;
        Ok(dx)
    }
}

/// A structure coupled through a mortar interface.
///
/// The solution vector holds the structural DOFs followed by the multiplier DOFs, whichever
/// [`Strategy`](crate::config::Strategy) builds the linear systems. With condensation the
/// multiplier part of the increment comes from the recovery after each solve.
#[derive(Debug, Clone)]
pub struct MortarStructuralSystem<M, S, C> {
    structure: StructureInterface<M>,
    mortar: MeshtyingInterface,
    solver: S,
    comm: C,
    map: Arc<Map>,
}

impl<M, S, C> MortarStructuralSystem<M, S, C>
where
    M: StructuralModel,
    S: LinearSolver,
    C: Communicator,
{
    pub fn new(model: M, strategy: MeshtyingStrategy, solver: S, comm: C) -> eyre::Result<Self> {
        let structure = StructureInterface::new(model);
        let mortar = MeshtyingInterface::new(strategy, structure.dofs().clone())?;
        let map = Arc::new(structure.dofs().union(mortar.lm_dofs()));
        Ok(Self {
            structure,
            mortar,
            solver,
            comm,
            map,
        })
    }

    pub fn structure(&self) -> &StructureInterface<M> {
        &self.structure
    }

    pub fn mortar(&self) -> &MeshtyingInterface {
        &self.mortar
    }

    pub fn strategy(&self) -> &MeshtyingStrategy {
        self.mortar.strategy()
    }

    /// The linearized mortar system at `x`, before Dirichlet rows are applied.
    fn build(&mut self, x: &Vector) -> eyre::Result<MortarSystem> {
        let u = x.extract(self.structure.dofs())?;
        let lambda = x.extract(self.mortar.lm_dofs())?;
        self.structure.compute_jacobian(x)?;
        let residual = self.structure.residual(x)?;
        let k = self
            .structure
            .jacobian()
            .ok_or_else(|| eyre!("structural stiffness is missing"))?;
        let strategy = self.mortar.strategy_mut();
        strategy.set_lambda(lambda);
        strategy.linear_system(k, &residual, &u)
    }
}

impl<M, S, C> LinearSystem for MortarStructuralSystem<M, S, C>
where
    M: StructuralModel,
    S: LinearSolver,
    C: Communicator,
{
    fn map(&self) -> &Arc<Map> {
        &self.map
    }

    fn interfaces(&self) -> Vec<&dyn NlnInterface> {
        vec![&self.structure as &dyn NlnInterface, &self.mortar]
    }

    fn begin_step(&mut self, time: f64, x: &mut Vector) -> eyre::Result<()> {
        let model = self.structure.model_mut();
        model.set_time(time);
        let dirichlet = model.dirichlet_dofs();
        let prescribed = model.prescribed_displacement(time);

        let mut increment = prescribed.clone();
        increment.update(-1.0, &x.extract(&dirichlet)?, 1.0);
        prescribed.export_into(x);

        let master = Arc::new(self.mortar.strategy().interface().master_dofs());
        let mut master_increment = Vector::zeros(master);
        increment.export_into(&mut master_increment);
        self.mortar
            .strategy_mut()
            .begin_step(&dirichlet, Some(master_increment), &self.comm)
    }

    fn residual(&mut self, x: &Vector) -> eyre::Result<Vector> {
        let mut f = Vector::zeros(self.map.clone());
        self.structure.compute_residual(x, &mut f)?;
        self.mortar.compute_residual(x, &mut f)?;
        Vector::zeros(self.structure.model().dirichlet_dofs()).export_into(&mut f);
        Ok(f)
    }

    fn correction(&mut self, x: &Vector, _f: &Vector) -> eyre::Result<Vector> {
        let MortarSystem { mut matrix, mut rhs } = self.build(x)?;
        let model = self.structure.model();
        apply_dirichlet(&mut matrix, &mut rhs, &model.dirichlet_dofs(), model.dirichlet_trafo())?;

        let mut solution = Vector::zeros(matrix.row_map().clone());
        self.solver.solve(&matrix, &mut solution, &rhs)?;

        let u = x.extract(self.structure.dofs())?;
        let strategy = self.mortar.strategy_mut();
        let lambda_old = strategy.lambda().clone();
        let du = strategy.recover(&solution, &u)?;
        let mut dlambda = strategy.lambda().clone();
        dlambda.update(-1.0, &lambda_old, 1.0);
        Ok(Vector::from_parts(self.map.clone(), &[&du, &dlambda]))
    }
}
