use crate::{AlgebraError, ConjugateGradient, JacobiPreconditioner, SparseMatrix, Vector};
use log::debug;
use nalgebra::DVector;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveInfo {
    pub num_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SolverError {
    Singular,
    /// The column map is not contained in the row map.
    NotSquare,
    MaxIterationsReached { max_iter: usize },
    IndefiniteOperator,
    Algebra(AlgebraError),
    Other(String),
}

impl Display for SolverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singular => write!(f, "system matrix is singular"),
            Self::NotSquare => write!(f, "system matrix columns are not covered by its rows"),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "iterative solver did not converge in {} iterations", max_iter)
            }
            Self::IndefiniteOperator => write!(f, "system matrix appears to be indefinite"),
            Self::Algebra(err) => write!(f, "{}", err),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SolverError {}

impl From<AlgebraError> for SolverError {
    fn from(err: AlgebraError) -> Self {
        Self::Algebra(err)
    }
}

/// Solves `A x = b` for a filled matrix whose row map is the solution map.
pub trait LinearSolver {
    /// `x` holds the initial guess on entry and must be keyed by the row map of `a`.
    fn solve(&mut self, a: &SparseMatrix, x: &mut Vector, b: &Vector) -> Result<SolveInfo, SolverError>;
}

fn check_square(a: &SparseMatrix) -> Result<(), SolverError> {
    let col_map = a.col_map().ok_or(AlgebraError::NotFilled)?;
    if col_map.is_subset_of(a.row_map()) {
        Ok(())
    } else {
        Err(SolverError::NotSquare)
    }
}

/// Dense LU factorization. Intended for small and moderately sized systems.
#[derive(Debug, Clone, Default)]
pub struct DirectSolver;

impl LinearSolver for DirectSolver {
    fn solve(&mut self, a: &SparseMatrix, x: &mut Vector, b: &Vector) -> Result<SolveInfo, SolverError> {
        check_square(a)?;
        let map = a.row_map();
        let dense = a.to_dense(map, map);
        let rhs = b.extract(map)?;
        let solution = dense.lu().solve(rhs.values()).ok_or(SolverError::Singular)?;
        if solution.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::Singular);
        }
        *x = Vector::from_values(map.clone(), solution);
        debug!("Direct solve of system with {} unknowns", map.num_local_elements());
        Ok(SolveInfo { num_iterations: 1 })
    }
}

/// Jacobi-preconditioned conjugate gradient, for symmetric positive definite systems.
#[derive(Debug, Clone)]
pub struct IterativeSolver {
    pub tolerance: f64,
    pub max_iter: usize,
}

impl Default for IterativeSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iter: 1000,
        }
    }
}

impl LinearSolver for IterativeSolver {
    fn solve(&mut self, a: &SparseMatrix, x: &mut Vector, b: &Vector) -> Result<SolveInfo, SolverError> {
        check_square(a)?;
        let map = a.row_map();
        // Re-key the columns onto the row layout so the CSR operator acts on row-ordered vectors
        let square = a.extract(map, map)?;
        let csr = square.csr()?;
        let rhs = b.extract(map)?;
        let mut solution: DVector<f64> = x.extract(map)?.values().clone();
        let mut cg = ConjugateGradient::new(csr)
            .with_preconditioner(JacobiPreconditioner::from_csr(csr))
            .with_tolerance(self.tolerance)
            .with_max_iter(self.max_iter);
        let num_iterations = cg.solve_with_guess(rhs.values(), &mut solution).map_err(|err| {
            use crate::CgErrorKind::*;
            match err.kind {
                MaxIterationsReached { max_iter } => SolverError::MaxIterationsReached { max_iter },
                IndefiniteOperator | IndefinitePreconditioner => SolverError::IndefiniteOperator,
                other => SolverError::Other(other.to_string()),
            }
        })?;
        *x = Vector::from_values(map.clone(), solution);
        debug!("CG converged in {} iterations", num_iterations);
        Ok(SolveInfo { num_iterations })
    }
}
