use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use std::error::Error;
use std::fmt;

pub trait LinearOperator {
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>>;
}

impl<'a, A> LinearOperator for &'a A
where
    A: ?Sized + LinearOperator,
{
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        <A as LinearOperator>::apply(self, y, x)
    }
}

impl LinearOperator for CsrMatrix<f64> {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        spmm_csr_dense(0.0, &mut y, 1.0, Op::NoOp(self), Op::NoOp(&x));
        Ok(())
    }
}

pub struct IdentityOperator;

impl LinearOperator for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        Ok(())
    }
}

/// Diagonal (Jacobi) preconditioner.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inverse_diagonal: DVector<f64>,
}

impl JacobiPreconditioner {
    /// Zero diagonal entries are left unscaled.
    pub fn from_csr(matrix: &CsrMatrix<f64>) -> Self {
        let inverse_diagonal = DVector::from_iterator(
            matrix.nrows(),
            (0..matrix.nrows()).map(|i| {
                let d = matrix
                    .get_entry(i, i)
                    .map(|entry| entry.into_value())
                    .unwrap_or(0.0);
                if d != 0.0 {
                    1.0 / d
                } else {
                    1.0
                }
            }),
        );
        Self { inverse_diagonal }
    }
}

impl LinearOperator for JacobiPreconditioner {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x.component_mul(&self.inverse_diagonal));
        Ok(())
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum CgErrorKind {
    OperatorError(Box<dyn Error>),
    PreconditionerError(Box<dyn Error>),
    IndefiniteOperator,
    IndefinitePreconditioner,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for CgErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => {
                write!(f, "Error applying operator: ")?;
                err.fmt(f)
            }
            Self::PreconditionerError(err) => {
                write!(f, "Error applying preconditioner: ")?;
                err.fmt(f)
            }
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite"),
            Self::IndefinitePreconditioner => write!(f, "Indefinite preconditioner"),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached.", max_iter)
            }
        }
    }
}

#[derive(Debug)]
pub struct CgError {
    pub num_iterations: usize,
    pub kind: CgErrorKind,
}

impl fmt::Display for CgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CG solve failed after {} iterations: {}", self.num_iterations, self.kind)
    }
}

impl Error for CgError {}

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
struct CgWorkspace {
    r: DVector<f64>,
    z: DVector<f64>,
    p: DVector<f64>,
    Ap: DVector<f64>,
}

impl CgWorkspace {
    fn new() -> Self {
        Self {
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            Ap: DVector::zeros(0),
        }
    }

    fn resize(&mut self, dim: usize) {
        for buffer in [&mut self.r, &mut self.z, &mut self.p, &mut self.Ap] {
            buffer.resize_vertically_mut(dim, 0.0);
        }
    }
}

/// Preconditioned conjugate gradient with a relative residual criterion `||r|| <= tol * ||b||`.
///
/// The criterion uses the recursively updated residual rather than the true residual.
#[derive(Debug)]
pub struct ConjugateGradient<A, P> {
    workspace: CgWorkspace,
    operator: A,
    preconditioner: P,
    tolerance: f64,
    max_iter: Option<usize>,
}

impl<A> ConjugateGradient<A, IdentityOperator> {
    pub fn new(operator: A) -> Self {
        Self {
            workspace: CgWorkspace::new(),
            operator,
            preconditioner: IdentityOperator,
            tolerance: 1e-8,
            max_iter: None,
        }
    }
}

impl<A, P> ConjugateGradient<A, P> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> ConjugateGradient<A, P2> {
        ConjugateGradient {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
        }
    }

    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl<A, P> ConjugateGradient<A, P>
where
    A: LinearOperator,
    P: LinearOperator,
{
    /// Solves `A x = b`, using the content of `x` as the initial guess. Returns the number of iterations.
    #[allow(non_snake_case)]
    pub fn solve_with_guess(&mut self, b: &DVector<f64>, x: &mut DVector<f64>) -> Result<usize, CgError> {
        use CgErrorKind::*;
        assert_eq!(b.len(), x.len());
        let fail = |num_iterations, kind| CgError { num_iterations, kind };

        self.workspace.resize(x.len());
        let CgWorkspace { r, z, p, Ap } = &mut self.workspace;
        let mut num_iterations = 0;

        let b_norm = b.norm();
        if b_norm == 0.0 {
            x.fill(0.0);
            return Ok(0);
        }

        // r = b - Ax
        self.operator
            .apply(r.as_view_mut(), x.as_view())
            .map_err(|err| fail(0, OperatorError(err)))?;
        r.zip_apply(b, |Ax_i, b_i| *Ax_i = b_i - *Ax_i);

        // z = Pr
        self.preconditioner
            .apply(z.as_view_mut(), r.as_view())
            .map_err(|err| fail(0, PreconditionerError(err)))?;
        p.copy_from(z);
        let mut zTr = z.dot(r);

        while r.norm() > self.tolerance * b_norm {
            if let Some(max_iter) = self.max_iter {
                if num_iterations >= max_iter {
                    return Err(fail(num_iterations, MaxIterationsReached { max_iter }));
                }
            }

            self.operator
                .apply(Ap.as_view_mut(), p.as_view())
                .map_err(|err| fail(num_iterations, OperatorError(err)))?;
            let pAp = p.dot(Ap);
            if pAp <= 0.0 {
                return Err(fail(num_iterations, IndefiniteOperator));
            }
            if zTr <= 0.0 {
                return Err(fail(num_iterations, IndefinitePreconditioner));
            }

            let alpha = zTr / pAp;
            x.axpy(alpha, p, 1.0);
            r.axpy(-alpha, Ap, 1.0);
            num_iterations += 1;

            self.preconditioner
                .apply(z.as_view_mut(), r.as_view())
                .map_err(|err| fail(num_iterations, PreconditionerError(err)))?;
            let zTr_next = z.dot(r);
            let beta = zTr_next / zTr;
            // p <- z + beta * p
            p.axpy(1.0, z, beta);
            zTr = zTr_next;
        }

        Ok(num_iterations)
    }
}
