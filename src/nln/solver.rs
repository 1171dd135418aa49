use crate::assembly::AssemblyError;
use crate::condensation::CondensationError;
use crate::config::NonlinearParameters;
use crate::coupling::CouplingError;
use crate::nln::{LinearSystem, NormType, QuantityType, StatusTest, TestStatus};
use itertools::Itertools;
use log::{debug, info, warn};
use mortar_sparse::{SolverError, Vector};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub struct NewtonSettings {
    pub max_iterations: usize,
    pub tests: Vec<StatusTest>,
}

impl NewtonSettings {
    /// Two-norm residual tests on the structure and the multipliers with the tolerance
    /// `NONLINEAR.CONVTOL`.
    pub fn from_parameters(params: &NonlinearParameters) -> Self {
        let residual_test = |quantity| StatusTest::NormF {
            quantity,
            norm: NormType::Two,
            tolerance: params.conv_tol,
            scaled: false,
        };
        Self {
            max_iterations: params.max_iter,
            tests: vec![
                residual_test(QuantityType::Structure),
                residual_test(QuantityType::LagrangeMultiplier),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewtonResult {
    pub iterations: usize,
    /// The aggregated value of each status test at convergence, `None` for tests of quantities
    /// no interface owns.
    pub norms: Vec<Option<f64>>,
}

#[derive(Debug)]
pub enum NewtonError {
    /// The tests did not pass within the maximum number of iterations.
    DidNotConverge { iterations: usize },
    /// Solving the linearized system failed.
    LinearSolver(SolverError),
    /// Evaluating the residual or assembling the linearized system failed.
    Model(eyre::Report),
}

impl NewtonError {
    /// Whether the step may be retried with a smaller step size.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::DidNotConverge { .. } | Self::LinearSolver(_) => true,
            Self::Model(report) => {
                let singular_d = |err: &AssemblyError| {
                    matches!(err, AssemblyError::SingularD { .. } | AssemblyError::SingularDenseD)
                };
                report.downcast_ref::<AssemblyError>().map_or(false, singular_d)
                    || matches!(
                        report.downcast_ref::<CondensationError>(),
                        Some(CondensationError::Assembly(err)) if singular_d(err)
                    )
                    || matches!(
                        report.downcast_ref::<CouplingError>(),
                        Some(CouplingError::SingularDualMatrix(_))
                    )
            }
        }
    }

    fn from_correction(report: eyre::Report) -> Self {
        match report.downcast::<SolverError>() {
            Ok(err) => Self::LinearSolver(err),
            Err(report) => Self::Model(report),
        }
    }
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DidNotConverge { iterations } => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", iterations)
            }
            Self::LinearSolver(err) => write!(f, "Failed to solve linearized system. Error: {}", err),
            Self::Model(err) => write!(f, "Failed to evaluate the nonlinear system. Error: {}", err),
        }
    }
}

impl Error for NewtonError {}

/// Full Newton steps on a [`LinearSystem`] until all evaluated status tests pass.
#[derive(Debug, Clone)]
pub struct NewtonSolver {
    settings: NewtonSettings,
}

impl NewtonSolver {
    pub fn new(settings: NewtonSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &NewtonSettings {
        &self.settings
    }

    /// Solves `F(x) = 0` starting from `x`.
    ///
    /// The iteration has converged once no test is unconverged and at least one test could be
    /// evaluated. Update tests are not evaluated before the first step.
    pub fn solve<S: LinearSystem>(&self, system: &mut S, x: &mut Vector) -> Result<NewtonResult, NewtonError> {
        let mut x_old: Option<Vector> = None;
        let mut iter = 0;
        loop {
            let f = system.residual(x).map_err(NewtonError::Model)?;
            let (statuses, norms): (Vec<_>, Vec<_>) = {
                let interfaces = system.interfaces();
                self.settings
                    .tests
                    .iter()
                    .map(|test| {
                        let value = test.value(&interfaces, &f, x, x_old.as_ref());
                        (test.check(&interfaces, &f, x, x_old.as_ref()), value)
                    })
                    .unzip()
            };
            debug!(
                "Newton iter {}: [{}]",
                iter,
                norms
                    .iter()
                    .map(|norm| norm.map_or_else(|| "-".to_string(), |value| format!("{:.3e}", value)))
                    .join(", ")
            );

            let converged = statuses.iter().all(|&status| status != TestStatus::Unconverged)
                && statuses.iter().any(|&status| status == TestStatus::Converged);
            if converged {
                info!("Newton converged in {} iterations", iter);
                return Ok(NewtonResult {
                    iterations: iter,
                    norms,
                });
            }
            if iter == self.settings.max_iterations {
                return Err(NewtonError::DidNotConverge { iterations: iter });
            }

            let dx = system.correction(x, &f).map_err(NewtonError::from_correction)?;
            x_old = Some(x.clone());
            x.update(1.0, &dx, 1.0);
            iter += 1;
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StepControl {
    pub dt: f64,
    /// The maximum number of consecutive halvings of the step size.
    pub max_cuts: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// The times at which a step converged.
    pub times: Vec<f64>,
    pub total_iterations: usize,
    pub cuts: usize,
}

/// Advances `system` from `start` to `end` in steps of `control.dt`.
///
/// The system and solution are backed up before each step. If the step fails with a
/// recoverable error, both are restored and the step is retried with half the step size, at
/// most `control.max_cuts` times in a row. A converged step restores the step size.
pub fn advance_with_step_cutting<S>(
    solver: &NewtonSolver,
    system: &mut S,
    x: &mut Vector,
    start: f64,
    end: f64,
    control: StepControl,
) -> Result<StepReport, NewtonError>
where
    S: LinearSystem + Clone,
{
    assert!(control.dt > 0.0, "step size must be positive");
    let mut report = StepReport {
        times: Vec::new(),
        total_iterations: 0,
        cuts: 0,
    };
    let tolerance = 1e-12 * control.dt;
    let mut time = start;
    let mut dt = control.dt;
    let mut consecutive_cuts = 0;
    while time < end - tolerance {
        let step = dt.min(end - time);
        let system_backup = system.clone();
        let x_backup = x.clone();

        let result = system
            .begin_step(time + step, x)
            .map_err(NewtonError::Model)
            .and_then(|_| solver.solve(system, x));
        match result {
            Ok(newton) => {
                time += step;
                report.times.push(time);
                report.total_iterations += newton.iterations;
                consecutive_cuts = 0;
                dt = control.dt;
            }
            Err(err) if err.is_recoverable() && consecutive_cuts < control.max_cuts => {
                warn!("Step to t = {} failed ({}), halving the step size", time + step, err);
                *system = system_backup;
                *x = x_backup;
                dt = step / 2.0;
                consecutive_cuts += 1;
                report.cuts += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(report)
}
