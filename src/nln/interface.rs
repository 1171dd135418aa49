use crate::nln::norms::{root_mean_square_norm, vector_norm};
use mortar_sparse::{Map, SparseMatrix, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Returned by the norm callbacks for quantities that an interface does not own.
pub const NORM_SENTINEL: f64 = -1.0;

/// The physical quantity a part of the solution vector belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityType {
    Structure,
    LagrangeMultiplier,
    Contact,
    Porofluid,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormType {
    One,
    Two,
    Max,
}

/// The corrector system requested from [`NlnInterface::compute_correction_system`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CorrectionType {
    /// Second order correction on the full system. The structure contributes its stiffness and the
    /// constraint the saddle-point block `[0 Bᵀ; B 0]`.
    SecondOrder,
    /// Correction of the constraint residual only. The constraint contributes `B` with multiplier
    /// rows and the structure contributes no entries.
    ConstraintOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKeywordError(pub String);

impl Display for ParseKeywordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "unknown keyword '{}'", self.0)
    }
}

impl std::error::Error for ParseKeywordError {}

impl Display for QuantityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Structure => "structure",
            Self::LagrangeMultiplier => "lagrange_multiplier",
            Self::Contact => "contact",
            Self::Porofluid => "porofluid",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for QuantityType {
    type Err = ParseKeywordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structure" => Ok(Self::Structure),
            "lagrange_multiplier" | "lm" => Ok(Self::LagrangeMultiplier),
            "contact" => Ok(Self::Contact),
            "porofluid" => Ok(Self::Porofluid),
            _ => Err(ParseKeywordError(s.to_string())),
        }
    }
}

impl Display for NormType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::One => "one",
            Self::Two => "two",
            Self::Max => "max",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for NormType {
    type Err = ParseKeywordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "one" | "l1" => Ok(Self::One),
            "two" | "l2" => Ok(Self::Two),
            "max" | "inf" => Ok(Self::Max),
            _ => Err(ParseKeywordError(s.to_string())),
        }
    }
}

/// Callbacks a Newton solver invokes on one physical field of the problem.
///
/// The solution `x` and residual `F` are keyed by the global map of the whole problem. An
/// interface reads and writes only the entries it owns.
pub trait NlnInterface {
    /// The quantities this interface owns. Each maps to the DOFs returned by
    /// [`quantity_dofs`](Self::quantity_dofs).
    fn quantities(&self) -> &[QuantityType];

    /// The DOFs of `quantity` in the global map, or `None` if this interface does not own it.
    fn quantity_dofs(&self, quantity: QuantityType) -> Option<&Arc<Map>>;

    /// Writes this interface's part of `F(x)` into `f`.
    fn compute_residual(&mut self, x: &Vector, f: &mut Vector) -> eyre::Result<()>;

    /// Evaluates and stores the Jacobian contribution of this interface at `x`.
    fn compute_jacobian(&mut self, x: &Vector) -> eyre::Result<()>;

    fn compute_f_and_jacobian(&mut self, x: &Vector, f: &mut Vector) -> eyre::Result<()> {
        self.compute_residual(x, f)?;
        self.compute_jacobian(x)
    }

    /// The stored Jacobian contribution.
    fn jacobian(&self) -> Option<&SparseMatrix>;

    /// Builds a corrector system at `x` without touching the stored Jacobian.
    fn compute_correction_system(&mut self, kind: CorrectionType, x: &Vector) -> eyre::Result<SparseMatrix>;

    fn is_saddle_point_system(&self) -> bool {
        false
    }

    fn is_condensed_system(&self) -> bool {
        false
    }

    fn residual_norm(&self, f: &Vector, quantity: QuantityType, norm: NormType, scaled: bool) -> f64 {
        match self.quantity_dofs(quantity).map(|dofs| f.extract(dofs)) {
            Some(Ok(part)) => vector_norm(&part, norm, scaled),
            _ => NORM_SENTINEL,
        }
    }

    fn update_norm(
        &self,
        x_new: &Vector,
        x_old: &Vector,
        quantity: QuantityType,
        norm: NormType,
        scaled: bool,
    ) -> f64 {
        match increment_on(self, x_new, x_old, quantity) {
            Some((_, dx)) => vector_norm(&dx, norm, scaled),
            None => NORM_SENTINEL,
        }
    }

    fn update_rms(
        &self,
        x_new: &Vector,
        x_old: &Vector,
        atol: f64,
        rtol: f64,
        quantity: QuantityType,
        disable_weighting: bool,
    ) -> f64 {
        match increment_on(self, x_new, x_old, quantity) {
            Some((x, dx)) => root_mean_square_norm(atol, rtol, &x, &dx, disable_weighting),
            None => NORM_SENTINEL,
        }
    }

    fn previous_norm(&self, x_old: &Vector, quantity: QuantityType, norm: NormType, scaled: bool) -> f64 {
        match self.quantity_dofs(quantity).map(|dofs| x_old.extract(dofs)) {
            Some(Ok(part)) => vector_norm(&part, norm, scaled),
            _ => NORM_SENTINEL,
        }
    }
}

/// `x_new` and `x_new - x_old` restricted to the DOFs of `quantity`.
fn increment_on<I: NlnInterface + ?Sized>(
    interface: &I,
    x_new: &Vector,
    x_old: &Vector,
    quantity: QuantityType,
) -> Option<(Vector, Vector)> {
    let dofs = interface.quantity_dofs(quantity)?;
    let x = x_new.extract(dofs).ok()?;
    let mut dx = x.clone();
    dx.update(-1.0, &x_old.extract(dofs).ok()?, 1.0);
    Some((x, dx))
}
