use crate::nln::{NlnInterface, NormType, QuantityType, NORM_SENTINEL};
use mortar_sparse::Vector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TestStatus {
    Converged,
    Unconverged,
    /// No interface owns the quantity, or there is no previous iterate yet.
    Unevaluated,
}

/// A convergence test on a single quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTest {
    NormF {
        quantity: QuantityType,
        norm: NormType,
        tolerance: f64,
        scaled: bool,
    },
    NormUpdate {
        quantity: QuantityType,
        norm: NormType,
        tolerance: f64,
        scaled: bool,
    },
    NormWrms {
        quantity: QuantityType,
        atol: f64,
        rtol: f64,
        tolerance: f64,
    },
}

impl StatusTest {
    pub fn quantity(&self) -> QuantityType {
        match *self {
            Self::NormF { quantity, .. } | Self::NormUpdate { quantity, .. } | Self::NormWrms { quantity, .. } => {
                quantity
            }
        }
    }

    pub fn tolerance(&self) -> f64 {
        match *self {
            Self::NormF { tolerance, .. } | Self::NormUpdate { tolerance, .. } | Self::NormWrms { tolerance, .. } => {
                tolerance
            }
        }
    }

    /// The aggregated norm over all interfaces, or `None` if no interface owns the quantity.
    ///
    /// Interfaces report the sentinel for quantities they do not own. Valid norms of several
    /// owners are combined by their maximum.
    pub fn value(
        &self,
        interfaces: &[&dyn NlnInterface],
        f: &Vector,
        x_new: &Vector,
        x_old: Option<&Vector>,
    ) -> Option<f64> {
        let quantity = self.quantity();
        let norms = interfaces.iter().map(|interface| match *self {
            Self::NormF { norm, scaled, .. } => interface.residual_norm(f, quantity, norm, scaled),
            Self::NormUpdate { norm, scaled, .. } => match x_old {
                Some(x_old) => interface.update_norm(x_new, x_old, quantity, norm, scaled),
                None => NORM_SENTINEL,
            },
            Self::NormWrms { atol, rtol, .. } => match x_old {
                Some(x_old) => interface.update_rms(x_new, x_old, atol, rtol, quantity, false),
                None => NORM_SENTINEL,
            },
        });
        norms.filter(|&value| value >= 0.0).reduce(f64::max)
    }

    pub fn check(
        &self,
        interfaces: &[&dyn NlnInterface],
        f: &Vector,
        x_new: &Vector,
        x_old: Option<&Vector>,
    ) -> TestStatus {
        match self.value(interfaces, f, x_new, x_old) {
            Some(value) if value <= self.tolerance() => TestStatus::Converged,
            Some(_) => TestStatus::Unconverged,
            None => TestStatus::Unevaluated,
        }
    }
}
