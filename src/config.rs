//! Mortar parameters.
//!
//! Parameters can be deserialized with serde (snake_case keys and values) or read from a flat
//! `name -> value` registry with the upper-case keys used by input files, see
//! [`MortarParameters::from_registry`]. Combinations that are not supported are rejected by
//! [`MortarParameters::validate`] at setup time.
use crate::element::CellType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

macro_rules! impl_keyword {
    ($type:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl Display for $type {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $(Self::$variant => $name,)+
                };
                write!(f, "{}", name)
            }
        }

        impl FromStr for $type {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($name) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(ConfigError::InvalidValue {
                    key: stringify!($type).to_string(),
                    value: s.to_string(),
                })
            }
        }
    };
}

/// Family of Lagrange multiplier shape functions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeFunction {
    Standard,
    Dual,
    PetrovGalerkin,
}

/// Lagrange multiplier interpolation on quadratic elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmQuadratic {
    Quadratic,
    Linear,
    PiecewiseLinear,
    Constant,
    Undefined,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    /// Clip, triangulate and integrate over integration cells.
    Segments,
    /// Integrate on the slave element, back-projecting Gauss points onto the masters.
    Elements,
    /// Element-based, with segment-based integration on boundary elements.
    #[serde(rename = "elements_bs")]
    ElementsBoundarySegmentation,
}

/// When to re-assemble consistent dual coefficients.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DualConsistency {
    None,
    Boundary,
    All,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Mortar,
    Gpts,
}

/// Global constraint handling.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Lagrange,
    Penalty,
    AugmentedLagrange,
    UzawaAugmented,
    Condensed,
    SaddlePoint,
    Nitsche,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshRelation {
    Tying,
    Sliding,
}

impl_keyword!(ShapeFunction {
    Standard => "standard",
    Dual => "dual",
    PetrovGalerkin => "petrov_galerkin",
});

impl_keyword!(LmQuadratic {
    Quadratic => "quadratic",
    Linear => "linear",
    PiecewiseLinear => "piecewise_linear",
    Constant => "constant",
    Undefined => "undefined",
});

impl_keyword!(IntegrationType {
    Segments => "segments",
    Elements => "elements",
    ElementsBoundarySegmentation => "elements_bs",
});

impl_keyword!(DualConsistency {
    None => "none",
    Boundary => "boundary",
    All => "all",
});

impl_keyword!(Algorithm {
    Mortar => "mortar",
    Gpts => "gpts",
});

impl_keyword!(Strategy {
    Lagrange => "lagrange",
    Penalty => "penalty",
    AugmentedLagrange => "augmented_lagrange",
    UzawaAugmented => "uzawa_augmented",
    Condensed => "condensed",
    SaddlePoint => "saddle_point",
    Nitsche => "nitsche",
});

impl_keyword!(MeshRelation {
    Tying => "tying",
    Sliding => "sliding",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearParameters {
    pub max_iter: usize,
    pub conv_tol: f64,
}

impl Default for NonlinearParameters {
    fn default() -> Self {
        Self {
            max_iter: 10,
            conv_tol: 1e-8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MortarParameters {
    pub shape_function: ShapeFunction,
    pub lm_quad: LmQuadratic,
    pub int_type: IntegrationType,
    pub lm_dual_consistent: DualConsistency,
    pub algorithm: Algorithm,
    pub strategy: Strategy,
    pub mesh_relation: MeshRelation,
    /// Enlargement of the search bounding boxes relative to the element size.
    pub search_param: f64,
    pub penalty_param: f64,
    pub nonlinear: NonlinearParameters,
}

impl Default for MortarParameters {
    fn default() -> Self {
        Self {
            shape_function: ShapeFunction::Dual,
            lm_quad: LmQuadratic::Quadratic,
            int_type: IntegrationType::Segments,
            lm_dual_consistent: DualConsistency::Boundary,
            algorithm: Algorithm::Mortar,
            strategy: Strategy::Condensed,
            mesh_relation: MeshRelation::Tying,
            search_param: 0.3,
            penalty_param: 1e3,
            nonlinear: NonlinearParameters::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    UnknownKey(String),
    InvalidValue { key: String, value: String },
    /// The parameters are individually valid but cannot be combined.
    InvalidCombination(String),
    Unsupported(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey(key) => write!(f, "unknown mortar parameter '{}'", key),
            Self::InvalidValue { key, value } => write!(f, "invalid value '{}' for {}", value, key),
            Self::InvalidCombination(msg) => write!(f, "invalid parameter combination: {}", msg),
            Self::Unsupported(msg) => write!(f, "unsupported: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl MortarParameters {
    /// Reads parameters from `name -> value` pairs. Missing keys keep their defaults.
    pub fn from_registry<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self, ConfigError> {
        let mut params = Self::default();
        for (key, value) in entries {
            match key {
                "SHAPE_FUNCTION" => params.shape_function = parse(key, value)?,
                "LM_QUAD" => params.lm_quad = parse(key, value)?,
                "INT_TYPE" => params.int_type = parse(key, value)?,
                "LM_DUAL_CONSISTENT" => params.lm_dual_consistent = parse(key, value)?,
                "ALGORITHM" => params.algorithm = parse(key, value)?,
                "STRATEGY" => params.strategy = parse(key, value)?,
                "MESH_RELATION" => params.mesh_relation = parse(key, value)?,
                "SEARCH_PARAM" => params.search_param = parse(key, value)?,
                "PENALTY_PARAM" => params.penalty_param = parse(key, value)?,
                "NONLINEAR.ITEMAX" => params.nonlinear.max_iter = parse(key, value)?,
                "NONLINEAR.CONVTOL" => params.nonlinear.conv_tol = parse(key, value)?,
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            }
        }
        Ok(params)
    }

    pub fn is_condensed(&self) -> bool {
        self.strategy == Strategy::Condensed
    }

    /// Whether the slave operator `D` is diagonal.
    pub fn has_dual_lm(&self) -> bool {
        matches!(self.shape_function, ShapeFunction::Dual | ShapeFunction::PetrovGalerkin)
    }

    /// Checks the parameter combination independently of the interface discretization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        use ConfigError::*;
        if self.algorithm == Algorithm::Gpts {
            return Err(Unsupported("gauss-point-to-segment coupling".to_string()));
        }
        match self.strategy {
            Strategy::AugmentedLagrange | Strategy::UzawaAugmented | Strategy::Nitsche => {
                return Err(Unsupported(format!("strategy {}", self.strategy)));
            }
            _ => {}
        }
        if self.is_condensed() && self.shape_function == ShapeFunction::Standard {
            return Err(InvalidCombination(
                "condensation requires dual or petrov_galerkin shape functions".to_string(),
            ));
        }
        if self.mesh_relation == MeshRelation::Sliding && !self.is_condensed() {
            return Err(InvalidCombination("mesh sliding is only available with condensation".to_string()));
        }
        if self.lm_quad == LmQuadratic::Linear && self.is_condensed() {
            return Err(InvalidCombination("linear LM interpolation requires a saddle point system".to_string()));
        }
        if self.lm_quad == LmQuadratic::PiecewiseLinear && self.shape_function != ShapeFunction::Standard {
            return Err(InvalidCombination(
                "piecewise_linear LM interpolation requires standard shape functions".to_string(),
            ));
        }
        if !(self.search_param >= 0.0) {
            return Err(InvalidValue {
                key: "SEARCH_PARAM".to_string(),
                value: self.search_param.to_string(),
            });
        }
        if self.strategy == Strategy::Penalty && !(self.penalty_param > 0.0) {
            return Err(InvalidValue {
                key: "PENALTY_PARAM".to_string(),
                value: self.penalty_param.to_string(),
            });
        }
        if self.nonlinear.max_iter == 0 {
            return Err(InvalidValue {
                key: "NONLINEAR.ITEMAX".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Checks the cell types of the slave surface against the LM interpolation.
    pub fn validate_for_cells(&self, cells: impl IntoIterator<Item = CellType>) -> Result<(), ConfigError> {
        use ConfigError::InvalidCombination;
        self.validate()?;
        for cell in cells {
            if !cell.is_quadratic() {
                continue;
            }
            match self.lm_quad {
                LmQuadratic::Constant | LmQuadratic::Undefined => {
                    return Err(InvalidCombination(format!(
                        "LM_QUAD {} is not defined on {} elements",
                        self.lm_quad, cell
                    )));
                }
                LmQuadratic::Quadratic if self.shape_function == ShapeFunction::Standard && cell == CellType::Quad8 => {
                    return Err(InvalidCombination(
                        "quadratic standard LM interpolation is not available on quad8".to_string(),
                    ));
                }
                LmQuadratic::PiecewiseLinear | LmQuadratic::Linear if cell == CellType::Nurbs9 => {
                    return Err(InvalidCombination(format!("LM_QUAD {} on nurbs9 elements", self.lm_quad)));
                }
                _ => {}
            }
            // Dual bases with positive weights do not exist for these serendipity-type spaces
            if self.has_dual_lm() && matches!(cell, CellType::Tri6 | CellType::Quad8) {
                return Err(InvalidCombination(format!("dual shape functions on {} elements", cell)));
            }
        }
        Ok(())
    }
}
