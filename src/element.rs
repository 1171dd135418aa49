//! Surface elements of the mortar interface.
//!
//! A surface element is a two-dimensional parametric patch embedded in 3D. The shape functions are
//! implemented generically over [`Real`](crate::Real) in the submodules; the geometric evaluation
//! used by the coupling pipeline is [`ElementGeometry`].
use nalgebra::{DVector, Matrix2xX, Matrix3xX, Point2, Scalar};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Real;

mod geometry;
mod int_element;
mod nurbs;
mod quadrilateral;
mod triangle;

pub use geometry::*;
pub use int_element::*;
pub use nurbs::*;
pub use quadrilateral::*;
pub use triangle::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Tri3,
    Tri6,
    Quad4,
    Quad8,
    Quad9,
    Nurbs9,
}

impl CellType {
    pub fn num_nodes(&self) -> usize {
        match self {
            Self::Tri3 => 3,
            Self::Tri6 => 6,
            Self::Quad4 => 4,
            Self::Quad8 => 8,
            Self::Quad9 | Self::Nurbs9 => 9,
        }
    }

    pub fn is_triangle(&self) -> bool {
        matches!(self, Self::Tri3 | Self::Tri6)
    }

    pub fn is_quadratic(&self) -> bool {
        !matches!(self, Self::Tri3 | Self::Quad4)
    }

    /// The linear cell type with the same reference domain.
    pub fn linear(&self) -> CellType {
        if self.is_triangle() {
            Self::Tri3
        } else {
            Self::Quad4
        }
    }

    /// Number of nodes on the boundary corners of the reference domain.
    pub fn num_corners(&self) -> usize {
        if self.is_triangle() {
            3
        } else {
            4
        }
    }

    /// Polynomial degree of the shape functions along each parametric direction.
    pub fn degree(&self) -> usize {
        if self.is_quadratic() {
            2
        } else {
            1
        }
    }

    pub fn parametric_center(&self) -> Point2<f64> {
        if self.is_triangle() {
            Point2::new(1.0 / 3.0, 1.0 / 3.0)
        } else {
            Point2::origin()
        }
    }

    /// Parametric coordinates of the nodes. For NURBS these are the Greville-like anchor points of
    /// the control net on the reference square.
    pub fn node_params(&self) -> Vec<Point2<f64>> {
        let p = Point2::new;
        match self {
            Self::Tri3 => vec![p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)],
            Self::Tri6 => vec![
                p(0.0, 0.0),
                p(1.0, 0.0),
                p(0.0, 1.0),
                p(0.5, 0.0),
                p(0.5, 0.5),
                p(0.0, 0.5),
            ],
            Self::Quad4 => QUAD_CORNERS.iter().map(|&[x, y]| p(x, y)).collect(),
            Self::Quad8 | Self::Quad9 => {
                let mut params: Vec<_> = QUAD_CORNERS.iter().map(|&[x, y]| p(x, y)).collect();
                params.extend([p(0.0, -1.0), p(1.0, 0.0), p(0.0, 1.0), p(-1.0, 0.0)]);
                if *self == Self::Quad9 {
                    params.push(p(0.0, 0.0));
                }
                params
            }
            Self::Nurbs9 => (0..9)
                .map(|k| p((k % 3) as f64 - 1.0, (k / 3) as f64 - 1.0))
                .collect(),
        }
    }

    /// Whether `xi` lies in the reference domain, enlarged by `tol`.
    pub fn contains_param(&self, xi: &Point2<f64>, tol: f64) -> bool {
        if self.is_triangle() {
            xi.x >= -tol && xi.y >= -tol && xi.x + xi.y <= 1.0 + tol
        } else {
            xi.x.abs() <= 1.0 + tol && xi.y.abs() <= 1.0 + tol
        }
    }

    /// Shape functions of the polynomial cell types. Returns `None` for [`CellType::Nurbs9`], whose
    /// basis depends on knot vectors and weights (see [`NurbsData`]).
    pub fn shape_functions(&self, xi: &Point2<f64>) -> Option<ShapeFunctions<f64>> {
        let shape = match self {
            Self::Tri3 => tri3_shape_functions(xi),
            Self::Tri6 => tri6_shape_functions(xi),
            Self::Quad4 => quad4_shape_functions(xi),
            Self::Quad8 => quad8_shape_functions(xi),
            Self::Quad9 => quad9_shape_functions(xi),
            Self::Nurbs9 => return None,
        };
        Some(shape)
    }
}

pub(crate) const QUAD_CORNERS: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tri3 => "tri3",
            Self::Tri6 => "tri6",
            Self::Quad4 => "quad4",
            Self::Quad8 => "quad8",
            Self::Quad9 => "quad9",
            Self::Nurbs9 => "nurbs9",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CellType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tri3" => Ok(Self::Tri3),
            "tri6" => Ok(Self::Tri6),
            "quad4" => Ok(Self::Quad4),
            "quad8" => Ok(Self::Quad8),
            "quad9" => Ok(Self::Quad9),
            "nurbs9" => Ok(Self::Nurbs9),
            _ => Err(format!("unknown cell type '{}'", s)),
        }
    }
}

/// Values and parametric derivatives of all shape functions of an element at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFunctions<T: Scalar> {
    pub values: DVector<T>,
    /// Column `k` holds `(∂N_k/∂ξ, ∂N_k/∂η)`.
    pub gradients: Matrix2xX<T>,
    /// Column `k` holds `(∂²N_k/∂ξ², ∂²N_k/∂η², ∂²N_k/∂ξ∂η)`.
    pub second_derivatives: Matrix3xX<T>,
}

impl<T: Real> ShapeFunctions<T> {
    pub fn zeros(num_nodes: usize) -> Self {
        Self {
            values: DVector::zeros(num_nodes),
            gradients: Matrix2xX::zeros(num_nodes),
            second_derivatives: Matrix3xX::zeros(num_nodes),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn set(&mut self, k: usize, value: T, gradient: [T; 2], second: [T; 3]) {
        self.values[k] = value;
        self.gradients[(0, k)] = gradient[0];
        self.gradients[(1, k)] = gradient[1];
        for (i, s) in second.into_iter().enumerate() {
            self.second_derivatives[(i, k)] = s;
        }
    }
}
