use crate::coupling::CouplingError;
use crate::deriv::DerivMap;
use crate::element::{ElementGeometry, ShapeFunctions};
use crate::quadrature::rule_for_cell;
use mortar_sparse::Gid;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Matrices with a condition number above this limit are treated as singular.
pub const DUAL_CONDITION_LIMIT: f64 = 1e12;

/// Coefficients of a dual basis `Λ_i = Σ_k A_ik N_k`, with `∂A_ik/∂X`.
#[derive(Debug, Clone, PartialEq)]
pub struct DualCoefficients {
    pub coefficients: DMatrix<f64>,
    /// Row-major derivatives of the coefficients.
    pub derivs: Vec<DerivMap>,
}

impl DualCoefficients {
    pub fn num_nodes(&self) -> usize {
        self.coefficients.nrows()
    }

    pub fn coefficient_deriv(&self, i: usize, k: usize) -> &DerivMap {
        &self.derivs[i * self.num_nodes() + k]
    }
}

/// Element-local matrices `D_e = diag(∫ N_i)` and `M_e = ∫ N_i N_j` over some integration domain.
#[derive(Debug, Clone)]
pub struct DualMatrices {
    d: DVector<f64>,
    m: DMatrix<f64>,
    d_derivs: Vec<DerivMap>,
    m_derivs: Vec<DerivMap>,
}

impl DualMatrices {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            d: DVector::zeros(num_nodes),
            m: DMatrix::zeros(num_nodes, num_nodes),
            d_derivs: vec![DerivMap::new(); num_nodes],
            m_derivs: vec![DerivMap::new(); num_nodes * num_nodes],
        }
    }

    pub fn d(&self) -> &DVector<f64> {
        &self.d
    }

    pub fn m(&self) -> &DMatrix<f64> {
        &self.m
    }

    /// Adds the contribution of one integration point with weight `w` (including the Jacobian).
    ///
    /// `xi_deriv` is the derivative of the point's parameter coordinates, if they depend on the
    /// nodal coordinates.
    pub fn add_point(
        &mut self,
        shape: &ShapeFunctions<f64>,
        weight: f64,
        weight_deriv: &DerivMap,
        xi_deriv: Option<&[DerivMap; 2]>,
    ) {
        let n = self.d.len();
        let value_derivs: Vec<DerivMap> = (0..n)
            .map(|i| match xi_deriv {
                Some([dxi, deta]) => {
                    let mut dn = dxi.scaled(shape.gradients[(0, i)]);
                    dn.add_scaled(deta, shape.gradients[(1, i)]);
                    dn
                }
                None => DerivMap::new(),
            })
            .collect();

        for i in 0..n {
            let ni = shape.values[i];
            self.d[i] += weight * ni;
            self.d_derivs[i].add_scaled(weight_deriv, ni);
            self.d_derivs[i].add_scaled(&value_derivs[i], weight);
            for j in 0..n {
                let nj = shape.values[j];
                self.m[(i, j)] += weight * ni * nj;
                let entry = &mut self.m_derivs[i * n + j];
                entry.add_scaled(weight_deriv, ni * nj);
                entry.add_scaled(&value_derivs[i], weight * nj);
                entry.add_scaled(&value_derivs[j], weight * ni);
            }
        }
    }

    /// Ratio of the largest to the smallest eigenvalue of `M_e`, infinite if `M_e` is not positive definite.
    pub fn condition_number(&self) -> f64 {
        let eigenvalues = SymmetricEigen::new(self.m.clone()).eigenvalues;
        let max = eigenvalues.max();
        let min = eigenvalues.min();
        if min <= 0.0 {
            f64::INFINITY
        } else {
            max / min
        }
    }

    /// `A = D_e M_e⁻¹` with `∂A = ∂D_e M_e⁻¹ - A ∂M_e M_e⁻¹`.
    pub fn coefficients(&self, element: Gid) -> Result<DualCoefficients, CouplingError> {
        let n = self.d.len();
        if self.condition_number() > DUAL_CONDITION_LIMIT {
            return Err(CouplingError::SingularDualMatrix(element));
        }
        let m_inv = self
            .m
            .clone()
            .try_inverse()
            .ok_or(CouplingError::SingularDualMatrix(element))?;
        let a = DMatrix::from_diagonal(&self.d) * &m_inv;

        let mut derivs = vec![DerivMap::new(); n * n];
        for i in 0..n {
            for k in 0..n {
                let entry = &mut derivs[i * n + k];
                entry.add_scaled(&self.d_derivs[i], m_inv[(i, k)]);
                for j in 0..n {
                    for l in 0..n {
                        let c = a[(i, j)] * m_inv[(l, k)];
                        if c != 0.0 {
                            entry.add_scaled(&self.m_derivs[j * n + l], -c);
                        }
                    }
                }
            }
        }
        Ok(DualCoefficients {
            coefficients: a,
            derivs,
        })
    }
}

/// Dual coefficients integrated over the full slave element.
pub fn full_element_dual(geometry: &ElementGeometry, element: Gid) -> Result<DualCoefficients, CouplingError> {
    let n = geometry.nodes().len();
    let mut matrices = DualMatrices::new(n);
    let (weights, points) = rule_for_cell(geometry.cell(), 2 * geometry.cell().degree() + 2);
    for (w, xi) in weights.iter().zip(&points) {
        let shape = geometry.shape_functions(xi);
        let jacobian = geometry.jacobian(xi);
        let jacobian_deriv = geometry.jacobian_deriv(xi).scaled(*w);
        matrices.add_point(&shape, w * jacobian, &jacobian_deriv, None);
    }
    matrices.coefficients(element)
}
