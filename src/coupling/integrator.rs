use crate::coupling::{
    project_along_direction, project_along_direction_deriv, CouplingError, IntCell, ProjectorPair, ProjectorSettings,
    DualCoefficients, MORTAR_PROJ_TOL,
};
use crate::deriv::{dot_const, DerivMap, DerivVec3};
use crate::element::{quad4_shape_functions, tri3_shape_functions, CellType, ElementGeometry, IntElement, ShapeFunctions};
use crate::quadrature::{rule_for_cell, triangle_rule};
use mortar_sparse::Gid;
use nalgebra::{Matrix2, Point2, Point3, Vector2};
use rustc_hash::FxHashMap;

/// Mortar contributions of all pairs coupled to one slave node.
///
/// `d` is keyed by slave node id and `m` by master node id. The derivative maps are keyed by
/// coordinate DOF ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeCoupling {
    pub d: FxHashMap<Gid, f64>,
    pub m: FxHashMap<Gid, f64>,
    /// Weighted gap.
    pub gap: f64,
    pub d_derivs: FxHashMap<Gid, DerivMap>,
    pub m_derivs: FxHashMap<Gid, DerivMap>,
    pub gap_deriv: DerivMap,
}

impl NodeCoupling {
    fn merge(&mut self, other: NodeCoupling) {
        for (gid, value) in other.d {
            *self.d.entry(gid).or_default() += value;
        }
        for (gid, value) in other.m {
            *self.m.entry(gid).or_default() += value;
        }
        for (gid, deriv) in other.d_derivs {
            self.d_derivs.entry(gid).or_default().add_scaled(&deriv, 1.0);
        }
        for (gid, deriv) in other.m_derivs {
            self.m_derivs.entry(gid).or_default().add_scaled(&deriv, 1.0);
        }
        self.gap += other.gap;
        self.gap_deriv.add_scaled(&other.gap_deriv, 1.0);
    }

    /// `Σ_j M_ij`.
    pub fn m_row_sum(&self) -> f64 {
        self.m.values().sum()
    }
}

/// Per-node mortar contributions keyed by slave node id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouplingContributions {
    nodes: FxHashMap<Gid, NodeCoupling>,
}

impl CouplingContributions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, gid: Gid) -> Option<&NodeCoupling> {
        self.nodes.get(&gid)
    }

    pub fn node_mut(&mut self, gid: Gid) -> &mut NodeCoupling {
        self.nodes.entry(gid).or_default()
    }

    /// Nodes in increasing id order.
    pub fn iter(&self) -> impl Iterator<Item = (Gid, &NodeCoupling)> {
        let mut nodes: Vec<_> = self.nodes.iter().map(|(&gid, node)| (gid, node)).collect();
        nodes.sort_unstable_by_key(|(gid, _)| *gid);
        nodes.into_iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn merge(&mut self, other: CouplingContributions) {
        for (gid, node) in other.nodes {
            self.node_mut(gid).merge(node);
        }
    }
}

/// Lagrange multiplier basis on the slave element.
#[derive(Debug, Copy, Clone)]
pub enum LmBasis<'a> {
    /// The slave shape functions.
    Standard,
    /// Shape functions of the corner nodes of the linear cell with the same reference domain.
    Linear,
    /// Linear shape functions of the slave integration element containing the point.
    PiecewiseLinear(&'a IntElement),
    Dual(&'a DualCoefficients),
}

/// Values and parametric gradients of the multiplier basis at one point. `coefficient_derivs`
/// holds the derivative of each basis function at fixed parameter coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LmValues {
    pub values: Vec<f64>,
    pub gradients: Vec<Vector2<f64>>,
    pub coefficient_derivs: Vec<DerivMap>,
}

impl LmValues {
    fn zeros(n: usize) -> Self {
        Self {
            values: vec![0.0; n],
            gradients: vec![Vector2::zeros(); n],
            coefficient_derivs: vec![DerivMap::new(); n],
        }
    }
}

fn gradient(shape: &ShapeFunctions<f64>, k: usize) -> Vector2<f64> {
    shape.gradients.column(k).into_owned()
}

/// Indices of the corner nodes of the parent element, in the node order of its linear cell.
fn corner_indices(cell: CellType) -> &'static [usize] {
    match cell {
        CellType::Tri3 | CellType::Tri6 => &[0, 1, 2],
        CellType::Nurbs9 => &[0, 2, 8, 6],
        _ => &[0, 1, 2, 3],
    }
}

impl<'a> LmBasis<'a> {
    pub fn evaluate(&self, slave: &ElementGeometry, shape: &ShapeFunctions<f64>, xi: &Point2<f64>) -> LmValues {
        let n = shape.num_nodes();
        match self {
            Self::Standard => LmValues {
                values: shape.values.iter().copied().collect(),
                gradients: (0..n).map(|k| gradient(shape, k)).collect(),
                coefficient_derivs: vec![DerivMap::new(); n],
            },
            Self::Linear => {
                let cell = slave.cell();
                let linear = if cell.is_triangle() {
                    tri3_shape_functions(xi)
                } else {
                    quad4_shape_functions(xi)
                };
                let mut lm = LmValues::zeros(n);
                for (local, &k) in corner_indices(cell).iter().enumerate() {
                    lm.values[k] = linear.values[local];
                    lm.gradients[k] = gradient(&linear, local);
                }
                lm
            }
            Self::PiecewiseLinear(int_element) => {
                if int_element.corner_nodes().is_empty() {
                    return Self::Standard.evaluate(slave, shape, xi);
                }
                let mut lm = LmValues::zeros(n);
                let Some(local) = int_element.local_param(xi) else {
                    return lm;
                };
                let linear = if int_element.cell().is_triangle() {
                    tri3_shape_functions(&local)
                } else {
                    quad4_shape_functions(&local)
                };
                // ∇_parent = J⁻ᵀ ∇_local
                let jacobian: Matrix2<f64> = int_element.parent_param_jacobian(&local);
                let inverse_t = jacobian.try_inverse().map(|inv| inv.transpose()).unwrap_or_else(Matrix2::zeros);
                for (c, &k) in int_element.corner_nodes().iter().enumerate() {
                    lm.values[k] = linear.values[c];
                    lm.gradients[k] = inverse_t * gradient(&linear, c);
                }
                lm
            }
            Self::Dual(dual) => {
                let a = &dual.coefficients;
                let mut lm = LmValues::zeros(n);
                for i in 0..n {
                    for k in 0..n {
                        lm.values[i] += a[(i, k)] * shape.values[k];
                        lm.gradients[i] += gradient(shape, k) * a[(i, k)];
                        lm.coefficient_derivs[i].add_scaled(dual.coefficient_deriv(i, k), shape.values[k]);
                    }
                }
                lm
            }
        }
    }
}

/// An integration point of an element pair.
///
/// `weight` includes the Jacobian of the integration domain. The parameter coordinates on the
/// slave and master parents carry their derivatives with respect to the nodal coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationPoint {
    pub weight: f64,
    pub weight_deriv: DerivMap,
    pub slave_xi: Point2<f64>,
    pub slave_xi_deriv: [DerivMap; 2],
    pub master_xi: Point2<f64>,
    pub master_xi_deriv: [DerivMap; 2],
}

/// Slave and master parents of a pair, with the ids of their nodes.
#[derive(Debug, Clone, Copy)]
pub struct PairContext<'a> {
    pub slave: &'a ElementGeometry,
    pub slave_nodes: &'a [Gid],
    pub master: &'a ElementGeometry,
    pub master_nodes: &'a [Gid],
    pub lm: LmBasis<'a>,
    /// Lump `D` onto its diagonal, as for dual and Petrov-Galerkin multipliers.
    pub lumped: bool,
}

fn shape_derivs(shape: &ShapeFunctions<f64>, xi_deriv: &[DerivMap; 2]) -> Vec<DerivMap> {
    (0..shape.num_nodes())
        .map(|k| {
            let mut d = xi_deriv[0].scaled(shape.gradients[(0, k)]);
            d.add_scaled(&xi_deriv[1], shape.gradients[(1, k)]);
            d
        })
        .collect()
}

/// Derivative of `a b c` for scalar factors with derivatives.
fn product_deriv(terms: [(f64, &DerivMap); 3]) -> DerivMap {
    let [(a, da), (b, db), (c, dc)] = terms;
    let mut d = da.scaled(b * c);
    d.add_scaled(db, a * c);
    d.add_scaled(dc, a * b);
    d
}

/// Accumulates `D`, `M` and the weighted gap of one integration point.
///
/// Returns `false` without contributing if the slave normal is undefined at the point.
pub fn integrate_point(ctx: &PairContext, point: &IntegrationPoint, contributions: &mut CouplingContributions) -> bool {
    let slave_shape = ctx.slave.shape_functions(&point.slave_xi);
    let master_shape = ctx.master.shape_functions(&point.master_xi);
    let Some(normal) = ctx.slave.unit_normal(&point.slave_xi) else {
        return false;
    };
    let normal = normal.into_inner();
    let lm = ctx.lm.evaluate(ctx.slave, &slave_shape, &point.slave_xi);

    let slave_derivs = shape_derivs(&slave_shape, &point.slave_xi_deriv);
    let master_derivs = shape_derivs(&master_shape, &point.master_xi_deriv);
    let lm_derivs: Vec<DerivMap> = (0..lm.values.len())
        .map(|i| {
            let mut d = lm.coefficient_derivs[i].clone();
            d.add_scaled(&point.slave_xi_deriv[0], lm.gradients[i].x);
            d.add_scaled(&point.slave_xi_deriv[1], lm.gradients[i].y);
            d
        })
        .collect();

    // g = (x_m - x_s) · n_s
    let x_s = ctx.slave.position(&point.slave_xi);
    let x_m = ctx.master.position(&point.master_xi);
    let rel = x_m - x_s;
    let gap = rel.dot(&normal);
    let dx_s = ctx.slave.position_total_deriv(&point.slave_xi, &point.slave_xi_deriv);
    let dx_m = ctx.master.position_total_deriv(&point.master_xi, &point.master_xi_deriv);
    let dn = ctx.slave.unit_normal_total_deriv(&point.slave_xi, &point.slave_xi_deriv);
    let mut drel: DerivVec3 = dx_m;
    crate::deriv::add_scaled_vec3(&mut drel, &dx_s, -1.0);
    let mut gap_deriv = dot_const(&normal, &drel);
    gap_deriv.add_scaled(&dot_const(&rel, &dn), 1.0);

    let w = point.weight;
    let dw = &point.weight_deriv;
    let unit = DerivMap::new();
    for (i, &node_i) in ctx.slave_nodes.iter().enumerate() {
        let lm_i = lm.values[i];
        if lm_i == 0.0 && lm_derivs[i].is_empty() {
            continue;
        }
        let dlm_i = &lm_derivs[i];
        let node = contributions.node_mut(node_i);

        if ctx.lumped {
            *node.d.entry(node_i).or_default() += w * lm_i;
            let d = product_deriv([(w, dw), (lm_i, dlm_i), (1.0, &unit)]);
            node.d_derivs.entry(node_i).or_default().add_scaled(&d, 1.0);
        } else {
            for (j, &node_j) in ctx.slave_nodes.iter().enumerate() {
                let n_j = slave_shape.values[j];
                *node.d.entry(node_j).or_default() += w * lm_i * n_j;
                let d = product_deriv([(w, dw), (lm_i, dlm_i), (n_j, &slave_derivs[j])]);
                node.d_derivs.entry(node_j).or_default().add_scaled(&d, 1.0);
            }
        }

        for (j, &node_j) in ctx.master_nodes.iter().enumerate() {
            let n_j = master_shape.values[j];
            *node.m.entry(node_j).or_default() += w * lm_i * n_j;
            let d = product_deriv([(w, dw), (lm_i, dlm_i), (n_j, &master_derivs[j])]);
            node.m_derivs.entry(node_j).or_default().add_scaled(&d, 1.0);
        }

        node.gap += w * lm_i * gap;
        let d = product_deriv([(w, dw), (lm_i, dlm_i), (gap, &gap_deriv)]);
        node.gap_deriv.add_scaled(&d, 1.0);
    }
    true
}

/// Back-projects the Gauss points of an integration cell onto the slave and master parents along
/// the auxiliary plane normal.
///
/// `initial` holds the starting parameter coordinates on the slave and master parents.
pub fn cell_points(
    cell: &IntCell,
    slave: &ElementGeometry,
    master: &ElementGeometry,
    projectors: &ProjectorPair,
    initial: (Point2<f64>, Point2<f64>),
) -> Result<Vec<IntegrationPoint>, CouplingError> {
    let degree = (2 * slave.cell().degree().max(master.cell().degree()) + 1).min(5);
    let (weights, etas) =
        triangle_rule(degree).unwrap_or_else(|| unreachable!("triangle rules exist up to degree 5"));
    let jacobian = cell.jacobian();
    let jacobian_deriv = cell.jacobian_deriv();
    let n = &cell.aux_normal;
    let dn = &cell.aux_normal_deriv;

    let project = |x: &Point3<f64>,
                   dx: &DerivVec3,
                   target: &ElementGeometry,
                   element: Gid,
                   settings: &ProjectorSettings,
                   start: Point2<f64>|
     -> Result<(Point2<f64>, [DerivMap; 2]), CouplingError> {
        let projection = project_along_direction(x, n, target, Some(start), settings);
        if !projection.converged {
            return Err(CouplingError::ProjectionFailed { element });
        }
        let deriv = project_along_direction_deriv(&projection, dx, n, dn, target)
            .ok_or(CouplingError::ProjectionFailed { element })?;
        Ok((projection.xi, deriv.xi))
    };

    weights
        .iter()
        .zip(&etas)
        .map(|(w, eta)| -> Result<IntegrationPoint, CouplingError> {
            let x = cell.map(eta);
            let dx = cell.map_deriv(eta);
            let (slave_xi, slave_xi_deriv) = project(&x, &dx, slave, cell.slave, &projectors.onto_slave, initial.0)?;
            let (master_xi, master_xi_deriv) =
                project(&x, &dx, master, cell.master, &projectors.onto_master, initial.1)?;
            Ok(IntegrationPoint {
                weight: w * jacobian,
                weight_deriv: jacobian_deriv.scaled(*w),
                slave_xi,
                slave_xi_deriv,
                master_xi,
                master_xi_deriv,
            })
        })
        .collect()
}

/// Element-based integration points of a slave element.
///
/// Each slave Gauss point is projected along the slave unit normal onto the masters in turn and
/// assigned to the first master that contains its projection within [`MORTAR_PROJ_TOL`]. Returns
/// the points with the index of their master, and whether every Gauss point found a master.
pub fn element_points(
    slave: &ElementGeometry,
    masters: &[&ElementGeometry],
    onto_master: &[ProjectorSettings],
) -> (Vec<(usize, IntegrationPoint)>, bool) {
    let (weights, xis) = rule_for_cell(slave.cell(), 2 * slave.cell().degree() + 1);
    let mut points = Vec::with_capacity(xis.len());
    let mut covered = true;
    for (w, xi) in weights.iter().zip(&xis) {
        let Some(normal) = slave.unit_normal(xi) else {
            covered = false;
            continue;
        };
        let normal = normal.into_inner();
        let x = slave.position(xi);
        let dx = slave.position_deriv(xi);
        let dn = slave.unit_normal_deriv(xi);

        let found = masters.iter().zip(onto_master).enumerate().find_map(|(index, (master, settings))| {
            let projection = project_along_direction(&x, &normal, master, None, settings);
            if !projection.converged || !master.contains_param(&projection.xi, MORTAR_PROJ_TOL) {
                return None;
            }
            let deriv = project_along_direction_deriv(&projection, &dx, &normal, &dn, master)?;
            Some((index, projection.xi, deriv.xi))
        });
        match found {
            Some((index, master_xi, master_xi_deriv)) => points.push((
                index,
                IntegrationPoint {
                    weight: w * slave.jacobian(xi),
                    weight_deriv: slave.jacobian_deriv(xi).scaled(*w),
                    slave_xi: *xi,
                    slave_xi_deriv: Default::default(),
                    master_xi,
                    master_xi_deriv,
                },
            )),
            None => covered = false,
        }
    }
    (points, covered)
}
