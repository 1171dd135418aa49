use crate::deriv::{add_scaled_vec3, cross_deriv, norm_deriv, normalize_deriv, DerivMap, DerivVec3};
use crate::element::{CellType, NurbsData, ShapeFunctions};
use crate::quadrature::{integrate, rule_for_cell};
use mortar_sparse::Gid;
use nalgebra::{Point2, Point3, Unit, Vector3};

/// A node of an element geometry.
///
/// The position of a geometry node is a linear combination of the coordinates of parent nodes,
/// given by its *support*: a list of (DOF ids of the parent node, coefficient). Ordinary mesh
/// nodes have a single entry with coefficient one. Pseudo-nodes of NURBS integration elements
/// are supported by all control points of the parent patch.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryNode {
    pub position: Point3<f64>,
    pub support: Vec<([Gid; 3], f64)>,
}

impl GeometryNode {
    pub fn from_mesh_node(position: Point3<f64>, dofs: [Gid; 3]) -> Self {
        Self {
            position,
            support: vec![(dofs, 1.0)],
        }
    }
}

/// Geometric evaluation of a surface element at parametric points, with sensitivities with
/// respect to the nodal coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementGeometry {
    cell: CellType,
    nurbs: Option<NurbsData>,
    nodes: Vec<GeometryNode>,
}

impl ElementGeometry {
    /// # Panics
    ///
    /// Panics if the number of nodes does not match the cell type, or if a NURBS cell lacks NURBS data.
    pub fn new(cell: CellType, nodes: Vec<GeometryNode>, nurbs: Option<NurbsData>) -> Self {
        assert_eq!(nodes.len(), cell.num_nodes(), "node count must match cell type {}", cell);
        assert!(
            cell != CellType::Nurbs9 || nurbs.is_some(),
            "NURBS elements require knot vectors and weights"
        );
        Self { cell, nurbs, nodes }
    }

    pub fn cell(&self) -> CellType {
        self.cell
    }

    pub fn nodes(&self) -> &[GeometryNode] {
        &self.nodes
    }

    pub fn nurbs(&self) -> Option<&NurbsData> {
        self.nurbs.as_ref()
    }

    pub fn shape_functions(&self, xi: &Point2<f64>) -> ShapeFunctions<f64> {
        match &self.nurbs {
            Some(nurbs) if self.cell == CellType::Nurbs9 => nurbs.shape_functions(xi),
            _ => self
                .cell
                .shape_functions(xi)
                .unwrap_or_else(|| unreachable!("polynomial cell types always have shape functions")),
        }
    }

    fn combine_positions(&self, coefficients: impl Iterator<Item = f64>) -> Vector3<f64> {
        self.nodes
            .iter()
            .zip(coefficients)
            .map(|(node, c)| node.position.coords * c)
            .sum()
    }

    /// Derivative of `Σ_k c_k x_k` with respect to the nodal coordinates.
    fn combine_derivs(&self, coefficients: impl Iterator<Item = f64>) -> DerivVec3 {
        let mut deriv = DerivVec3::default();
        for (node, c) in self.nodes.iter().zip(coefficients) {
            if c == 0.0 {
                continue;
            }
            for (dofs, s) in &node.support {
                for d in 0..3 {
                    deriv[d].add(dofs[d], c * s);
                }
            }
        }
        deriv
    }

    pub fn position(&self, xi: &Point2<f64>) -> Point3<f64> {
        let shape = self.shape_functions(xi);
        Point3::from(self.combine_positions(shape.values.iter().copied()))
    }

    /// The covariant tangents `∂x/∂ξ` and `∂x/∂η`.
    pub fn tangents(&self, xi: &Point2<f64>) -> [Vector3<f64>; 2] {
        let shape = self.shape_functions(xi);
        [0, 1].map(|i| self.combine_positions(shape.gradients.row(i).iter().copied()))
    }

    /// The second derivatives `(∂²x/∂ξ², ∂²x/∂η², ∂²x/∂ξ∂η)`.
    pub fn second_derivatives(&self, xi: &Point2<f64>) -> [Vector3<f64>; 3] {
        let shape = self.shape_functions(xi);
        [0, 1, 2].map(|i| self.combine_positions(shape.second_derivatives.row(i).iter().copied()))
    }

    /// Non-unit normal `∂x/∂ξ × ∂x/∂η`.
    pub fn normal(&self, xi: &Point2<f64>) -> Vector3<f64> {
        let [g1, g2] = self.tangents(xi);
        g1.cross(&g2)
    }

    /// Surface Jacobian `|∂x/∂ξ × ∂x/∂η|`.
    pub fn jacobian(&self, xi: &Point2<f64>) -> f64 {
        self.normal(xi).norm()
    }

    /// Returns `None` if the element is degenerate at `xi`.
    pub fn unit_normal(&self, xi: &Point2<f64>) -> Option<Unit<Vector3<f64>>> {
        Unit::try_new(self.normal(xi), f64::EPSILON * self.characteristic_length().powi(2))
    }

    /// Parametric derivatives `∂n/∂ξ` and `∂n/∂η` of the unit normal.
    pub fn unit_normal_derivatives_xi(&self, xi: &Point2<f64>) -> [Vector3<f64>; 2] {
        let [g1, g2] = self.tangents(xi);
        let [g11, g22, g12] = self.second_derivatives(xi);
        let m = g1.cross(&g2);
        let length = m.norm();
        let n = m / length;
        let project = |dm: Vector3<f64>| (dm - n * n.dot(&dm)) / length;
        [
            project(g11.cross(&g2) + g1.cross(&g12)),
            project(g12.cross(&g2) + g1.cross(&g22)),
        ]
    }

    /// `∂x(ξ)/∂X` at fixed `ξ`.
    pub fn position_deriv(&self, xi: &Point2<f64>) -> DerivVec3 {
        let shape = self.shape_functions(xi);
        self.combine_derivs(shape.values.iter().copied())
    }

    /// Derivative of `Σ_k c_k x_k` for arbitrary nodal coefficients, such as shape function gradients.
    pub fn linear_combination_deriv(&self, coefficients: &[f64]) -> DerivVec3 {
        self.combine_derivs(coefficients.iter().copied())
    }

    pub fn tangents_deriv(&self, xi: &Point2<f64>) -> [DerivVec3; 2] {
        let shape = self.shape_functions(xi);
        [0, 1].map(|i| self.combine_derivs(shape.gradients.row(i).iter().copied()))
    }

    /// `∂(g1 × g2)/∂X` at fixed `ξ`.
    pub fn normal_deriv(&self, xi: &Point2<f64>) -> DerivVec3 {
        let [g1, g2] = self.tangents(xi);
        let [dg1, dg2] = self.tangents_deriv(xi);
        cross_deriv(&g1, &dg1, &g2, &dg2)
    }

    pub fn jacobian_deriv(&self, xi: &Point2<f64>) -> DerivMap {
        norm_deriv(&self.normal(xi), &self.normal_deriv(xi))
    }

    pub fn unit_normal_deriv(&self, xi: &Point2<f64>) -> DerivVec3 {
        normalize_deriv(&self.normal(xi), &self.normal_deriv(xi))
    }

    /// Derivative of `x(ξ)` where `ξ` itself depends on the nodal coordinates through `dxi`.
    pub fn position_total_deriv(&self, xi: &Point2<f64>, dxi: &[DerivMap; 2]) -> DerivVec3 {
        let mut deriv = self.position_deriv(xi);
        let tangents = self.tangents(xi);
        for (g, dxi) in tangents.iter().zip(dxi) {
            for d in 0..3 {
                deriv[d].add_scaled(dxi, g[d]);
            }
        }
        deriv
    }

    /// Derivative of the unit normal at `ξ(X)`, including the parametric dependence.
    pub fn unit_normal_total_deriv(&self, xi: &Point2<f64>, dxi: &[DerivMap; 2]) -> DerivVec3 {
        let mut deriv = self.unit_normal_deriv(xi);
        let dn_dxi = self.unit_normal_derivatives_xi(xi);
        for (dn, dxi) in dn_dxi.iter().zip(dxi) {
            let outer = crate::deriv::outer(dn, dxi);
            add_scaled_vec3(&mut deriv, &outer, 1.0);
        }
        deriv
    }

    pub fn area(&self) -> f64 {
        let rule = rule_for_cell(self.cell, 2 * self.cell.degree() + 1);
        integrate(&rule, |xi| self.jacobian(xi))
    }

    /// Largest distance between any node and the first node.
    pub fn characteristic_length(&self) -> f64 {
        let first = &self.nodes[0].position;
        self.nodes
            .iter()
            .map(|node| (node.position - first).norm())
            .fold(0.0_f64, f64::max)
    }

    pub fn contains_param(&self, xi: &Point2<f64>, tol: f64) -> bool {
        self.cell.contains_param(xi, tol)
    }

    /// All DOF ids the geometry depends on.
    pub fn dofs(&self) -> impl Iterator<Item = Gid> + '_ {
        self.nodes
            .iter()
            .flat_map(|node| node.support.iter().flat_map(|(dofs, _)| dofs.iter().copied()))
    }
}
