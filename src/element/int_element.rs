use crate::element::{tri3_shape_functions, quad4_shape_functions, CellType, ElementGeometry, GeometryNode};
use mortar_sparse::Gid;
use nalgebra::{Matrix2, Point2, Vector2};

/// A linear sub-element of a (possibly quadratic) parent element.
///
/// Coupling operates on integration elements so that the projected polygons stay planar. Each
/// integration element maps its own reference domain onto a part of the parent parameter domain
/// through the (bi)linear interpolation of its corner parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct IntElement {
    local_index: usize,
    parent: Gid,
    cell: CellType,
    corner_params: Vec<Point2<f64>>,
    corner_nodes: Vec<usize>,
    geometry: ElementGeometry,
}

impl IntElement {
    pub fn local_index(&self) -> usize {
        self.local_index
    }

    pub fn parent(&self) -> Gid {
        self.parent
    }

    /// Either [`CellType::Tri3`] or [`CellType::Quad4`].
    pub fn cell(&self) -> CellType {
        self.cell
    }

    /// Parent parameter coordinates of the corners.
    pub fn corner_params(&self) -> &[Point2<f64>] {
        &self.corner_params
    }

    /// Parent node indices of the corners. Empty for NURBS pseudo-nodes.
    pub fn corner_nodes(&self) -> &[usize] {
        &self.corner_nodes
    }

    pub fn geometry(&self) -> &ElementGeometry {
        &self.geometry
    }

    fn corner_weights(&self, xi: &Point2<f64>) -> (Vec<f64>, Vec<[f64; 2]>) {
        let shape = match self.cell {
            CellType::Tri3 => tri3_shape_functions(xi),
            _ => quad4_shape_functions(xi),
        };
        let gradients = (0..shape.num_nodes())
            .map(|k| [shape.gradients[(0, k)], shape.gradients[(1, k)]])
            .collect();
        (shape.values.iter().copied().collect(), gradients)
    }

    /// Maps a point of the integration element's reference domain to the parent parameter domain.
    pub fn parent_param(&self, xi: &Point2<f64>) -> Point2<f64> {
        let (values, _) = self.corner_weights(xi);
        let coords: Vector2<f64> = self
            .corner_params
            .iter()
            .zip(&values)
            .map(|(p, &n)| p.coords * n)
            .sum();
        Point2::from(coords)
    }

    /// Inverse of [`parent_param`](Self::parent_param). All sub-element maps are affine.
    pub fn local_param(&self, parent_xi: &Point2<f64>) -> Option<Point2<f64>> {
        let center = self.cell.parametric_center();
        let inverse = self.parent_param_jacobian(&center).try_inverse()?;
        Some(center + inverse * (parent_xi - self.parent_param(&center)))
    }

    /// `∂ξ_parent / ∂ξ_local`.
    pub fn parent_param_jacobian(&self, xi: &Point2<f64>) -> Matrix2<f64> {
        let (_, gradients) = self.corner_weights(xi);
        let mut jacobian = Matrix2::zeros();
        for (p, g) in self.corner_params.iter().zip(&gradients) {
            for (i, j) in itertools::iproduct!(0..2, 0..2) {
                jacobian[(i, j)] += p[i] * g[j];
            }
        }
        jacobian
    }
}

/// Corner tuples of the linear sub-elements of each cell type, as indices into the parent nodes.
fn split_pattern(cell: CellType) -> Vec<(CellType, Vec<usize>)> {
    use CellType::*;
    match cell {
        Tri3 => vec![(Tri3, vec![0, 1, 2])],
        Quad4 => vec![(Quad4, vec![0, 1, 2, 3])],
        Tri6 => vec![
            (Tri3, vec![0, 3, 5]),
            (Tri3, vec![3, 1, 4]),
            (Tri3, vec![5, 4, 2]),
            (Tri3, vec![3, 4, 5]),
        ],
        Quad8 => vec![
            (Tri3, vec![0, 4, 7]),
            (Tri3, vec![1, 5, 4]),
            (Tri3, vec![2, 6, 5]),
            (Tri3, vec![3, 7, 6]),
            (Quad4, vec![4, 5, 6, 7]),
        ],
        Quad9 => vec![
            (Quad4, vec![0, 4, 8, 7]),
            (Quad4, vec![4, 1, 5, 8]),
            (Quad4, vec![8, 5, 2, 6]),
            (Quad4, vec![7, 8, 6, 3]),
        ],
        // A single sub-element spanning the patch, over pseudo-nodes at the parametric corners
        Nurbs9 => vec![(Quad4, Vec::new())],
    }
}

/// Splits an element into its linear integration elements.
///
/// Linear elements yield a single integration element identical to themselves.
pub fn split_into_int_elements(parent: Gid, geometry: &ElementGeometry) -> Vec<IntElement> {
    let cell = geometry.cell();
    let node_params = cell.node_params();
    split_pattern(cell)
        .into_iter()
        .enumerate()
        .map(|(local_index, (sub_cell, corners))| {
            let (corner_params, nodes) = if cell == CellType::Nurbs9 {
                let params: Vec<_> = crate::element::QUAD_CORNERS
                    .iter()
                    .map(|&[x, y]| Point2::new(x, y))
                    .collect();
                let nodes: Vec<GeometryNode> = params.iter().map(|xi| pseudo_node(geometry, xi)).collect();
                (params, nodes)
            } else {
                let params: Vec<Point2<f64>> = corners.iter().map(|&k| node_params[k]).collect();
                let nodes: Vec<GeometryNode> = corners.iter().map(|&k| geometry.nodes()[k].clone()).collect();
                (params, nodes)
            };
            IntElement {
                local_index,
                parent,
                cell: sub_cell,
                corner_params,
                corner_nodes: corners,
                geometry: ElementGeometry::new(sub_cell, nodes, None),
            }
        })
        .collect()
}

/// A node located at the parent parameter `xi`, whose support combines the supports of all parent nodes.
fn pseudo_node(geometry: &ElementGeometry, xi: &Point2<f64>) -> GeometryNode {
    let shape = geometry.shape_functions(xi);
    let support = geometry
        .nodes()
        .iter()
        .zip(shape.values.iter())
        .filter(|(_, n)| **n != 0.0)
        .flat_map(|(node, &n)| node.support.iter().map(move |&(dofs, c)| (dofs, n * c)))
        .collect();
    GeometryNode {
        position: geometry.position(xi),
        support,
    }
}
