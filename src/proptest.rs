//! Strategies for generating surface elements in property tests.
use crate::element::{CellType, ElementGeometry, GeometryNode};
use ::proptest::prelude::*;
use nalgebra::{Point2, Point3};

/// Points inside the reference domain of `cell`, kept away from the boundary by `margin`.
pub fn parametric_point(cell: CellType, margin: f64) -> impl Strategy<Value = Point2<f64>> {
    let range = (-1.0 + margin)..(1.0 - margin);
    [range.clone(), range].prop_map(move |[a, b]| {
        if cell.is_triangle() {
            // Fold the square onto the triangle (0, 0), (1, 0), (0, 1)
            let (s, t) = ((a + 1.0) / 2.0, (b + 1.0) / 2.0);
            if s + t > 1.0 {
                Point2::new(1.0 - s, 1.0 - t)
            } else {
                Point2::new(s, t)
            }
        } else {
            Point2::new(a, b)
        }
    })
}

/// Quad4 elements obtained by perturbing the unit square `[0, 1]²` in all three directions.
///
/// Node `k` has the DOFs `3k..3k + 3`. The perturbation is small enough for the element to stay
/// convex and counter-clockwise seen from `+z`.
pub fn perturbed_quad4() -> impl Strategy<Value = ElementGeometry> {
    let offset = || [-0.15..0.15, -0.15..0.15, -0.15..0.15];
    [offset(), offset(), offset(), offset()].prop_map(|offsets| {
        let corners = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let nodes = corners
            .iter()
            .zip(offsets)
            .enumerate()
            .map(|(k, ([x, y], [dx, dy, dz]))| {
                let dofs = [3 * k, 3 * k + 1, 3 * k + 2];
                GeometryNode::from_mesh_node(Point3::new(x + dx, y + dy, dz), dofs)
            })
            .collect();
        ElementGeometry::new(CellType::Quad4, nodes, None)
    })
}
