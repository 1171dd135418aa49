use crate::coupling::{AuxPlane, Vertex};
use crate::deriv::{add_scaled_vec3, cross_deriv, norm_deriv, DerivMap, DerivVec3};
use itertools::Itertools;
use mortar_geometry::triangulate_convex_delaunay;
use mortar_sparse::Gid;
use nalgebra::{Point2, Point3, Vector3};

/// A triangular integration cell on the auxiliary plane.
#[derive(Debug, Clone, PartialEq)]
pub struct IntCell {
    pub local_id: usize,
    pub slave: Gid,
    pub master: Gid,
    pub vertices: [Point3<f64>; 3],
    pub vertex_derivs: [DerivVec3; 3],
    pub aux_normal: Vector3<f64>,
    pub aux_normal_deriv: DerivVec3,
}

impl IntCell {
    fn edges(&self) -> (Vector3<f64>, Vector3<f64>) {
        let [a, b, c] = &self.vertices;
        (b - a, c - a)
    }

    pub fn area(&self) -> f64 {
        let (e1, e2) = self.edges();
        0.5 * e1.cross(&e2).norm()
    }

    /// Point of the cell at the reference triangle coordinates `eta`.
    pub fn map(&self, eta: &Point2<f64>) -> Point3<f64> {
        let [a, b, c] = &self.vertices;
        Point3::from(a.coords * (1.0 - eta.x - eta.y) + b.coords * eta.x + c.coords * eta.y)
    }

    pub fn map_deriv(&self, eta: &Point2<f64>) -> DerivVec3 {
        let mut deriv = DerivVec3::default();
        let weights = [1.0 - eta.x - eta.y, eta.x, eta.y];
        for (w, d) in weights.iter().zip(&self.vertex_derivs) {
            add_scaled_vec3(&mut deriv, d, *w);
        }
        deriv
    }

    /// Jacobian determinant of the map from the reference triangle, which is twice the area.
    pub fn jacobian(&self) -> f64 {
        2.0 * self.area()
    }

    pub fn jacobian_deriv(&self) -> DerivMap {
        let (e1, e2) = self.edges();
        let [d0, d1, d2] = &self.vertex_derivs;
        let edge_deriv = |d: &DerivVec3| {
            let mut de = d.clone();
            add_scaled_vec3(&mut de, d0, -1.0);
            de
        };
        let (de1, de2) = (edge_deriv(d1), edge_deriv(d2));
        norm_deriv(&e1.cross(&e2), &cross_deriv(&e1, &de1, &e2, &de2))
    }
}

/// Delaunay triangulation of a convex clip polygon into integration cells.
///
/// Cells with an area below `min_area` are discarded. The remaining cells are counter-clockwise
/// around the auxiliary plane normal.
pub fn triangulate(aux: &AuxPlane, polygon: &[Vertex], slave: Gid, master: Gid, min_area: f64) -> Vec<IntCell> {
    let local = polygon.iter().map(|v| aux.to_local(&v.coords)).collect_vec();
    triangulate_convex_delaunay(&local)
        .into_iter()
        .map(|[i, j, k]| IntCell {
            local_id: 0,
            slave,
            master,
            vertices: [polygon[i].coords, polygon[j].coords, polygon[k].coords],
            vertex_derivs: [
                polygon[i].deriv.clone(),
                polygon[j].deriv.clone(),
                polygon[k].deriv.clone(),
            ],
            aux_normal: aux.normal(),
            aux_normal_deriv: aux.normal_deriv().clone(),
        })
        .filter(|cell| cell.area() >= min_area)
        .enumerate()
        .map(|(local_id, cell)| IntCell { local_id, ..cell })
        .collect()
}
