use crate::coupling::AuxPlane;
use crate::deriv::{add_scaled_vec3, cross_deriv, dot_const, outer, DerivMap, DerivVec3};
use crate::element::ElementGeometry;
use nalgebra::{Point3, Vector3};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VertexKind {
    /// Projection of a slave node onto the auxiliary plane.
    SlaveNode,
    /// Projection of a master node onto the auxiliary plane.
    MasterNode,
    /// Intersection of a projected slave edge with a projected master edge.
    LineClip,
}

/// A vertex on the auxiliary plane, with the derivative of its coordinates.
///
/// Node vertices reference a single geometry node index. Line-clip vertices reference the two
/// end points of the slave edge followed by the two end points of the master edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub coords: Point3<f64>,
    pub kind: VertexKind,
    pub nodes: Vec<usize>,
    /// Position along the slave edge, for line-clip vertices.
    pub alpha: Option<f64>,
    pub deriv: DerivVec3,
    /// Kinds of coincident vertices merged into this one during clipping.
    pub merged: Vec<VertexKind>,
}

/// Projects the nodes of an element geometry onto the auxiliary plane, in node order.
pub fn project_polygon(aux: &AuxPlane, geometry: &ElementGeometry, kind: VertexKind) -> Vec<Vertex> {
    let n = geometry.nodes().len();
    (0..n)
        .map(|k| {
            let mut unit = vec![0.0; n];
            unit[k] = 1.0;
            let position = geometry.nodes()[k].position;
            let dx = geometry.linear_combination_deriv(&unit);
            Vertex {
                coords: aux.project(&position),
                kind,
                nodes: vec![k],
                alpha: None,
                deriv: aux.project_deriv(&position, &dx),
                merged: Vec::new(),
            }
        })
        .collect()
}

/// Intersection of the slave edge `s0 -> s1` with the master edge `m0 -> m1` on the auxiliary plane.
///
/// The intersection parameter is `alpha = ((m0 - s0) × (m1 - m0)) · n / ((s1 - s0) × (m1 - m0)) · n`,
/// and the vertex lies at `s0 + alpha (s1 - s0)`.
pub fn line_clip_vertex(aux: &AuxPlane, slave_edge: [&Vertex; 2], master_edge: [&Vertex; 2]) -> Option<Vertex> {
    let [s0, s1] = slave_edge;
    let [m0, m1] = master_edge;
    let n = aux.normal();
    let dn = aux.normal_deriv();

    let diff = |a: &Vertex, b: &Vertex| -> (Vector3<f64>, DerivVec3) {
        let mut d = a.deriv.clone();
        add_scaled_vec3(&mut d, &b.deriv, -1.0);
        (a.coords - b.coords, d)
    };
    let (ms, dms) = diff(m0, s0);
    let (mm, dmm) = diff(m1, m0);
    let (ss, dss) = diff(s1, s0);

    let num_cross = ms.cross(&mm);
    let den_cross = ss.cross(&mm);
    let num = num_cross.dot(&n);
    let den = den_cross.dot(&n);
    if den.abs() <= f64::EPSILON * ss.norm() * mm.norm() {
        return None;
    }
    let alpha = num / den;

    let mut dnum = dot_const(&n, &cross_deriv(&ms, &dms, &mm, &dmm));
    dnum.add_scaled(&dot_const(&num_cross, dn), 1.0);
    let mut dden = dot_const(&n, &cross_deriv(&ss, &dss, &mm, &dmm));
    dden.add_scaled(&dot_const(&den_cross, dn), 1.0);
    let mut dalpha: DerivMap = dnum;
    dalpha.add_scaled(&dden, -alpha);
    dalpha.scale(1.0 / den);

    let mut deriv = s0.deriv.clone();
    add_scaled_vec3(&mut deriv, &dss, alpha);
    add_scaled_vec3(&mut deriv, &outer(&ss, &dalpha), 1.0);

    Some(Vertex {
        coords: s0.coords + ss * alpha,
        kind: VertexKind::LineClip,
        nodes: [s0.nodes[0], s1.nodes[0], m0.nodes[0], m1.nodes[0]].to_vec(),
        alpha: Some(alpha),
        deriv,
        merged: Vec::new(),
    })
}
