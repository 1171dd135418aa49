use crate::deriv::{add_scaled_vec3, dot_const, outer, DerivMap, DerivVec3};
use crate::element::ElementGeometry;
use mortar_geometry::PlaneFrame;
use nalgebra::{Point2, Point3, Vector3};

/// Planar approximation of a slave element, through the element's parametric center and
/// orthogonal to its unit normal there.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxPlane {
    frame: PlaneFrame<f64>,
    center_deriv: DerivVec3,
    normal_deriv: DerivVec3,
}

impl AuxPlane {
    /// Returns `None` if the element is degenerate at its center.
    pub fn new(slave: &ElementGeometry) -> Option<Self> {
        let xi = slave.cell().parametric_center();
        let normal = slave.unit_normal(&xi)?;
        let frame = PlaneFrame::new(slave.position(&xi), normal.as_ref())?;
        Some(Self {
            frame,
            center_deriv: slave.position_deriv(&xi),
            normal_deriv: slave.unit_normal_deriv(&xi),
        })
    }

    pub fn center(&self) -> &Point3<f64> {
        self.frame.origin()
    }

    pub fn normal(&self) -> Vector3<f64> {
        self.frame.normal().into_inner()
    }

    pub fn center_deriv(&self) -> &DerivVec3 {
        &self.center_deriv
    }

    pub fn normal_deriv(&self) -> &DerivVec3 {
        &self.normal_deriv
    }

    pub fn frame(&self) -> &PlaneFrame<f64> {
        &self.frame
    }

    pub fn to_local(&self, point: &Point3<f64>) -> Point2<f64> {
        self.frame.to_local(point)
    }

    pub fn project(&self, point: &Point3<f64>) -> Point3<f64> {
        self.frame.project(point)
    }

    /// Derivative of the projection `p = x - ((x - c) · n) n` of a point `x` with derivative `dx`.
    pub fn project_deriv(&self, point: &Point3<f64>, dx: &DerivVec3) -> DerivVec3 {
        let n = self.normal();
        let rel = point - self.center();
        let s = rel.dot(&n);
        // ds = n · (dx - dc) + (x - c) · dn
        let mut ds: DerivMap = dot_const(&n, dx);
        ds.add_scaled(&dot_const(&n, &self.center_deriv), -1.0);
        ds.add_scaled(&dot_const(&rel, &self.normal_deriv), 1.0);

        let mut dp = dx.clone();
        add_scaled_vec3(&mut dp, &self.normal_deriv, -s);
        add_scaled_vec3(&mut dp, &outer(&n, &ds), -1.0);
        dp
    }
}
