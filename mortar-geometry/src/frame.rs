use crate::Real;
use nalgebra::{Point2, Point3, Scalar, Unit, UnitVector3, Vector3};

/// Computes two unit vectors that together with `normal` form a right-handed orthonormal basis.
///
/// Uses the branchless construction from "Building an Orthonormal Basis, Revisited"
/// (Duff et al., JCGT 2017).
pub fn orthonormal_tangents<T: Real>(normal: &UnitVector3<T>) -> [UnitVector3<T>; 2] {
    let n = normal;
    let sign = T::copysign(T::one(), n.z);
    let a = -T::one() / (sign + n.z);
    let b = n.x * n.y * a;
    let t1 = Vector3::new(T::one() + sign * n.x * n.x * a, sign * b, -sign * n.x);
    let t1 = Unit::new_normalize(t1);
    let t2 = Unit::new_normalize(n.cross(&t1));
    [t1, t2]
}

/// A plane with an attached right-handed frame `(t1, t2, n)`.
///
/// Local coordinates of a point are its components along `t1` and `t2` relative to the origin,
/// so polygons that wind counter-clockwise around `n` also wind counter-clockwise in local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneFrame<T: Scalar> {
    origin: Point3<T>,
    normal: UnitVector3<T>,
    tangents: [UnitVector3<T>; 2],
}

impl<T: Real> PlaneFrame<T> {
    /// Returns `None` if the normal is too short to be normalized.
    pub fn new(origin: Point3<T>, normal: &Vector3<T>) -> Option<Self> {
        let normal = Unit::try_new(*normal, T::default_epsilon())?;
        let tangents = orthonormal_tangents(&normal);
        Some(Self {
            origin,
            normal,
            tangents,
        })
    }

    pub fn origin(&self) -> &Point3<T> {
        &self.origin
    }

    pub fn normal(&self) -> &UnitVector3<T> {
        &self.normal
    }

    pub fn tangents(&self) -> &[UnitVector3<T>; 2] {
        &self.tangents
    }

    pub fn signed_distance(&self, point: &Point3<T>) -> T {
        (point - self.origin).dot(&self.normal)
    }

    /// Orthogonal projection of `point` onto the plane.
    pub fn project(&self, point: &Point3<T>) -> Point3<T> {
        point - self.normal.as_ref() * self.signed_distance(point)
    }

    pub fn to_local(&self, point: &Point3<T>) -> Point2<T> {
        let rel = point - self.origin;
        Point2::new(rel.dot(&self.tangents[0]), rel.dot(&self.tangents[1]))
    }

    pub fn to_global(&self, local: &Point2<T>) -> Point3<T> {
        let [t1, t2] = &self.tangents;
        self.origin + t1.as_ref() * local.x + t2.as_ref() * local.y
    }
}
