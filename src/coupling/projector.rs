use crate::coupling::{MORTAR_CONV_TOL, MORTAR_MAX_ITER};
use crate::deriv::{add_scaled_vec3, combine, DerivMap, DerivVec3};
use crate::element::{CellType, ElementGeometry};
use log::trace;
use nalgebra::{Matrix3, Point2, Point3, Vector3};

/// Result of a projection onto an element.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Projection {
    pub xi: Point2<f64>,
    /// Distance parameter along the projection direction.
    pub alpha: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Derivatives of a converged projection with respect to the nodal coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionDeriv {
    pub xi: [DerivMap; 2],
    pub alpha: DerivMap,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProjectorSettings {
    pub max_iter: usize,
    pub tolerance: f64,
    /// Whether the unit normal of the target element varies over the element, so that the
    /// Newton matrix needs its parametric derivatives.
    pub normal_curvature: bool,
}

/// Settings for projections onto the slave and onto the master element of a pair.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProjectorPair {
    pub onto_slave: ProjectorSettings,
    pub onto_master: ProjectorSettings,
}

const fn cell_index(cell: CellType) -> usize {
    match cell {
        CellType::Tri3 => 0,
        CellType::Tri6 => 1,
        CellType::Quad4 => 2,
        CellType::Quad8 => 3,
        CellType::Quad9 => 4,
        CellType::Nurbs9 => 5,
    }
}

const fn settings_for_index(index: usize) -> ProjectorSettings {
    ProjectorSettings {
        max_iter: MORTAR_MAX_ITER,
        tolerance: MORTAR_CONV_TOL,
        // Only the flat triangle has a constant normal
        normal_curvature: index != 0,
    }
}

const fn build_table() -> [[ProjectorPair; 6]; 6] {
    let mut table = [[ProjectorPair {
        onto_slave: settings_for_index(0),
        onto_master: settings_for_index(0),
    }; 6]; 6];
    let mut s = 0;
    while s < 6 {
        let mut m = 0;
        while m < 6 {
            table[s][m] = ProjectorPair {
                onto_slave: settings_for_index(s),
                onto_master: settings_for_index(m),
            };
            m += 1;
        }
        s += 1;
    }
    table
}

static PROJECTOR_TABLE: [[ProjectorPair; 6]; 6] = build_table();

/// Projector settings for a (slave, master) pair of cell types.
pub fn projector_for(slave: CellType, master: CellType) -> &'static ProjectorPair {
    &PROJECTOR_TABLE[cell_index(slave)][cell_index(master)]
}

/// Newton iteration on `F(ξ, α) = 0` given a function returning `F` and `∂F/∂(ξ, η, α)`.
fn newton(
    initial: Point2<f64>,
    settings: &ProjectorSettings,
    mut residual: impl FnMut(&Point2<f64>, f64) -> (Vector3<f64>, Matrix3<f64>),
) -> Projection {
    let mut xi = initial;
    let mut alpha = 0.0;
    for iteration in 1..=settings.max_iter {
        let (f, jacobian) = residual(&xi, alpha);
        let Some(inverse) = jacobian.try_inverse() else {
            trace!("Singular projection matrix at xi = ({}, {})", xi.x, xi.y);
            break;
        };
        let step = -(inverse * f);
        xi += step.xy();
        alpha += step.z;
        if !xi.coords.iter().all(|x| x.is_finite()) {
            break;
        }
        if step.xy().norm() <= settings.tolerance {
            return Projection {
                xi,
                alpha,
                converged: true,
                iterations: iteration,
            };
        }
    }
    trace!("Projection did not converge within {} iterations", settings.max_iter);
    Projection {
        xi,
        alpha,
        converged: false,
        iterations: settings.max_iter,
    }
}

fn columns(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Matrix3<f64> {
    Matrix3::from_columns(&[a, b, c])
}

/// Solves `J [dξ; dα] = -∂F/∂X`.
fn solve_deriv(jacobian: &Matrix3<f64>, df: &DerivVec3) -> Option<ProjectionDeriv> {
    let inverse = jacobian.try_inverse()?;
    let row = |a: usize| {
        combine(&[
            (-inverse[(a, 0)], &df[0]),
            (-inverse[(a, 1)], &df[1]),
            (-inverse[(a, 2)], &df[2]),
        ])
    };
    Some(ProjectionDeriv {
        xi: [row(0), row(1)],
        alpha: row(2),
    })
}

/// Finds `ξ, α` with `x_e(ξ) = p + α d` for a fixed direction `d`.
///
/// Used for slave nodes projected along their nodal normal onto a master element, and for Gauss
/// points projected back along the auxiliary plane normal.
pub fn project_along_direction(
    point: &Point3<f64>,
    direction: &Vector3<f64>,
    target: &ElementGeometry,
    initial: Option<Point2<f64>>,
    settings: &ProjectorSettings,
) -> Projection {
    let initial = initial.unwrap_or_else(|| target.cell().parametric_center());
    newton(initial, settings, |xi, alpha| {
        let [g1, g2] = target.tangents(xi);
        let f = target.position(xi) - point - direction * alpha;
        (f, columns(g1, g2, -direction))
    })
}

pub fn project_along_direction_deriv(
    projection: &Projection,
    point_deriv: &DerivVec3,
    direction: &Vector3<f64>,
    direction_deriv: &DerivVec3,
    target: &ElementGeometry,
) -> Option<ProjectionDeriv> {
    let xi = &projection.xi;
    let [g1, g2] = target.tangents(xi);
    // ∂F/∂X = ∂x_e/∂X - α ∂d/∂X - ∂p/∂X
    let mut df = target.position_deriv(xi);
    add_scaled_vec3(&mut df, direction_deriv, -projection.alpha);
    add_scaled_vec3(&mut df, point_deriv, -1.0);
    solve_deriv(&columns(g1, g2, -direction), &df)
}

/// Slave node onto a master element: `x_m(ξ) = x_node + α n_node`.
pub fn project_node_along_nodal_normal(
    node: &Point3<f64>,
    nodal_normal: &Vector3<f64>,
    target: &ElementGeometry,
    settings: &ProjectorSettings,
) -> Projection {
    project_along_direction(node, nodal_normal, target, None, settings)
}

fn normal_xi(target: &ElementGeometry, xi: &Point2<f64>, settings: &ProjectorSettings) -> [Vector3<f64>; 2] {
    if settings.normal_curvature {
        target.unit_normal_derivatives_xi(xi)
    } else {
        [Vector3::zeros(); 2]
    }
}

fn element_normal_matrix(target: &ElementGeometry, xi: &Point2<f64>, alpha: f64, settings: &ProjectorSettings) -> Matrix3<f64> {
    let [g1, g2] = target.tangents(xi);
    let [n1, n2] = normal_xi(target, xi, settings);
    let n = target.normal(xi).normalize();
    columns(g1 + n1 * alpha, g2 + n2 * alpha, n)
}

/// Finds `ξ, α` with `p = x_e(ξ) + α n_e(ξ)`, where `n_e` is the unit normal of the target element.
///
/// Used for master nodes projected onto a slave element.
pub fn project_along_element_normal(
    point: &Point3<f64>,
    target: &ElementGeometry,
    settings: &ProjectorSettings,
) -> Projection {
    newton(target.cell().parametric_center(), settings, |xi, alpha| {
        let n = target.normal(xi).normalize();
        let f = target.position(xi) + n * alpha - point;
        (f, element_normal_matrix(target, xi, alpha, settings))
    })
}

pub fn project_along_element_normal_deriv(
    projection: &Projection,
    point_deriv: &DerivVec3,
    target: &ElementGeometry,
    settings: &ProjectorSettings,
) -> Option<ProjectionDeriv> {
    let xi = &projection.xi;
    let mut df = target.position_deriv(xi);
    add_scaled_vec3(&mut df, &target.unit_normal_deriv(xi), projection.alpha);
    add_scaled_vec3(&mut df, point_deriv, -1.0);
    solve_deriv(&element_normal_matrix(target, xi, projection.alpha, settings), &df)
}

/// The normal field `n(ξ) = Σ_k N_k(ξ) n_k` interpolated from nodal normals, with its parametric derivatives.
fn interpolated_normal(target: &ElementGeometry, xi: &Point2<f64>, nodal_normals: &[Vector3<f64>]) -> [Vector3<f64>; 3] {
    let shape = target.shape_functions(xi);
    let mut result = [Vector3::zeros(); 3];
    for (k, n) in nodal_normals.iter().enumerate() {
        result[0] += n * shape.values[k];
        result[1] += n * shape.gradients[(0, k)];
        result[2] += n * shape.gradients[(1, k)];
    }
    result
}

/// Finds `ξ, α` with `p = x_e(ξ) + α n(ξ)`, where `n` interpolates the nodal normals of the target.
///
/// # Panics
///
/// Panics if the number of nodal normals does not match the number of target nodes.
pub fn project_along_interpolated_normal(
    point: &Point3<f64>,
    target: &ElementGeometry,
    nodal_normals: &[Vector3<f64>],
    settings: &ProjectorSettings,
) -> Projection {
    assert_eq!(nodal_normals.len(), target.nodes().len(), "one nodal normal per node");
    newton(target.cell().parametric_center(), settings, |xi, alpha| {
        let [g1, g2] = target.tangents(xi);
        let [n, n1, n2] = interpolated_normal(target, xi, nodal_normals);
        let f = target.position(xi) + n * alpha - point;
        (f, columns(g1 + n1 * alpha, g2 + n2 * alpha, n))
    })
}

pub fn project_along_interpolated_normal_deriv(
    projection: &Projection,
    point_deriv: &DerivVec3,
    target: &ElementGeometry,
    nodal_normals: &[Vector3<f64>],
    nodal_normal_derivs: &[DerivVec3],
) -> Option<ProjectionDeriv> {
    let xi = &projection.xi;
    let alpha = projection.alpha;
    let shape = target.shape_functions(xi);
    let mut df = target.position_deriv(xi);
    for (k, dn) in nodal_normal_derivs.iter().enumerate() {
        add_scaled_vec3(&mut df, dn, alpha * shape.values[k]);
    }
    add_scaled_vec3(&mut df, point_deriv, -1.0);
    let [g1, g2] = target.tangents(xi);
    let [n, n1, n2] = interpolated_normal(target, xi, nodal_normals);
    solve_deriv(&columns(g1 + n1 * alpha, g2 + n2 * alpha, n), &df)
}
