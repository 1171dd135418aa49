//! Segment-based and element-based mortar coupling of slave and master surface elements.
//!
//! For one slave element, coupling builds an auxiliary plane, projects the slave and master
//! outlines onto it, clips them, triangulates the overlap into integration cells and integrates
//! the mortar operators `D`, `M` and the weighted gap `g` over the cells, together with their
//! derivatives with respect to all nodal coordinates involved. Quadratic elements are coupled
//! through their linear integration elements.
use mortar_geometry::ClipError;
use mortar_sparse::Gid;
use std::fmt;
use std::fmt::{Display, Formatter};

mod aux_plane;
mod clipper;
mod dual;
mod integrator;
mod manager;
mod projector;
mod triangulator;
mod vertex;

pub use aux_plane::*;
pub use clipper::*;
pub use dual::*;
pub use integrator::*;
pub use manager::*;
pub use projector::*;
pub use triangulator::*;
pub use vertex::*;

/// Maximum number of Newton iterations of the projectors.
pub const MORTAR_MAX_ITER: usize = 10;
/// Convergence tolerance of the projectors on the parametric update.
pub const MORTAR_CONV_TOL: f64 = 1e-12;
/// Parametric tolerance for accepting a projected point as lying inside an element.
pub const MORTAR_PROJ_TOL: f64 = 0.05;
/// Clipping tolerance relative to the longest polygon edge.
pub const MORTAR_CLIP_TOL: f64 = 1e-8;
/// Integration cells smaller than this fraction of the slave element area are discarded.
pub const MORTAR_INT_LIM: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CouplingError {
    /// The slave element has zero area or no well-defined normal.
    DegenerateElement(Gid),
    /// Clipping failed for a pair of elements.
    Clip { slave: Gid, master: Gid, error: ClipError },
    /// A projection did not converge within [`MORTAR_MAX_ITER`] iterations.
    ProjectionFailed { element: Gid },
    /// The element mass matrix used for the dual basis is singular.
    SingularDualMatrix(Gid),
    UnknownElement(Gid),
}

impl CouplingError {
    /// Whether the pair can be skipped while coupling continues with the remaining pairs.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DegenerateElement(_) | Self::Clip { .. } | Self::ProjectionFailed { .. }
        )
    }
}

impl Display for CouplingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateElement(gid) => write!(f, "slave element {} is degenerate", gid),
            Self::Clip { slave, master, error } => {
                write!(f, "clipping slave element {} against master element {} failed: {}", slave, master, error)
            }
            Self::ProjectionFailed { element } => write!(f, "projection onto element {} did not converge", element),
            Self::SingularDualMatrix(gid) => {
                write!(f, "mass matrix of slave element {} is singular, no dual basis exists", gid)
            }
            Self::UnknownElement(gid) => write!(f, "element {} is not part of the interface", gid),
        }
    }
}

impl std::error::Error for CouplingError {}
