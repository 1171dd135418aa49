//! Planar geometry used by the mortar coupling pipeline.
//!
//! Everything here works in the two-dimensional coordinates of an auxiliary plane. The
//! [`PlaneFrame`] maps between those coordinates and physical space.
use nalgebra::RealField;

pub use nalgebra;

mod delaunay;
mod frame;
mod polygon;
pub mod predicates;

pub use delaunay::*;
pub use frame::*;
pub use polygon::*;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
