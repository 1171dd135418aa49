//! Mortar coupling of non-matching 3D surface meshes.
//!
//! The crate couples a slave and a master surface through the mortar operators `D`, `M` and the
//! weighted gap, together with their exact linearizations, and transforms the resulting
//! structural systems for mesh tying, frictionless mesh sliding and the poroelastic
//! no-penetration condition. The [`nln`] module connects the coupled problem to a Newton solver.
pub mod assembly;
pub mod condensation;
pub mod config;
pub mod coupling;
pub mod deriv;
pub mod element;
pub mod interface;
pub mod nln;
pub mod quadrature;
pub mod search;
pub mod sliding;
pub mod strategy;

#[cfg(feature = "proptest")]
pub mod proptest;

pub use mortar_geometry::Real;

pub mod geometry {
    pub use mortar_geometry::*;
}

pub mod sparse {
    pub use mortar_sparse::*;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
