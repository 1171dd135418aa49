//! The interface between the mortar-coupled structural problem and a Newton-type solver.
//!
//! A nonlinear problem is composed of several [`NlnInterface`]s, one per physical field. Each
//! interface owns a set of [`QuantityType`]s and reports [`NORM_SENTINEL`] for norms of
//! quantities it does not own, so that the solver can aggregate per-quantity norms across all
//! interfaces before testing convergence.
mod interface;
mod linear_system;
mod models;
pub mod norms;
mod solver;
mod status;

pub use interface::*;
pub use linear_system::*;
pub use models::*;
pub use solver::*;
pub use status::*;
