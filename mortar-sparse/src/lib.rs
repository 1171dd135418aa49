//! Serial, map-keyed sparse linear algebra.
//!
//! Rows and columns are labeled by global ids ([`Gid`]) held in a [`Map`]. Matrices follow an
//! explicit two-state life cycle: entries are inserted while a [`SparseMatrix`] is *assembling*,
//! and `fill` freezes the pattern into CSR storage. All operations that would be collective on a
//! distributed machine go through a [`Communicator`].
use std::fmt;
use std::fmt::{Display, Formatter};

mod block;
mod cg;
mod comm;
mod map;
mod matrix;
mod solver;
mod vector;

pub use block::*;
pub use cg::*;
pub use comm::*;
pub use map::*;
pub use matrix::*;
pub use solver::*;
pub use vector::*;

pub use nalgebra_sparse;

/// Global id of a row, column or vector entry.
pub type Gid = usize;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AlgebraError {
    /// A map was constructed with the same global id twice.
    DuplicateGid(Gid),
    /// Attempted to insert into a row that is not part of the row map.
    RowNotOwned(Gid),
    /// A column id is not part of the column map the matrix is being filled with.
    ColumnNotInMap(Gid),
    /// The map is not a subset of the map it is extracted from.
    NotASubset,
    /// The operation requires a filled matrix.
    NotFilled,
    /// The operation requires a matrix in the assembling state.
    NotAssembling,
    /// The operation requires a stored entry that is absent from the sparsity pattern.
    MissingEntry { row: Gid, col: Gid },
    /// The two operands are keyed by incompatible maps.
    MapMismatch(&'static str),
}

impl Display for AlgebraError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateGid(gid) => write!(f, "global id {} appears more than once in map", gid),
            Self::RowNotOwned(gid) => write!(f, "row {} is not owned by the row map", gid),
            Self::ColumnNotInMap(gid) => write!(f, "column {} is not part of the column map", gid),
            Self::NotASubset => write!(f, "map is not a subset of the source map"),
            Self::NotFilled => write!(f, "operation requires a filled matrix"),
            Self::NotAssembling => write!(f, "operation requires a matrix in the assembling state"),
            Self::MissingEntry { row, col } => {
                write!(f, "entry ({}, {}) is not part of the sparsity pattern", row, col)
            }
            Self::MapMismatch(context) => write!(f, "incompatible maps: {}", context),
        }
    }
}

impl std::error::Error for AlgebraError {}
