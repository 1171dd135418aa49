//! Builders for flat test interfaces and small structural models.
#![allow(dead_code)]

use mortar::config::MortarParameters;
use mortar::element::CellType;
use mortar::interface::{MortarInterface, Side};
use mortar_sparse::{Gid, Map, SparseMatrix, Vector};
use nalgebra::{DMatrix, Point3};
use std::sync::Arc;

pub const LM_OFFSET: Gid = 100_000;

/// A flat `n × n` grid of quad4 elements covering `[x0, x0 + size] × [y0, y0 + size]` at height `z`.
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    pub n: usize,
    pub origin: [f64; 2],
    pub size: f64,
    pub z: f64,
    pub node_offset: Gid,
    pub element_offset: Gid,
}

impl Grid {
    pub fn unit(n: usize, node_offset: Gid, element_offset: Gid) -> Self {
        Self {
            n,
            origin: [0.0, 0.0],
            size: 1.0,
            z: 0.0,
            node_offset,
            element_offset,
        }
    }

    pub fn node(&self, i: usize, j: usize) -> Gid {
        self.node_offset + j * (self.n + 1) + i
    }

    pub fn position(&self, i: usize, j: usize) -> Point3<f64> {
        let h = self.size / self.n as f64;
        Point3::new(self.origin[0] + i as f64 * h, self.origin[1] + j as f64 * h, self.z)
    }

    pub fn nodes(&self) -> impl Iterator<Item = Gid> + '_ {
        (0..=self.n).flat_map(move |j| (0..=self.n).map(move |i| self.node(i, j)))
    }
}

pub fn node_dofs(gid: Gid) -> [Gid; 3] {
    [3 * gid, 3 * gid + 1, 3 * gid + 2]
}

/// Adds the grid to the interface. Slave elements wind counter-clockwise seen from `+z` and master
/// elements clockwise, so that a slave grid below a master grid faces it.
pub fn add_quad_grid(interface: &mut MortarInterface, side: Side, grid: &Grid) {
    for j in 0..=grid.n {
        for i in 0..=grid.n {
            let gid = grid.node(i, j);
            interface
                .add_node(gid, node_dofs(gid), grid.position(i, j), side)
                .unwrap();
        }
    }
    for j in 0..grid.n {
        for i in 0..grid.n {
            let (a, b, c, d) = (grid.node(i, j), grid.node(i + 1, j), grid.node(i + 1, j + 1), grid.node(i, j + 1));
            let nodes = match side {
                Side::Slave => vec![a, b, c, d],
                Side::Master => vec![a, d, c, b],
            };
            let gid = grid.element_offset + j * grid.n + i;
            interface
                .add_element(gid, CellType::Quad4, nodes, side, None)
                .unwrap();
        }
    }
}

/// A slave grid and a master grid on the unit square at `z = 0`.
pub fn tied_patches(n_slave: usize, n_master: usize) -> (MortarInterface, Grid, Grid) {
    let slave = Grid::unit(n_slave, 0, 0);
    let master = Grid::unit(n_master, 1000, 1000);
    let mut interface = MortarInterface::new(LM_OFFSET);
    add_quad_grid(&mut interface, Side::Slave, &slave);
    add_quad_grid(&mut interface, Side::Master, &master);
    (interface, slave, master)
}

pub fn condensed_tying() -> MortarParameters {
    MortarParameters::default()
}

pub fn dense(matrix: &SparseMatrix, rows: &Map, cols: &Map) -> DMatrix<f64> {
    matrix.to_dense(rows, cols)
}

/// `c I` on the given DOFs, as a filled matrix.
pub fn scaled_identity(dofs: Arc<Map>, c: f64) -> SparseMatrix {
    let mut k = SparseMatrix::identity(dofs);
    k.scale(c);
    k
}

pub fn constant_vector(dofs: Arc<Map>, value: f64) -> Vector {
    Vector::from_fn(dofs, |_| value)
}
