use crate::common::{constant_vector, scaled_identity, tied_patches, Grid, LM_OFFSET};
use matrixcompare::assert_scalar_eq;
use mortar::assembly::MortarOperators;
use mortar::condensation::{DofPartition, MeshslidingCondenser};
use mortar::config::MortarParameters;
use mortar::coupling::couple_interface;
use mortar::interface::MortarInterface;
use mortar::sliding::SlidingOperators;
use mortar_sparse::Vector;
use std::sync::Arc;

struct Sliding {
    interface: MortarInterface,
    slave: Grid,
    ops: MortarOperators,
    sliding: SlidingOperators,
}

/// Coplanar patches evaluated at vanishing multipliers.
fn sliding(n_slave: usize, n_master: usize) -> Sliding {
    let (mut interface, slave, _) = tied_patches(n_slave, n_master);
    interface.evaluate_nodal_normals().unwrap();
    let coupling = couple_interface(&mut interface, &MortarParameters::default()).unwrap();
    let ops = MortarOperators::assemble(&interface, coupling.contributions).unwrap();
    let lambda = Vector::zeros(ops.lm_dofs().clone());
    let sliding = SlidingOperators::assemble(&interface, &ops, &lambda).unwrap();
    Sliding {
        interface,
        slave,
        ops,
        sliding,
    }
}

#[test]
fn tangent_rows_select_tangential_multipliers() {
    let Sliding { slave, sliding, .. } = sliding(2, 3);
    assert_eq!(sliding.slave_dofs().num_local_elements(), 27);
    for gid in slave.nodes() {
        let [x, y, z] = [3 * gid, 3 * gid + 1, 3 * gid + 2];
        // t₁ = e_x on the second DOF row and t₂ = e_y on the third
        assert_scalar_eq!(sliding.t.get(y, x + LM_OFFSET), 1.0, comp = abs, tol = 1e-14);
        assert_scalar_eq!(sliding.t.get(z, y + LM_OFFSET), 1.0, comp = abs, tol = 1e-14);
        assert_eq!(sliding.t.get(x, x + LM_OFFSET), 0.0);
        assert_scalar_eq!(sliding.gap_rhs.get(x).unwrap(), 0.0, comp = abs, tol = 1e-14);
    }
    assert_eq!(sliding.h.max_abs(), 0.0);
}

#[test]
fn gap_rows_are_invariant_under_normal_translation() {
    let Sliding { slave, ops, sliding, .. } = sliding(2, 3);
    let slave_sums = sliding.n_s.row_sums().unwrap();
    let master_sums = sliding.n_m.row_sums().unwrap();
    for gid in slave.nodes() {
        let row = 3 * gid;
        let d = ops.d().get(row + LM_OFFSET, row);
        // Lifting the master surface opens the gap by the weight of the node
        assert_scalar_eq!(master_sums.get(row).unwrap(), d, comp = abs, tol = 1e-10);
        assert_scalar_eq!(slave_sums.get(row).unwrap(), -d, comp = abs, tol = 1e-10);
        // Only the first DOF row of a node carries the gap
        assert_eq!(slave_sums.get(row + 1).unwrap(), 0.0);
        assert_eq!(master_sums.get(row + 2).unwrap(), 0.0);
    }
}

#[test]
fn sliding_condensation_replaces_slave_rows_with_constraints() {
    let Sliding {
        interface,
        slave,
        ops,
        sliding,
    } = sliding(2, 3);
    let system = Arc::new(interface.slave_dofs().union(&interface.master_dofs()));
    let partition = DofPartition::from_interface(system.clone(), &interface).unwrap();
    let condenser = MeshslidingCondenser::new(&ops, partition).unwrap();
    let k = scaled_identity(system.clone(), 2.0);
    let b = constant_vector(system.clone(), 1.0);
    let lambda = Vector::zeros(ops.lm_dofs().clone());
    let (condensed, cache) = condenser.condense(&k, &b, &ops, &sliding, &lambda).unwrap();
    let matrix = &condensed.matrix;

    let slave_dofs = interface.slave_dofs();
    for gid in slave.nodes() {
        let [x, y, z] = [3 * gid, 3 * gid + 1, 3 * gid + 2];
        let d = ops.d().get(x + LM_OFFSET, x);
        for col in slave_dofs.iter() {
            assert_scalar_eq!(matrix.get(x, col), sliding.n_s.get(x, col), comp = abs, tol = 1e-12);
        }
        assert_scalar_eq!(matrix.get(y, x), -2.0 / d, comp = abs, tol = 1e-10);
        assert_scalar_eq!(matrix.get(z, y), -2.0 / d, comp = abs, tol = 1e-10);
        assert_scalar_eq!(condensed.rhs.get(x).unwrap(), 0.0, comp = abs, tol = 1e-14);
        assert_scalar_eq!(condensed.rhs.get(y).unwrap(), -1.0 / d, comp = abs, tol = 1e-10);
    }

    // Master rows receive the slave rows through Pᵀ
    let p = condenser.projector();
    for (row, col, value) in p.triplets() {
        assert_scalar_eq!(matrix.get(col, row), 2.0 * value, comp = abs, tol = 1e-12);
    }

    let dx = Vector::zeros(system);
    let lambda = condenser.recover(&cache, &dx).unwrap();
    for gid in slave.nodes() {
        let dof = 3 * gid;
        let d = ops.d().get(dof + LM_OFFSET, dof);
        assert_scalar_eq!(lambda.get(dof + LM_OFFSET).unwrap(), 1.0 / d, comp = abs, tol = 1e-10);
    }
}
