use crate::common::{add_quad_grid, tied_patches, Grid, LM_OFFSET};
use mortar::interface::{MortarInterface, Side};
use mortar::search::{BoundingBox, ElementTree};
use nalgebra::Point3;

#[test]
fn bounding_box_of_points() {
    let points = [
        Point3::new(0.0, 1.0, -1.0),
        Point3::new(2.0, -1.0, 0.5),
        Point3::new(1.0, 0.0, 0.0),
    ];
    let bb = BoundingBox::from_points(&points).unwrap();
    assert_eq!(bb.min, Point3::new(0.0, -1.0, -1.0));
    assert_eq!(bb.max, Point3::new(2.0, 1.0, 0.5));
    assert_eq!(bb.inflate(0.5).min, Point3::new(-0.5, -1.5, -1.5));
    assert!(BoundingBox::from_points(&[]).is_none());
}

#[test]
fn bounding_boxes_touching_at_a_face_intersect() {
    let a = BoundingBox {
        min: Point3::origin(),
        max: Point3::new(1.0, 1.0, 1.0),
    };
    let b = BoundingBox {
        min: Point3::new(1.0, 0.0, 0.0),
        max: Point3::new(2.0, 1.0, 1.0),
    };
    let c = BoundingBox {
        min: Point3::new(1.5, 0.0, 0.0),
        max: Point3::new(2.0, 1.0, 1.0),
    };
    assert!(a.intersects(&b));
    assert!(b.intersects(&a));
    assert!(!a.intersects(&c));
    assert!(a.inflate(0.5).intersects(&c));
}

#[test]
fn element_tree_returns_sorted_hits() {
    let unit_box = |x: f64| BoundingBox {
        min: Point3::new(x, 0.0, 0.0),
        max: Point3::new(x + 1.0, 1.0, 0.0),
    };
    let tree = ElementTree::new((0..10).rev().map(|gid| (gid, unit_box(gid as f64))));
    assert_eq!(tree.len(), 10);
    assert_eq!(tree.intersecting(&unit_box(3.5)), vec![3, 4]);
    assert_eq!(tree.intersecting(&unit_box(4.0)), vec![3, 4, 5]);
    assert!(tree.intersecting(&unit_box(20.0)).is_empty());
}

#[test]
fn candidates_of_matching_grids_include_neighbors() {
    let (interface, slave, master) = tied_patches(2, 2);
    let candidates = interface.search_candidates(0.0);
    assert_eq!(candidates.len(), 4);
    let slave_gids: Vec<_> = candidates.iter().map(|(gid, _)| *gid).collect();
    assert_eq!(slave_gids, vec![0, 1, 2, 3]);
    // Flat boxes of a 2 × 2 grid all touch each other
    for (_, masters) in &candidates {
        assert_eq!(masters, &vec![1000, 1001, 1002, 1003]);
    }
    assert_eq!(slave.n, master.n);
}

#[test]
fn candidates_of_distant_surfaces_are_empty() {
    let mut interface = MortarInterface::new(LM_OFFSET);
    add_quad_grid(&mut interface, Side::Slave, &Grid::unit(2, 0, 0));
    let far = Grid {
        z: 5.0,
        ..Grid::unit(2, 1000, 1000)
    };
    add_quad_grid(&mut interface, Side::Master, &far);
    for (_, masters) in interface.search_candidates(0.3) {
        assert!(masters.is_empty());
    }
    // Boxes grow with the search parameter until they reach the master surface
    for (_, masters) in interface.search_candidates(10.0) {
        assert_eq!(masters.len(), 4);
    }
}

#[test]
fn candidates_of_fine_master_grid_are_local() {
    let (interface, _, master) = tied_patches(1, 4);
    let candidates = interface.search_candidates(0.0);
    assert_eq!(candidates.len(), 1);
    let (_, masters) = &candidates[0];
    assert_eq!(masters.len(), master.n * master.n);

    let (interface, _, _) = tied_patches(4, 1);
    for (_, masters) in interface.search_candidates(0.0) {
        assert_eq!(masters, vec![1000]);
    }
}
