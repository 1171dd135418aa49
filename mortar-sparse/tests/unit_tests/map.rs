use mortar_sparse::{AlgebraError, Map, SerialCommunicator};

#[test]
fn map_rejects_duplicates() {
    assert_eq!(Map::new(vec![3, 1, 3]), Err(AlgebraError::DuplicateGid(3)));
}

#[test]
fn map_local_ids_follow_insertion_order() {
    let map = Map::new(vec![7, 2, 5]).unwrap();
    assert_eq!(map.lid(7), Some(0));
    assert_eq!(map.lid(5), Some(2));
    assert_eq!(map.lid(4), None);
    assert_eq!(map.gid(1), 2);
    assert_eq!(map.num_global_elements(&SerialCommunicator), 3);
}

#[test]
fn map_set_operations() {
    let a = Map::new(vec![4, 0, 2]).unwrap();
    let b = Map::new(vec![2, 3]).unwrap();
    assert_eq!(a.union(&b).gids(), &[0, 2, 3, 4]);
    assert_eq!(a.intersection(&b).gids(), &[2]);
    assert_eq!(a.difference(&b).gids(), &[4, 0]);
    assert!(Map::new(vec![0, 4]).unwrap().is_subset_of(&a));
    assert!(!b.is_subset_of(&a));
}

#[test]
fn map_from_unsorted_sorts_and_deduplicates() {
    let map = Map::from_unsorted(vec![5, 1, 5, 3, 1]);
    assert_eq!(map.gids(), &[1, 3, 5]);
    assert_eq!(Map::contiguous(2, 3).gids(), &[2, 3, 4]);
}

#[test]
fn map_remap_keeps_extent() {
    let map = Map::contiguous(0, 3);
    assert_eq!(map.remap(vec![10, 11, 12]).unwrap().gids(), &[10, 11, 12]);
    assert!(map.remap(vec![10, 11]).is_err());
}
