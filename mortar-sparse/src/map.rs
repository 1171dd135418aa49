use crate::{AlgebraError, Communicator, Gid};
use itertools::Itertools;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

/// An ordered index set of global ids.
///
/// The position of a global id in the map is its *local id*. Every map built here is owned
/// entirely by the calling process.
#[derive(Debug, Clone, Default)]
pub struct Map {
    gids: Vec<Gid>,
    lids: FxHashMap<Gid, usize>,
    num_global: OnceLock<usize>,
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.gids == other.gids
    }
}

impl Eq for Map {}

impl Map {
    pub fn new(gids: Vec<Gid>) -> Result<Self, AlgebraError> {
        let mut lids = FxHashMap::default();
        lids.reserve(gids.len());
        for (lid, &gid) in gids.iter().enumerate() {
            if lids.insert(gid, lid).is_some() {
                return Err(AlgebraError::DuplicateGid(gid));
            }
        }
        Ok(Self {
            gids,
            lids,
            num_global: OnceLock::new(),
        })
    }

    /// Builds a map from arbitrary ids, sorting them and removing duplicates.
    pub fn from_unsorted(gids: impl IntoIterator<Item = Gid>) -> Self {
        let gids = gids.into_iter().sorted_unstable().dedup().collect_vec();
        let lids = gids.iter().enumerate().map(|(lid, &gid)| (gid, lid)).collect();
        Self {
            gids,
            lids,
            num_global: OnceLock::new(),
        }
    }

    /// The map `{offset, offset + 1, ..., offset + len - 1}`.
    pub fn contiguous(offset: Gid, len: usize) -> Self {
        Self::from_unsorted(offset..offset + len)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn num_local_elements(&self) -> usize {
        self.gids.len()
    }

    /// Number of elements across all processes.
    ///
    /// This is a collective call the first time it is made for a given map.
    pub fn num_global_elements(&self, comm: &dyn Communicator) -> usize {
        *self
            .num_global
            .get_or_init(|| comm.sum_all_usize(self.gids.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.gids.is_empty()
    }

    pub fn gids(&self) -> &[Gid] {
        &self.gids
    }

    pub fn gid(&self, lid: usize) -> Gid {
        self.gids[lid]
    }

    pub fn lid(&self, gid: Gid) -> Option<usize> {
        self.lids.get(&gid).copied()
    }

    pub fn contains(&self, gid: Gid) -> bool {
        self.lids.contains_key(&gid)
    }

    pub fn iter(&self) -> impl Iterator<Item = Gid> + '_ {
        self.gids.iter().copied()
    }

    pub fn is_subset_of(&self, other: &Map) -> bool {
        self.gids.iter().all(|&gid| other.contains(gid))
    }

    /// Sorted union. Overlapping maps are allowed.
    pub fn union(&self, other: &Map) -> Map {
        Self::from_unsorted(self.iter().chain(other.iter()))
    }

    pub fn union_all<'a>(maps: impl IntoIterator<Item = &'a Map>) -> Map {
        Self::from_unsorted(maps.into_iter().flat_map(Map::iter))
    }

    /// Elements of `self` that are also in `other`, in the order of `self`.
    pub fn intersection(&self, other: &Map) -> Map {
        self.filtered(|gid| other.contains(gid))
    }

    /// Elements of `self` that are not in `other`, in the order of `self`.
    pub fn difference(&self, other: &Map) -> Map {
        self.filtered(|gid| !other.contains(gid))
    }

    /// Relabels the map with new global ids while keeping the local layout.
    pub fn remap(&self, new_gids: Vec<Gid>) -> Result<Map, AlgebraError> {
        if new_gids.len() != self.gids.len() {
            return Err(AlgebraError::MapMismatch("remapped ids must keep the local extent"));
        }
        Map::new(new_gids)
    }

    fn filtered(&self, predicate: impl Fn(Gid) -> bool) -> Map {
        let gids = self.iter().filter(|&gid| predicate(gid)).collect_vec();
        let lids = gids.iter().enumerate().map(|(lid, &gid)| (gid, lid)).collect();
        Map {
            gids,
            lids,
            num_global: OnceLock::new(),
        }
    }
}
