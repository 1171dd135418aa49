//! Contact search: candidate master elements for every slave element.
use crate::element::ElementGeometry;
use crate::interface::{MortarInterface, Side};
use mortar_sparse::Gid;
use nalgebra::Point3;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

/// Slave element ids with their candidate master element ids, both in increasing order.
pub type CandidatePairs = Vec<(Gid, Vec<Gid>)>;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((*first, *first), |(min, max), p| (min.inf(p), max.sup(p)));
        Some(Self { min, max })
    }

    /// Enlarges the box by `margin` in every direction.
    pub fn inflate(&self, margin: f64) -> Self {
        Self {
            min: self.min.map(|x| x - margin),
            max: self.max.map(|x| x + margin),
        }
    }

    pub fn diameter(&self) -> f64 {
        (self.max - self.min).norm()
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    fn envelope(&self) -> AABB<[f64; 3]> {
        AABB::from_corners(self.min.coords.into(), self.max.coords.into())
    }
}

/// Bounding box of the element nodes. For NURBS elements the control net bounds the surface.
pub fn element_bounding_box(geometry: &ElementGeometry) -> Option<BoundingBox> {
    BoundingBox::from_points(geometry.nodes().iter().map(|node| &node.position))
}

/// R-tree over the enlarged bounding boxes of a set of elements.
pub struct ElementTree {
    tree: RTree<GeomWithData<Rectangle<[f64; 3]>, Gid>>,
}

impl ElementTree {
    pub fn new(boxes: impl IntoIterator<Item = (Gid, BoundingBox)>) -> Self {
        let objects = boxes
            .into_iter()
            .map(|(gid, bb)| {
                let rectangle = Rectangle::from_corners(bb.min.coords.into(), bb.max.coords.into());
                GeomWithData::new(rectangle, gid)
            })
            .collect();
        Self {
            tree: RTree::bulk_load(objects),
        }
    }

    /// Ids of all elements whose box intersects `query`, sorted.
    pub fn intersecting(&self, query: &BoundingBox) -> Vec<Gid> {
        let mut gids: Vec<_> = self
            .tree
            .locate_in_envelope_intersecting(&query.envelope())
            .map(|object| object.data)
            .collect();
        gids.sort_unstable();
        gids
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Enlarged box of an element: each box grows by `search_param` times its own diameter.
fn search_box(geometry: &ElementGeometry, search_param: f64) -> Option<BoundingBox> {
    let bb = element_bounding_box(geometry)?;
    let margin = search_param * bb.diameter();
    Some(bb.inflate(margin))
}

pub fn find_candidates(interface: &MortarInterface, search_param: f64) -> CandidatePairs {
    let master_boxes = interface.elements_on(Side::Master).filter_map(|element| {
        let geometry = interface.geometry(element);
        search_box(&geometry, search_param).map(|bb| (element.gid, bb))
    });
    let tree = ElementTree::new(master_boxes.collect::<Vec<_>>());

    let mut pairs: CandidatePairs = interface
        .elements_on(Side::Slave)
        .filter_map(|element| {
            let geometry = interface.geometry(element);
            let bb = search_box(&geometry, search_param)?;
            Some((element.gid, tree.intersecting(&bb)))
        })
        .collect();
    pairs.sort_unstable_by_key(|(gid, _)| *gid);
    pairs
}
