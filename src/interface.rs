//! The mortar interface: slave and master surface nodes and elements.
use crate::coupling::DualCoefficients;
use crate::deriv::{cross_deriv, normalize_deriv, outer, add_scaled_vec3, DerivVec3, dot_const};
use crate::element::{CellType, ElementGeometry, GeometryNode, NurbsData};
use crate::search::{find_candidates, CandidatePairs};
use log::warn;
use mortar_sparse::{Gid, Map, Vector};
use nalgebra::{Point3, Vector3};
use ordered_float::OrderedFloat;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Side {
    Slave,
    Master,
}

/// Averaged unit normal and orthonormal tangents at a node, with their sensitivities.
#[derive(Debug, Clone, PartialEq)]
pub struct NodalFrame {
    pub normal: Vector3<f64>,
    pub tangents: [Vector3<f64>; 2],
    pub normal_deriv: DerivVec3,
    pub tangent_derivs: [DerivVec3; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct MortarNode {
    pub gid: Gid,
    pub dofs: [Gid; 3],
    pub reference: Point3<f64>,
    pub current: Point3<f64>,
    pub side: Side,
    pub frame: Option<NodalFrame>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MortarElement {
    pub gid: Gid,
    pub cell: CellType,
    pub nodes: Vec<Gid>,
    pub side: Side,
    pub nurbs: Option<NurbsData>,
    /// Consistent dual coefficients of the current coupling pass, if any were computed.
    pub dual: Option<DualCoefficients>,
    /// Cleared when no master element could be coupled in the last pass.
    pub has_projection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InterfaceError {
    DuplicateNode(Gid),
    DuplicateElement(Gid),
    DuplicateDof(Gid),
    /// A structural DOF id collides with the range reserved for Lagrange multipliers.
    DofInMultiplierRange(Gid),
    UnknownNode { element: Gid, node: Gid },
    NodeCountMismatch { element: Gid, expected: usize, actual: usize },
    /// An element references a node on the opposite side of the interface.
    SideMismatch { element: Gid, node: Gid },
    MissingNurbsData(Gid),
    MissingDisplacement(Gid),
    /// All elements adjacent to the node are degenerate.
    DegenerateNormal(Gid),
}

impl Display for InterfaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNode(gid) => write!(f, "node {} added twice", gid),
            Self::DuplicateElement(gid) => write!(f, "element {} added twice", gid),
            Self::DuplicateDof(dof) => write!(f, "dof {} belongs to more than one node", dof),
            Self::DofInMultiplierRange(dof) => {
                write!(f, "dof {} lies in the id range reserved for Lagrange multipliers", dof)
            }
            Self::UnknownNode { element, node } => {
                write!(f, "element {} references unknown node {}", element, node)
            }
            Self::NodeCountMismatch {
                element,
                expected,
                actual,
            } => write!(f, "element {} has {} nodes, expected {}", element, actual, expected),
            Self::SideMismatch { element, node } => {
                write!(f, "element {} references node {} of the opposite side", element, node)
            }
            Self::MissingNurbsData(gid) => write!(f, "NURBS element {} has no knot vectors and weights", gid),
            Self::MissingDisplacement(dof) => write!(f, "displacement vector has no entry for dof {}", dof),
            Self::DegenerateNormal(gid) => write!(f, "cannot compute a normal at node {}", gid),
        }
    }
}

impl std::error::Error for InterfaceError {}

/// Slave and master surfaces of one mortar interface.
///
/// Lagrange multiplier DOFs are associated with slave DOFs by a fixed offset: the multiplier of
/// slave DOF `d` has the id `d + lm_dof_offset`. Structural DOF ids must therefore stay below the
/// offset.
#[derive(Debug, Clone)]
pub struct MortarInterface {
    nodes: Vec<MortarNode>,
    node_lids: FxHashMap<Gid, usize>,
    elements: Vec<MortarElement>,
    element_lids: FxHashMap<Gid, usize>,
    node_elements: FxHashMap<Gid, Vec<Gid>>,
    dofs: FxHashSet<Gid>,
    lm_dof_offset: Gid,
}

impl MortarInterface {
    pub fn new(lm_dof_offset: Gid) -> Self {
        Self {
            nodes: Vec::new(),
            node_lids: FxHashMap::default(),
            elements: Vec::new(),
            element_lids: FxHashMap::default(),
            node_elements: FxHashMap::default(),
            dofs: FxHashSet::default(),
            lm_dof_offset,
        }
    }

    pub fn add_node(&mut self, gid: Gid, dofs: [Gid; 3], reference: Point3<f64>, side: Side) -> Result<(), InterfaceError> {
        if self.node_lids.contains_key(&gid) {
            return Err(InterfaceError::DuplicateNode(gid));
        }
        for dof in dofs {
            if dof >= self.lm_dof_offset {
                return Err(InterfaceError::DofInMultiplierRange(dof));
            }
            if self.dofs.contains(&dof) {
                return Err(InterfaceError::DuplicateDof(dof));
            }
        }
        self.dofs.extend(dofs);
        self.node_lids.insert(gid, self.nodes.len());
        self.nodes.push(MortarNode {
            gid,
            dofs,
            reference,
            current: reference,
            side,
            frame: None,
        });
        Ok(())
    }

    pub fn add_element(
        &mut self,
        gid: Gid,
        cell: CellType,
        nodes: Vec<Gid>,
        side: Side,
        nurbs: Option<NurbsData>,
    ) -> Result<(), InterfaceError> {
        if self.element_lids.contains_key(&gid) {
            return Err(InterfaceError::DuplicateElement(gid));
        }
        if nodes.len() != cell.num_nodes() {
            return Err(InterfaceError::NodeCountMismatch {
                element: gid,
                expected: cell.num_nodes(),
                actual: nodes.len(),
            });
        }
        if cell == CellType::Nurbs9 && nurbs.is_none() {
            return Err(InterfaceError::MissingNurbsData(gid));
        }
        for &node in &nodes {
            let node_side = self
                .node(node)
                .ok_or(InterfaceError::UnknownNode { element: gid, node })?
                .side;
            if node_side != side {
                return Err(InterfaceError::SideMismatch { element: gid, node });
            }
        }
        for &node in &nodes {
            self.node_elements.entry(node).or_default().push(gid);
        }
        self.element_lids.insert(gid, self.elements.len());
        self.elements.push(MortarElement {
            gid,
            cell,
            nodes,
            side,
            nurbs,
            dual: None,
            has_projection: true,
        });
        Ok(())
    }

    pub fn lm_dof_offset(&self) -> Gid {
        self.lm_dof_offset
    }

    pub fn node(&self, gid: Gid) -> Option<&MortarNode> {
        self.node_lids.get(&gid).map(|&lid| &self.nodes[lid])
    }

    pub fn node_mut(&mut self, gid: Gid) -> Option<&mut MortarNode> {
        self.node_lids.get(&gid).map(|&lid| &mut self.nodes[lid])
    }

    pub fn element(&self, gid: Gid) -> Option<&MortarElement> {
        self.element_lids.get(&gid).map(|&lid| &self.elements[lid])
    }

    pub fn element_mut(&mut self, gid: Gid) -> Option<&mut MortarElement> {
        self.element_lids.get(&gid).map(|&lid| &mut self.elements[lid])
    }

    pub fn nodes(&self) -> &[MortarNode] {
        &self.nodes
    }

    pub fn elements(&self) -> &[MortarElement] {
        &self.elements
    }

    pub fn nodes_on(&self, side: Side) -> impl Iterator<Item = &MortarNode> {
        self.nodes.iter().filter(move |node| node.side == side)
    }

    pub fn elements_on(&self, side: Side) -> impl Iterator<Item = &MortarElement> {
        self.elements.iter().filter(move |element| element.side == side)
    }

    pub fn adjacent_elements(&self, node: Gid) -> &[Gid] {
        self.node_elements.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lagrange multiplier DOFs of a slave node.
    pub fn lm_dofs(&self, node: &MortarNode) -> [Gid; 3] {
        node.dofs.map(|dof| dof + self.lm_dof_offset)
    }

    fn dof_map(&self, side: Side) -> Map {
        Map::from_unsorted(self.nodes_on(side).flat_map(|node| node.dofs))
    }

    pub fn slave_dofs(&self) -> Map {
        self.dof_map(Side::Slave)
    }

    pub fn master_dofs(&self) -> Map {
        self.dof_map(Side::Master)
    }

    /// Lagrange multiplier DOFs in the same order as [`slave_dofs`](Self::slave_dofs).
    pub fn slave_lm_dofs(&self) -> Map {
        Map::from_unsorted(self.nodes_on(Side::Slave).flat_map(|node| self.lm_dofs(node)))
    }

    /// Sets `x = X + u` for every node.
    pub fn set_current_positions(&mut self, displacement: &Vector) -> Result<(), InterfaceError> {
        for node in &mut self.nodes {
            let mut u = Vector3::zeros();
            for (d, &dof) in node.dofs.iter().enumerate() {
                u[d] = displacement
                    .get(dof)
                    .ok_or(InterfaceError::MissingDisplacement(dof))?;
            }
            node.current = node.reference + u;
        }
        Ok(())
    }

    /// Current geometry of an element.
    ///
    /// # Panics
    ///
    /// Panics if the element references nodes that are not part of the interface, which
    /// [`add_element`](Self::add_element) rules out.
    pub fn geometry(&self, element: &MortarElement) -> ElementGeometry {
        let nodes = element
            .nodes
            .iter()
            .map(|&gid| {
                let node = &self.nodes[self.node_lids[&gid]];
                GeometryNode::from_mesh_node(node.current, node.dofs)
            })
            .collect();
        ElementGeometry::new(element.cell, nodes, element.nurbs.clone())
    }

    /// Computes the averaged nodal normals and tangents of all nodes.
    ///
    /// The nodal normal is the normalized sum of the unit normals of the adjacent elements, evaluated
    /// at the node. The first tangent is the normalized projection of the coordinate axis least aligned
    /// with the normal, and the second completes a right-handed frame.
    pub fn evaluate_nodal_normals(&mut self) -> Result<(), InterfaceError> {
        let mut frames = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut sum = Vector3::zeros();
            let mut sum_deriv = DerivVec3::default();
            for &element_gid in self.adjacent_elements(node.gid) {
                let element = &self.elements[self.element_lids[&element_gid]];
                let local = element
                    .nodes
                    .iter()
                    .position(|&n| n == node.gid)
                    .unwrap_or_else(|| unreachable!("adjacency is symmetric"));
                let xi = element.cell.node_params()[local];
                let geometry = self.geometry(element);
                match geometry.unit_normal(&xi) {
                    Some(n) => {
                        sum += n.into_inner();
                        add_scaled_vec3(&mut sum_deriv, &geometry.unit_normal_deriv(&xi), 1.0);
                    }
                    None => warn!("Skipping degenerate element {} in normal of node {}", element_gid, node.gid),
                }
            }
            if sum.norm() <= f64::EPSILON {
                return Err(InterfaceError::DegenerateNormal(node.gid));
            }
            frames.push(nodal_frame(&sum, &sum_deriv));
        }
        for (node, frame) in self.nodes.iter_mut().zip(frames) {
            node.frame = Some(frame);
        }
        Ok(())
    }

    /// Master element candidates for every slave element, from bounding boxes enlarged by `search_param`
    /// times the element size.
    pub fn search_candidates(&self, search_param: f64) -> CandidatePairs {
        find_candidates(self, search_param)
    }
}

/// Frame with normal `v / |v|` and tangents chosen as described in
/// [`MortarInterface::evaluate_nodal_normals`].
fn nodal_frame(v: &Vector3<f64>, dv: &DerivVec3) -> NodalFrame {
    let normal = v.normalize();
    let normal_deriv = normalize_deriv(v, dv);

    let axis_index = (0..3)
        .min_by_key(|&i| OrderedFloat(normal[i].abs()))
        .unwrap_or(0);
    let axis = Vector3::ith(axis_index, 1.0);
    // s = e - (e·n) n
    let e_dot_n = axis.dot(&normal);
    let s = axis - normal * e_dot_n;
    let mut ds = outer(&normal, &dot_const(&axis, &normal_deriv));
    crate::deriv::scale_vec3(&mut ds, -1.0);
    add_scaled_vec3(&mut ds, &normal_deriv, -e_dot_n);
    let t1 = s.normalize();
    let t1_deriv = normalize_deriv(&s, &ds);
    let t2 = normal.cross(&t1);
    let t2_deriv = cross_deriv(&normal, &normal_deriv, &t1, &t1_deriv);

    NodalFrame {
        normal,
        tangents: [t1, t2],
        normal_deriv,
        tangent_derivs: [t1_deriv, t2_deriv],
    }
}
