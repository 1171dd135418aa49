use crate::config::{DualConsistency, IntegrationType, LmQuadratic, MortarParameters, ShapeFunction};
use crate::coupling::{
    cell_points, clip_polygons, element_points, full_element_dual, integrate_point, orient_polygon, project_polygon,
    projector_for, triangulate, AuxPlane, CouplingContributions, CouplingError, DualCoefficients, DualMatrices,
    IntegrationPoint, LmBasis, PairContext, VertexKind, MORTAR_INT_LIM,
};
use crate::element::{split_into_int_elements, ElementGeometry, IntElement};
use crate::interface::{MortarElement, MortarInterface};
use itertools::Itertools;
use log::{debug, trace, warn};
use mortar_geometry::signed_area;
use mortar_sparse::Gid;
use nalgebra::Point3;

/// Relative area deficit below which a slave element counts as fully covered.
const BOUNDARY_AREA_TOL: f64 = 1e-8;

/// Result of coupling one slave element.
#[derive(Debug, Clone, Default)]
pub struct ElementCoupling {
    pub contributions: CouplingContributions,
    /// Masters that contributed at least one integration point.
    pub coupled_masters: Vec<Gid>,
    pub num_cells: usize,
    /// Whether the coupled area is smaller than the slave element.
    pub boundary: bool,
    /// Dual coefficients used for the element, if any.
    pub dual: Option<DualCoefficients>,
}

/// Summary of a coupling pass over the interface.
#[derive(Debug, Clone, Default)]
pub struct InterfaceCoupling {
    pub contributions: CouplingContributions,
    pub num_cells: usize,
    /// Slave elements without any valid projection.
    pub uncoupled: Vec<Gid>,
}

struct Master<'a> {
    gid: Gid,
    element: &'a MortarElement,
    geometry: ElementGeometry,
    int_elements: Vec<IntElement>,
}

/// Integration points of a slave element, grouped by master.
struct PointSet {
    master: usize,
    slave_int_element: Option<usize>,
    points: Vec<IntegrationPoint>,
}

/// Couples slave elements against candidate master elements.
pub struct CouplingManager<'a> {
    interface: &'a MortarInterface,
    params: &'a MortarParameters,
}

fn bounding_sphere(geometry: &ElementGeometry) -> (Point3<f64>, f64) {
    let center = geometry.position(&geometry.cell().parametric_center());
    let radius = geometry
        .nodes()
        .iter()
        .map(|node| (node.position - center).norm())
        .fold(0.0, f64::max);
    (center, radius)
}

impl<'a> CouplingManager<'a> {
    pub fn new(interface: &'a MortarInterface, params: &'a MortarParameters) -> Self {
        Self { interface, params }
    }

    fn element(&self, gid: Gid) -> Result<&'a MortarElement, CouplingError> {
        self.interface
            .element(gid)
            .ok_or(CouplingError::UnknownElement(gid))
    }

    /// Rejects masters whose bounding sphere is too far away or whose center normal faces the
    /// same way as the slave normal.
    fn prefilter(&self, slave: &ElementGeometry, master: &ElementGeometry) -> bool {
        let (slave_center, slave_radius) = bounding_sphere(slave);
        let (master_center, master_radius) = bounding_sphere(master);
        let reach = (slave_radius + master_radius) * (1.0 + self.params.search_param);
        if (slave_center - master_center).norm() > reach {
            return false;
        }
        let normal = |g: &ElementGeometry| g.unit_normal(&g.cell().parametric_center());
        match (normal(slave), normal(master)) {
            (Some(ns), Some(nm)) => ns.into_inner().dot(&nm.into_inner()) <= 0.0,
            _ => false,
        }
    }

    /// Couples one slave element against the given master candidates.
    ///
    /// Masters that fail in a recoverable way are skipped. Fails only if the dual basis of the
    /// slave element does not exist.
    pub fn couple_element(&self, slave_gid: Gid, master_gids: &[Gid]) -> Result<ElementCoupling, CouplingError> {
        let slave = self.element(slave_gid)?;
        let slave_geometry = self.interface.geometry(slave);
        let slave_area = slave_geometry.area();
        if !(slave_area > 0.0) {
            return Err(CouplingError::DegenerateElement(slave_gid));
        }

        let mut masters = Vec::with_capacity(master_gids.len());
        for &gid in master_gids {
            let element = self.element(gid)?;
            let geometry = self.interface.geometry(element);
            if !self.prefilter(&slave_geometry, &geometry) {
                trace!("Pre-filter rejects master {} for slave {}", gid, slave_gid);
                continue;
            }
            let int_elements = split_into_int_elements(gid, &geometry);
            masters.push(Master {
                gid,
                element,
                geometry,
                int_elements,
            });
        }
        let slave_int_elements = split_into_int_elements(slave_gid, &slave_geometry);

        let segments = |this: &Self| this.segment_points(slave, &slave_geometry, &slave_int_elements, &masters);
        let (point_sets, num_cells, boundary, segment_based) = match self.params.int_type {
            IntegrationType::Segments => {
                let (sets, cells, boundary) = segments(self);
                (sets, cells, boundary, true)
            }
            IntegrationType::Elements | IntegrationType::ElementsBoundarySegmentation => {
                let (sets, covered) = self.element_based_points(&slave_geometry, &slave_int_elements, &masters);
                if !covered && self.params.int_type == IntegrationType::ElementsBoundarySegmentation {
                    trace!("Slave element {} is a boundary element, using segments", slave_gid);
                    let (sets, cells, boundary) = segments(self);
                    (sets, cells, boundary, true)
                } else {
                    (sets, 0, !covered, false)
                }
            }
        };

        let dual = if segment_based && self.use_consistent_dual(boundary) {
            self.consistent_dual(slave_gid, &slave_geometry, &point_sets)?
        } else {
            self.element_dual(slave_gid, &slave_geometry)?
        };
        let mut contributions = CouplingContributions::new();
        let mut coupled_masters = Vec::new();
        for set in &point_sets {
            let master = &masters[set.master];
            let lm = self.lm_basis(slave, &slave_int_elements, set.slave_int_element, dual.as_ref());
            let ctx = PairContext {
                slave: &slave_geometry,
                slave_nodes: &slave.nodes,
                master: &master.geometry,
                master_nodes: &master.element.nodes,
                lm,
                lumped: self.params.has_dual_lm(),
            };
            let mut contributed = false;
            for point in &set.points {
                contributed |= integrate_point(&ctx, point, &mut contributions);
            }
            if contributed {
                coupled_masters.push(master.gid);
            }
        }
        coupled_masters.sort_unstable();
        coupled_masters.dedup();

        Ok(ElementCoupling {
            contributions,
            coupled_masters,
            num_cells,
            boundary,
            dual,
        })
    }

    fn lm_basis<'b>(
        &self,
        slave: &MortarElement,
        slave_int_elements: &'b [IntElement],
        int_element: Option<usize>,
        dual: Option<&'b DualCoefficients>,
    ) -> LmBasis<'b> {
        if let Some(dual) = dual {
            return LmBasis::Dual(dual);
        }
        if !slave.cell.is_quadratic() {
            return LmBasis::Standard;
        }
        match self.params.lm_quad {
            LmQuadratic::Linear => LmBasis::Linear,
            LmQuadratic::PiecewiseLinear => match int_element {
                Some(index) => LmBasis::PiecewiseLinear(&slave_int_elements[index]),
                None => LmBasis::Standard,
            },
            _ => LmBasis::Standard,
        }
    }

    /// Clip-and-triangulate integration points for every pair of slave and master integration
    /// elements. Returns the point sets, the number of cells and whether the element is a boundary element.
    fn segment_points(
        &self,
        slave: &MortarElement,
        slave_geometry: &ElementGeometry,
        slave_int_elements: &[IntElement],
        masters: &[Master],
    ) -> (Vec<PointSet>, usize, bool) {
        let min_area = MORTAR_INT_LIM * slave_geometry.area();
        let mut sets = Vec::new();
        let mut num_cells = 0;
        let mut projected_area = 0.0;
        let mut cell_area = 0.0;

        for (s, slave_ie) in slave_int_elements.iter().enumerate() {
            let Some(aux) = AuxPlane::new(slave_ie.geometry()) else {
                debug!("Skipping degenerate integration element {} of slave {}", s, slave.gid);
                continue;
            };
            let mut slave_polygon = project_polygon(&aux, slave_ie.geometry(), VertexKind::SlaveNode);
            orient_polygon(&aux, &mut slave_polygon);
            let local = slave_polygon.iter().map(|v| aux.to_local(&v.coords)).collect_vec();
            projected_area += signed_area(&local);
            let slave_start = slave_ie.parent_param(&slave_ie.cell().parametric_center());

            for (m, master) in masters.iter().enumerate() {
                let projectors = projector_for(slave.cell, master.element.cell);
                let mut points = Vec::new();
                for master_ie in &master.int_elements {
                    let mut master_polygon = project_polygon(&aux, master_ie.geometry(), VertexKind::MasterNode);
                    orient_polygon(&aux, &mut master_polygon);
                    let clipped = match clip_polygons(&aux, &slave_polygon, &master_polygon) {
                        Ok(clipped) => clipped,
                        Err(error) => {
                            let error = CouplingError::Clip {
                                slave: slave.gid,
                                master: master.gid,
                                error,
                            };
                            debug!("Skipping integration element pair: {}", error);
                            continue;
                        }
                    };
                    if clipped.is_empty() {
                        continue;
                    }
                    let master_start = master_ie.parent_param(&master_ie.cell().parametric_center());
                    for cell in triangulate(&aux, &clipped, slave.gid, master.gid, min_area) {
                        match cell_points(
                            &cell,
                            slave_geometry,
                            &master.geometry,
                            projectors,
                            (slave_start, master_start),
                        ) {
                            Ok(cell_points) => {
                                num_cells += 1;
                                cell_area += cell.area();
                                points.extend(cell_points);
                            }
                            Err(error) => trace!("Discarding integration cell: {}", error),
                        }
                    }
                }
                if !points.is_empty() {
                    sets.push(PointSet {
                        master: m,
                        slave_int_element: Some(s),
                        points,
                    });
                }
            }
        }
        let boundary = cell_area < (1.0 - BOUNDARY_AREA_TOL) * projected_area;
        (sets, num_cells, boundary)
    }

    fn element_based_points(
        &self,
        slave_geometry: &ElementGeometry,
        slave_int_elements: &[IntElement],
        masters: &[Master],
    ) -> (Vec<PointSet>, bool) {
        let geometries = masters.iter().map(|m| &m.geometry).collect_vec();
        let settings = masters
            .iter()
            .map(|m| projector_for(slave_geometry.cell(), m.element.cell).onto_master)
            .collect_vec();
        let (points, covered) = element_points(slave_geometry, &geometries, &settings);

        let mut sets: Vec<PointSet> = Vec::new();
        for (master, point) in points {
            let slave_int_element = slave_int_elements.iter().position(|ie| {
                ie.local_param(&point.slave_xi)
                    .map_or(false, |local| ie.cell().contains_param(&local, 1e-12))
            });
            match sets
                .iter_mut()
                .find(|set| set.master == master && set.slave_int_element == slave_int_element)
            {
                Some(set) => set.points.push(point),
                None => sets.push(PointSet {
                    master,
                    slave_int_element,
                    points: vec![point],
                }),
            }
        }
        (sets, covered)
    }

    fn use_consistent_dual(&self, boundary: bool) -> bool {
        match self.params.lm_dual_consistent {
            DualConsistency::None => false,
            DualConsistency::Boundary => boundary,
            DualConsistency::All => true,
        }
    }

    fn element_dual(
        &self,
        slave_gid: Gid,
        slave_geometry: &ElementGeometry,
    ) -> Result<Option<DualCoefficients>, CouplingError> {
        if self.params.shape_function == ShapeFunction::Standard {
            return Ok(None);
        }
        full_element_dual(slave_geometry, slave_gid).map(Some)
    }

    /// Dual basis biorthogonal on the coupled part of the slave element.
    fn consistent_dual(
        &self,
        slave_gid: Gid,
        slave_geometry: &ElementGeometry,
        point_sets: &[PointSet],
    ) -> Result<Option<DualCoefficients>, CouplingError> {
        if self.params.shape_function == ShapeFunction::Standard {
            return Ok(None);
        }
        let mut matrices = DualMatrices::new(slave_geometry.nodes().len());
        for point in point_sets.iter().flat_map(|set| set.points.iter()) {
            let shape = slave_geometry.shape_functions(&point.slave_xi);
            matrices.add_point(&shape, point.weight, &point.weight_deriv, Some(&point.slave_xi_deriv));
        }
        match matrices.coefficients(slave_gid) {
            Ok(dual) => Ok(Some(dual)),
            Err(error) => {
                warn!("Consistent dual basis unavailable, using full element basis: {}", error);
                self.element_dual(slave_gid, slave_geometry)
            }
        }
    }
}

/// Couples every slave element of the interface against its search candidates.
///
/// Updates the cached dual coefficients and projection flags of the slave elements.
pub fn couple_interface(
    interface: &mut MortarInterface,
    params: &MortarParameters,
) -> Result<InterfaceCoupling, CouplingError> {
    let candidates = interface.search_candidates(params.search_param);
    let mut result = InterfaceCoupling::default();
    let mut element_updates = Vec::with_capacity(candidates.len());
    {
        let manager = CouplingManager::new(interface, params);
        for (slave, masters) in &candidates {
            match manager.couple_element(*slave, masters) {
                Ok(coupling) => {
                    let coupled = !coupling.coupled_masters.is_empty();
                    if !coupled {
                        warn!("Slave element {} has no valid projection", slave);
                    }
                    result.num_cells += coupling.num_cells;
                    result.contributions.merge(coupling.contributions);
                    element_updates.push((*slave, coupling.dual, coupled));
                }
                Err(error) if error.is_recoverable() => {
                    debug!("Skipping slave element {}: {}", slave, error);
                    element_updates.push((*slave, None, false));
                }
                Err(error) => return Err(error),
            }
        }
    }
    for (gid, dual, coupled) in element_updates {
        if let Some(element) = interface.element_mut(gid) {
            element.dual = dual;
            element.has_projection = coupled;
        }
        if !coupled {
            result.uncoupled.push(gid);
        }
    }
    Ok(result)
}
