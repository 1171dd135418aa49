use crate::coupling::{line_clip_vertex, AuxPlane, Vertex, VertexKind, MORTAR_CLIP_TOL};
use itertools::Itertools;
use log::trace;
use mortar_geometry::{clip_convex_polygons, max_edge_length, signed_area, ClipError, ClipSource};
use nalgebra::Point2;

/// Orders a projected polygon counter-clockwise around the auxiliary plane normal.
///
/// Master outlines wind clockwise when the two surfaces face each other.
pub fn orient_polygon(aux: &AuxPlane, polygon: &mut [Vertex]) {
    let local = polygon.iter().map(|v| aux.to_local(&v.coords)).collect_vec();
    if signed_area(&local) < 0.0 {
        polygon.reverse();
    }
}

/// The convex intersection of the slave and master polygons on the auxiliary plane.
///
/// Both polygons must be counter-clockwise around the plane normal (see [`orient_polygon`]).
/// Vertices of either polygon inside the other are carried over with their derivatives, and edge
/// intersections become line-clip vertices. An empty result means the polygons do not overlap.
pub fn clip_polygons(aux: &AuxPlane, slave: &[Vertex], master: &[Vertex]) -> Result<Vec<Vertex>, ClipError> {
    let slave_local = slave.iter().map(|v| aux.to_local(&v.coords)).collect_vec();
    let master_local = master.iter().map(|v| aux.to_local(&v.coords)).collect_vec();
    let tol = clip_tolerance(&slave_local, &master_local);

    let clipped = clip_convex_polygons(&slave_local, &master_local, tol)?;
    let mut result = Vec::with_capacity(clipped.len());
    for vertex in clipped {
        let mut v = match vertex.source {
            ClipSource::First(i) => slave[i].clone(),
            ClipSource::Second(j) => master[j].clone(),
            ClipSource::EdgeIntersection {
                first_edge,
                second_edge,
            } => {
                let slave_edge = [&slave[first_edge], &slave[(first_edge + 1) % slave.len()]];
                let master_edge = [&master[second_edge], &master[(second_edge + 1) % master.len()]];
                match line_clip_vertex(aux, slave_edge, master_edge) {
                    Some(v) => v,
                    None => {
                        trace!("Dropping line-clip vertex of parallel edges {} and {}", first_edge, second_edge);
                        continue;
                    }
                }
            }
        };
        v.merged = vertex.merged.iter().map(vertex_kind).collect();
        result.push(v);
    }
    if result.len() < 3 {
        result.clear();
    }
    Ok(result)
}

fn vertex_kind(source: &ClipSource) -> VertexKind {
    match source {
        ClipSource::First(_) => VertexKind::SlaveNode,
        ClipSource::Second(_) => VertexKind::MasterNode,
        ClipSource::EdgeIntersection { .. } => VertexKind::LineClip,
    }
}

fn clip_tolerance(slave: &[Point2<f64>], master: &[Point2<f64>]) -> f64 {
    MORTAR_CLIP_TOL * max_edge_length(slave).max(max_edge_length(master))
}
