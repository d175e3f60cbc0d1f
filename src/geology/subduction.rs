//! Subduction of compressed oceanic crust

use glam::DVec3;
use tracing::{debug, info};

use crate::crust::Crust;
use crate::error::ConsistencyError;
use crate::plate::PlateId;
use crate::point::{Point, PointId};
use crate::triangulation::Mesh;

use super::boundary_points;

/// Radius of the volcanic arc on the overriding plate, km
pub const ARC_RADIUS: f64 = 400.0;

/// Volcanic rock added at the subduction point, km
pub const ARC_THICKNESS: f64 = 1.2;

/// Density of volcanic rock
pub const ARC_DENSITY: f64 = 2.7;

/// Uplift of the overriding plate at the subduction point, km
pub const ARC_UPLIFT: f64 = 0.2;

/// Radius of the trench on the subducting plate, km
pub const TRENCH_RADIUS: f64 = 200.0;

/// Depth of the trench at the subduction point, km
pub const TRENCH_DEPTH: f64 = 2.0;

/// Magnitude of the slab pull on points near the trench
pub const SLAB_PULL: f64 = 100.0;

/// Radius along the plate boundary over which subduction lifts or sinks
/// the crust, km
pub const BOUNDARY_RADIUS: f64 = 1500.0;

/// Boundary uplift of the overriding plate, km
pub const BOUNDARY_UPLIFT: f64 = 0.1;

/// Boundary sinking of the subducting plate, km
pub const BOUNDARY_SINK: f64 = 1.0;

/// Per-epoch relaxation of base depth offsets
pub const BASE_DEPTH_DECAY: f64 = 0.99;

/// What the subduction pass did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubductionOutcome {
    /// Points destroyed
    pub subducted: usize,
    /// Rock volume destroyed with them, km³
    pub volume_lost: f64,
    /// Volcanic rock added to overriding plates, km³
    pub volcanic_volume: f64,
}

/// Apply `f(point, distance)` to every member of `plate` within `radius`
/// of `origin`
fn for_members_within<F>(
    crust: &mut Crust,
    plate: PlateId,
    origin: DVec3,
    radius: f64,
    mut f: F,
) -> Result<(), ConsistencyError>
where
    F: FnMut(PointId, &mut Point, f64) -> Result<(), ConsistencyError>,
{
    let Some(members) = crust.plate(plate).map(|p| p.points.clone()) else {
        return Ok(());
    };
    for p in members {
        let point = crust.get_mut(p)?;
        let d = point.pos.distance(origin);
        if d < radius {
            f(p, point, d)?;
        }
    }
    Ok(())
}

/// Subduct the lower end of every queued link
///
/// Links whose points have already been destroyed by an earlier entry in
/// the queue are skipped. The destroyed point's wedges and links are
/// removed from `mesh`.
pub fn subduct(
    crust: &mut Crust,
    mesh: &mut Mesh,
    queue: &[(PointId, PointId)],
) -> Result<SubductionOutcome, ConsistencyError> {
    let edge = boundary_points(crust, mesh.links());
    let mut outcome = SubductionOutcome::default();

    for &(a, b) in queue {
        let (Some(pa), Some(pb)) = (crust.point(a), crust.point(b)) else {
            continue;
        };
        let (down, up) = if pa.surface_height() < pb.surface_height() {
            (a, b)
        } else {
            (b, a)
        };
        let sinking = crust.get(down)?;
        let (down_plate, down_pos) = (sinking.plate, sinking.pos);
        let (up_plate, up_pos) = {
            let p = crust.get(up)?;
            (p.plate, p.pos)
        };

        let mut slab = DVec3::ZERO;
        for &n in mesh.neighbours(down) {
            if let Some(np) = crust.point(n) {
                if np.plate == down_plate {
                    slab += down_pos - np.pos;
                }
            }
        }
        let slab = slab.try_normalize().map(|s| s * SLAB_PULL);

        mesh.remove_point(down, crust);
        let dead = crust.kill_point(down)?;
        outcome.subducted += 1;
        outcome.volume_lost += dead.volume();

        let mut volcanic = 0.0;
        for_members_within(crust, up_plate, up_pos, ARC_RADIUS, |id, p, d| {
            let layer = ARC_THICKNESS * (1.0 - d / ARC_RADIUS);
            volcanic += layer * p.area;
            p.base_depth_offset += ARC_UPLIFT * (1.0 - d / ARC_RADIUS);
            p.add_rock(id, layer, ARC_DENSITY)
        })?;
        outcome.volcanic_volume += volcanic;
        for_members_within(crust, up_plate, up_pos, BOUNDARY_RADIUS, |id, p, d| {
            if edge.get(id.index()).copied().unwrap_or(false) {
                p.base_depth_offset += BOUNDARY_UPLIFT * (1.0 - d / BOUNDARY_RADIUS);
            }
            Ok(())
        })?;

        if let Some(slab) = slab {
            for_members_within(crust, down_plate, down_pos, TRENCH_RADIUS, |_, p, d| {
                p.base_depth_offset -= TRENCH_DEPTH * (1.0 - d / TRENCH_RADIUS);
                p.collision_force += slab;
                Ok(())
            })?;
            for_members_within(crust, down_plate, down_pos, BOUNDARY_RADIUS, |id, p, d| {
                if edge.get(id.index()).copied().unwrap_or(false) {
                    p.base_depth_offset -= BOUNDARY_SINK * (1.0 - d / BOUNDARY_RADIUS);
                }
                Ok(())
            })?;
        }
        debug!(point = %down, plate = %down_plate, under = %up_plate, "point subducted");
    }
    if outcome.subducted > 0 {
        info!(
            points = outcome.subducted,
            volcanic = outcome.volcanic_volume,
            "subduction"
        );
    }
    Ok(outcome)
}

/// Let base depth offsets relax towards zero
pub fn decay_base_depth(crust: &mut Crust) {
    for (_, p) in crust.points_mut() {
        p.base_depth_offset *= BASE_DEPTH_DECAY;
    }
}
