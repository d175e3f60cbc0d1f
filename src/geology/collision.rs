//! Continental collision, obduction and crustal deformation

use glam::DVec3;
use tracing::{debug, info};

use crate::crust::Crust;
use crate::error::ConsistencyError;
use crate::links::LinkSystem;
use crate::plate::PlateId;
use crate::point::PointId;
use crate::triangulation::{triangle_area, Mesh};

use super::{cross_plate_links, natural_length};

/// Strength of the push between colliding continents
pub const COLLISION_FORCE: f64 = 0.4;

/// How far colliding crust is shoved per epoch, relative to the overlap
pub const SQUASH: f64 = 0.004;

/// Radius around a collision inside which crust is deformed, km
pub const SQUASH_RADIUS: f64 = 300.0;

/// Largest landmass that can be obducted, km²
pub const OBDUCTION_AREA_LIMIT: f64 = 1.0e7;

/// Compression (length / natural length) below which a landmass obducts
pub const OBDUCTION_RATIO: f64 = 0.8;

/// Compression below which colliding continents deform
pub const DEFORMATION_RATIO: f64 = 0.9;

/// Compression below which oceanic crust subducts
pub const SUBDUCTION_RATIO: f64 = 0.6;

/// Connected continental crust of one plate
#[derive(Debug, Clone, PartialEq)]
pub struct Landmass {
    pub plate: PlateId,
    pub points: Vec<PointId>,
    /// Total area of the member points, km²
    pub area: f64,
}

/// What the collision pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionOutcome {
    pub obductions: usize,
    pub deformations: usize,
    /// Rock volume gained (or lost, if negative) by rescaling deformed
    /// columns at their current areas, km³
    pub deformation_volume: f64,
    /// Compressed links with oceanic crust, to be subducted
    pub subductions: Vec<(PointId, PointId)>,
}

/// Group continental points into landmasses
///
/// Two continental points are in the same landmass when a chain of links
/// between continental points of their plate joins them. Each point's
/// `landmass` field is set to its index in the returned list.
pub fn find_landmasses(crust: &mut Crust, links: &LinkSystem) -> Vec<Landmass> {
    for (_, p) in crust.points_mut() {
        p.landmass = None;
    }
    let mut landmasses = Vec::new();
    for first in crust.point_ids() {
        let Some(point) = crust.point(first) else { continue };
        if point.landmass.is_some() || !point.is_continental() {
            continue;
        }
        let index = landmasses.len();
        let plate = point.plate;
        let mut members = vec![first];
        let mut area = 0.0;
        if let Some(p) = crust.point_mut(first) {
            p.landmass = Some(index);
        }
        let mut next = 0;
        while next < members.len() {
            let p = members[next];
            next += 1;
            area += crust.point(p).map_or(0.0, |pt| pt.area);
            for &n in links.neighbours(p) {
                if let Some(np) = crust.point_mut(n) {
                    if np.landmass.is_none() && np.plate == plate && np.is_continental() {
                        np.landmass = Some(index);
                        members.push(n);
                    }
                }
            }
        }
        landmasses.push(Landmass {
            plate,
            points: members,
            area,
        });
    }
    debug!(count = landmasses.len(), "found landmasses");
    landmasses
}

/// Resolve every compressed plate boundary
///
/// `landmasses` must come from [`find_landmasses`] on the current plates.
/// For a given link, obduction and deformation never both happen.
pub fn collide(
    crust: &mut Crust,
    mesh: &Mesh,
    landmasses: &[Landmass],
    planet_radius: f64,
) -> Result<CollisionOutcome, ConsistencyError> {
    let mut outcome = CollisionOutcome::default();

    for (a, b) in cross_plate_links(crust, mesh.links()) {
        let (pa, pb) = (crust.get(a)?, crust.get(b)?);
        // An earlier obduction may have put both ends on one plate
        if pa.plate == pb.plate {
            continue;
        }
        let nat = natural_length(pa, pb);
        let len = pa.pos.distance(pb.pos);
        if !(len < nat) || len <= 0.0 {
            continue;
        }

        if pa.is_continental() && pb.is_continental() {
            let push = (pb.pos - pa.pos) * COLLISION_FORCE * nat / len;
            let (la, lb) = (pa.landmass, pb.landmass);
            crust.get_mut(a)?.collision_force += push * 0.1;
            crust.get_mut(b)?.collision_force -= push * 0.1;

            let mut obducted = false;
            if len < nat * OBDUCTION_RATIO {
                if let (Some(la), Some(lb)) = (la, lb) {
                    obducted = try_obduct(crust, landmasses, (a, la), (b, lb))?;
                }
            }
            if obducted {
                outcome.obductions += 1;
            } else if len < nat * DEFORMATION_RATIO {
                outcome.deformation_volume += deform(crust, mesh, a, b, nat, len, planet_radius)?;
                outcome.deformations += 1;
            }
        } else if len < nat * SUBDUCTION_RATIO {
            outcome.subductions.push((a, b));
        }
    }
    Ok(outcome)
}

/// Move the smaller of two colliding landmasses onto the other's plate, if
/// it is small enough
fn try_obduct(
    crust: &mut Crust,
    landmasses: &[Landmass],
    (a, la): (PointId, usize),
    (b, lb): (PointId, usize),
) -> Result<bool, ConsistencyError> {
    let (Some(mass_a), Some(mass_b)) = (landmasses.get(la), landmasses.get(lb)) else {
        return Ok(false);
    };
    let (small, onto) = if mass_a.area < mass_b.area {
        (mass_a, b)
    } else {
        (mass_b, a)
    };
    if small.area > OBDUCTION_AREA_LIMIT {
        return Ok(false);
    }
    let target = crust.get(onto)?.plate;
    for &p in &small.points {
        if crust.is_alive(p) {
            crust.assign_point(p, target)?;
        }
    }
    info!(
        points = small.points.len(),
        area = small.area,
        onto = %target,
        "landmass obducted"
    );
    Ok(true)
}

/// Crumple both plates around a collision
///
/// Points of each plate within [`SQUASH_RADIUS`] of its colliding point are
/// pushed away from the other plate, less the further they are. Wedges of
/// either plate touching a moved point keep their rock volume: their
/// points' thickness is scaled by the area lost or gained.
///
/// Returns the change in rock volume measured with the points' current
/// areas, which are only refreshed once the mesh is repaired.
fn deform(
    crust: &mut Crust,
    mesh: &Mesh,
    a: PointId,
    b: PointId,
    nat: f64,
    len: f64,
    planet_radius: f64,
) -> Result<f64, ConsistencyError> {
    let (pa, pb) = (crust.get(a)?, crust.get(b)?);
    let (plate_a, plate_b) = (pa.plate, pb.plate);
    let (pos_a, pos_b) = (pa.pos, pb.pos);
    let shove = (pos_a - pos_b) * SQUASH * nat / len;

    let mut moves: Vec<(PointId, DVec3)> = Vec::new();
    for (plate, origin, dir) in [(plate_a, pos_a, shove), (plate_b, pos_b, -shove)] {
        let members = crust.plate(plate).ok_or(ConsistencyError::UnknownPlate(plate))?;
        for &p in &members.points {
            let d = crust.get(p)?.pos.distance(origin);
            if d < SQUASH_RADIUS {
                moves.push((p, dir * (1.0 - d / SQUASH_RADIUS)));
            }
        }
    }
    let mut moved = vec![false; crust.point_capacity()];
    for &(p, _) in &moves {
        moved[p.index()] = true;
    }

    // Wedges entirely on one of the two plates that touch a moved point
    let mut squished: Vec<([PointId; 3], f64)> = Vec::new();
    for wedge in mesh.wedges() {
        let [x, y, z] = wedge.points;
        let (Some(px), Some(py), Some(pz)) = (crust.point(x), crust.point(y), crust.point(z)) else {
            continue;
        };
        let plate = px.plate;
        if py.plate != plate || pz.plate != plate || (plate != plate_a && plate != plate_b) {
            continue;
        }
        if wedge.points.iter().any(|p| moved[p.index()]) {
            squished.push((wedge.points, triangle_area(px.pos, py.pos, pz.pos)));
        }
    }

    for (p, offset) in moves {
        let point = crust.get_mut(p)?;
        point.pos += offset;
        point.set_radius(planet_radius);
        point.valid = false;
    }

    let mut volume = 0.0;
    for ([x, y, z], old_area) in squished {
        let area = triangle_area(crust.get(x)?.pos, crust.get(y)?.pos, crust.get(z)?.pos);
        if area > 0.0 {
            let factor = old_area / area;
            for p in [x, y, z] {
                let point = crust.get_mut(p)?;
                let before = point.volume();
                point.scale_thickness(factor);
                volume += point.volume() - before;
            }
        }
    }
    debug!(%a, %b, volume, "crust deformed");
    Ok(volume)
}
