//! Stress relaxation and plate fragmentation
//!
//! Every link inside a plate carries a push force along its direction. The
//! solver repeatedly picks a random link and sets its push force to the value
//! that equalizes the along-link force at both ends. Links whose pull exceeds
//! their strength break, and a plate whose unbroken links no longer connect
//! it is split in two.

use std::collections::BTreeMap;

use glam::DVec3;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::crust::Crust;
use crate::error::ConsistencyError;
use crate::kinematics::recenter;
use crate::links::{Link, LinkSystem};
use crate::plate::{Plate, PlateId};
use crate::point::PointId;

/// Tensile strength of a link per km of width
pub const BREAK_FORCE: f64 = 0.04;

/// Increase of the break threshold when a plate shatters completely
pub const BREAK_FORCE_STEP: f64 = 0.005;

/// Threshold raises allowed per plate and epoch
pub const MAX_BREAK_RETRIES: usize = 20;

/// Fraction of the collision force carried into the next epoch
pub const COLLISION_DECAY: f64 = 0.7;

/// Random relaxation steps per link of a plate
pub const SWEEPS_PER_LINK: usize = 10;

/// What one pass of the solver did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StressOutcome {
    /// New plates split off
    pub splits: usize,
    /// Links broken over all plates
    pub broken_links: usize,
    /// Times a threshold had to be raised
    pub retries: usize,
}

/// A third of the distance between the two points completing the wedges on
/// either side of `a`-`b`
///
/// Falls back to a third of the link length when the link does not have two
/// wedges.
pub fn link_width(crust: &Crust, links: &LinkSystem, a: PointId, b: PointId) -> f64 {
    let common = links.common_neighbours(a, b);
    if let [p1, p2, ..] = common.as_slice() {
        if let (Some(x), Some(y)) = (crust.pos(*p1), crust.pos(*p2)) {
            return x.distance(y) / 3.0;
        }
    }
    debug!(%a, %b, "couldn't find width of link");
    match (crust.pos(a), crust.pos(b)) {
        (Some(x), Some(y)) => x.distance(y) / 3.0,
        _ => 0.0,
    }
}

/// How easily a plate of the given area breaks
///
/// 1.0 for plates of 5·10⁶ km² and more, falling off towards 0.1 for small
/// plates so they rarely fragment further.
pub fn plate_compliance(area: f64) -> f64 {
    let x = (area - 5.0e6).min(0.0) / 3.5e7;
    0.1 + 0.9 * (-(x * x)).exp()
}

fn link_dir(crust: &Crust, a: PointId, b: PointId) -> Result<DVec3, ConsistencyError> {
    Ok((crust.get(b)?.pos - crust.get(a)?.pos).normalize_or_zero())
}

fn shift_stress(crust: &mut Crust, a: PointId, b: PointId, v: DVec3) -> Result<(), ConsistencyError> {
    crust.get_mut(a)?.stress_force += v;
    crust.get_mut(b)?.stress_force -= v;
    Ok(())
}

/// Relax one link
///
/// Its current push is taken off both ends, then replaced by half the
/// difference between the along-link forces at `a` and `b`.
pub fn sort_link(crust: &mut Crust, link: &mut Link, a: PointId, b: PointId) -> Result<(), ConsistencyError> {
    if link.broken {
        return Ok(());
    }
    let v = link_dir(crust, a, b)?;
    shift_stress(crust, a, b, v * link.push_force)?;
    let f1 = crust.get(a)?.net_force().dot(v);
    let f2 = crust.get(b)?.net_force().dot(v);
    link.push_force = (f1 - f2) / 2.0;
    shift_stress(crust, a, b, -v * link.push_force)
}

/// Take a link's push off its endpoints
pub fn remove_from_stress(crust: &mut Crust, link: &Link, a: PointId, b: PointId) -> Result<(), ConsistencyError> {
    let v = link_dir(crust, a, b)?;
    shift_stress(crust, a, b, v * link.push_force)
}

/// Recompute `plate_crosser` on every link from the current membership
pub fn refresh_plate_crossers(crust: &Crust, links: &mut LinkSystem) {
    for ((a, b), link) in links.iter_mut() {
        link.plate_crosser = match (crust.point(a), crust.point(b)) {
            (Some(pa), Some(pb)) => pa.plate != pb.plate,
            _ => false,
        };
    }
}

/// Clear the solver state left by the previous epoch
fn reset(crust: &mut Crust, links: &mut LinkSystem) {
    for (_, link) in links.iter_mut() {
        link.push_force = 0.0;
        link.broken = false;
    }
    refresh_plate_crossers(crust, links);
    for (_, p) in crust.points_mut() {
        p.stress_force = DVec3::ZERO;
        p.collision_force *= COLLISION_DECAY;
        p.broken = false;
    }
}

/// Relax and break every plate in turn, splitting plates that come apart
///
/// Plates created by a split are not processed again in the same pass.
pub fn solve<R: Rng + ?Sized>(
    crust: &mut Crust,
    links: &mut LinkSystem,
    rng: &mut R,
) -> Result<StressOutcome, ConsistencyError> {
    reset(crust, links);

    let plate_ids = crust.plate_ids();
    let mut internal: BTreeMap<PlateId, Vec<(PointId, PointId)>> = BTreeMap::new();
    for (a, b) in links.keys() {
        let (Some(pa), Some(pb)) = (crust.point(a), crust.point(b)) else {
            continue;
        };
        if pa.plate != pb.plate {
            continue;
        }
        let plate = pa.plate;
        let width = link_width(crust, links, a, b);
        if let Some(link) = links.get_mut(a, b) {
            link.link_width = width;
        }
        internal.entry(plate).or_default().push((a, b));
    }

    let mut outcome = StressOutcome::default();
    for plate in plate_ids {
        if let Some(plate_links) = internal.get(&plate) {
            solve_plate(crust, links, plate, plate_links, rng, &mut outcome)?;
        }
    }
    refresh_plate_crossers(crust, links);
    debug!(?outcome, "stress pass finished");
    Ok(outcome)
}

fn solve_plate<R: Rng + ?Sized>(
    crust: &mut Crust,
    links: &mut LinkSystem,
    plate: PlateId,
    plate_links: &[(PointId, PointId)],
    rng: &mut R,
    outcome: &mut StressOutcome,
) -> Result<(), ConsistencyError> {
    if plate_links.is_empty() {
        return Ok(());
    }
    let compliance = plate_compliance(crust.plate_area(plate));
    let mut threshold = BREAK_FORCE;
    let mut retries = 0;

    loop {
        for _ in 0..plate_links.len() * SWEEPS_PER_LINK {
            let (a, b) = plate_links[rng.gen_range(0..plate_links.len())];
            if let Some(link) = links.get_mut(a, b) {
                sort_link(crust, link, a, b)?;
            }
        }

        let mut broke = false;
        for &(a, b) in plate_links {
            let Some(link) = links.get_mut(a, b) else { continue };
            if !link.broken && link.push_force < -threshold * link.link_width * compliance {
                link.broken = true;
                remove_from_stress(crust, link, a, b)?;
                broke = true;
                outcome.broken_links += 1;
            }
        }
        if !broke {
            return Ok(());
        }

        mark_broken_points(crust, links, plate, plate_links)?;
        let members = crust.plate(plate).map(|p| p.points.clone()).unwrap_or_default();
        let start = members
            .iter()
            .copied()
            .find(|&p| crust.point(p).is_some_and(|pt| !pt.broken));

        match start {
            Some(start) => {
                if split_off(crust, links, plate, plate_links, &members, start, rng)? {
                    outcome.splits += 1;
                    return Ok(());
                }
            }
            None => {
                retries += 1;
                outcome.retries += 1;
                if retries > MAX_BREAK_RETRIES {
                    warn!(%plate, threshold, "plate shattered at every threshold, leaving it whole");
                    return Ok(());
                }
                warn!(%plate, threshold, "no unbroken point left, raising break threshold");
                for &(a, b) in plate_links {
                    if let Some(link) = links.get_mut(a, b) {
                        link.push_force = 0.0;
                        link.broken = false;
                    }
                }
                for &p in &members {
                    let point = crust.get_mut(p)?;
                    point.stress_force = DVec3::ZERO;
                    point.broken = false;
                }
                threshold += BREAK_FORCE_STEP;
            }
        }
    }
}

fn mark_broken_points(
    crust: &mut Crust,
    links: &LinkSystem,
    plate: PlateId,
    plate_links: &[(PointId, PointId)],
) -> Result<(), ConsistencyError> {
    for &(a, b) in plate_links {
        if !links.get(a, b).is_some_and(|l| l.broken) {
            continue;
        }
        for end in [a, b] {
            for &n in links.neighbours(end) {
                let point = crust.get_mut(n)?;
                if point.plate == plate {
                    point.broken = true;
                }
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Outside,
    Reached,
    Unreached,
    Broken,
}

/// Walk the unbroken links from `start`; if part of the plate is not
/// reached, move the reached part onto a new plate
///
/// Returns whether the plate was split.
fn split_off<R: Rng + ?Sized>(
    crust: &mut Crust,
    links: &mut LinkSystem,
    plate: PlateId,
    plate_links: &[(PointId, PointId)],
    members: &[PointId],
    start: PointId,
    rng: &mut R,
) -> Result<bool, ConsistencyError> {
    let mut side = vec![Side::Outside; crust.point_capacity()];
    let mut unreached = 0usize;
    let mut broken = Vec::new();
    for &p in members {
        if crust.get(p)?.broken {
            side[p.index()] = Side::Broken;
            broken.push(p);
        } else {
            side[p.index()] = Side::Unreached;
            unreached += 1;
        }
    }
    side[start.index()] = Side::Reached;
    unreached -= 1;

    let mut reached = vec![start];
    let mut next = 0;
    while next < reached.len() && unreached > 0 {
        let p = reached[next];
        next += 1;
        for &n in links.neighbours(p) {
            if side[n.index()] == Side::Unreached {
                side[n.index()] = Side::Reached;
                reached.push(n);
                unreached -= 1;
            }
        }
    }
    if unreached == 0 {
        return Ok(false);
    }

    let parent = crust.plate(plate).ok_or(ConsistencyError::UnknownPlate(plate))?;
    let fresh = Plate::with_random_color(parent.center, parent.density_tweak, rng);
    let new_plate = crust.add_plate(fresh);
    for &p in &reached {
        crust.assign_point(p, new_plate)?;
    }
    recenter(crust, new_plate)?;
    recenter(crust, plate)?;

    assign_broken(crust, links, plate, new_plate, plate_links, &side, broken)?;
    refresh_plate_crossers(crust, links);
    info!(%plate, %new_plate, moved = reached.len(), "plate split under stress");
    Ok(true)
}

/// Attach each broken point to the side it is directly linked to
///
/// Points reached from neither side by an unbroken neighbour go with the
/// side most of their neighbours ended up on.
fn assign_broken(
    crust: &mut Crust,
    links: &LinkSystem,
    plate: PlateId,
    new_plate: PlateId,
    plate_links: &[(PointId, PointId)],
    side: &[Side],
    mut broken: Vec<PointId>,
) -> Result<(), ConsistencyError> {
    while !broken.is_empty() {
        let before = broken.len();
        for target in [new_plate, plate] {
            let mut attach = Vec::new();
            for &(a, b) in plate_links {
                let (Some(pa), Some(pb)) = (crust.point(a), crust.point(b)) else {
                    continue;
                };
                if pa.broken && !pb.broken && pb.plate == target && !attach.contains(&a) {
                    attach.push(a);
                } else if pb.broken && !pa.broken && pa.plate == target && !attach.contains(&b) {
                    attach.push(b);
                }
            }
            for p in attach {
                crust.assign_point(p, target)?;
                crust.get_mut(p)?.broken = false;
                broken.retain(|&q| q != p);
            }
        }
        if broken.len() == before {
            for p in broken.drain(..) {
                let (mut moved, mut stayed) = (0, 0);
                for &n in links.neighbours(p) {
                    match side[n.index()] {
                        Side::Reached => moved += 1,
                        Side::Unreached => stayed += 1,
                        _ => {}
                    }
                }
                let target = if moved > stayed { new_plate } else { plate };
                crust.assign_point(p, target)?;
                crust.get_mut(p)?.broken = false;
            }
        }
    }
    Ok(())
}
