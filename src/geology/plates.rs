//! Plate housekeeping: splitting, capturing, accreting

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use glam::DVec3;
use rand::Rng;
use tracing::{debug, info};

use crate::crust::Crust;
use crate::error::ConsistencyError;
use crate::kinematics::recenter;
use crate::links::LinkSystem;
use crate::mantle::random_unit_vector;
use crate::plate::{Plate, PlateId};
use crate::point::PointId;
use crate::stress::{link_width, refresh_plate_crossers};

use super::cross_plate_links;

/// Plates smaller than this (km²) are accreted onto a neighbour
pub const TINY_PLATE_AREA: f64 = 1.0e5;

/// Plates with fewer points than this are accreted onto a neighbour
pub const TINY_PLATE_POINTS: usize = 3;

/// Plates larger than this (km²) are split in two
pub const HUGE_PLATE_AREA: f64 = 1.0e8;

/// Both halves of a huge plate need more points than this
pub const MIN_SPLIT_POINTS: usize = 5;

/// Move `members` onto a new plate split off `parent` and re-center both
fn split_off<R: Rng + ?Sized>(
    crust: &mut Crust,
    parent: PlateId,
    members: &[PointId],
    rng: &mut R,
) -> Result<PlateId, ConsistencyError> {
    let plate = crust.plate(parent).ok_or(ConsistencyError::UnknownPlate(parent))?;
    let fresh = Plate::with_random_color(plate.center, plate.density_tweak, rng);
    let child = crust.add_plate(fresh);
    for &p in members {
        crust.assign_point(p, child)?;
    }
    recenter(crust, child)?;
    recenter(crust, parent)?;
    Ok(child)
}

/// Give each part of a plate that is no longer connected by same-plate
/// links its own plate
///
/// The part reachable from the plate's first point keeps the plate; all
/// remaining points go to one new plate. Returns the number of new plates.
pub fn split_disconnected_plates<R: Rng + ?Sized>(
    crust: &mut Crust,
    links: &LinkSystem,
    rng: &mut R,
) -> Result<usize, ConsistencyError> {
    let mut splits = 0;
    let mut reached = vec![false; crust.point_capacity()];
    for id in crust.plate_ids() {
        let Some(&start) = crust.plate(id).and_then(|p| p.points.first()) else {
            continue;
        };
        reached[start.index()] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(p) = queue.pop_front() {
            for &n in links.neighbours(p) {
                if !reached[n.index()] && crust.point(n).is_some_and(|np| np.plate == id) {
                    reached[n.index()] = true;
                    queue.push_back(n);
                }
            }
        }

        let members = &crust.plate(id).ok_or(ConsistencyError::UnknownPlate(id))?.points;
        let rest: Vec<PointId> = members.iter().copied().filter(|p| !reached[p.index()]).collect();
        if rest.is_empty() {
            continue;
        }
        let child = split_off(crust, id, &rest, rng)?;
        splits += 1;
        info!(plate = %id, new_plate = %child, moved = rest.len(), "disconnected plate split");
    }
    Ok(splits)
}

/// Merge every plate whose whole boundary touches a single other plate into
/// that plate
///
/// Only runs with more than two plates, so the planet always keeps at
/// least two. Returns the number of captured plates.
pub fn capture_enclosed_plates(crust: &mut Crust, links: &mut LinkSystem) -> Result<usize, ConsistencyError> {
    if crust.plate_count() <= 2 {
        return Ok(0);
    }
    let mut candidates: BTreeSet<PlateId> = crust.plate_ids().into_iter().collect();
    let mut linked: BTreeMap<PlateId, PlateId> = BTreeMap::new();
    for (a, b) in cross_plate_links(crust, links) {
        let (pa, pb) = (crust.get(a)?.plate, crust.get(b)?.plate);
        for (this, other) in [(pa, pb), (pb, pa)] {
            match linked.get(&this) {
                None => {
                    linked.insert(this, other);
                }
                Some(&seen) if seen != other => {
                    candidates.remove(&this);
                }
                Some(_) => {}
            }
        }
    }

    let mut captured = 0;
    for plate in candidates {
        let Some(&host) = linked.get(&plate) else {
            continue;
        };
        let (Some(inner), Some(outer)) = (crust.plate(plate), crust.plate(host)) else {
            continue;
        };
        if inner.is_empty() || outer.is_empty() {
            continue;
        }
        let moved = crust.merge_plate_into(plate, host)?;
        crust.remove_plate(plate)?;
        recenter(crust, host)?;
        captured += 1;
        info!(%plate, into = %host, moved, "enclosed plate captured");
    }
    if captured > 0 {
        refresh_plate_crossers(crust, links);
    }
    Ok(captured)
}

/// Merge every plate below the size floor into the neighbour it shares the
/// widest boundary with
///
/// Tiny plates without any neighbour are left alone. Returns the number of
/// accreted plates.
pub fn accrete_tiny_plates(crust: &mut Crust, links: &mut LinkSystem) -> Result<usize, ConsistencyError> {
    let mut accreted = 0;
    for plate in crust.plate_ids() {
        let Some(members) = crust.plate(plate).map(Plate::len) else {
            continue;
        };
        if crust.plate_area(plate) >= TINY_PLATE_AREA && members >= TINY_PLATE_POINTS {
            continue;
        }

        let mut shared: BTreeMap<PlateId, f64> = BTreeMap::new();
        for (a, b) in cross_plate_links(crust, links) {
            let (pa, pb) = (crust.get(a)?.plate, crust.get(b)?.plate);
            let other = if pa == plate {
                pb
            } else if pb == plate {
                pa
            } else {
                continue;
            };
            *shared.entry(other).or_insert(0.0) += link_width(crust, links, a, b);
        }
        let mut best: Option<(PlateId, f64)> = None;
        for (&other, &width) in &shared {
            if best.map_or(true, |(_, w)| width > w) {
                best = Some((other, width));
            }
        }
        let Some((host, width)) = best else {
            debug!(%plate, "tiny plate has no neighbours");
            continue;
        };

        let moved = crust.merge_plate_into(plate, host)?;
        crust.remove_plate(plate)?;
        recenter(crust, host)?;
        refresh_plate_crossers(crust, links);
        accreted += 1;
        info!(%plate, into = %host, moved, boundary = width, "tiny plate accreted");
    }
    Ok(accreted)
}

/// Cut every plate above the area ceiling in two along a random plane
/// through its centroid
///
/// A plate is left whole when either side would have too few points.
/// Returns the number of new plates.
pub fn split_huge_plates<R: Rng + ?Sized>(crust: &mut Crust, rng: &mut R) -> Result<usize, ConsistencyError> {
    let mut splits = 0;
    for plate in crust.plate_ids() {
        if crust.plate_area(plate) <= HUGE_PLATE_AREA {
            continue;
        }
        let members = crust.plate(plate).ok_or(ConsistencyError::UnknownPlate(plate))?.points.clone();
        let mut middle = DVec3::ZERO;
        for &p in &members {
            middle += crust.get(p)?.pos;
        }
        let Some(normal) = middle.cross(random_unit_vector(rng)).try_normalize() else {
            continue;
        };

        let mut side = Vec::new();
        for &p in &members {
            if normal.dot(crust.get(p)?.pos) > 0.0 {
                side.push(p);
            }
        }
        if side.len() <= MIN_SPLIT_POINTS || members.len() - side.len() <= MIN_SPLIT_POINTS {
            debug!(%plate, side = side.len(), of = members.len(), "huge plate split rejected");
            continue;
        }
        let child = split_off(crust, plate, &side, rng)?;
        splits += 1;
        info!(%plate, new_plate = %child, moved = side.len(), "huge plate split");
    }
    Ok(splits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::point::Point;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const R: f64 = 6400.0;

    fn add(crust: &mut Crust, plate: PlateId, lat: f64, lon: f64, area: f64) -> PointId {
        let mut p = Point::from_lat_lon(lat, lon, R, plate, 180.0, 0);
        p.area = area;
        crust.add_point(p).unwrap()
    }

    fn plates(crust: &mut Crust, n: usize) -> Vec<PlateId> {
        (0..n)
            .map(|_| crust.add_plate(Plate::new(DVec3::Z * R, Rgb::WHITE, 0.0)))
            .collect()
    }

    #[test]
    fn test_disconnected_plate_splits() {
        let mut crust = Crust::new();
        let ps = plates(&mut crust, 1);
        let ids: Vec<PointId> = (0..4).map(|i| add(&mut crust, ps[0], 0.0, i as f64 * 3.0, 1e4)).collect();
        let mut links = LinkSystem::new();
        links.add(ids[0], ids[1]).unwrap();
        links.add(ids[2], ids[3]).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(split_disconnected_plates(&mut crust, &links, &mut rng).unwrap(), 1);
        assert_eq!(crust.plate_count(), 2);
        let (a, c) = (crust.point(ids[0]).unwrap().plate, crust.point(ids[2]).unwrap().plate);
        assert_eq!(a, ps[0]);
        assert_ne!(a, c);
        assert_eq!(crust.point(ids[3]).unwrap().plate, c);
        crust.check_partition().unwrap();

        // Both parts are connected now
        assert_eq!(split_disconnected_plates(&mut crust, &links, &mut rng).unwrap(), 0);
    }

    #[test]
    fn test_enclosed_plate_is_captured() {
        // A touches only B; B, C and D all touch two others
        let mut crust = Crust::new();
        let ps = plates(&mut crust, 4);
        let (a, b, c, d) = (ps[0], ps[1], ps[2], ps[3]);
        let pa = add(&mut crust, a, 0.0, 0.0, 1e5);
        let pb = add(&mut crust, b, 0.0, 3.0, 1e5);
        let pc = add(&mut crust, c, 0.0, 6.0, 1e5);
        let pd = add(&mut crust, d, 3.0, 4.5, 1e5);
        let mut links = LinkSystem::new();
        for (x, y) in [(pa, pb), (pb, pc), (pc, pd), (pd, pb)] {
            links.add(x, y).unwrap();
        }

        assert_eq!(capture_enclosed_plates(&mut crust, &mut links).unwrap(), 1);
        assert!(crust.plate(a).is_none());
        assert_eq!(crust.point(pa).unwrap().plate, b);
        assert!(!links.get(pa, pb).unwrap().plate_crosser);
        assert_eq!(crust.plate_count(), 3);
        crust.check_partition().unwrap();
    }

    #[test]
    fn test_two_plates_are_never_captured() {
        let mut crust = Crust::new();
        let ps = plates(&mut crust, 2);
        let x = add(&mut crust, ps[0], 0.0, 0.0, 1e5);
        let y = add(&mut crust, ps[1], 0.0, 3.0, 1e5);
        let mut links = LinkSystem::new();
        links.add(x, y).unwrap();
        assert_eq!(capture_enclosed_plates(&mut crust, &mut links).unwrap(), 0);
        assert_eq!(crust.plate_count(), 2);
    }

    #[test]
    fn test_tiny_plate_joins_widest_neighbour() {
        let mut crust = Crust::new();
        let ps = plates(&mut crust, 3);
        let (tiny, big, other) = (ps[0], ps[1], ps[2]);
        let t1 = add(&mut crust, tiny, 0.0, 0.0, 1e4);
        let t2 = add(&mut crust, tiny, 2.0, 0.0, 1e4);
        let b: Vec<PointId> = (0..3).map(|i| add(&mut crust, big, i as f64 * 2.0, 2.0, 1e5)).collect();
        let o: Vec<PointId> = (0..3).map(|i| add(&mut crust, other, 4.0 + i as f64 * 2.0, -2.0, 1e5)).collect();
        let mut links = LinkSystem::new();
        for (x, y) in [(t1, t2), (t1, b[0]), (t2, b[1]), (t2, o[0]), (b[0], b[1]), (o[0], o[1])] {
            links.add(x, y).unwrap();
        }

        assert_eq!(accrete_tiny_plates(&mut crust, &mut links).unwrap(), 1);
        assert!(crust.plate(tiny).is_none());
        assert_eq!(crust.point(t1).unwrap().plate, big);
        assert_eq!(crust.point(t2).unwrap().plate, big);
        assert_eq!(crust.plate(big).unwrap().len(), 5);
        crust.check_partition().unwrap();
    }

    #[test]
    fn test_isolated_tiny_plate_stays() {
        let mut crust = Crust::new();
        let ps = plates(&mut crust, 1);
        add(&mut crust, ps[0], 0.0, 0.0, 1e4);
        let mut links = LinkSystem::new();
        assert_eq!(accrete_tiny_plates(&mut crust, &mut links).unwrap(), 0);
        assert_eq!(crust.plate_count(), 1);
    }

    #[test]
    fn test_huge_plate_is_bisected() {
        let mut crust = Crust::new();
        let ps = plates(&mut crust, 2);
        let (huge, small) = (ps[0], ps[1]);
        // A ring around the north pole, so every plane through the pole
        // axis halves it
        for k in 0..24 {
            add(&mut crust, huge, 45.0, k as f64 * 15.0, 1e7);
        }
        for k in 0..6 {
            add(&mut crust, small, -45.0, k as f64 * 60.0, 1e6);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(split_huge_plates(&mut crust, &mut rng).unwrap(), 1);
        assert_eq!(crust.plate_count(), 3);
        let halves: Vec<usize> = crust
            .plates()
            .filter(|&(id, _)| id != small)
            .map(|(_, p)| p.len())
            .collect();
        assert_eq!(halves.iter().sum::<usize>(), 24);
        assert!(halves.iter().all(|&n| n > MIN_SPLIT_POINTS));
        assert_eq!(crust.plate(small).unwrap().len(), 6);
        crust.check_partition().unwrap();
    }
}
