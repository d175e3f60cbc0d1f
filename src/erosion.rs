//! Erosion, smoothing and basal melting
//!
//! Every point gets a volume capacity: how much rock it can take before a
//! link to a neighbour breaks the slope limit or the point rises above a
//! neighbour. Points with negative capacity are too steep; the excess is
//! lifted off and carried downhill from neighbour to neighbour until it has
//! all been deposited.

use std::ops::AddAssign;

use rand::Rng;
use tracing::{debug, warn};

use crate::crust::Crust;
use crate::error::ConsistencyError;
use crate::links::LinkSystem;
use crate::point::{Point, PointId};

/// Steepest slope allowed above sea level
pub const LAND_SLOPE_LIMIT: f64 = 1.0 / 40.0;

/// Steepest slope allowed below sea level
pub const SEA_SLOPE_LIMIT: f64 = 1.0 / 16.0;

/// Most rock (vertical km) moved off a point in one epoch
pub const MOVE_LIMIT: f64 = 50.0;

/// Columns are never eroded thinner than this, km
pub const MIN_COLUMN: f64 = 4.0;

/// Hops a lifted load may travel before it is spread over the planet
pub const MAX_HOPS: usize = 1000;

/// Capacity of a point without any constraining neighbour
const NO_CAP: f64 = 1.0e11;

/// Loads smaller than this (km³) are dropped where they are
const MIN_ROUTED: f64 = 1.0;

/// A point needs more capacity than this (km³) to take part of a load
const DEPOSIT_THRESHOLD: f64 = 100.0;

/// Height difference (km) under which a point counts as the bottom of a pit
const PIT_TOLERANCE: f64 = 0.01;

/// Smallest layer (km) dropped into a pit
const PIT_LAYER: f64 = 0.01;

/// Density smoothed rock drifts towards
pub const SEDIMENT_DENSITY: f64 = 2.3;

/// Share of sediment in rock moved by smoothing
const SEDIMENT_MIX: f64 = 0.05;

/// Chance of passing over a link when smoothing
const SMOOTH_SKIP: f64 = 0.5;

/// Deepest ice age drop of the sea level, km
const ICE_AGE_DROP: f64 = 0.14;

/// Smoothing chance per link above the ice age sea level
const LAND_SMOOTHING: f64 = 0.001;

/// Smoothing chance per link below the ice age sea level
const SEA_SMOOTHING: f64 = 0.0005;

/// Columns whose base is deeper than this (km) melt from below
pub const MELT_DEPTH: f64 = -60.0;

/// Melting stops this deep (km)
const MELT_OFFSET: f64 = 58.0;

/// Most rock (km) melted off a column in one epoch
const MAX_MELT: f64 = 100.0;

/// Rock moved around by erosion, smoothing and melting
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErosionOutcome {
    /// Points that were too steep
    pub eroded_points: usize,
    /// Rock lifted off steep points, km³
    pub eroded: f64,
    /// Rock deposited downhill, km³
    pub deposited: f64,
    /// Rock spread over the whole planet after the hop limit, km³
    pub spilled: f64,
    /// Links smoothed
    pub smoothed: usize,
    /// Rock moved by smoothing, km³
    pub smoothed_volume: f64,
    /// Columns melted from below
    pub melted_points: usize,
    /// Rock melted away, km³
    pub melted: f64,
}

impl AddAssign for ErosionOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.eroded_points += rhs.eroded_points;
        self.eroded += rhs.eroded;
        self.deposited += rhs.deposited;
        self.spilled += rhs.spilled;
        self.smoothed += rhs.smoothed;
        self.smoothed_volume += rhs.smoothed_volume;
        self.melted_points += rhs.melted_points;
        self.melted += rhs.melted;
    }
}

#[inline]
fn slope_limit(point: &Point, sea_level: f64) -> f64 {
    if point.height_above(sea_level) < 0.0 {
        SEA_SLOPE_LIMIT
    } else {
        LAND_SLOPE_LIMIT
    }
}

/// Capacities `(vol_cap, vol_cap_relaxed)` a link puts on its lower end
fn low_end_caps(low: &Point, diff: f64, dist: f64, sea_level: f64) -> (f64, f64) {
    let relaxed = low.area * (diff + slope_limit(low, sea_level) * dist);
    (relaxed.min(low.area * diff), relaxed)
}

/// Capacity a link puts on its higher end
fn high_end_cap(high: &Point, diff: f64, dist: f64, sea_level: f64) -> f64 {
    high.area * (slope_limit(high, sea_level) * dist - diff)
}

/// Compute the volume capacity of every point from all links
///
/// The higher end of any link is capped at zero: it already stands above a
/// neighbour.
pub fn compute_vol_caps(crust: &mut Crust, links: &LinkSystem, sea_level: f64) -> Result<(), ConsistencyError> {
    for (_, p) in crust.points_mut() {
        p.vol_cap = NO_CAP;
        p.vol_cap_relaxed = NO_CAP;
    }
    for ((a, b), link) in links.iter() {
        if link.count == 0 {
            continue;
        }
        let (pa, pb) = (crust.get(a)?, crust.get(b)?);
        let (low, high) = if pa.surface_height() > pb.surface_height() {
            (b, a)
        } else {
            (a, b)
        };
        let (pl, ph) = (crust.get(low)?, crust.get(high)?);
        let diff = ph.surface_height() - pl.surface_height();
        let dist = pl.pos.distance(ph.pos);
        let (cap, relaxed) = low_end_caps(pl, diff, dist, sea_level);
        let high_cap = high_end_cap(ph, diff, dist, sea_level);

        let pl = crust.get_mut(low)?;
        pl.vol_cap = pl.vol_cap.min(cap);
        pl.vol_cap_relaxed = pl.vol_cap_relaxed.min(relaxed);
        let ph = crust.get_mut(high)?;
        ph.vol_cap = ph.vol_cap.min(high_cap).min(0.0);
        ph.vol_cap_relaxed = ph.vol_cap_relaxed.min(high_cap);
    }
    Ok(())
}

/// Recompute one point's capacity from its own links
fn refresh_vol_cap(crust: &mut Crust, links: &LinkSystem, id: PointId, sea_level: f64) -> Result<(), ConsistencyError> {
    let p = crust.get(id)?;
    let (mut cap, mut relaxed) = (NO_CAP, NO_CAP);
    for &n in links.neighbours(id) {
        let Some(q) = crust.point(n) else {
            continue;
        };
        let dist = p.pos.distance(q.pos);
        if p.surface_height() > q.surface_height() {
            let c = high_end_cap(p, p.surface_height() - q.surface_height(), dist, sea_level);
            cap = cap.min(c);
            relaxed = relaxed.min(c);
        } else {
            let (c, r) = low_end_caps(p, q.surface_height() - p.surface_height(), dist, sea_level);
            cap = cap.min(c);
            relaxed = relaxed.min(r);
        }
    }
    let p = crust.get_mut(id)?;
    p.vol_cap = cap;
    p.vol_cap_relaxed = relaxed;
    Ok(())
}

/// Recompute the capacity of a point and its neighbours
fn refresh_around(crust: &mut Crust, links: &LinkSystem, id: PointId, sea_level: f64) -> Result<(), ConsistencyError> {
    refresh_vol_cap(crust, links, id, sea_level)?;
    for &n in links.neighbours(id) {
        if crust.is_alive(n) {
            refresh_vol_cap(crust, links, n, sea_level)?;
        }
    }
    Ok(())
}

/// Cut every over-steep point down to its slope limits and carry the rock
/// downhill
///
/// `surface_area` is the summed point area, over which a load that cannot
/// settle within [`MAX_HOPS`] is spread. Rock volume is conserved.
pub fn erode(
    crust: &mut Crust,
    links: &LinkSystem,
    sea_level: f64,
    surface_area: f64,
) -> Result<ErosionOutcome, ConsistencyError> {
    compute_vol_caps(crust, links, sea_level)?;
    let mut outcome = ErosionOutcome::default();

    for id in crust.point_ids() {
        let p = crust.get(id)?;
        if p.vol_cap >= 0.0 || p.area <= 0.0 {
            continue;
        }
        let lifted = (-p.vol_cap)
            .min(MOVE_LIMIT * p.area)
            .min(((p.thickness - MIN_COLUMN) * p.area).max(0.0));
        if lifted <= 0.0 {
            continue;
        }
        let (area, density) = (p.area, p.density);
        crust.get_mut(id)?.remove_rock(id, lifted / area)?;
        refresh_around(crust, links, id, sea_level)?;
        outcome.eroded_points += 1;
        outcome.eroded += lifted;

        let (deposited, spilled) = carry_downhill(crust, links, id, lifted, density, sea_level, surface_area)?;
        outcome.deposited += deposited;
        outcome.spilled += spilled;
    }
    if outcome.eroded_points > 0 {
        debug!(points = outcome.eroded_points, volume = outcome.eroded, "erosion");
    }
    Ok(outcome)
}

/// Walk from `start` to the lowest neighbour, dropping rock wherever there
/// is room, until the load is used up
///
/// Returns the volume deposited on the way and the volume spilled over the
/// planet.
fn carry_downhill(
    crust: &mut Crust,
    links: &LinkSystem,
    start: PointId,
    mut load: f64,
    density: f64,
    sea_level: f64,
    surface_area: f64,
) -> Result<(f64, f64), ConsistencyError> {
    let mut at = start;
    let mut deposited = 0.0;
    let mut hops = 0;
    while load > MIN_ROUTED && hops < MAX_HOPS {
        let here = crust.get(at)?.surface_height();
        let (mut lowest, mut lowest_height) = (at, here);
        for &n in links.neighbours(at) {
            if let Some(q) = crust.point(n) {
                if q.surface_height() < lowest_height {
                    lowest = n;
                    lowest_height = q.surface_height();
                }
            }
        }

        let target = crust.get(lowest)?;
        let amount = if target.area <= 0.0 {
            0.0
        } else if target.vol_cap > DEPOSIT_THRESHOLD {
            target.vol_cap.min(load).max(0.0)
        } else if (lowest_height - here).abs() < PIT_TOLERANCE {
            (PIT_LAYER * target.area).max(target.vol_cap_relaxed).min(load)
        } else {
            0.0
        };
        if amount > 0.0 {
            let area = target.area;
            crust.get_mut(lowest)?.add_rock(lowest, amount / area, density)?;
            load -= amount;
            deposited += amount;
            refresh_around(crust, links, lowest, sea_level)?;
        }
        at = lowest;
        hops += 1;
    }

    if load <= 0.0 {
        return Ok((deposited, 0.0));
    }
    if hops >= MAX_HOPS && load > MIN_ROUTED && surface_area > 0.0 {
        warn!(point = %start, volume = load, "eroded rock found no resting place, spreading it");
        let layer = load / surface_area;
        for (id, p) in crust.points_mut() {
            p.add_rock(id, layer, density)?;
        }
        return Ok((deposited, load));
    }
    let last = crust.get(at)?;
    let target = if last.area > 0.0 { at } else { start };
    let area = crust.get(target)?.area;
    crust.get_mut(target)?.add_rock(target, load / area, density)?;
    Ok((deposited + load, 0.0))
}

/// Move rock from the higher end of `high`-`low` towards the lower end
///
/// Returns the volume moved.
fn smooth_link(crust: &mut Crust, low: PointId, high: PointId) -> Result<f64, ConsistencyError> {
    let (pl, ph) = (crust.get(low)?, crust.get(high)?);
    if pl.area <= 0.0 || ph.area <= 0.0 {
        return Ok(0.0);
    }
    let diff = ph.surface_height() - pl.surface_height();
    let ratio = ph.area / pl.area;
    let remove = MOVE_LIMIT
        .min(diff / (1.0 + ratio))
        .min(ph.thickness - MIN_COLUMN)
        .max(0.0);
    if remove <= 0.0 {
        return Ok(0.0);
    }
    let density = ph.density * (1.0 - SEDIMENT_MIX) + SEDIMENT_DENSITY * SEDIMENT_MIX;
    let volume = remove * ph.area;
    crust.get_mut(high)?.remove_rock(high, remove)?;
    crust.get_mut(low)?.add_rock(low, remove * ratio, density)?;
    Ok(volume)
}

/// Now and then level a random link, a little more often on land
///
/// The land/sea split uses a sea level lowered by a random ice age.
pub fn smooth<R: Rng + ?Sized>(
    crust: &mut Crust,
    links: &LinkSystem,
    sea_level: f64,
    rng: &mut R,
) -> Result<ErosionOutcome, ConsistencyError> {
    let ice_age = sea_level - ICE_AGE_DROP * rng.gen::<f64>();
    let mut outcome = ErosionOutcome::default();
    for ((a, b), link) in links.iter() {
        if link.count < 2 || rng.gen::<f64>() < SMOOTH_SKIP {
            continue;
        }
        let (pa, pb) = (crust.get(a)?, crust.get(b)?);
        let (low, high) = if pa.surface_height() > pb.surface_height() {
            (b, a)
        } else {
            (a, b)
        };
        let chance = if crust.get(high)?.surface_height() > ice_age {
            LAND_SMOOTHING
        } else {
            SEA_SMOOTHING
        };
        if rng.gen::<f64>() >= chance {
            continue;
        }
        let moved = smooth_link(crust, low, high)?;
        if moved > 0.0 {
            outcome.smoothed += 1;
            outcome.smoothed_volume += moved;
        }
    }
    Ok(outcome)
}

/// Melt the roots of columns reaching too deep into the mantle
pub fn melt_roots(crust: &mut Crust) -> Result<ErosionOutcome, ConsistencyError> {
    let mut outcome = ErosionOutcome::default();
    for (id, p) in crust.points_mut() {
        let base = p.base_depth();
        if base >= MELT_DEPTH {
            continue;
        }
        let melt = MAX_MELT.min(-base - MELT_OFFSET).min(p.thickness);
        if melt > 0.0 {
            p.remove_rock(id, melt)?;
            outcome.melted_points += 1;
            outcome.melted += melt * p.area;
        }
    }
    if outcome.melted_points > 0 {
        debug!(points = outcome.melted_points, "melted mountain roots");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::plate::{Plate, PlateId};
    use approx::assert_relative_eq;
    use glam::DVec3;

    const R: f64 = 6400.0;

    fn column(crust: &mut Crust, plate: PlateId, lon: f64, thickness: f64, density: f64) -> PointId {
        let mut p = Point::from_lat_lon(0.0, lon, R, plate, 100.0, 0);
        p.area = 1.0e4;
        p.thickness = thickness;
        p.density = density;
        crust.add_point(p).unwrap()
    }

    /// A mountain next to a stretch of ocean floor, about 200 km apart
    fn slope() -> (Crust, LinkSystem, PointId, PointId) {
        let mut crust = Crust::new();
        let plate = crust.add_plate(Plate::new(DVec3::Z * R, Rgb::WHITE, 0.0));
        let high = column(&mut crust, plate, 0.0, 40.0, 2.7);
        let low = column(&mut crust, plate, 1.8, 7.0, 3.0);
        let mut links = LinkSystem::new();
        links.add(high, low).unwrap();
        links.add(high, low).unwrap();
        (crust, links, high, low)
    }

    fn total_volume(crust: &Crust) -> f64 {
        crust.points().map(|(_, p)| p.volume()).sum()
    }

    #[test]
    fn test_vol_caps() {
        let (mut crust, links, high, low) = slope();
        compute_vol_caps(&mut crust, &links, 0.0).unwrap();
        let (ph, pl) = (crust.point(high).unwrap(), crust.point(low).unwrap());
        assert!(ph.vol_cap < 0.0);
        assert!(ph.vol_cap_relaxed < 0.0);
        let diff = ph.surface_height() - pl.surface_height();
        assert_relative_eq!(pl.vol_cap, pl.area * diff, epsilon = 1e-6);
        assert!(pl.vol_cap_relaxed > pl.vol_cap);
    }

    #[test]
    fn test_erosion_moves_rock_downhill() {
        let (mut crust, links, high, low) = slope();
        let before = total_volume(&crust);
        let h_before = crust.point(high).unwrap().surface_height();
        let outcome = erode(&mut crust, &links, 0.0, 2.0e4).unwrap();

        assert_eq!(outcome.eroded_points, 1);
        assert!(outcome.eroded > 0.0);
        assert_relative_eq!(outcome.eroded, outcome.deposited + outcome.spilled, epsilon = 1e-6);
        assert_relative_eq!(total_volume(&crust), before, epsilon = 1e-6);
        assert!(crust.point(high).unwrap().surface_height() < h_before);
        assert!(crust.point(low).unwrap().thickness > 7.0);
        // Deposited rock carries the mountain's density
        assert!(crust.point(low).unwrap().density < 3.0);
    }

    #[test]
    fn test_erosion_keeps_minimum_column() {
        let (mut crust, links, high, _) = slope();
        crust.point_mut(high).unwrap().thickness = 4.5;
        crust.point_mut(high).unwrap().base_depth_offset = 10.0;
        let outcome = erode(&mut crust, &links, 0.0, 2.0e4).unwrap();
        assert_eq!(outcome.eroded_points, 1);
        assert!(crust.point(high).unwrap().thickness >= MIN_COLUMN - 1e-9);
    }

    #[test]
    fn test_gentle_slope_is_left_alone() {
        let (mut crust, links, high, _) = slope();
        crust.point_mut(high).unwrap().thickness = 10.0;
        crust.point_mut(high).unwrap().density = 3.0;
        let outcome = erode(&mut crust, &links, 0.0, 2.0e4).unwrap();
        assert_eq!(outcome.eroded_points, 0);
        assert_eq!(crust.point(high).unwrap().thickness, 10.0);
    }

    #[test]
    fn test_smooth_link_conserves_rock() {
        let (mut crust, _, high, low) = slope();
        let before = total_volume(&crust);
        let (h_high, h_low) = (
            crust.point(high).unwrap().surface_height(),
            crust.point(low).unwrap().surface_height(),
        );
        let moved = smooth_link(&mut crust, low, high).unwrap();
        assert!(moved > 0.0);
        assert_relative_eq!(total_volume(&crust), before, epsilon = 1e-6);
        let (ph, pl) = (crust.point(high).unwrap(), crust.point(low).unwrap());
        assert!(ph.surface_height() < h_high);
        assert!(pl.surface_height() > h_low);
        assert!(pl.density < 3.0);
    }

    #[test]
    fn test_melting_deep_roots() {
        let (mut crust, _, high, low) = slope();
        crust.point_mut(high).unwrap().thickness = 80.0;
        crust.point_mut(high).unwrap().density = 2.9;
        let outcome = melt_roots(&mut crust).unwrap();
        assert_eq!(outcome.melted_points, 1);
        let p = crust.point(high).unwrap();
        assert!(p.base_depth() >= MELT_DEPTH);
        assert_relative_eq!(p.thickness, 80.0 - (80.0 * 2.9 / 3.3 - MELT_OFFSET), epsilon = 1e-9);
        assert_eq!(crust.point(low).unwrap().thickness, 7.0);
    }

    #[test]
    fn test_outcomes_add_up() {
        let mut total = ErosionOutcome::default();
        total += ErosionOutcome {
            eroded: 2.0,
            melted_points: 1,
            ..Default::default()
        };
        total += ErosionOutcome {
            eroded: 3.0,
            ..Default::default()
        };
        assert_eq!(total.eroded, 5.0);
        assert_eq!(total.melted_points, 1);
    }
}
