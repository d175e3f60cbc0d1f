//! Mantle upwellings and the flow they drive
//!
//! Each upwelling pushes the crust radially away from itself. The speed of
//! the flow at a position depends on how much closer the nearest upwelling
//! is than the second nearest: it ramps up quickly just outside an
//! upwelling and dies away towards the divide between two of them.

use std::f64::consts::PI;

use glam::DVec3;
use rand::Rng;
use tracing::debug;

use crate::crust::Crust;
use crate::point::Point;

/// Minimum separation between upwellings, km
pub const MIN_UPWELLING_SEPARATION: f64 = 3000.0;

/// Radius within which continental rock above a candidate upwelling is
/// weighed when breaking up supercontinents, km
pub const BREAKUP_RADIUS: f64 = 3000.0;

/// Drag coefficient turning a flow/velocity mismatch into force per km²
pub const MANTLE_DRAG: f64 = 3.0e-5;

/// Peak flow speed
pub const FLOW_SPEED: f64 = 100.0;

/// Attempts at placing one upwelling before the last sample is kept
pub const MAX_PLACEMENT_ATTEMPTS: usize = 1000;

/// A mantle upwelling
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Upwelling {
    /// Position on the planet surface
    pub pos: DVec3,
    /// Multiplier on the flow speed
    pub strength: f64,
}

impl Upwelling {
    pub fn new(pos: DVec3) -> Self {
        Self { pos, strength: 1.0 }
    }
}

/// A uniformly distributed random unit vector
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> DVec3 {
    let z: f64 = rng.gen_range(-1.0..=1.0);
    let phi: f64 = rng.gen_range(0.0..2.0 * PI);
    let r = (1.0 - z * z).max(0.0).sqrt();
    DVec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Mantle flow velocity at `pos`
///
/// Needs at least two upwellings; with fewer there is no flow.
pub fn flow_at(upwellings: &[Upwelling], pos: DVec3) -> DVec3 {
    let mut nearest: Option<(f64, &Upwelling)> = None;
    let mut second: Option<f64> = None;
    for up in upwellings {
        let d = up.pos.distance_squared(pos);
        match nearest {
            Some((cd, _)) if d > cd => {
                if second.map_or(true, |scd| d < scd) {
                    second = Some(d);
                }
            }
            _ => {
                second = nearest.map(|(cd, _)| cd);
                nearest = Some((d, up));
            }
        }
    }
    let (Some((cd, up)), Some(scd)) = (nearest, second) else {
        return DVec3::ZERO;
    };
    let ratio = if cd + scd > 0.0 { cd / (cd + scd) } else { 0.5 };
    let speed = if ratio <= 0.1 {
        ratio * 10.0
    } else {
        (0.4 - (ratio - 0.1)) / 0.4
    };
    (pos - up.pos).normalize_or_zero() * speed * FLOW_SPEED * up.strength
}

/// Sample the flow at a point and set its mantle force
///
/// The force is the drag from the difference between the flow and the
/// point's own motion over the last epoch, scaled by its area.
pub fn update_mantle_force(upwellings: &[Upwelling], point: &mut Point) {
    point.mantle_flow = flow_at(upwellings, point.pos);
    let moved = point.pos - point.old_pos;
    point.mantle_force = (point.mantle_flow - moved) * point.area * MANTLE_DRAG;
}

fn nearest_earlier(placed: &[Upwelling], pos: DVec3) -> f64 {
    placed
        .iter()
        .map(|u| u.pos.distance(pos))
        .fold(f64::INFINITY, f64::min)
}

/// Scatter the upwellings at random, keeping them apart
///
/// Each upwelling is resampled until it is at least
/// [`MIN_UPWELLING_SEPARATION`] from the ones placed before it, or the
/// attempts run out. Strengths are kept.
pub fn randomize_upwellings<R: Rng + ?Sized>(upwellings: &mut [Upwelling], radius: f64, rng: &mut R) {
    for i in 0..upwellings.len() {
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let pos = random_unit_vector(rng) * radius;
            upwellings[i].pos = pos;
            if nearest_earlier(&upwellings[..i], pos) >= MIN_UPWELLING_SEPARATION {
                break;
            }
        }
    }
}

/// Continental rock weighed within [`BREAKUP_RADIUS`] of `pos`
///
/// Nearer rock counts more. The result is scaled so that a plain ocean
/// floor gives values of a few units.
pub fn rock_load(crust: &Crust, pos: DVec3) -> f64 {
    let volume: f64 = crust
        .points()
        .filter_map(|(_, p)| {
            let d = p.pos.distance(pos);
            (d < BREAKUP_RADIUS).then(|| p.area * p.thickness * (BREAKUP_RADIUS - d) / BREAKUP_RADIUS)
        })
        .sum();
    volume / 1.0e7
}

/// Re-place the upwellings preferring sites under thick crust
///
/// Like [`randomize_upwellings`], but a site with little rock above it is
/// rejected with probability `0.7·min(1, (8/load)²)`, so upwellings tend to
/// end up under large continents and tear them apart.
pub fn break_up_supercontinents<R: Rng + ?Sized>(
    upwellings: &mut [Upwelling],
    crust: &Crust,
    radius: f64,
    rng: &mut R,
) {
    for i in 0..upwellings.len() {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let pos = random_unit_vector(rng) * radius;
            upwellings[i].pos = pos;
            if attempts >= MAX_PLACEMENT_ATTEMPTS {
                break;
            }
            if nearest_earlier(&upwellings[..i], pos) < MIN_UPWELLING_SEPARATION {
                continue;
            }
            let load = rock_load(crust, pos);
            let thin = rng.gen::<f64>() < (8.0 / load).powi(2);
            let unlucky = rng.gen::<f64>() < 0.7;
            if !(thin && unlucky) {
                break;
            }
        }
        debug!(upwelling = i, attempts, "placed upwelling");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const R: f64 = 6400.0;

    #[test]
    fn test_unit_vectors() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            assert_relative_eq!(random_unit_vector(&mut rng).length(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_flow_points_away_from_nearest() {
        let ups = [Upwelling::new(DVec3::Z * R), Upwelling::new(-DVec3::Z * R)];
        let pos = DVec3::new(0.6, 0.0, 0.8) * R;
        let flow = flow_at(&ups, pos);
        assert!(flow.x > 0.0);
        assert!(flow.dot(pos - ups[0].pos) > 0.0);
        assert!(flow.length() <= FLOW_SPEED + 1e-9);
    }

    #[test]
    fn test_flow_speed_profile() {
        let ups = [Upwelling::new(DVec3::Z * R), Upwelling::new(-DVec3::Z * R)];
        // At the upwelling itself the flow is still
        assert_relative_eq!(flow_at(&ups, DVec3::Z * R).length(), 0.0, epsilon = 1e-9);
        // On the divide ratio = 0.5, so speed = 0
        assert_relative_eq!(flow_at(&ups, DVec3::X * R).length(), 0.0, epsilon = 1e-9);
        // Strength scales the flow
        let strong = [
            Upwelling { pos: DVec3::Z * R, strength: 2.0 },
            Upwelling::new(-DVec3::Z * R),
        ];
        let pos = DVec3::new(0.6, 0.0, 0.8) * R;
        assert_relative_eq!(
            flow_at(&strong, pos).length(),
            2.0 * flow_at(&ups, pos).length(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_single_upwelling_has_no_flow() {
        let ups = [Upwelling::new(DVec3::Z * R)];
        assert_eq!(flow_at(&ups, DVec3::X * R), DVec3::ZERO);
    }

    #[test]
    fn test_randomize_keeps_separation() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut ups = vec![Upwelling::new(DVec3::ZERO); 8];
        randomize_upwellings(&mut ups, R, &mut rng);
        for i in 0..ups.len() {
            assert_relative_eq!(ups[i].pos.length(), R, epsilon = 1e-6);
            for j in 0..i {
                assert!(ups[i].pos.distance(ups[j].pos) >= MIN_UPWELLING_SEPARATION);
            }
        }
    }

    #[test]
    fn test_mantle_force_opposes_own_motion() {
        use crate::plate::PlateId;
        let ups = [Upwelling::new(DVec3::Z * R), Upwelling::new(-DVec3::Z * R)];
        let mut p = Point::new(DVec3::X * R, PlateId(0), 180.0, 0);
        p.area = 1.0e5;
        p.old_pos = p.pos - DVec3::Y * 10.0;
        update_mantle_force(&ups, &mut p);
        assert!(p.mantle_force.y < 0.0);
    }
}
