//! New ocean floor in the gaps between diverging plates

use tracing::info;

use crate::crust::Crust;
use crate::error::ConsistencyError;
use crate::links::LinkSystem;
use crate::mantle::{update_mantle_force, Upwelling};
use crate::point::{Point, PointId};

use super::{cross_plate_links, natural_length};

/// Stretch (length / natural length) at which a plate boundary rifts
pub const RIFT_RATIO: f64 = 2.2;

/// Fill every overstretched plate boundary with two new ocean floor points
///
/// The points go at one and two thirds of the way along the link, each on
/// the plate of the nearer end, and are put back on the planet surface.
/// They have no area until the mesh has been repaired. Returns the ids of
/// the new points.
pub fn rift(
    crust: &mut Crust,
    links: &LinkSystem,
    upwellings: &[Upwelling],
    planet_radius: f64,
    point_spacing: f64,
    epoch: i32,
) -> Result<Vec<PointId>, ConsistencyError> {
    let mut gaps = Vec::new();
    for (a, b) in cross_plate_links(crust, links) {
        let (pa, pb) = (crust.get(a)?, crust.get(b)?);
        if pa.pos.distance(pb.pos) >= natural_length(pa, pb) * RIFT_RATIO {
            gaps.push((a, b));
        }
    }

    let mut created = Vec::with_capacity(gaps.len() * 2);
    for &(a, b) in &gaps {
        let (pa, pb) = (crust.get(a)?, crust.get(b)?);
        let sides = [
            (pa.pos * (2.0 / 3.0) + pb.pos / 3.0, pa.plate),
            (pa.pos / 3.0 + pb.pos * (2.0 / 3.0), pb.plate),
        ];
        for (pos, plate) in sides {
            let tweak = crust
                .plate(plate)
                .ok_or(ConsistencyError::UnknownPlate(plate))?
                .density_tweak;
            let mut point = Point::new(pos, plate, point_spacing / 2.0, epoch);
            point.set_radius(planet_radius);
            point.old_pos = point.pos;
            point.make_new_ocean_floor(tweak);
            point.valid = false;
            update_mantle_force(upwellings, &mut point);
            created.push(crust.add_point(point)?);
        }
    }
    if !gaps.is_empty() {
        info!(rifts = gaps.len(), points = created.len(), "new ocean floor");
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::plate::{Plate, PlateId};
    use crate::point::OCEAN_FLOOR_THICKNESS;
    use approx::assert_relative_eq;
    use glam::DVec3;

    const R: f64 = 6400.0;

    fn pair(gap_deg: f64) -> (Crust, LinkSystem, [PointId; 2], [PlateId; 2]) {
        let mut crust = Crust::new();
        let west = crust.add_plate(Plate::new(DVec3::Z * R, Rgb::WHITE, 0.05));
        let east = crust.add_plate(Plate::new(DVec3::Z * R, Rgb::BLUE, 0.1));
        let a = crust
            .add_point(Point::from_lat_lon(0.0, -gap_deg / 2.0, R, west, 180.0, 0))
            .unwrap();
        let b = crust
            .add_point(Point::from_lat_lon(0.0, gap_deg / 2.0, R, east, 180.0, 0))
            .unwrap();
        let mut links = LinkSystem::new();
        links.add(a, b).unwrap();
        links.add(a, b).unwrap();
        (crust, links, [a, b], [west, east])
    }

    #[test]
    fn test_wide_gap_grows_ocean_floor() {
        // 8 degrees is about 890 km, more than 2.2 x 360
        let (mut crust, links, [a, b], [west, east]) = pair(8.0);
        let created = rift(&mut crust, &links, &[], R, 360.0, 7).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(crust.point_count(), 4);

        let near_a = crust.point(created[0]).unwrap();
        let near_b = crust.point(created[1]).unwrap();
        assert_eq!(near_a.plate, west);
        assert_eq!(near_b.plate, east);
        assert!(near_a.pos.distance(crust.pos(a).unwrap()) < near_a.pos.distance(crust.pos(b).unwrap()));
        for p in [near_a, near_b] {
            assert_relative_eq!(p.radius(), R, epsilon = 1e-6);
            assert_eq!(p.thickness, OCEAN_FLOOR_THICKNESS);
            assert_eq!(p.size, 180.0);
            assert_eq!(p.creation_epoch, 7);
            assert!(!p.valid);
        }
        assert_relative_eq!(near_a.density, 3.05, epsilon = 1e-12);
        assert_relative_eq!(near_b.density, 3.1, epsilon = 1e-12);
        crust.check_partition().unwrap();
    }

    #[test]
    fn test_narrow_gap_is_left_alone() {
        let (mut crust, links, _, _) = pair(4.0);
        let created = rift(&mut crust, &links, &[], R, 360.0, 0).unwrap();
        assert!(created.is_empty());
        assert_eq!(crust.point_count(), 2);
    }
}
