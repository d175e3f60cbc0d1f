//! Geological processes at and between plate boundaries
//!
//! Each epoch, after the plates have moved:
//!
//! 1. [`collision`]: colliding continents push apart, obduct small
//!    landmasses or crumple; compressed ocean floor is queued for subduction
//! 2. [`subduction`]: the queued points are destroyed and the plates around
//!    them are lifted or dragged down
//! 3. [`rifting`]: overstretched boundaries grow new ocean floor
//! 4. [`plates`]: disconnected, enclosed, tiny and huge plates are fixed up

pub mod collision;
pub mod plates;
pub mod rifting;
pub mod subduction;

pub use collision::{collide, find_landmasses, CollisionOutcome, Landmass};
pub use plates::{accrete_tiny_plates, capture_enclosed_plates, split_disconnected_plates, split_huge_plates};
pub use rifting::rift;
pub use subduction::{decay_base_depth, subduct, SubductionOutcome};

use crate::crust::Crust;
use crate::links::LinkSystem;
use crate::point::{Point, PointId};

/// Rest length of a link: the sum of its endpoints' nominal sizes
#[inline]
pub fn natural_length(a: &Point, b: &Point) -> f64 {
    a.size + b.size
}

/// Links whose endpoints are on different plates, in key order
pub fn cross_plate_links(crust: &Crust, links: &LinkSystem) -> Vec<(PointId, PointId)> {
    links
        .iter()
        .filter(|&((a, b), link)| {
            link.count > 0
                && match (crust.point(a), crust.point(b)) {
                    (Some(pa), Some(pb)) => pa.plate != pb.plate,
                    _ => false,
                }
        })
        .map(|(key, _)| key)
        .collect()
}

/// Flags, indexed by point, of the points on a plate boundary
pub fn boundary_points(crust: &Crust, links: &LinkSystem) -> Vec<bool> {
    let mut edge = vec![false; crust.point_capacity()];
    for (a, b) in cross_plate_links(crust, links) {
        edge[a.index()] = true;
        edge[b.index()] = true;
    }
    edge
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::plate::Plate;
    use glam::DVec3;

    #[test]
    fn test_cross_plate_links_and_boundary() {
        let mut crust = Crust::new();
        let p1 = crust.add_plate(Plate::new(DVec3::X, Rgb::WHITE, 0.0));
        let p2 = crust.add_plate(Plate::new(DVec3::Y, Rgb::WHITE, 0.0));
        let a = crust.add_point(Point::new(DVec3::X, p1, 1.0, 0)).unwrap();
        let b = crust.add_point(Point::new(DVec3::Y, p1, 1.0, 0)).unwrap();
        let c = crust.add_point(Point::new(DVec3::Z, p2, 1.0, 0)).unwrap();
        let mut links = LinkSystem::new();
        links.add(a, b).unwrap();
        links.add(b, c).unwrap();

        assert_eq!(cross_plate_links(&crust, &links), vec![(b, c)]);
        let edge = boundary_points(&crust, &links);
        assert!(!edge[a.index()] && edge[b.index()] && edge[c.index()]);
        assert_eq!(natural_length(crust.point(a).unwrap(), crust.point(c).unwrap()), 2.0);
    }
}
