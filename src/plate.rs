//! Rigid crust plates

use std::fmt;

use glam::DVec3;
use rand::Rng;

use crate::color::Rgb;
use crate::point::PointId;

/// Stable index of a plate in the crust arena
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlateId(pub u32);

impl PlateId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PlateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// A rigid fragment of crust
///
/// The member list is the authoritative side of the point/plate relation;
/// every member's `plate` field points back here. Forces are accumulated
/// during an epoch and cleared once the plate has moved.
#[derive(Debug, Clone)]
pub struct Plate {
    /// Representative center, on (or near) the planet surface
    pub center: DVec3,
    /// Display color
    pub color: Rgb,
    /// Added to the density of ocean floor created on this plate
    pub density_tweak: f64,
    /// Member points, no duplicates
    pub points: Vec<PointId>,
    /// Net force accumulated this epoch
    pub force: DVec3,
    /// Net torque about the center axis accumulated this epoch
    pub rotation: f64,
}

impl Plate {
    /// Create an empty plate at `center`
    pub fn new(center: DVec3, color: Rgb, density_tweak: f64) -> Self {
        Self {
            center,
            color,
            density_tweak,
            points: Vec::new(),
            force: DVec3::ZERO,
            rotation: 0.0,
        }
    }

    /// Create an empty plate with a random display color
    pub fn with_random_color<R: Rng + ?Sized>(center: DVec3, density_tweak: f64, rng: &mut R) -> Self {
        let color = Rgb::new(rng.gen(), rng.gen(), rng.gen());
        Self::new(center, color, density_tweak)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: PointId) -> bool {
        self.points.contains(&id)
    }

    pub(crate) fn push_point(&mut self, id: PointId) {
        if !self.points.contains(&id) {
            self.points.push(id);
        }
    }

    pub(crate) fn remove_point(&mut self, id: PointId) -> bool {
        match self.points.iter().position(|&p| p == id) {
            Some(i) => {
                self.points.remove(i);
                true
            }
            None => false,
        }
    }

    /// Clear the accumulated force and torque
    pub fn reset_forces(&mut self) {
        self.force = DVec3::ZERO;
        self.rotation = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_membership_has_no_duplicates() {
        let mut plate = Plate::new(DVec3::Z, Rgb::WHITE, 0.0);
        plate.push_point(PointId(1));
        plate.push_point(PointId(2));
        plate.push_point(PointId(1));
        assert_eq!(plate.len(), 2);
        assert!(plate.remove_point(PointId(1)));
        assert!(!plate.remove_point(PointId(1)));
        assert!(plate.contains(PointId(2)));
    }

    #[test]
    fn test_random_color_is_seeded() {
        let mut a = ChaCha8Rng::seed_from_u64(3);
        let mut b = ChaCha8Rng::seed_from_u64(3);
        let p1 = Plate::with_random_color(DVec3::X, 0.1, &mut a);
        let p2 = Plate::with_random_color(DVec3::X, 0.1, &mut b);
        assert_eq!(p1.color, p2.color);
    }

    #[test]
    fn test_display() {
        assert_eq!(PlateId(7).to_string(), "P7");
    }
}
