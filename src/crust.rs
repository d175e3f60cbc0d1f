//! Arena of crust points and plates
//!
//! Points and plates live in slot vectors addressed by [`PointId`] and
//! [`PlateId`]. A dead slot is never reused within one world, so an id held
//! by a link or a wedge either still names the same entity or names nothing.

use glam::DVec3;

use crate::error::ConsistencyError;
use crate::plate::{Plate, PlateId};
use crate::point::{Point, PointId};

/// Points and plates of one world
#[derive(Debug, Clone, Default)]
pub struct Crust {
    points: Vec<Option<Point>>,
    plates: Vec<Option<Plate>>,
    live_points: usize,
    live_plates: usize,
    next_tag: u64,
}

impl Crust {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live points
    #[inline]
    pub fn point_count(&self) -> usize {
        self.live_points
    }

    /// Number of live plates
    #[inline]
    pub fn plate_count(&self) -> usize {
        self.live_plates
    }

    /// One past the largest point id ever handed out
    ///
    /// Dead slots are never reused, so this keeps growing while points are
    /// created and destroyed. A snapshot round trip renumbers densely.
    #[inline]
    pub fn point_capacity(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.points.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn point_mut(&mut self, id: PointId) -> Option<&mut Point> {
        self.points.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Like [`Crust::point`], but a missing point is a consistency fault
    pub fn get(&self, id: PointId) -> Result<&Point, ConsistencyError> {
        self.point(id).ok_or(ConsistencyError::UnknownPoint(id))
    }

    /// Like [`Crust::point_mut`], but a missing point is a consistency fault
    pub fn get_mut(&mut self, id: PointId) -> Result<&mut Point, ConsistencyError> {
        self.point_mut(id).ok_or(ConsistencyError::UnknownPoint(id))
    }

    /// Position of a live point
    #[inline]
    pub fn pos(&self, id: PointId) -> Option<DVec3> {
        self.point(id).map(|p| p.pos)
    }

    #[inline]
    pub fn is_alive(&self, id: PointId) -> bool {
        self.point(id).is_some()
    }

    #[inline]
    pub fn plate(&self, id: PlateId) -> Option<&Plate> {
        self.plates.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn plate_mut(&mut self, id: PlateId) -> Option<&mut Plate> {
        self.plates.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Like [`Crust::plate_mut`], but a missing plate is a consistency fault
    pub fn get_plate_mut(&mut self, id: PlateId) -> Result<&mut Plate, ConsistencyError> {
        self.plate_mut(id).ok_or(ConsistencyError::UnknownPlate(id))
    }

    /// Iterate over live points in id order
    pub fn points(&self) -> impl Iterator<Item = (PointId, &Point)> + '_ {
        self.points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (PointId(i as u32), p)))
    }

    /// Iterate mutably over live points in id order
    pub fn points_mut(&mut self) -> impl Iterator<Item = (PointId, &mut Point)> + '_ {
        self.points
            .iter_mut()
            .enumerate()
            .filter_map(|(i, p)| p.as_mut().map(|p| (PointId(i as u32), p)))
    }

    /// Ids of all live points, ascending
    pub fn point_ids(&self) -> Vec<PointId> {
        self.points().map(|(id, _)| id).collect()
    }

    /// Iterate over live plates in id order
    pub fn plates(&self) -> impl Iterator<Item = (PlateId, &Plate)> + '_ {
        self.plates
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (PlateId(i as u32), p)))
    }

    /// Ids of all live plates, ascending
    pub fn plate_ids(&self) -> Vec<PlateId> {
        self.plates().map(|(id, _)| id).collect()
    }

    /// Sum of the areas of a plate's points
    pub fn plate_area(&self, id: PlateId) -> f64 {
        self.plate(id)
            .map(|plate| {
                plate
                    .points
                    .iter()
                    .filter_map(|&p| self.point(p))
                    .map(|p| p.area)
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Total rock volume of all live points at their current areas, km³
    pub fn rock_volume(&self) -> f64 {
        self.points().map(|(_, p)| p.volume()).sum()
    }

    /// Add a plate and return its id
    pub fn add_plate(&mut self, plate: Plate) -> PlateId {
        let id = PlateId(self.plates.len() as u32);
        self.plates.push(Some(plate));
        self.live_plates += 1;
        id
    }

    /// Remove an empty plate
    ///
    /// # Errors
    ///
    /// `UnknownPlate` if the plate does not exist, `PlateMembership` if it
    /// still has members (removing it would orphan them).
    pub fn remove_plate(&mut self, id: PlateId) -> Result<Plate, ConsistencyError> {
        let slot = self
            .plates
            .get_mut(id.index())
            .ok_or(ConsistencyError::UnknownPlate(id))?;
        match slot {
            Some(plate) if !plate.is_empty() => Err(ConsistencyError::PlateMembership {
                point: plate.points[0],
                plate: id,
            }),
            Some(_) => {
                self.live_plates -= 1;
                slot.take().ok_or(ConsistencyError::UnknownPlate(id))
            }
            None => Err(ConsistencyError::UnknownPlate(id)),
        }
    }

    /// Remove every plate without members, returning how many went
    pub fn drop_empty_plates(&mut self) -> usize {
        let mut dropped = 0;
        for slot in self.plates.iter_mut() {
            if slot.as_ref().is_some_and(Plate::is_empty) {
                *slot = None;
                dropped += 1;
            }
        }
        self.live_plates -= dropped;
        dropped
    }

    /// Add a point to the arena and to its plate's member list
    ///
    /// The point receives the next identity tag.
    ///
    /// # Errors
    ///
    /// `UnknownPlate` if `point.plate` is not a live plate.
    pub fn add_point(&mut self, mut point: Point) -> Result<PointId, ConsistencyError> {
        let id = PointId(self.points.len() as u32);
        let plate = point.plate;
        self.get_plate_mut(plate)?.push_point(id);
        point.tag = self.next_tag;
        self.next_tag += 1;
        self.points.push(Some(point));
        self.live_points += 1;
        Ok(id)
    }

    /// Destroy a point, removing it from its plate
    ///
    /// The caller is responsible for dropping mesh elements that use it.
    pub fn kill_point(&mut self, id: PointId) -> Result<Point, ConsistencyError> {
        let point = self
            .points
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(ConsistencyError::UnknownPoint(id))?;
        self.live_points -= 1;
        let plate = point.plate;
        if !self.get_plate_mut(plate)?.remove_point(id) {
            return Err(ConsistencyError::PlateMembership { point: id, plate });
        }
        Ok(point)
    }

    /// Move a point onto another plate, keeping both sides of the relation
    pub fn assign_point(&mut self, id: PointId, to: PlateId) -> Result<(), ConsistencyError> {
        let from = self.get(id)?.plate;
        if from == to {
            return Ok(());
        }
        if self.plate(to).is_none() {
            return Err(ConsistencyError::UnknownPlate(to));
        }
        if !self.get_plate_mut(from)?.remove_point(id) {
            return Err(ConsistencyError::PlateMembership { point: id, plate: from });
        }
        self.get_plate_mut(to)?.push_point(id);
        self.get_mut(id)?.plate = to;
        Ok(())
    }

    /// Move every member of `from` onto `to`
    pub fn merge_plate_into(&mut self, from: PlateId, to: PlateId) -> Result<usize, ConsistencyError> {
        let members = match self.plate(from) {
            Some(plate) => plate.points.clone(),
            None => return Err(ConsistencyError::UnknownPlate(from)),
        };
        for &p in &members {
            self.assign_point(p, to)?;
        }
        Ok(members.len())
    }

    /// Verify that plate membership is an exact partition of the live points
    pub fn check_partition(&self) -> Result<(), ConsistencyError> {
        let mut seen = vec![false; self.points.len()];
        for (plate_id, plate) in self.plates() {
            for &p in &plate.points {
                let point = self.point(p).ok_or(ConsistencyError::UnknownPoint(p))?;
                if point.plate != plate_id || seen[p.index()] {
                    return Err(ConsistencyError::PlateMembership {
                        point: p,
                        plate: plate_id,
                    });
                }
                seen[p.index()] = true;
            }
        }
        for (id, point) in self.points() {
            if !seen[id.index()] {
                return Err(match self.plate(point.plate) {
                    Some(_) => ConsistencyError::PlateMembership {
                        point: id,
                        plate: point.plate,
                    },
                    None => ConsistencyError::OrphanPoint { point: id },
                });
            }
        }
        Ok(())
    }

    /// Verify every live point has finite position and forces
    pub fn check_finite(&self) -> Result<(), ConsistencyError> {
        self.points().try_for_each(|(id, p)| p.check_finite(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    fn crust_with_plates(n: usize) -> (Crust, Vec<PlateId>) {
        let mut crust = Crust::new();
        let plates = (0..n)
            .map(|_| crust.add_plate(Plate::new(DVec3::Z, Rgb::WHITE, 0.0)))
            .collect();
        (crust, plates)
    }

    fn add(crust: &mut Crust, plate: PlateId, x: f64) -> PointId {
        crust
            .add_point(Point::new(DVec3::new(x, 0.0, 1.0), plate, 1.0, 0))
            .unwrap()
    }

    #[test]
    fn test_add_and_kill_point() {
        let (mut crust, plates) = crust_with_plates(1);
        let a = add(&mut crust, plates[0], 0.0);
        let b = add(&mut crust, plates[0], 1.0);
        assert_eq!(crust.point_count(), 2);
        assert_ne!(crust.point(a).unwrap().tag, crust.point(b).unwrap().tag);

        crust.kill_point(a).unwrap();
        assert_eq!(crust.point_count(), 1);
        assert!(!crust.is_alive(a));
        assert_eq!(crust.plate(plates[0]).unwrap().points, vec![b]);
        assert!(matches!(crust.kill_point(a), Err(ConsistencyError::UnknownPoint(_))));
        crust.check_partition().unwrap();
    }

    #[test]
    fn test_rock_volume_counts_live_points() {
        let (mut crust, plates) = crust_with_plates(1);
        let a = add(&mut crust, plates[0], 0.0);
        let b = add(&mut crust, plates[0], 1.0);
        for (id, area) in [(a, 2.0), (b, 3.0)] {
            let p = crust.get_mut(id).unwrap();
            p.area = area;
            p.thickness = 10.0;
        }
        assert_eq!(crust.rock_volume(), 50.0);
        crust.kill_point(a).unwrap();
        assert_eq!(crust.rock_volume(), 30.0);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let (mut crust, plates) = crust_with_plates(1);
        let a = add(&mut crust, plates[0], 0.0);
        crust.kill_point(a).unwrap();
        let b = add(&mut crust, plates[0], 0.0);
        assert_ne!(a, b);
        assert_eq!(crust.point_capacity(), 2);
    }

    #[test]
    fn test_assign_and_merge() {
        let (mut crust, plates) = crust_with_plates(2);
        let a = add(&mut crust, plates[0], 0.0);
        let b = add(&mut crust, plates[0], 1.0);
        let c = add(&mut crust, plates[1], 2.0);

        crust.assign_point(a, plates[1]).unwrap();
        assert_eq!(crust.point(a).unwrap().plate, plates[1]);
        crust.check_partition().unwrap();

        assert_eq!(crust.merge_plate_into(plates[1], plates[0]).unwrap(), 2);
        assert!(crust.plate(plates[1]).unwrap().is_empty());
        assert_eq!(crust.drop_empty_plates(), 1);
        assert_eq!(crust.plate_count(), 1);
        for p in [a, b, c] {
            assert_eq!(crust.point(p).unwrap().plate, plates[0]);
        }
        crust.check_partition().unwrap();
    }

    #[test]
    fn test_remove_non_empty_plate_fails() {
        let (mut crust, plates) = crust_with_plates(1);
        add(&mut crust, plates[0], 0.0);
        assert!(crust.remove_plate(plates[0]).is_err());
    }

    #[test]
    fn test_partition_detects_bad_back_reference() {
        let (mut crust, plates) = crust_with_plates(2);
        let a = add(&mut crust, plates[0], 0.0);
        crust.point_mut(a).unwrap().plate = plates[1];
        assert!(matches!(
            crust.check_partition(),
            Err(ConsistencyError::PlateMembership { .. })
        ));
    }

    #[test]
    fn test_plate_area() {
        let (mut crust, plates) = crust_with_plates(1);
        let a = add(&mut crust, plates[0], 0.0);
        let b = add(&mut crust, plates[0], 1.0);
        crust.point_mut(a).unwrap().area = 2.0;
        crust.point_mut(b).unwrap().area = 3.5;
        assert_eq!(crust.plate_area(plates[0]), 5.5);
    }
}
