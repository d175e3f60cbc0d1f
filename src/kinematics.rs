//! Rigid plate motion
//!
//! Forces acting at member points are summed into a net force and a torque
//! about the axis through the plate center. Moving a plate turns both into
//! rotations about the planet center: a spin about the plate's own axis and
//! a drift about the axis perpendicular to the force.

use glam::{DMat3, DVec3};

use crate::crust::Crust;
use crate::error::ConsistencyError;
use crate::plate::{Plate, PlateId};

/// Accumulate a force `vec` acting through `at`
///
/// Forces whose line of action passes through the plate axis add to the
/// net force without producing torque; zero and non-finite lever arms are
/// ignored entirely.
pub fn apply_force(plate: &mut Plate, at: DVec3, vec: DVec3) {
    if vec.length_squared() <= 0.0 {
        return;
    }
    let Some(perp) = vec.cross(plate.center).try_normalize() else {
        return;
    };
    let lever = plate.center.dot(perp) - at.dot(perp);
    plate.rotation -= lever * vec.length();
    plate.force += vec;
}

/// Move a plate by its accumulated force and torque, then re-center it
///
/// Every member point keeps its distance from the planet center, and its
/// `old_pos` records where it was before the move. The plate's
/// accumulators are scaled in place; call [`Plate::reset_forces`] after.
///
/// # Errors
///
/// `UnknownPlate`/`UnknownPoint` for a broken arena, `NonFinite` if the
/// move produced an invalid position.
pub fn move_plate(crust: &mut Crust, id: PlateId) -> Result<(), ConsistencyError> {
    let area = crust.plate_area(id);
    let plate = crust.plate(id).ok_or(ConsistencyError::UnknownPlate(id))?;
    if area <= 0.0 || plate.is_empty() {
        return Ok(());
    }
    let moment_of_inertia = area * area / (2.0 * std::f64::consts::PI);
    let rotation = plate.rotation / moment_of_inertia;
    let force = plate.force / area;
    let axis = plate.center.normalize_or_zero();

    let spin = if axis != DVec3::ZERO && rotation.is_finite() {
        DMat3::from_axis_angle(axis, rotation)
    } else {
        DMat3::IDENTITY
    };
    let drift = match force.cross(axis).try_normalize() {
        Some(drift_axis) => DMat3::from_axis_angle(drift_axis, -force.length()),
        None => DMat3::IDENTITY,
    };
    let transform = drift * spin;

    let members = plate.points.clone();
    {
        let plate = crust.get_plate_mut(id)?;
        plate.rotation = rotation;
        plate.force = force;
    }
    for p in members {
        let point = crust.get_mut(p)?;
        let height = point.radius();
        point.old_pos = point.pos;
        point.pos = transform * point.pos;
        point.original_north = transform * point.original_north;
        point.set_radius(height);
        if !point.pos.is_finite() {
            return Err(ConsistencyError::NonFinite {
                what: "position",
                point: p,
                x: point.pos.x,
                y: point.pos.y,
                z: point.pos.z,
            });
        }
    }
    recenter(crust, id)
}

/// Put the plate center at the area-weighted mean direction of its points,
/// at their mean radius
///
/// Points without area yet (a freshly built planet) are weighted equally.
pub fn recenter(crust: &mut Crust, id: PlateId) -> Result<(), ConsistencyError> {
    let plate = crust.plate(id).ok_or(ConsistencyError::UnknownPlate(id))?;
    if plate.is_empty() {
        return Ok(());
    }
    let mut weighted = DVec3::ZERO;
    let mut plain = DVec3::ZERO;
    let mut height = 0.0;
    for &p in &plate.points {
        let point = crust.get(p)?;
        weighted += point.pos * point.area;
        plain += point.pos;
        height += point.radius();
    }
    height /= plate.len() as f64;
    let dir = weighted
        .try_normalize()
        .or_else(|| plain.try_normalize())
        .unwrap_or(DVec3::Y);
    crust.get_plate_mut(id)?.center = dir * height;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::point::{Point, PointId};
    use approx::assert_relative_eq;

    const R: f64 = 6400.0;

    fn patch() -> (Crust, PlateId, Vec<PointId>) {
        let mut crust = Crust::new();
        let plate = crust.add_plate(Plate::new(DVec3::Z * R, Rgb::WHITE, 0.0));
        let mut ids = Vec::new();
        for (lat, lon) in [(0.0, 0.0), (5.0, 0.0), (0.0, 5.0), (-5.0, 0.0), (0.0, -5.0)] {
            let mut p = Point::from_lat_lon(lat, lon, R, plate, 100.0, 0);
            p.area = 1.0e5;
            ids.push(crust.add_point(p).unwrap());
        }
        recenter(&mut crust, plate).unwrap();
        (crust, plate, ids)
    }

    #[test]
    fn test_force_through_axis_has_no_torque() {
        let mut plate = Plate::new(DVec3::Z * R, Rgb::WHITE, 0.0);
        apply_force(&mut plate, DVec3::Z * R, DVec3::X * 10.0);
        assert_relative_eq!(plate.rotation, 0.0, epsilon = 1e-9);
        assert_eq!(plate.force, DVec3::X * 10.0);

        apply_force(&mut plate, DVec3::Z * R, DVec3::ZERO);
        assert_eq!(plate.force, DVec3::X * 10.0);
    }

    #[test]
    fn test_offset_force_makes_torque() {
        let mut plate = Plate::new(DVec3::Z * R, Rgb::WHITE, 0.0);
        apply_force(&mut plate, DVec3::new(0.0, 500.0, R), DVec3::X * 10.0);
        assert!(plate.rotation.abs() > 1.0);
    }

    #[test]
    fn test_move_preserves_radius_and_shape() {
        let (mut crust, plate, ids) = patch();
        let before: Vec<DVec3> = ids.iter().map(|&p| crust.pos(p).unwrap()).collect();
        {
            let plate = crust.plate_mut(plate).unwrap();
            plate.force = DVec3::X * 5.0e4;
            plate.rotation = 1.0e8;
        }
        move_plate(&mut crust, plate).unwrap();

        for (i, &p) in ids.iter().enumerate() {
            let point = crust.point(p).unwrap();
            assert_relative_eq!(point.radius(), R, epsilon = 1e-6);
            assert_eq!(point.old_pos, before[i]);
            assert!(point.pos.distance(before[i]) > 1.0);
        }
        // Rigid: pairwise distances unchanged
        let d0 = before[1].distance(before[3]);
        let d1 = crust.pos(ids[1]).unwrap().distance(crust.pos(ids[3]).unwrap());
        assert_relative_eq!(d0, d1, epsilon = 1e-6);
    }

    #[test]
    fn test_drift_follows_force() {
        let (mut crust, plate, ids) = patch();
        crust.plate_mut(plate).unwrap().force = DVec3::X * 5.0e4;
        let start = crust.pos(ids[0]).unwrap();
        move_plate(&mut crust, plate).unwrap();
        let moved = crust.pos(ids[0]).unwrap() - start;
        assert!(moved.x > 0.0, "moved {:?}", moved);
        let center = crust.plate(plate).unwrap().center;
        assert!(center.x > 0.0);
    }

    #[test]
    fn test_recenter() {
        let (crust, plate, _) = patch();
        let center = crust.plate(plate).unwrap().center;
        assert_relative_eq!(center.length(), R, epsilon = 1e-6);
        assert_relative_eq!(center.normalize().z, 1.0, epsilon = 1e-9);
    }
}
