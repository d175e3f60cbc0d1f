//! Crust points and their rock columns

use std::fmt;

use glam::DVec3;

use crate::color::Rgb;
use crate::error::ConsistencyError;
use crate::plate::PlateId;

/// Density of the mantle the crust floats on, g/cm³
pub const DEFAULT_BULK_DENSITY: f64 = 3.3;

/// Columns thicker than this (km) count as continental crust
pub const CONTINENTAL_THICKNESS: f64 = 18.0;

/// Thickness of freshly made ocean floor, km
pub const OCEAN_FLOOR_THICKNESS: f64 = 7.0;

/// Density of freshly made ocean floor before the plate's tweak
pub const OCEAN_FLOOR_DENSITY: f64 = 3.0;

/// Weight of the mantle drag in a point's net force
const MANTLE_FORCE_WEIGHT: f64 = 0.004;

/// Weight of the collision force in a point's net force
const COLLISION_FORCE_WEIGHT: f64 = 0.2;

/// Stable index of a point in the crust arena
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId(pub u32);

impl PointId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A vertex of the crust mesh
///
/// The distance of `pos` from the planet center is the point's radius; the
/// rock column summary (`thickness`, `density`, `base_depth_offset`)
/// determines its surface height.
#[derive(Debug, Clone)]
pub struct Point {
    /// Current position
    pub pos: DVec3,
    /// Position before the last plate move
    pub old_pos: DVec3,
    /// Monotonic identity tag, unique over the lifetime of a world
    pub tag: u64,
    /// Owning plate
    pub plate: PlateId,
    /// Rock column thickness, km
    pub thickness: f64,
    /// Mean rock density of the column
    pub density: f64,
    /// Density of the mantle under this column
    pub bulk_density: f64,
    /// Accumulated isostatic offset (subduction pull-down, uplift)
    pub base_depth_offset: f64,
    /// Nominal radius of the point, km (half the spacing)
    pub size: f64,
    /// Share of the surface area of the adjacent wedges, km²
    pub area: f64,
    /// Epoch the point was created in
    pub creation_epoch: i32,
    /// Display color from the world's color map
    pub color: Rgb,
    /// A north reference rotated together with the plate
    pub original_north: DVec3,

    /// Mantle flow velocity sampled at the point this epoch
    pub mantle_flow: DVec3,
    /// Drag force exerted by the mantle
    pub mantle_force: DVec3,
    /// Force from colliding plates and slab pull
    pub collision_force: DVec3,
    /// Force accumulated by the stress solver
    pub stress_force: DVec3,
    /// Mesh around this point must be rechecked
    pub valid: bool,
    /// Point sits next to an overstressed link
    pub broken: bool,
    /// Landmass this point belongs to for the current epoch
    pub landmass: Option<usize>,
    /// Rock volume that can be added before a slope limit is hit
    pub vol_cap: f64,
    /// Like `vol_cap` without the "no higher than neighbours" clamp
    pub vol_cap_relaxed: f64,
}

impl Point {
    /// Create a point with an empty rock column at `pos`
    pub fn new(pos: DVec3, plate: PlateId, size: f64, creation_epoch: i32) -> Self {
        Self {
            pos,
            old_pos: pos,
            tag: 0,
            plate,
            thickness: 0.0,
            density: 3.0,
            bulk_density: DEFAULT_BULK_DENSITY,
            base_depth_offset: 0.0,
            size,
            area: 0.0,
            creation_epoch,
            color: Rgb::BLACK,
            original_north: north_at(pos),
            mantle_flow: DVec3::ZERO,
            mantle_force: DVec3::ZERO,
            collision_force: DVec3::ZERO,
            stress_force: DVec3::ZERO,
            valid: false,
            broken: false,
            landmass: None,
            vol_cap: 0.0,
            vol_cap_relaxed: 0.0,
        }
    }

    /// Create a point from latitude/longitude in degrees
    ///
    /// Longitude 0 lies on +z, latitude 90 on +y.
    pub fn from_lat_lon(
        lat_deg: f64,
        lon_deg: f64,
        radius: f64,
        plate: PlateId,
        size: f64,
        creation_epoch: i32,
    ) -> Self {
        let (lat, lon) = (lat_deg.to_radians(), lon_deg.to_radians());
        let pos = DVec3::new(
            lon.sin() * lat.cos() * radius,
            lat.sin() * radius,
            lon.cos() * lat.cos() * radius,
        );
        Self::new(pos, plate, size, creation_epoch)
    }

    /// Distance from the planet center
    #[inline]
    pub fn radius(&self) -> f64 {
        self.pos.length()
    }

    /// Put the point back at distance `h` from the center, keeping direction
    pub fn set_radius(&mut self, h: f64) {
        let dir = self.pos.normalize_or_zero();
        if dir != DVec3::ZERO {
            self.pos = dir * h;
        }
    }

    /// Elevation of the rock surface relative to the datum, km
    #[inline]
    pub fn surface_height(&self) -> f64 {
        self.base_depth_offset + self.thickness * (1.0 - self.density / self.bulk_density)
    }

    /// Depth of the column's base relative to the datum, km (negative down)
    #[inline]
    pub fn base_depth(&self) -> f64 {
        self.base_depth_offset - self.thickness * self.density / self.bulk_density
    }

    /// Height above the given sea level
    #[inline]
    pub fn height_above(&self, sea_level: f64) -> f64 {
        self.surface_height() - sea_level
    }

    /// Rock volume of the column, km³
    #[inline]
    pub fn volume(&self) -> f64 {
        self.thickness * self.area
    }

    #[inline]
    pub fn is_continental(&self) -> bool {
        self.thickness > CONTINENTAL_THICKNESS
    }

    /// Add a layer of rock, mixing densities by thickness
    ///
    /// # Errors
    ///
    /// `NegativeRock` if `thickness` is negative or not finite.
    pub fn add_rock(&mut self, id: PointId, thickness: f64, density: f64) -> Result<(), ConsistencyError> {
        if !(thickness >= 0.0) || !thickness.is_finite() {
            return Err(ConsistencyError::NegativeRock {
                point: id,
                amount: thickness,
            });
        }
        let total = self.thickness + thickness;
        if total > 0.0 {
            self.density = (self.thickness * self.density + thickness * density) / total;
        }
        self.thickness = total;
        Ok(())
    }

    /// Remove `thickness` km from the top of the column
    ///
    /// # Errors
    ///
    /// `ExcessRemoval` if more rock is requested than the column holds, or
    /// the amount is negative.
    pub fn remove_rock(&mut self, id: PointId, thickness: f64) -> Result<(), ConsistencyError> {
        if !(thickness >= 0.0) || thickness > self.thickness + 1e-9 {
            return Err(ConsistencyError::ExcessRemoval {
                point: id,
                requested: thickness,
                available: self.thickness,
            });
        }
        self.thickness = (self.thickness - thickness).max(0.0);
        Ok(())
    }

    /// Scale the column thickness (area-conserving squash)
    pub fn scale_thickness(&mut self, factor: f64) {
        if factor.is_finite() && factor > 0.0 {
            self.thickness *= factor;
        }
    }

    /// Replace the column by fresh oceanic crust
    pub fn make_new_ocean_floor(&mut self, density_tweak: f64) {
        self.thickness = OCEAN_FLOOR_THICKNESS;
        self.density = OCEAN_FLOOR_DENSITY + density_tweak;
    }

    /// Net force used by the stress solver
    #[inline]
    pub fn net_force(&self) -> DVec3 {
        self.stress_force
            + self.mantle_force * MANTLE_FORCE_WEIGHT
            + self.collision_force * COLLISION_FORCE_WEIGHT
    }

    /// Return a `NonFinite` fault if position or any force is NaN/infinite
    pub fn check_finite(&self, id: PointId) -> Result<(), ConsistencyError> {
        let fields: [(&'static str, DVec3); 4] = [
            ("position", self.pos),
            ("mantle force", self.mantle_force),
            ("collision force", self.collision_force),
            ("stress force", self.stress_force),
        ];
        for (what, v) in fields {
            if !v.is_finite() {
                return Err(ConsistencyError::NonFinite {
                    what,
                    point: id,
                    x: v.x,
                    y: v.y,
                    z: v.z,
                });
            }
        }
        Ok(())
    }
}

/// Local north direction at `pos`
///
/// At the poles, where north is undefined, returns zero.
pub fn north_at(pos: DVec3) -> DVec3 {
    let up = pos.normalize_or_zero();
    let east = DVec3::Y.cross(up).normalize_or_zero();
    up.cross(east)
}
