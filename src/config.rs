//! World configuration and builder
//!
//! This module provides the configuration types used to create a new
//! simulated planet.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TectonicError};

/// Default planet radius in km
pub const DEFAULT_PLANET_RADIUS: f64 = 6400.0;

/// Default distance between neighbouring crust points in km
pub const DEFAULT_POINT_SPACING: f64 = 360.0;

/// Total surface water on the planet in km³
pub const DEFAULT_WATER_VOLUME: f64 = 1.36e9;

/// Configuration for a new simulated world
///
/// The same configuration (including `seed`) produces the same initial
/// planet and, step for step, the same history.
///
/// # Example
///
/// ```rust
/// use tectonic_planet::*;
///
/// let config = WorldConfigBuilder::new()
///     .seed(42)
///     .plate_count(6).unwrap()
///     .build()
///     .unwrap();
///
/// # #[cfg(feature = "serde")]
/// # {
/// let json = serde_json::to_string(&config).unwrap();
/// let restored: WorldConfig = serde_json::from_str(&json).unwrap();
/// assert_eq!(config, restored);
/// # }
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    /// Seed for the world's single random source
    pub seed: u64,

    /// Number of plates placed at initialization
    pub plate_count: usize,

    /// Number of mantle upwellings driving plate motion
    ///
    /// At least two are needed: the flow at a point is shaped by the
    /// nearest and second-nearest upwelling.
    pub mantle_point_count: usize,

    /// Planet radius in km
    pub planet_radius: f64,

    /// Nominal spacing between crust points in km
    ///
    /// Determines the number of points (roughly `4πR² / spacing²`) and the
    /// resolution of the spatial grid.
    pub point_spacing: f64,

    /// Total volume of water poured onto the surface, km³
    pub water_volume: f64,

    /// Probability that an initial plate is oceanic rather than continental
    pub ocean_plate_probability: f64,
}

impl WorldConfig {
    /// Approximate number of crust points this configuration produces
    pub fn approximate_point_count(&self) -> usize {
        let sphere = 4.0 * std::f64::consts::PI * self.planet_radius * self.planet_radius;
        (sphere / (self.point_spacing * self.point_spacing)) as usize
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            plate_count: 10,
            mantle_point_count: 10,
            planet_radius: DEFAULT_PLANET_RADIUS,
            point_spacing: DEFAULT_POINT_SPACING,
            water_volume: DEFAULT_WATER_VOLUME,
            ocean_plate_probability: 0.75,
        }
    }
}

/// Builder for creating a [`WorldConfig`] with validation
///
/// # Example
///
/// ```rust
/// use tectonic_planet::*;
///
/// // Use defaults (10 plates, 10 upwellings, Earth-sized)
/// let config = WorldConfigBuilder::new().build().unwrap();
///
/// // A coarse planet for quick experiments
/// let config = WorldConfigBuilder::new()
///     .seed(7)
///     .point_spacing(900.0)
///     .unwrap()
///     .mantle_point_count(4)
///     .unwrap()
///     .build()
///     .unwrap();
/// assert_eq!(config.mantle_point_count, 4);
/// ```
#[derive(Debug, Clone)]
pub struct WorldConfigBuilder {
    seed: Option<u64>,
    plate_count: usize,
    mantle_point_count: usize,
    planet_radius: f64,
    point_spacing: f64,
    water_volume: f64,
    ocean_plate_probability: f64,
}

impl WorldConfigBuilder {
    /// Create a new builder with default values
    ///
    /// Defaults:
    /// - seed: Random (generated from thread_rng)
    /// - plate_count: 10
    /// - mantle_point_count: 10
    /// - planet_radius: 6400 km
    /// - point_spacing: 360 km
    /// - water_volume: 1.36e9 km³
    /// - ocean_plate_probability: 0.75
    pub fn new() -> Self {
        let defaults = WorldConfig::default();
        Self {
            seed: None,
            plate_count: defaults.plate_count,
            mantle_point_count: defaults.mantle_point_count,
            planet_radius: defaults.planet_radius,
            point_spacing: defaults.point_spacing,
            water_volume: defaults.water_volume,
            ocean_plate_probability: defaults.ocean_plate_probability,
        }
    }

    /// Set the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of initial plates
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `count` is zero
    pub fn plate_count(mut self, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(TectonicError::InvalidConfig(
                "plate count must be at least 1".to_string(),
            ));
        }
        self.plate_count = count;
        Ok(self)
    }

    /// Set the number of mantle upwellings
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `count` < 2
    pub fn mantle_point_count(mut self, count: usize) -> Result<Self> {
        if count < 2 {
            return Err(TectonicError::InvalidConfig(format!(
                "mantle point count must be >= 2 (got {})",
                count
            )));
        }
        self.mantle_point_count = count;
        Ok(self)
    }

    /// Set the planet radius in km
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the radius is not a positive finite number
    pub fn planet_radius(mut self, radius: f64) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(TectonicError::InvalidConfig(format!(
                "planet radius must be positive (got {})",
                radius
            )));
        }
        self.planet_radius = radius;
        Ok(self)
    }

    /// Set the nominal point spacing in km
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the spacing is not positive and finite
    pub fn point_spacing(mut self, spacing: f64) -> Result<Self> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(TectonicError::InvalidConfig(format!(
                "point spacing must be positive (got {})",
                spacing
            )));
        }
        self.point_spacing = spacing;
        Ok(self)
    }

    /// Set the total water volume in km³
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the volume is negative or not finite
    pub fn water_volume(mut self, volume: f64) -> Result<Self> {
        if !(volume.is_finite() && volume >= 0.0) {
            return Err(TectonicError::InvalidConfig(format!(
                "water volume must be >= 0 (got {})",
                volume
            )));
        }
        self.water_volume = volume;
        Ok(self)
    }

    /// Set the probability that an initial plate is oceanic
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `p` is outside `[0, 1]`
    pub fn ocean_plate_probability(mut self, p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(TectonicError::InvalidConfig(format!(
                "ocean plate probability must be in [0, 1] (got {})",
                p
            )));
        }
        self.ocean_plate_probability = p;
        Ok(self)
    }

    /// Build the configuration
    ///
    /// If no seed was provided, generates a random seed using thread_rng.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the spacing is too coarse for the radius
    /// (fewer than a handful of latitude rings would fit).
    pub fn build(self) -> Result<WorldConfig> {
        if self.point_spacing * 8.0 > self.planet_radius * std::f64::consts::PI {
            return Err(TectonicError::InvalidConfig(format!(
                "point spacing {} is too coarse for radius {}",
                self.point_spacing, self.planet_radius
            )));
        }
        let seed = self.seed.unwrap_or_else(rand::random);

        Ok(WorldConfig {
            seed,
            plate_count: self.plate_count,
            mantle_point_count: self.mantle_point_count,
            planet_radius: self.planet_radius,
            point_spacing: self.point_spacing,
            water_volume: self.water_volume,
            ocean_plate_probability: self.ocean_plate_probability,
        })
    }
}

impl Default for WorldConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = WorldConfigBuilder::new().seed(1).build().unwrap();
        assert_eq!(config.plate_count, 10);
        assert_eq!(config.mantle_point_count, 10);
        assert_eq!(config.planet_radius, 6400.0);
        assert_eq!(config.point_spacing, 360.0);
        assert_eq!(config.water_volume, 1.36e9);
    }

    #[test]
    fn test_builder_custom() {
        let config = WorldConfigBuilder::new()
            .seed(42)
            .plate_count(4)
            .unwrap()
            .mantle_point_count(3)
            .unwrap()
            .point_spacing(1000.0)
            .unwrap()
            .ocean_plate_probability(0.5)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.seed, 42);
        assert_eq!(config.plate_count, 4);
        assert_eq!(config.mantle_point_count, 3);
        assert_eq!(config.point_spacing, 1000.0);
        assert_eq!(config.ocean_plate_probability, 0.5);
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert!(WorldConfigBuilder::new().plate_count(0).is_err());
        assert!(WorldConfigBuilder::new().mantle_point_count(1).is_err());
        assert!(WorldConfigBuilder::new().planet_radius(0.0).is_err());
        assert!(WorldConfigBuilder::new().planet_radius(f64::NAN).is_err());
        assert!(WorldConfigBuilder::new().point_spacing(-5.0).is_err());
        assert!(WorldConfigBuilder::new().water_volume(-1.0).is_err());
        assert!(WorldConfigBuilder::new().ocean_plate_probability(1.5).is_err());
    }

    #[test]
    fn test_spacing_too_coarse() {
        let result = WorldConfigBuilder::new()
            .point_spacing(5000.0)
            .unwrap()
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_approximate_point_count() {
        let config = WorldConfig::default();
        let n = config.approximate_point_count();
        assert!(n > 1000 && n < 10_000, "got {}", n);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_serialization() {
        let config = WorldConfigBuilder::new().seed(12345).build().unwrap();

        let json = serde_json::to_string(&config).unwrap();
        let restored: WorldConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, restored);
    }
}
