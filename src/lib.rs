//! Plate tectonics on a triangulated sphere
//!
//! A standalone library that simulates the crust of a planet epoch by epoch:
//! mantle-driven plate motion, continental collision, subduction, rifting,
//! erosion and a sea level set by a fixed volume of water.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tectonic_planet::*;
//!
//! // Create a planet
//! let config = WorldConfigBuilder::new()
//!     .seed(42)
//!     .plate_count(10).unwrap()
//!     .build().unwrap();
//!
//! let mut world = World::new(config).unwrap();
//!
//! // Let the continents drift for a while
//! for _ in 0..100 {
//!     let report = world.step().unwrap();
//!     println!("epoch {}: sea level {:.2} km", report.epoch, report.sea_level);
//! }
//!
//! world.save("planet.tec").unwrap();
//! ```
//!
//! # Features
//!
//! - `spatial-index` (default): Enables O(log n) nearest-point lookups using a KD-tree
//! - `serde`: Enables serialization support for configuration, colors and reports

// Modules
pub mod error;
pub mod config;
pub mod color;
pub mod point;
pub mod plate;
pub mod crust;
pub mod links;
pub mod grid;
pub mod triangulation;
pub mod kinematics;
pub mod mantle;
pub mod stress;
pub mod geology;
pub mod erosion;
pub mod sealevel;
pub mod persistence;
pub mod world;

#[cfg(feature = "spatial-index")]
pub mod spatial;

// Re-export core types for convenience
pub use error::{ConsistencyError, Result, TectonicError};
pub use config::{WorldConfig, WorldConfigBuilder};
pub use color::{ColorMap, ColorMapper, Rgb};
pub use point::{Point, PointId};
pub use plate::{Plate, PlateId};
pub use crust::Crust;
pub use links::{Link, LinkSystem};
pub use triangulation::{Mesh, RepairOutcome, Wedge};
pub use mantle::Upwelling;
pub use erosion::ErosionOutcome;
pub use persistence::Snapshot;
pub use world::{EpochReport, World};

#[cfg(feature = "spatial-index")]
pub use spatial::PointIndex;

// Re-export glam::DVec3 for convenience
pub use glam::DVec3;
