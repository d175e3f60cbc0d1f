//! Error types for the tectonic simulation

use thiserror::Error;

use crate::plate::PlateId;
use crate::point::PointId;

/// A broken invariant of the crust model or the mesh.
///
/// These are never recovered from: continuing after one would silently
/// corrupt the edge-manifold mesh or the plate partition. Every variant
/// carries the identities (and where relevant the coordinates) of the
/// offending entities so the caller can dump them before aborting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsistencyError {
    /// An edge would be referenced by more than two wedges
    #[error("edge {a}-{b} reference count would reach {count}")]
    EdgeOverflow { a: PointId, b: PointId, count: u8 },

    /// A point is not a member of the plate it claims to belong to
    #[error("point {point} claims plate {plate} but is not in its member list")]
    PlateMembership { point: PointId, plate: PlateId },

    /// A finished mesh still has an edge used by fewer than two wedges
    #[error("edge {a}-{b} is used by {count} wedge(s) after the mesh was closed")]
    OpenEdge { a: PointId, b: PointId, count: u8 },

    /// A point belongs to no live plate
    #[error("point {point} has no owning plate")]
    OrphanPoint { point: PointId },

    /// A position or force picked up a NaN or infinity
    #[error("non-finite {what} on point {point}: ({x}, {y}, {z})")]
    NonFinite {
        what: &'static str,
        point: PointId,
        x: f64,
        y: f64,
        z: f64,
    },

    /// Negative thickness passed to a rock-adding operation
    #[error("tried to add {amount} km of rock to point {point}")]
    NegativeRock { point: PointId, amount: f64 },

    /// Removal of more rock than the column holds
    #[error("tried to remove {requested} km of rock from point {point} which has {available} km")]
    ExcessRemoval {
        point: PointId,
        requested: f64,
        available: f64,
    },

    /// A dead or never-allocated point id was used
    #[error("unknown point {0}")]
    UnknownPoint(PointId),

    /// A removed or never-allocated plate id was used
    #[error("unknown plate {0}")]
    UnknownPlate(PlateId),
}

/// Errors that can occur while building, stepping, saving or loading a world
#[derive(Error, Debug)]
pub enum TectonicError {
    /// Configuration validation failed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A fatal invariant violation
    #[error("consistency fault: {0}")]
    Consistency(#[from] ConsistencyError),

    /// The triangulation could not be bootstrapped within its retry budget
    #[error("triangulation failed: {0}")]
    Triangulation(String),

    /// Reading or writing a snapshot failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot was readable but its contents make no sense
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

impl TectonicError {
    /// Whether the error means the in-memory world can no longer be trusted
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TectonicError::Consistency(_) | TectonicError::Triangulation(_)
        )
    }
}

/// Result type alias for simulation operations
pub type Result<T> = std::result::Result<T, TectonicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_error_display_names_entities() {
        let err = ConsistencyError::EdgeOverflow {
            a: PointId(3),
            b: PointId(9),
            count: 3,
        };
        let text = err.to_string();
        assert!(text.contains("3-9"));
        assert!(text.contains('3'));
    }

    #[test]
    fn test_consistency_converts_and_is_fatal() {
        let err: TectonicError = ConsistencyError::OrphanPoint { point: PointId(1) }.into();
        assert!(err.is_fatal());

        let io: TectonicError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(!io.is_fatal());
        assert!(io.to_string().starts_with("I/O error"));
    }
}
