//! Orbital Mechanics Library
//!
//! TLE ingestion, SGP4 propagation, ECI to geodetic transforms and
//! trajectory sampling for a single tracked object.

use thiserror::Error;

pub mod propagation;
pub mod tle;
pub mod trajectory;
pub mod transforms;

pub use propagation::{EciPosition, Propagate, Sgp4Propagator};
pub use tle::TleRecord;
pub use trajectory::{OrbitSample, SamplingWindow, TrajectoryArc};
pub use transforms::{Cartesian, GeodeticPosition};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrbitalError {
    #[error("TLE needs a name and two element lines, found {found} non-blank line(s)")]
    InsufficientLines { found: usize },
    #[error("Malformed TLE: {0}")]
    MalformedTle(String),
    #[error("Propagation failed: {0}")]
    PropagationFailed(String),
}

impl OrbitalError {
    /// True for the errors that reject TLE text as a whole.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrbitalError::InsufficientLines { .. } | OrbitalError::MalformedTle(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OrbitalError>;
