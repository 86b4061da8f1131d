//! SGP4 propagator adapter.

use std::fmt;

use chrono::{DateTime, Utc};
use nalgebra::Vector3;

use crate::{OrbitalError, Result, TleRecord};

/// Earth-centered inertial state at one instant, in km and km/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EciPosition {
    pub position_km: Vector3<f64>,
    pub velocity_km_s: Vector3<f64>,
}

/// Anything that can place the tracked object in the inertial frame.
///
/// An `Err` means "no sample at this instant"; callers skip the instant
/// rather than treating it as fatal.
pub trait Propagate {
    fn propagate(&self, at: DateTime<Utc>) -> Result<EciPosition>;
}

/// SGP4 model initialised once from a [`TleRecord`].
pub struct Sgp4Propagator {
    epoch: DateTime<Utc>,
    constants: sgp4::Constants,
}

impl Sgp4Propagator {
    /// Initialise the model. Fails with [`OrbitalError::MalformedTle`] when the
    /// element lines cannot be decoded or describe an orbit SGP4 rejects.
    pub fn from_tle(tle: &TleRecord) -> Result<Self> {
        let elements = sgp4::Elements::from_tle(
            Some(tle.name().to_string()),
            tle.line1().as_bytes(),
            tle.line2().as_bytes(),
        )
        .map_err(|e| OrbitalError::MalformedTle(format!("{:?}", e)))?;

        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| OrbitalError::MalformedTle(format!("{:?}", e)))?;

        Ok(Self {
            epoch: DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc),
            constants,
        })
    }

    /// Element set epoch.
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    fn minutes_since_epoch(&self, at: DateTime<Utc>) -> f64 {
        at.signed_duration_since(self.epoch).num_milliseconds() as f64 / 60_000.0
    }
}

impl Propagate for Sgp4Propagator {
    fn propagate(&self, at: DateTime<Utc>) -> Result<EciPosition> {
        let prediction = self
            .constants
            .propagate(self.minutes_since_epoch(at))
            .map_err(|e| OrbitalError::PropagationFailed(format!("{:?} at {}", e, at)))?;

        Ok(EciPosition {
            position_km: Vector3::from(prediction.position),
            velocity_km_s: Vector3::from(prediction.velocity),
        })
    }
}

impl fmt::Debug for Sgp4Propagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sgp4Propagator")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
