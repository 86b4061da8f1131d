//! Horizon-limited visibility geometry.
//!
//! The radius is a straight-line chord from a sea-level observer on a
//! spherical Earth to the horizon point of an object at the given altitude.
//! Ground-station elevation and atmospheric refraction are ignored; the test
//! is an approximation of line-of-sight, not an elevation mask.

use orbital_mechanics::transforms::WGS84_A_M;
use orbital_mechanics::{Cartesian, OrbitSample};
use serde::{Deserialize, Serialize};

/// Maximum straight-line distance, in meters, at which an object at
/// `object_height_m` is above the horizon of a ground observer.
///
/// Negative heights clamp to zero.
pub fn visibility_radius(object_height_m: f64) -> f64 {
    let h = object_height_m.max(0.0);
    ((WGS84_A_M + h).powi(2) - WGS84_A_M * WGS84_A_M).sqrt()
}

/// True iff the two ground-frame points are within `radius` meters.
pub fn is_visible(ground: &Cartesian, object: &Cartesian, radius: f64) -> bool {
    (object - ground).norm() <= radius
}

/// Which altitude feeds [`visibility_radius`] during window detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltitudeSource {
    /// Each sample's own geodetic height.
    Live,
    /// A fixed altitude in meters for every sample.
    Nominal(f64),
}

impl AltitudeSource {
    pub fn radius_for(&self, sample: &OrbitSample) -> f64 {
        match self {
            AltitudeSource::Live => visibility_radius(sample.geodetic.height_m),
            AltitudeSource::Nominal(height_m) => visibility_radius(*height_m),
        }
    }
}
