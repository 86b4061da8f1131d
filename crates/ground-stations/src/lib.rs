//! Ground Stations Library
//!
//! A fixed ground station, the horizon-limited visibility test against a
//! tracked object, and detection of the next visibility window.

use orbital_mechanics::{Cartesian, GeodeticPosition};
use serde::Serialize;
use thiserror::Error;

pub mod visibility;
pub mod window;

pub use visibility::{is_visible, visibility_radius, AltitudeSource};
pub use window::{detect_window, VisibilityWindow, DEFAULT_PASS_GAP_MIN};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StationError {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

pub type Result<T> = std::result::Result<T, StationError>;

/// Validate latitude is in valid range
fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

/// Validate longitude is in valid range
fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

/// Observer location, converted to the ground frame once at construction.
#[derive(Debug, Clone, Serialize)]
pub struct GroundStation {
    name: String,
    location: GeodeticPosition,
    frame_position: Cartesian,
}

impl GroundStation {
    pub fn new(name: impl Into<String>, location: GeodeticPosition) -> Result<Self> {
        if !is_valid_latitude(location.latitude_deg) {
            return Err(StationError::InvalidCoordinates(format!(
                "latitude {} outside [-90, 90]",
                location.latitude_deg
            )));
        }
        if !is_valid_longitude(location.longitude_deg) {
            return Err(StationError::InvalidCoordinates(format!(
                "longitude {} outside [-180, 180]",
                location.longitude_deg
            )));
        }
        if !location.height_m.is_finite() {
            return Err(StationError::InvalidCoordinates(format!(
                "height {} is not finite",
                location.height_m
            )));
        }

        Ok(Self {
            name: name.into(),
            frame_position: location.to_ground_frame(),
            location,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &GeodeticPosition {
        &self.location
    }

    pub fn frame_position(&self) -> &Cartesian {
        &self.frame_position
    }

    /// Straight-line distance to a ground-frame point, in meters.
    pub fn distance_to(&self, point: &Cartesian) -> f64 {
        (point - self.frame_position).norm()
    }
}
