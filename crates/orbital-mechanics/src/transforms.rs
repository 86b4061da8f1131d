//! Inertial to geodetic conversion and the WGS84 ground frame.

use std::f64::consts::{PI, TAU};

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::EciPosition;

/// WGS84 equatorial radius in meters.
pub const WGS84_A_M: f64 = 6_378_137.0;
pub const WGS84_FLATTENING: f64 = 1.0 / 298.257223563;
const WGS84_E2: f64 = WGS84_FLATTENING * (2.0 - WGS84_FLATTENING);

/// Earth-fixed Cartesian point in meters, used for distance tests.
pub type Cartesian = Vector3<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub height_m: f64,
}

impl GeodeticPosition {
    pub fn new(latitude_deg: f64, longitude_deg: f64, height_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            height_m,
        }
    }

    /// Earth-fixed position of this point.
    pub fn to_ground_frame(&self) -> Cartesian {
        geodetic_to_ecef(self)
    }
}

/// Julian date (UT1 approximated by UTC) with millisecond resolution.
pub fn julian_date(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 86_400_000.0 + 2_440_587.5
}

/// Greenwich mean sidereal time in radians, normalized to [0, 2π).
pub fn gmst(at: DateTime<Utc>) -> f64 {
    // Julian centuries from J2000.0
    let t = (julian_date(at) - 2_451_545.0) / 36_525.0;

    let gmst_sec = 67_310.54841 + (876_600.0 * 3600.0 + 8_640_184.812866) * t + 0.093104 * t * t
        - 6.2e-6 * t * t * t;

    (gmst_sec / 240.0).to_radians().rem_euclid(TAU)
}

/// Convert an inertial position to latitude/longitude/height.
///
/// The frame is rotated by sidereal time at `at`, so the same inertial
/// vector lands on different longitudes at different instants.
pub fn eci_to_geodetic(eci: &EciPosition, at: DateTime<Utc>) -> GeodeticPosition {
    let a_km = WGS84_A_M / 1000.0;
    let [x, y, z] = [eci.position_km.x, eci.position_km.y, eci.position_km.z];

    let r = (x * x + y * y).sqrt();
    let longitude = wrap_longitude(y.atan2(x) - gmst(at));

    // fixed-point iteration on latitude, converges well inside 20 rounds
    let mut latitude = z.atan2(r);
    let mut c = 1.0;
    for _ in 0..20 {
        let sin_lat = latitude.sin();
        c = 1.0 / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        latitude = (z + a_km * c * WGS84_E2 * sin_lat).atan2(r);
    }

    let height_km = if latitude.cos().abs() > 1e-9 {
        r / latitude.cos() - a_km * c
    } else {
        // pole: r vanishes
        z.abs() - a_km * (1.0 - WGS84_E2).sqrt()
    };

    GeodeticPosition {
        latitude_deg: latitude.to_degrees(),
        longitude_deg: longitude.to_degrees(),
        height_m: height_km * 1000.0,
    }
}

/// WGS84 geodetic to Earth-fixed Cartesian, meters.
pub fn geodetic_to_ecef(pos: &GeodeticPosition) -> Cartesian {
    let lat = pos.latitude_deg.to_radians();
    let lon = pos.longitude_deg.to_radians();
    let h = pos.height_m;

    // Radius of curvature in prime vertical
    let n = WGS84_A_M / (1.0 - WGS84_E2 * lat.sin().powi(2)).sqrt();

    Vector3::new(
        (n + h) * lat.cos() * lon.cos(),
        (n + h) * lat.cos() * lon.sin(),
        (n * (1.0 - WGS84_E2) + h) * lat.sin(),
    )
}

fn wrap_longitude(rad: f64) -> f64 {
    (rad + PI).rem_euclid(TAU) - PI
}
