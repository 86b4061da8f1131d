//! Startup configuration
//!
//! Every option is a CLI flag with a `TRACKER_*` environment fallback.
//! Invalid geometry or spans are fatal: there is no safe default to fall
//! back to once the operator has asked for something else.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use ground_stations::{AltitudeSource, GroundStation, StationError};
use orbital_mechanics::{GeodeticPosition, SamplingWindow};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid ground station: {0}")]
    Station(#[from] StationError),
    #[error("Invalid object identifier {0:?}: expected a non-empty alphanumeric catalog number")]
    ObjectId(String),
    #[error("Invalid sampling window: {0}")]
    Sampling(String),
    #[error("Invalid refresh interval: {0}")]
    Interval(String),
    #[error("Invalid altitude: {0}")]
    Altitude(String),
    #[error("Invalid pass gap: {0}")]
    PassGap(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AltitudeMode {
    /// Radius from each sample's own height
    Live,
    /// Radius from the nominal altitude only
    Nominal,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pass-tracker",
    about = "Track one orbiting object and predict its next pass over a ground station"
)]
pub struct Args {
    /// Catalog number of the tracked object
    #[arg(long, env = "TRACKER_NORAD_ID", default_value = "59508")]
    pub norad_id: String,

    /// Ground station label
    #[arg(long, env = "TRACKER_STATION_NAME", default_value = "CIT Ground Station")]
    pub station_name: String,

    /// Ground station latitude in degrees
    #[arg(
        long,
        env = "TRACKER_STATION_LAT",
        default_value_t = 35.6887391,
        allow_hyphen_values = true
    )]
    pub station_lat: f64,

    /// Ground station longitude in degrees
    #[arg(
        long,
        env = "TRACKER_STATION_LON",
        default_value_t = 140.0219295,
        allow_hyphen_values = true
    )]
    pub station_lon: f64,

    /// Ground station height above the ellipsoid in meters
    #[arg(
        long,
        env = "TRACKER_STATION_HEIGHT_M",
        default_value_t = 100.0,
        allow_hyphen_values = true
    )]
    pub station_height_m: f64,

    /// Minutes of trajectory kept behind now
    #[arg(long, env = "TRACKER_PAST_SPAN_MIN", default_value_t = 90.0, allow_hyphen_values = true)]
    pub past_span_min: f64,

    /// Minutes of trajectory predicted ahead of now
    #[arg(
        long,
        env = "TRACKER_FUTURE_SPAN_MIN",
        default_value_t = 180.0,
        allow_hyphen_values = true
    )]
    pub future_span_min: f64,

    /// Sampling step in minutes
    #[arg(long, env = "TRACKER_STEP_MIN", default_value_t = 0.1, allow_hyphen_values = true)]
    pub step_min: f64,

    /// Minutes between TLE refetches
    #[arg(long, env = "TRACKER_TLE_REFRESH_MIN", default_value_t = 180)]
    pub tle_refresh_min: u64,

    /// Milliseconds between trajectory recomputes
    #[arg(long, env = "TRACKER_PROPAGATION_REFRESH_MS", default_value_t = 1000)]
    pub propagation_refresh_ms: u64,

    /// Altitude in km used when no live height is available
    #[arg(
        long,
        env = "TRACKER_NOMINAL_ALTITUDE_KM",
        default_value_t = 400.0,
        allow_hyphen_values = true
    )]
    pub nominal_altitude_km: f64,

    /// Altitude feeding the visibility radius during pass detection
    #[arg(long, env = "TRACKER_ALTITUDE_SOURCE", value_enum, default_value_t = AltitudeMode::Live)]
    pub altitude_source: AltitudeMode,

    /// Out-of-view minutes still treated as the same pass
    #[arg(long, env = "TRACKER_PASS_GAP_MIN", default_value_t = 10.0, allow_hyphen_values = true)]
    pub pass_gap_min: f64,

    /// TLE source base URL
    #[arg(
        long,
        env = "TRACKER_TLE_URL",
        default_value = "https://celestrak.org/NORAD/elements/gp.php"
    )]
    pub tle_url: String,

    /// Snapshot API port
    #[arg(long, env = "TRACKER_PORT", default_value_t = 18601)]
    pub port: u16,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub object_id: String,
    pub station_name: String,
    pub station: GeodeticPosition,
    pub sampling: SamplingWindow,
    pub tle_refresh: Duration,
    pub propagation_refresh: Duration,
    pub nominal_altitude_m: f64,
    pub altitude_source: AltitudeSource,
    pub pass_gap: chrono::Duration,
    pub tle_url: String,
    pub port: u16,
}

impl TrackerConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let object_id = args.norad_id.trim().to_string();
        if object_id.is_empty() || !object_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::ObjectId(args.norad_id));
        }

        let sampling = SamplingWindow {
            past_span_min: args.past_span_min,
            future_span_min: args.future_span_min,
            step_min: args.step_min,
        };
        validate_sampling(&sampling)?;

        if args.tle_refresh_min == 0 {
            return Err(ConfigError::Interval("TLE refresh must be at least one minute".into()));
        }
        if args.propagation_refresh_ms == 0 {
            return Err(ConfigError::Interval(
                "propagation refresh must be at least one millisecond".into(),
            ));
        }

        if !args.nominal_altitude_km.is_finite() || args.nominal_altitude_km < 0.0 {
            return Err(ConfigError::Altitude(format!(
                "nominal altitude {} km must be a non-negative number",
                args.nominal_altitude_km
            )));
        }
        let nominal_altitude_m = args.nominal_altitude_km * 1000.0;

        if !args.pass_gap_min.is_finite() || args.pass_gap_min < 0.0 {
            return Err(ConfigError::PassGap(format!(
                "{} min must be a non-negative number",
                args.pass_gap_min
            )));
        }

        let config = Self {
            object_id,
            station_name: args.station_name,
            station: GeodeticPosition::new(
                args.station_lat,
                args.station_lon,
                args.station_height_m,
            ),
            sampling,
            tle_refresh: Duration::from_secs(args.tle_refresh_min * 60),
            propagation_refresh: Duration::from_millis(args.propagation_refresh_ms),
            nominal_altitude_m,
            altitude_source: match args.altitude_source {
                AltitudeMode::Live => AltitudeSource::Live,
                AltitudeMode::Nominal => AltitudeSource::Nominal(nominal_altitude_m),
            },
            pass_gap: chrono::Duration::milliseconds(
                (args.pass_gap_min * 60_000.0).round() as i64,
            ),
            tle_url: args.tle_url,
            port: args.port,
        };

        // Fail now rather than on first use
        config.ground_station()?;

        Ok(config)
    }

    pub fn ground_station(&self) -> Result<GroundStation, ConfigError> {
        Ok(GroundStation::new(self.station_name.clone(), self.station)?)
    }
}

/// Longest span on either side of now, in minutes (one week).
pub const MAX_SPAN_MIN: f64 = 7.0 * 24.0 * 60.0;

/// Upper bound on instants sampled per propagation pass.
pub const MAX_SAMPLES_PER_PASS: usize = 1_000_000;

fn validate_sampling(window: &SamplingWindow) -> Result<(), ConfigError> {
    let spans = [
        ("past span", window.past_span_min),
        ("future span", window.future_span_min),
    ];
    for (label, value) in spans {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Sampling(format!(
                "{label} {value} min must be a non-negative number"
            )));
        }
        if value > MAX_SPAN_MIN {
            return Err(ConfigError::Sampling(format!(
                "{label} {value} min exceeds the {MAX_SPAN_MIN} min limit"
            )));
        }
    }

    if !window.step_min.is_finite() || window.step_min <= 0.0 {
        return Err(ConfigError::Sampling(format!(
            "step {} min must be positive",
            window.step_min
        )));
    }
    // below one millisecond the grid collapses onto repeated instants
    if window.step_min * 60_000.0 < 1.0 {
        return Err(ConfigError::Sampling(format!(
            "step {} min is below one millisecond",
            window.step_min
        )));
    }

    let combined = window.past_span_min + window.future_span_min;
    if combined > 0.0 && window.step_min > combined {
        return Err(ConfigError::Sampling(format!(
            "step {} min exceeds the combined span of {} min",
            window.step_min, combined
        )));
    }

    let samples = window.total_steps();
    if samples > MAX_SAMPLES_PER_PASS {
        return Err(ConfigError::Sampling(format!(
            "{samples} samples per pass exceeds the limit of {MAX_SAMPLES_PER_PASS}"
        )));
    }

    Ok(())
}
