//! Shared refresh state and the read-only snapshots built from it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ground_stations::{
    is_visible, visibility_radius, AltitudeSource, GroundStation, VisibilityWindow,
};
use orbital_mechanics::{GeodeticPosition, OrbitSample, Sgp4Propagator, TleRecord, TrajectoryArc};
use serde::Serialize;

/// A TLE that parsed and initialised SGP4, with the time it arrived.
#[derive(Debug)]
pub struct LoadedTle {
    pub record: TleRecord,
    pub propagator: Sgp4Propagator,
    pub fetched_at: DateTime<Utc>,
}

/// Latest values of both cycles.
///
/// The TLE cycle only writes `tle`; the propagation cycle only writes the
/// derived slots and reads `tle`. Slots are replaced, never edited.
#[derive(Debug, Default)]
pub struct RefreshState {
    pub tle: Option<Arc<LoadedTle>>,
    pub trajectory: Option<Arc<TrajectoryArc>>,
    pub window: Option<VisibilityWindow>,
    pub last_propagated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TleInfo {
    pub name: String,
    pub line1: String,
    pub line2: String,
    pub revolution_number: u32,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationInfo {
    pub name: String,
    pub location: GeodeticPosition,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassInfo {
    #[serde(flatten)]
    pub window: VisibilityWindow,
    pub seconds_until_enter: Option<i64>,
    pub duration_seconds: Option<i64>,
    /// `now` falls between enter and exit.
    pub in_progress: bool,
}

/// Owned copy of everything the renderer needs. Fields are `None` until
/// the first TLE has loaded and been propagated.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingSnapshot {
    pub object_id: String,
    pub generated_at: DateTime<Utc>,
    pub station: StationInfo,
    pub tle: Option<TleInfo>,
    pub last_propagated_at: Option<DateTime<Utc>>,
    pub current: Option<OrbitSample>,
    pub visibility_radius_m: f64,
    /// Straight-line distance from the station to the current position.
    pub range_m: Option<f64>,
    pub in_range: Option<bool>,
    pub pass: Option<PassInfo>,
    pub trajectory: Option<TrajectoryArc>,
}

impl RefreshState {
    pub fn snapshot(
        &self,
        object_id: &str,
        station: &GroundStation,
        altitude: AltitudeSource,
        nominal_altitude_m: f64,
        now: DateTime<Utc>,
    ) -> TrackingSnapshot {
        let current = self
            .trajectory
            .as_ref()
            .and_then(|arc| arc.current().copied());

        let visibility_radius_m = match (altitude, current.as_ref()) {
            (AltitudeSource::Live, Some(sample)) => visibility_radius(sample.geodetic.height_m),
            _ => visibility_radius(nominal_altitude_m),
        };

        let range_m = current
            .as_ref()
            .map(|sample| station.distance_to(&sample.frame_position));

        let in_range = current.as_ref().map(|sample| {
            is_visible(
                station.frame_position(),
                &sample.frame_position,
                visibility_radius_m,
            )
        });

        TrackingSnapshot {
            object_id: object_id.to_string(),
            generated_at: now,
            station: StationInfo {
                name: station.name().to_string(),
                location: *station.location(),
            },
            tle: self.tle.as_ref().map(|tle| TleInfo {
                name: tle.record.name().to_string(),
                line1: tle.record.line1().to_string(),
                line2: tle.record.line2().to_string(),
                revolution_number: tle.record.epoch_revolution_number(),
                fetched_at: tle.fetched_at,
            }),
            last_propagated_at: self.last_propagated_at,
            current,
            visibility_radius_m,
            range_m,
            in_range,
            pass: self.window.map(|window| PassInfo {
                window,
                seconds_until_enter: window.time_until_enter(now).map(|d| d.num_seconds()),
                duration_seconds: window.duration().map(|d| d.num_seconds()),
                in_progress: window.contains(now),
            }),
            trajectory: self.trajectory.as_deref().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn station() -> GroundStation {
        GroundStation::new("CIT", GeodeticPosition::new(35.6887391, 140.0219295, 100.0)).unwrap()
    }

    fn sample(at: DateTime<Utc>, lat: f64, lon: f64) -> OrbitSample {
        let geodetic = GeodeticPosition::new(lat, lon, 400_000.0);
        OrbitSample {
            timestamp: at,
            geodetic,
            frame_position: geodetic.to_ground_frame(),
        }
    }

    #[test]
    fn test_empty_state_snapshot_is_absent() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let snapshot = RefreshState::default().snapshot(
            "59508",
            &station(),
            AltitudeSource::Live,
            400_000.0,
            now,
        );

        assert!(snapshot.tle.is_none());
        assert!(snapshot.current.is_none());
        assert!(snapshot.in_range.is_none());
        assert!(snapshot.range_m.is_none());
        assert!(snapshot.pass.is_none());
        assert!(snapshot.trajectory.is_none());
        assert_eq!(snapshot.visibility_radius_m, visibility_radius(400_000.0));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["trajectory"].is_null());
        assert_eq!(json["station"]["name"], "CIT");
    }

    #[test]
    fn test_current_position_range_check() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let overhead = TrajectoryArc {
            past: vec![],
            future: vec![sample(now, 35.6887391, 140.0219295)],
        };
        let antipode = TrajectoryArc {
            past: vec![],
            future: vec![sample(now, -35.6887391, -39.9780705)],
        };

        let mut state = RefreshState {
            trajectory: Some(Arc::new(overhead)),
            window: Some(VisibilityWindow {
                enter: Some(now + Duration::minutes(3)),
                exit: Some(now + Duration::minutes(9)),
            }),
            ..Default::default()
        };
        let snapshot = state.snapshot("59508", &station(), AltitudeSource::Live, 400_000.0, now);
        assert_eq!(snapshot.in_range, Some(true));
        // 400 km overhead of a station 100 m up
        assert!((snapshot.range_m.unwrap() - 399_900.0).abs() < 1.0);
        let pass = snapshot.pass.unwrap();
        assert_eq!(pass.seconds_until_enter, Some(180));
        assert_eq!(pass.duration_seconds, Some(360));
        assert!(!pass.in_progress);

        state.trajectory = Some(Arc::new(antipode));
        let snapshot = state.snapshot("59508", &station(), AltitudeSource::Live, 400_000.0, now);
        assert_eq!(snapshot.in_range, Some(false));
        assert!(snapshot.range_m.unwrap() > 12_000_000.0);

        let later = now + Duration::minutes(5);
        let snapshot = state.snapshot("59508", &station(), AltitudeSource::Live, 400_000.0, later);
        let pass = snapshot.pass.unwrap();
        assert!(pass.in_progress);
        assert_eq!(pass.seconds_until_enter, Some(0));
    }
}
