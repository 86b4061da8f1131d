//! Visibility window detection
//!
//! Scans the future part of a sampled arc for the first pass over the
//! ground station. In-radius samples separated by no more than the gap
//! tolerance belong to the same pass; the first in-radius sample after a
//! longer gap ends the scan.

use chrono::{DateTime, Duration, Utc};
use orbital_mechanics::OrbitSample;
use serde::Serialize;

use crate::visibility::{is_visible, AltitudeSource};
use crate::GroundStation;

/// Gap tolerance, in minutes, observed for low Earth orbit passes.
pub const DEFAULT_PASS_GAP_MIN: i64 = 10;

/// The next pass, or `None` bounds when no sampled instant is in view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VisibilityWindow {
    pub enter: Option<DateTime<Utc>>,
    pub exit: Option<DateTime<Utc>>,
}

impl VisibilityWindow {
    pub fn is_empty(&self) -> bool {
        self.enter.is_none()
    }

    /// Time left until the pass begins; zero once it has started.
    pub fn time_until_enter(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.enter.map(|enter| (enter - now).max(Duration::zero()))
    }

    pub fn duration(&self) -> Option<Duration> {
        Some(self.exit? - self.enter?)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        match (self.enter, self.exit) {
            (Some(enter), Some(exit)) => enter <= at && at <= exit,
            _ => false,
        }
    }
}

/// Find the first pass in `future`, which must be ordered by time.
pub fn detect_window(
    station: &GroundStation,
    future: &[OrbitSample],
    altitude: AltitudeSource,
    max_gap: Duration,
) -> VisibilityWindow {
    let mut window = VisibilityWindow::default();

    for sample in future {
        let radius = altitude.radius_for(sample);
        if !is_visible(station.frame_position(), &sample.frame_position, radius) {
            continue;
        }

        if window.enter.is_none() {
            window.enter = Some(sample.timestamp);
        }
        if let Some(exit) = window.exit {
            if sample.timestamp - exit > max_gap {
                break;
            }
        }
        window.exit = Some(sample.timestamp);
    }

    window
}
