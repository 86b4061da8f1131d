//! Trajectory sampling over a sliding window around `now`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::propagation::Propagate;
use crate::transforms::{eci_to_geodetic, Cartesian, GeodeticPosition};

/// Span and resolution of one sampling pass, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingWindow {
    pub past_span_min: f64,
    pub future_span_min: f64,
    pub step_min: f64,
}

impl Default for SamplingWindow {
    fn default() -> Self {
        Self {
            past_span_min: 90.0,
            future_span_min: 180.0,
            step_min: 0.1,
        }
    }
}

impl SamplingWindow {
    /// Step offsets relative to `now`, as whole step counts.
    ///
    /// Counting in steps keeps the grid exact; accumulating a fractional
    /// minute would drift over thousands of samples.
    fn step_range(&self) -> std::ops::RangeInclusive<i64> {
        let past = (self.past_span_min / self.step_min).round() as i64;
        let future = (self.future_span_min / self.step_min).round() as i64;
        past.saturating_neg()..=future
    }

    fn step_ms(&self) -> i64 {
        (self.step_min * 60_000.0).round() as i64
    }

    /// Number of instants a pass visits, failed or not.
    pub fn total_steps(&self) -> usize {
        let range = self.step_range();
        let count = range.end().saturating_sub(*range.start()).saturating_add(1);
        usize::try_from(count.max(0)).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrbitSample {
    pub timestamp: DateTime<Utc>,
    pub geodetic: GeodeticPosition,
    pub frame_position: Cartesian,
}

/// Samples ordered by time, split at the instant they were taken around.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrajectoryArc {
    pub past: Vec<OrbitSample>,
    pub future: Vec<OrbitSample>,
}

impl TrajectoryArc {
    /// The first future sample, shown as the object's live position.
    pub fn current(&self) -> Option<&OrbitSample> {
        self.future.first()
    }

    pub fn len(&self) -> usize {
        self.past.len() + self.future.len()
    }

    pub fn is_empty(&self) -> bool {
        self.past.is_empty() && self.future.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &OrbitSample> {
        self.past.iter().chain(self.future.iter())
    }
}

/// Walk `window` around `now`, propagating and converting each instant.
///
/// Instants the propagator rejects are omitted, never substituted. So are
/// offsets that fall outside the representable time range.
pub fn sample<P: Propagate + ?Sized>(
    propagator: &P,
    now: DateTime<Utc>,
    window: &SamplingWindow,
) -> TrajectoryArc {
    let step_ms = window.step_ms();
    let mut arc = TrajectoryArc::default();
    let mut skipped = 0usize;

    for step in window.step_range() {
        let Some(time) = step
            .checked_mul(step_ms)
            .and_then(Duration::try_milliseconds)
            .and_then(|offset| now.checked_add_signed(offset))
        else {
            trace!("skipping step {}: offset out of range", step);
            skipped += 1;
            continue;
        };

        let eci = match propagator.propagate(time) {
            Ok(eci) => eci,
            Err(e) => {
                trace!("skipping {}: {}", time, e);
                skipped += 1;
                continue;
            }
        };

        let geodetic = eci_to_geodetic(&eci, time);
        let sample = OrbitSample {
            timestamp: time,
            geodetic,
            frame_position: geodetic.to_ground_frame(),
        };

        if step < 0 {
            arc.past.push(sample);
        } else {
            arc.future.push(sample);
        }
    }

    debug!(
        "sampled {} past / {} future instants around {} ({} skipped)",
        arc.past.len(),
        arc.future.len(),
        now,
        skipped
    );

    arc
}
