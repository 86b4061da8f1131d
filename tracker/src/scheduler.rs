//! Refresh scheduler
//!
//! Two independent periodic cycles share one [`RefreshState`]:
//!
//! | Cycle | Period | Writes |
//! |-------|--------|--------|
//! | TLE | `tle_refresh` (180 min) | `tle` |
//! | Propagation | `propagation_refresh` (1 s) | `trajectory`, `window` |
//!
//! Failures inside a cycle are logged and contained; previously published
//! state is left untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ground_stations::{detect_window, GroundStation, VisibilityWindow};
use orbital_mechanics::{trajectory, OrbitalError, Sgp4Propagator, TleRecord, TrajectoryArc};
use thiserror::Error;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::config::TrackerConfig;
use crate::state::{LoadedTle, RefreshState, TrackingSnapshot};
use crate::tle_source::{FetchError, TleSource};

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Validation(#[from] OrbitalError),
}

impl RefreshError {
    /// The source answered, but with text that is not a usable TLE.
    pub fn is_validation(&self) -> bool {
        matches!(self, RefreshError::Validation(e) if e.is_validation())
    }
}

/// Result of one propagation pass, before it is published.
#[derive(Debug, Clone)]
pub struct PassPrediction {
    pub arc: TrajectoryArc,
    pub window: VisibilityWindow,
}

/// Sample the arc around `now` and find the next pass over `station`.
pub fn predict(
    tle: &LoadedTle,
    station: &GroundStation,
    config: &TrackerConfig,
    now: DateTime<Utc>,
) -> PassPrediction {
    let arc = trajectory::sample(&tle.propagator, now, &config.sampling);
    let window = detect_window(station, &arc.future, config.altitude_source, config.pass_gap);
    PassPrediction { arc, window }
}

/// Owner of the shared state; cheap to clone into tasks and handlers.
#[derive(Clone)]
pub struct Tracker {
    config: Arc<TrackerConfig>,
    station: Arc<GroundStation>,
    state: Arc<RwLock<RefreshState>>,
    tle_loaded: Arc<Notify>,
}

impl Tracker {
    pub fn new(config: TrackerConfig, station: GroundStation) -> Self {
        Self {
            config: Arc::new(config),
            station: Arc::new(station),
            state: Arc::new(RwLock::new(RefreshState::default())),
            tle_loaded: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Fetch, validate and publish a new TLE.
    ///
    /// On any error the previously loaded TLE stays in place.
    pub async fn refresh_tle<S: TleSource>(&self, source: &S) -> Result<(), RefreshError> {
        let lines = source.fetch(&self.config.object_id).await?;
        let record = TleRecord::parse(&lines)?;
        let propagator = Sgp4Propagator::from_tle(&record)?;

        info!(
            "Loaded TLE for {} (rev {}, epoch {})",
            record.name(),
            record.epoch_revolution_number(),
            propagator.epoch()
        );

        let loaded = LoadedTle {
            record,
            propagator,
            fetched_at: Utc::now(),
        };
        self.state.write().await.tle = Some(Arc::new(loaded));
        self.tle_loaded.notify_one();

        Ok(())
    }

    /// Resample and recompute the pass window for `now`.
    ///
    /// Returns `false` without touching state when no TLE has loaded yet.
    pub async fn recompute(&self, now: DateTime<Utc>) -> bool {
        let Some(tle) = self.state.read().await.tle.clone() else {
            trace!("No TLE loaded, skipping propagation");
            return false;
        };

        let station = self.station.clone();
        let config = self.config.clone();
        let pass_tle = tle.clone();
        let prediction =
            tokio::task::spawn_blocking(move || predict(&pass_tle, &station, &config, now)).await;

        let prediction = match prediction {
            Ok(prediction) => prediction,
            Err(e) => {
                error!("Propagation pass failed: {}", e);
                return false;
            }
        };

        self.publish(&tle, prediction, now).await
    }

    /// Store a prediction made from `tle`.
    ///
    /// Dropped when another TLE has been loaded since the pass started, so
    /// an arc is never shown next to the record it was not computed from.
    async fn publish(
        &self,
        tle: &Arc<LoadedTle>,
        prediction: PassPrediction,
        now: DateTime<Utc>,
    ) -> bool {
        let mut state = self.state.write().await;
        if !state.tle.as_ref().is_some_and(|current| Arc::ptr_eq(current, tle)) {
            debug!("TLE changed during propagation, discarding pass for {}", now);
            return false;
        }

        debug!(
            "Propagated {} samples, window {:?} -> {:?}",
            prediction.arc.len(),
            prediction.window.enter,
            prediction.window.exit
        );

        state.trajectory = Some(Arc::new(prediction.arc));
        state.window = Some(prediction.window);
        state.last_propagated_at = Some(now);

        true
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> TrackingSnapshot {
        self.state.read().await.snapshot(
            &self.config.object_id,
            &self.station,
            self.config.altitude_source,
            self.config.nominal_altitude_m,
            now,
        )
    }

    /// Refetch the TLE immediately, then every `tle_refresh`.
    pub fn spawn_tle_cycle<S>(&self, source: Arc<S>) -> CycleHandle
    where
        S: TleSource + Send + Sync + 'static,
    {
        let tracker = self.clone();
        let period = self.config.tle_refresh;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match tracker.refresh_tle(source.as_ref()).await {
                    Ok(()) => {}
                    Err(e) if e.is_validation() => {
                        warn!("Rejected fetched TLE, keeping previous TLE: {}", e)
                    }
                    Err(e) => warn!("TLE refresh failed, keeping previous TLE: {}", e),
                }
            }
        });

        CycleHandle::new("tle", task)
    }

    /// Recompute every `propagation_refresh`, and as soon as a new TLE lands.
    pub fn spawn_propagation_cycle(&self) -> CycleHandle {
        let tracker = self.clone();
        let period = self.config.propagation_refresh;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                let tle_changed = tokio::select! {
                    _ = interval.tick() => false,
                    _ = tracker.tle_loaded.notified() => true,
                };
                if tle_changed {
                    interval.reset();
                }
                tracker.recompute(Utc::now()).await;
            }
        });

        CycleHandle::new("propagation", task)
    }

    pub fn start<S>(&self, source: Arc<S>) -> Cycles
    where
        S: TleSource + Send + Sync + 'static,
    {
        Cycles {
            tle: self.spawn_tle_cycle(source),
            propagation: self.spawn_propagation_cycle(),
        }
    }
}

/// Cancellation handle for one periodic cycle.
pub struct CycleHandle {
    name: &'static str,
    task: JoinHandle<()>,
}

impl CycleHandle {
    fn new(name: &'static str, task: JoinHandle<()>) -> Self {
        debug!("Started {} cycle", name);
        Self { name, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the cycle and wait until it can no longer touch state.
    pub async fn cancel(self) {
        if self.is_finished() {
            warn!("{} cycle had already stopped", self.name);
        }
        self.task.abort();
        match self.task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!("Cancelled {} cycle", self.name),
            Err(e) => error!("{} cycle ended abnormally: {}", self.name, e),
        }
    }
}

pub struct Cycles {
    pub tle: CycleHandle,
    pub propagation: CycleHandle,
}

impl Cycles {
    pub async fn shutdown(self) {
        self.tle.cancel().await;
        self.propagation.cancel().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use chrono::{Duration, TimeZone};
    use clap::Parser;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::Mutex;

    const ISS: [&str; 3] = [
        "ISS (ZARYA)",
        "1 25544U 98067A   24001.50000000  .00016717  00000-0  30375-3 0  9995",
        "2 25544  51.6416 208.5243 0003437 114.4526 358.1393 15.49815361432878",
    ];

    /// Replays queued responses, then fails.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<String>, FetchError>>>,
    }

    impl ScriptedSource {
        fn push_lines(&self, lines: &[&str]) {
            let lines = lines.iter().map(|l| l.to_string()).collect();
            self.responses.lock().unwrap().push_back(Ok(lines));
        }

        fn push_failure(&self) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(FetchError::Empty("25544".into())));
        }
    }

    impl TleSource for ScriptedSource {
        fn fetch(
            &self,
            object_id: &str,
        ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send {
            let next = self.responses.lock().unwrap().pop_front();
            let object_id = object_id.to_string();
            async move { next.unwrap_or(Err(FetchError::Empty(object_id))) }
        }
    }

    fn tracker(extra: &[&str]) -> Tracker {
        let args = Args::try_parse_from(
            ["pass-tracker", "--norad-id", "25544"]
                .into_iter()
                .chain(extra.iter().copied()),
        )
        .unwrap();
        let config = TrackerConfig::from_args(args).unwrap();
        let station = config.ground_station().unwrap();
        Tracker::new(config, station)
    }

    fn near_epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap()
    }

    fn malformed_iss() -> Vec<String> {
        let mut line2 = ISS[2].to_string();
        line2.replace_range(64..68, "WXYZ");
        vec![ISS[0].to_string(), ISS[1].to_string(), line2]
    }

    #[tokio::test]
    async fn test_no_tle_means_no_output() {
        let tracker = tracker(&[]);

        assert!(!tracker.recompute(near_epoch()).await);

        let snapshot = tracker.snapshot(near_epoch()).await;
        assert!(snapshot.tle.is_none());
        assert!(snapshot.trajectory.is_none());
        assert!(snapshot.pass.is_none());
        assert!(snapshot.last_propagated_at.is_none());
    }

    #[tokio::test]
    async fn test_refresh_then_recompute() {
        let tracker = tracker(&[]);
        let source = ScriptedSource::default();
        source.push_lines(&ISS);

        tracker.refresh_tle(&source).await.unwrap();
        assert!(tracker.recompute(near_epoch()).await);

        let snapshot = tracker.snapshot(near_epoch()).await;
        let tle = snapshot.tle.unwrap();
        assert_eq!(tle.name, "ISS (ZARYA)");
        assert_eq!(tle.revolution_number, 3287);

        let arc = snapshot.trajectory.unwrap();
        assert_eq!(arc.len(), 2701);
        assert_eq!(arc.current().unwrap().timestamp, near_epoch());
        assert_eq!(snapshot.current.unwrap().timestamp, near_epoch());
        assert_eq!(snapshot.last_propagated_at, Some(near_epoch()));

        // a window, when found, lies inside the future span
        let pass = snapshot.pass.unwrap();
        if let (Some(enter), Some(exit)) = (pass.window.enter, pass.window.exit) {
            assert!(near_epoch() <= enter && enter <= exit);
            assert!(exit <= near_epoch() + Duration::minutes(180));
        }
    }

    #[tokio::test]
    async fn test_malformed_tle_keeps_previous() {
        let tracker = tracker(&[]);
        let source = ScriptedSource::default();
        source.push_lines(&ISS);
        let malformed = malformed_iss();
        source
            .responses
            .lock()
            .unwrap()
            .push_back(Ok(malformed));

        tracker.refresh_tle(&source).await.unwrap();
        let err = tracker.refresh_tle(&source).await.unwrap_err();
        assert!(matches!(
            err,
            RefreshError::Validation(OrbitalError::MalformedTle(_))
        ));
        assert!(err.is_validation());

        let snapshot = tracker.snapshot(near_epoch()).await;
        assert_eq!(snapshot.tle.unwrap().revolution_number, 3287);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous() {
        let tracker = tracker(&[]);
        let source = ScriptedSource::default();
        source.push_lines(&ISS);
        source.push_failure();
        source.push_lines(&ISS[..2]);

        tracker.refresh_tle(&source).await.unwrap();
        let before = tracker.snapshot(near_epoch()).await.tle.unwrap().fetched_at;

        let err = tracker.refresh_tle(&source).await.unwrap_err();
        assert!(matches!(err, RefreshError::Fetch(_)));
        assert!(!err.is_validation());
        assert!(matches!(
            tracker.refresh_tle(&source).await.unwrap_err(),
            RefreshError::Validation(OrbitalError::InsufficientLines { found: 2 })
        ));

        let after = tracker.snapshot(near_epoch()).await.tle.unwrap();
        assert_eq!(after.fetched_at, before);
        assert_eq!(after.revolution_number, 3287);
    }

    #[tokio::test]
    async fn test_failed_first_fetch_leaves_state_empty() {
        let tracker = tracker(&[]);
        let source = ScriptedSource::default();
        source.push_failure();

        assert!(tracker.refresh_tle(&source).await.is_err());
        assert!(!tracker.recompute(near_epoch()).await);
        assert!(tracker.snapshot(near_epoch()).await.tle.is_none());
    }

    #[tokio::test]
    async fn test_prediction_from_replaced_tle_is_discarded() {
        let tracker = tracker(&["--past-span-min", "10", "--future-span-min", "30"]);
        let source = ScriptedSource::default();
        source.push_lines(&ISS);
        source.push_lines(&ISS);

        tracker.refresh_tle(&source).await.unwrap();
        let old = tracker.state.read().await.tle.clone().unwrap();
        let prediction = predict(&old, &tracker.station, &tracker.config, near_epoch());

        // a new record lands while the pass is still running
        tracker.refresh_tle(&source).await.unwrap();
        assert!(!tracker.publish(&old, prediction.clone(), near_epoch()).await);
        let snapshot = tracker.snapshot(near_epoch()).await;
        assert!(snapshot.trajectory.is_none());
        assert!(snapshot.last_propagated_at.is_none());

        let new = tracker.state.read().await.tle.clone().unwrap();
        assert!(tracker.publish(&new, prediction, near_epoch()).await);
        assert!(tracker.snapshot(near_epoch()).await.trajectory.is_some());
    }

    #[test]
    fn test_predict_is_pure() {
        let tracker = tracker(&["--past-span-min", "10", "--future-span-min", "30"]);
        let record = TleRecord::parse(ISS).unwrap();
        let loaded = LoadedTle {
            propagator: Sgp4Propagator::from_tle(&record).unwrap(),
            record,
            fetched_at: near_epoch(),
        };

        let a = predict(&loaded, &tracker.station, &tracker.config, near_epoch());
        let b = predict(&loaded, &tracker.station, &tracker.config, near_epoch());

        assert_eq!(a.arc.len(), 401);
        assert_eq!(a.window, b.window);
        assert_eq!(
            a.arc.samples().map(|s| s.timestamp).collect::<Vec<_>>(),
            b.arc.samples().map(|s| s.timestamp).collect::<Vec<_>>()
        );
    }

    async fn wait_for_propagation(tracker: &Tracker) -> DateTime<Utc> {
        for _ in 0..200 {
            if let Some(at) = tracker.snapshot(Utc::now()).await.last_propagated_at {
                return at;
            }
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        }
        panic!("propagation cycle never ran");
    }

    #[tokio::test]
    async fn test_cycles_run_and_cancel() {
        let tracker = tracker(&[
            "--past-span-min",
            "1",
            "--future-span-min",
            "2",
            "--propagation-refresh-ms",
            "20",
        ]);
        let source = Arc::new(ScriptedSource::default());
        source.push_lines(&ISS);

        let cycles = tracker.start(source);
        wait_for_propagation(&tracker).await;
        assert!(!cycles.tle.is_finished());
        assert!(!cycles.propagation.is_finished());

        cycles.shutdown().await;
        let frozen = tracker.snapshot(Utc::now()).await.last_propagated_at;
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(tracker.snapshot(Utc::now()).await.last_propagated_at, frozen);

        // last-known state stays readable after teardown
        assert!(tracker.snapshot(Utc::now()).await.trajectory.is_some());
    }

    #[tokio::test]
    async fn test_cycles_cancel_independently() {
        let tracker = tracker(&["--past-span-min", "1", "--future-span-min", "2"]);
        let source = Arc::new(ScriptedSource::default());
        source.push_lines(&ISS);

        let Cycles { tle, propagation } = tracker.start(source);
        tle.cancel().await;

        // TLE arrived before cancellation or not at all; either way the
        // propagation cycle keeps running on whatever is loaded
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!propagation.is_finished());
        propagation.cancel().await;
    }
}
