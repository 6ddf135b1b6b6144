use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::calibration::profile::CalibrationProfile;
use crate::math::stats::ExponentialAverage;
use crate::pipeline::{FrameReport, PosturePipeline};
use crate::pose::REQUIRED_JOINTS;
use crate::prelude::{CalibrationResult, KeypointSource, RejectReason};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsSnapshot;

const FPS_SAMPLE_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    /// The consuming surface is hidden; no frames are pulled.
    Suspended,
    Stopped,
}

/// Cloneable handle that suspends, resumes or stops a running scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerControl {
    state: Arc<watch::Sender<RunState>>,
}

impl Default for SchedulerControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerControl {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RunState::Running);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn suspend(&self) {
        self.transition(RunState::Running, RunState::Suspended);
    }

    pub fn resume(&self) {
        self.transition(RunState::Suspended, RunState::Running);
    }

    /// Idempotent. A stopped control never runs again.
    pub fn stop(&self) {
        self.state.send_if_modified(|state| {
            if *state == RunState::Stopped {
                false
            } else {
                *state = RunState::Stopped;
                true
            }
        });
    }

    fn transition(&self, from: RunState, to: RunState) {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
    }

    fn watch(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SchedulerSummary {
    pub frames: usize,
    pub fps: f64,
    pub metrics: MetricsSnapshot,
}

type FrameObserver = Box<dyn FnMut(&FrameReport, f64) + Send>;

/// Pulls poses at a fixed cadence and feeds them through the pipeline, one
/// frame in flight at a time.
pub struct FrameScheduler<S> {
    source: S,
    pipeline: PosturePipeline,
    control: SchedulerControl,
    period: Duration,
    max_frames: Option<usize>,
    frames: usize,
    fps: ExponentialAverage,
    last_tick: Option<Instant>,
    observer: Option<FrameObserver>,
    logger: LogManager,
}

impl<S: KeypointSource> FrameScheduler<S> {
    pub fn new(source: S, pipeline: PosturePipeline, period: Duration) -> Self {
        Self {
            source,
            pipeline,
            control: SchedulerControl::new(),
            period: period.max(Duration::from_millis(1)),
            max_frames: None,
            frames: 0,
            fps: ExponentialAverage::new(FPS_SAMPLE_WEIGHT),
            last_tick: None,
            observer: None,
            logger: LogManager::new("posture::scheduler"),
        }
    }

    /// Stop after `frames` processed frames.
    pub fn with_frame_limit(mut self, frames: usize) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Called with every processed frame and the current FPS estimate.
    pub fn with_observer(
        mut self,
        observer: impl FnMut(&FrameReport, f64) + Send + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn control(&self) -> SchedulerControl {
        self.control.clone()
    }

    pub fn pipeline(&self) -> &PosturePipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut PosturePipeline {
        &mut self.pipeline
    }

    /// Stops any run and ends the current bad-posture session.
    pub fn stop(&mut self) {
        self.control.stop();
        self.pipeline.reset();
    }

    /// Pulls one pose and stores it as the calibration reference. Runs only
    /// while no frame loop is active.
    pub async fn capture_calibration(&mut self) -> CalibrationResult<CalibrationProfile> {
        match self.source.detect().await? {
            Some(pose) => self.pipeline.calibrate(&pose),
            None => Err(RejectReason::MissingJoints(REQUIRED_JOINTS.to_vec()).into()),
        }
    }

    pub async fn run(&mut self) -> SchedulerSummary {
        let mut state = self.control.watch();
        let mut ticker = self.ticker();
        self.logger.record("scheduler started");

        'run: loop {
            let current = *state.borrow_and_update();
            match current {
                RunState::Stopped => break,
                RunState::Suspended => {
                    self.logger.record("scheduler suspended");
                    self.last_tick = None;
                    if state.changed().await.is_err() {
                        break;
                    }
                    if *state.borrow() == RunState::Running {
                        self.logger.record("scheduler resumed");
                        ticker = self.ticker();
                    }
                    continue;
                }
                RunState::Running => {}
            }

            if self.max_frames.is_some_and(|max| self.frames >= max) {
                break;
            }

            tokio::select! {
                biased;
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }
            self.record_tick();

            let detection = self.source.detect();
            tokio::pin!(detection);
            let detected = loop {
                tokio::select! {
                    biased;
                    changed = state.changed() => {
                        if changed.is_err() || *state.borrow() == RunState::Stopped {
                            break 'run;
                        }
                    }
                    result = &mut detection => break result,
                    _ = ticker.tick() => {
                        self.pipeline.metrics().record_dropped_tick();
                        self.logger.debug("tick dropped, previous frame still in flight");
                    }
                }
            };

            if *state.borrow() == RunState::Stopped {
                break;
            }

            match detected {
                Ok(pose) => {
                    let report = self.pipeline.process(pose.as_ref());
                    self.frames += 1;
                    let fps = self.fps.value();
                    if let Some(observer) = self.observer.as_mut() {
                        observer(&report, fps);
                    }
                }
                Err(err) => self.logger.warn(&format!("frame skipped: {}", err)),
            }
        }

        self.pipeline.reset();
        self.logger
            .record(&format!("scheduler stopped after {} frames", self.frames));
        SchedulerSummary {
            frames: self.frames,
            fps: self.fps.value(),
            metrics: self.pipeline.metrics().snapshot(),
        }
    }

    fn ticker(&self) -> time::Interval {
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    fn record_tick(&mut self) {
        let now = Instant::now();
        if let Some(previous) = self.last_tick {
            let delta_ms = now.duration_since(previous).as_secs_f64() * 1000.0;
            if delta_ms > 0.0 {
                self.fps.update(1000.0 / delta_ms);
            }
        }
        self.last_tick = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::sink::testing::RecordingSink;
    use crate::alerts::tracker::TrackerState;
    use crate::clock::ManualClock;
    use crate::pipeline::testing::{pipeline, slouched, upright};
    use crate::pose::Pose;
    use crate::prelude::{CalibrationError, SourceResult};
    use std::sync::Mutex;

    /// Replays poses, taking `latency` per inference and advancing the
    /// pipeline clock by one frame each call.
    struct ScriptedSource {
        poses: Vec<Option<Pose>>,
        next: usize,
        latency: Duration,
        clock: ManualClock,
        calls: Arc<Mutex<Vec<Instant>>>,
        hang_after: Option<usize>,
    }

    impl ScriptedSource {
        fn new(poses: Vec<Option<Pose>>, clock: &ManualClock) -> Self {
            Self {
                poses,
                next: 0,
                latency: Duration::ZERO,
                clock: clock.clone(),
                calls: Arc::new(Mutex::new(Vec::new())),
                hang_after: None,
            }
        }
    }

    impl KeypointSource for ScriptedSource {
        async fn detect(&mut self) -> SourceResult<Option<Pose>> {
            self.calls.lock().unwrap().push(Instant::now());
            if self.hang_after.is_some_and(|limit| self.next >= limit) {
                std::future::pending::<()>().await;
            }
            if !self.latency.is_zero() {
                time::sleep(self.latency).await;
            }
            self.clock.advance(100);
            let pose = self.poses[self.next % self.poses.len()].clone();
            self.next += 1;
            Ok(pose)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_until_frame_limit_and_tracks_fps() {
        let clock = ManualClock::starting_at(0);
        let sink = RecordingSink::granted();
        let source = ScriptedSource::new(vec![Some(upright())], &clock);
        let mut scheduler = FrameScheduler::new(
            source,
            pipeline(&clock, &sink),
            Duration::from_millis(20),
        )
        .with_frame_limit(50);

        let summary = scheduler.run().await;
        assert_eq!(summary.frames, 50);
        assert_eq!(summary.metrics.good_frames, 50);
        assert_eq!(summary.metrics.ticks_dropped, 0);
        assert!(summary.fps > 40.0 && summary.fps <= 50.0 + 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_inference_drops_ticks_instead_of_queueing() {
        let clock = ManualClock::starting_at(0);
        let sink = RecordingSink::granted();
        let mut source = ScriptedSource::new(vec![Some(upright())], &clock);
        source.latency = Duration::from_millis(100);
        let calls = source.calls.clone();
        let mut scheduler = FrameScheduler::new(
            source,
            pipeline(&clock, &sink),
            Duration::from_millis(30),
        )
        .with_frame_limit(5);

        let summary = scheduler.run().await;
        assert_eq!(summary.frames, 5);
        assert!(summary.metrics.ticks_dropped >= 5);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 5);
        for pair in calls.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_in_flight_frame_and_resets_tracker() {
        let clock = ManualClock::starting_at(0);
        let sink = RecordingSink::granted();
        let mut source = ScriptedSource::new(vec![Some(slouched())], &clock);
        source.hang_after = Some(3);
        let mut scheduler = FrameScheduler::new(
            source,
            pipeline(&clock, &sink),
            Duration::from_millis(10),
        );

        let control = scheduler.control();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            control.stop();
            control.stop();
        });

        let summary = scheduler.run().await;
        assert_eq!(summary.frames, 3);
        assert_eq!(scheduler.pipeline().tracker_state(), TrackerState::Neutral);
        assert_eq!(scheduler.control().state(), RunState::Stopped);

        // A stopped scheduler does not start again.
        let again = scheduler.run().await;
        assert_eq!(again.frames, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn suspended_scheduler_pulls_nothing_until_resumed() {
        let clock = ManualClock::starting_at(0);
        let sink = RecordingSink::granted();
        let source = ScriptedSource::new(vec![Some(upright())], &clock);
        let calls = source.calls.clone();
        let mut scheduler = FrameScheduler::new(
            source,
            pipeline(&clock, &sink),
            Duration::from_millis(10),
        )
        .with_frame_limit(4);

        let control = scheduler.control();
        control.suspend();
        let started = Instant::now();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(2)).await;
            control.resume();
        });

        let summary = scheduler.run().await;
        assert_eq!(summary.frames, 4);
        let calls = calls.lock().unwrap();
        assert!(calls[0].duration_since(started) >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_every_frame() {
        let clock = ManualClock::starting_at(0);
        let sink = RecordingSink::granted();
        let source = ScriptedSource::new(vec![Some(upright()), None], &clock);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let mut scheduler = FrameScheduler::new(
            source,
            pipeline(&clock, &sink),
            Duration::from_millis(10),
        )
        .with_frame_limit(4)
        .with_observer(move |report, _fps| {
            record.lock().unwrap().push(report.analysis.feedback.clone());
        });

        scheduler.run().await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[1], "No person detected");
    }

    #[tokio::test]
    async fn calibration_capture_uses_next_pose() {
        let clock = ManualClock::starting_at(0);
        let sink = RecordingSink::granted();
        let source = ScriptedSource::new(vec![None, Some(upright())], &clock);
        let mut scheduler = FrameScheduler::new(
            source,
            pipeline(&clock, &sink),
            Duration::from_millis(10),
        );

        assert!(matches!(
            scheduler.capture_calibration().await,
            Err(CalibrationError::Rejected(RejectReason::MissingJoints(_)))
        ));
        assert!(scheduler.capture_calibration().await.is_ok());
        assert!(!scheduler.pipeline_mut().calibration_needed());
    }
}
