use crate::generator::profile::SyntheticSource;
use crate::workflow::config::{ClockMode, WorkflowConfig};
use anyhow::Context;
use log::{info, warn};
use posturecore::alerts::{LocalBus, LogAlertSink, NotificationGate, Unavailable};
use posturecore::calibration::{CalibrationStatus, CalibrationStore, FileStore, MemoryStore};
use posturecore::clock::{ManualClock, SystemClock};
use posturecore::prelude::{BroadcastTransport, Clock, KeyValueStore, Millis};
use posturecore::scheduler::SchedulerControl;
use posturecore::telemetry::{MetricsRecorder, MetricsSnapshot};
use posturecore::{FrameReport, FrameScheduler, PosturePipeline};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::LocalSet;

/// Simulated runs still tick the scheduler, just without waiting between frames.
const SIMULATED_TICK: Duration = Duration::from_millis(1);

/// Receives every processed frame: instance index, report, current FPS.
pub type FrameObserver = Arc<dyn Fn(usize, &FrameReport, f64) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport {
    pub instance: usize,
    pub frames: usize,
    pub fps: f64,
    pub calibrated_on_start: bool,
    pub calibration: CalibrationStatus,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub instances: Vec<InstanceReport>,
}

impl WorkflowResult {
    pub fn alerts_emitted(&self) -> usize {
        self.instances.iter().map(|i| i.metrics.alerts_emitted).sum()
    }

    pub fn frames(&self) -> usize {
        self.instances.iter().map(|i| i.frames).sum()
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    memory: MemoryStore,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            memory: MemoryStore::new(),
        }
    }

    fn storage(&self) -> anyhow::Result<Box<dyn KeyValueStore>> {
        match &self.config.calibration_dir {
            Some(dir) => {
                let store = FileStore::open(dir)
                    .with_context(|| format!("opening calibration directory {}", dir.display()))?;
                Ok(Box::new(store))
            }
            None => Ok(Box::new(self.memory.clone())),
        }
    }

    fn transport(&self) -> Arc<dyn BroadcastTransport> {
        if self.config.shared_cooldown {
            LocalBus::new()
        } else {
            Arc::new(Unavailable)
        }
    }

    pub fn calibration_store(&self) -> anyhow::Result<CalibrationStore> {
        Ok(CalibrationStore::new(self.storage()?))
    }

    pub fn reset_calibration(&self) -> anyhow::Result<()> {
        self.calibration_store()?.clear();
        Ok(())
    }

    pub fn build_pipeline(
        &self,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn BroadcastTransport>,
    ) -> anyhow::Result<PosturePipeline> {
        let metrics = MetricsRecorder::new();
        let gate = NotificationGate::new(
            Box::new(LogAlertSink::new()),
            transport,
            &self.config.topic,
            &self.config.settings,
            self.config.alert_style.clone(),
            metrics.clone(),
        );
        Ok(PosturePipeline::new(
            self.config.settings,
            self.calibration_store()?,
            gate,
            clock,
            metrics,
        ))
    }

    fn build_scheduler(
        &self,
        instance: usize,
        origin: Millis,
        transport: Arc<dyn BroadcastTransport>,
        observer: Option<FrameObserver>,
    ) -> anyhow::Result<FrameScheduler<SyntheticSource>> {
        let mut generator = self.config.generator.clone();
        generator.seed = generator.seed.wrapping_add(instance as u64);
        let interval_ms = self.config.frame_interval_ms.max(1);

        let (source, clock, period) = match self.config.clock {
            ClockMode::Simulated => {
                let manual = ManualClock::starting_at(origin);
                let source = SyntheticSource::new(generator)
                    .with_simulated_clock(manual.clone(), interval_ms);
                let clock: Arc<dyn Clock> = Arc::new(manual);
                (source, clock, SIMULATED_TICK)
            }
            ClockMode::Realtime => {
                let clock: Arc<dyn Clock> = Arc::new(SystemClock);
                let period = Duration::from_millis(interval_ms);
                (SyntheticSource::new(generator), clock, period)
            }
        };

        let pipeline = self
            .build_pipeline(clock, transport)
            .with_context(|| format!("building pipeline for instance {}", instance))?;
        let mut scheduler = FrameScheduler::new(source, pipeline, period);
        if let Some(frames) = self.config.frames {
            scheduler = scheduler.with_frame_limit(frames);
        }
        if let Some(observer) = observer {
            scheduler = scheduler.with_observer(move |report, fps| observer(instance, report, fps));
        }
        Ok(scheduler)
    }

    /// Runs every configured instance to completion, or until `shutdown`
    /// resolves.
    pub async fn execute<F>(
        &self,
        observer: Option<FrameObserver>,
        shutdown: F,
    ) -> anyhow::Result<WorkflowResult>
    where
        F: Future<Output = ()> + 'static,
    {
        let transport = self.transport();
        // Simulated siblings share one origin so their timestamps line up.
        let origin = SystemClock.now_ms();
        let mut schedulers = Vec::new();
        for instance in 0..self.config.instances.max(1) {
            schedulers.push(self.build_scheduler(
                instance,
                origin,
                transport.clone(),
                observer.clone(),
            )?);
        }
        let controls: Vec<SchedulerControl> = schedulers.iter().map(|s| s.control()).collect();

        let local = LocalSet::new();
        let auto_calibrate = self.config.auto_calibrate;
        let attempts = self.config.calibration_attempts;
        let instances = local
            .run_until(async move {
                let watcher = tokio::task::spawn_local(async move {
                    shutdown.await;
                    info!("shutdown requested, stopping {} instance(s)", controls.len());
                    for control in &controls {
                        control.stop();
                    }
                });

                let handles: Vec<_> = schedulers
                    .into_iter()
                    .enumerate()
                    .map(|(instance, scheduler)| {
                        tokio::task::spawn_local(run_instance(
                            instance,
                            scheduler,
                            auto_calibrate,
                            attempts,
                        ))
                    })
                    .collect();

                let mut reports = Vec::with_capacity(handles.len());
                for handle in handles {
                    reports.push(handle.await.context("monitor instance panicked")?);
                }
                watcher.abort();
                Ok::<_, anyhow::Error>(reports)
            })
            .await?;

        Ok(WorkflowResult { instances })
    }
}

async fn run_instance(
    instance: usize,
    mut scheduler: FrameScheduler<SyntheticSource>,
    auto_calibrate: bool,
    attempts: usize,
) -> InstanceReport {
    let mut calibrated_on_start = false;
    if auto_calibrate && scheduler.pipeline_mut().calibration_needed() {
        for attempt in 1..=attempts {
            match scheduler.capture_calibration().await {
                Ok(profile) => {
                    info!(
                        "instance {} calibrated (shoulder {:.1}px, slouch {:.1}/{:.1} deg)",
                        instance,
                        profile.reference_shoulder_alignment,
                        profile.reference_left_slouch_angle,
                        profile.reference_right_slouch_angle
                    );
                    calibrated_on_start = true;
                    break;
                }
                Err(err) => warn!(
                    "instance {} calibration attempt {}/{} failed: {}",
                    instance, attempt, attempts, err
                ),
            }
        }
    }

    let summary = scheduler.run().await;
    InstanceReport {
        instance,
        frames: summary.frames,
        fps: summary.fps,
        calibrated_on_start,
        calibration: scheduler.pipeline_mut().calibration_status(),
        metrics: summary.metrics,
    }
}
