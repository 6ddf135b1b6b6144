//! Posture classification and alerting core for the Rust posture monitor.
//!
//! A frame flows through [`scheduler::FrameScheduler`] into
//! [`pipeline::PosturePipeline`]: the pose is classified with thresholds
//! personalised by [`calibration::CalibrationStore`], the
//! [`alerts::TemporalStatusTracker`] decides whether an alert is due, and the
//! [`alerts::NotificationGate`] applies cooldown shared across instances.

pub mod alerts;
pub mod analysis;
pub mod calibration;
pub mod clock;
pub mod math;
pub mod pipeline;
pub mod pose;
pub mod prelude;
pub mod scheduler;
pub mod settings;
pub mod telemetry;

pub use analysis::{AnalysisResult, PostureMetricEngine};
pub use pipeline::{FrameReport, PosturePipeline};
pub use pose::{JointId, Keypoint, Pose};
pub use prelude::KeypointSource;
pub use scheduler::{FrameScheduler, SchedulerControl};
pub use settings::EffectiveSettings;
