use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use posturecore::alerts::{AlertStyle, DEFAULT_TOPIC};
use posturecore::EffectiveSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Each frame advances a manual clock by `frame_interval_ms`; runs as fast as possible.
    Simulated,
    /// Wall-clock timestamps and a real frame cadence.
    Realtime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub frame_interval_ms: u64,
    /// `None` runs until interrupted.
    pub frames: Option<usize>,
    pub clock: ClockMode,
    /// Sibling monitors sharing one broadcast topic and calibration store.
    pub instances: usize,
    pub shared_cooldown: bool,
    pub topic: String,
    /// Persist calibration here; in-memory when unset.
    pub calibration_dir: Option<PathBuf>,
    pub auto_calibrate: bool,
    pub calibration_attempts: usize,
    pub settings: EffectiveSettings,
    pub alert_style: AlertStyle,
    pub generator: GeneratorConfig,
    pub bridge_addr: SocketAddr,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 100,
            frames: Some(1_350),
            clock: ClockMode::Simulated,
            instances: 1,
            shared_cooldown: true,
            topic: DEFAULT_TOPIC.to_string(),
            calibration_dir: None,
            auto_calibrate: true,
            calibration_attempts: 10,
            settings: EffectiveSettings::default(),
            alert_style: AlertStyle::default(),
            generator: GeneratorConfig::default(),
            bridge_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Applies command-line overrides on top of the file or default values.
    pub fn with_overrides(
        mut self,
        frames: Option<usize>,
        calibration_dir: Option<PathBuf>,
        instances: Option<usize>,
        realtime: bool,
    ) -> Self {
        if frames.is_some() {
            self.frames = frames;
        }
        if calibration_dir.is_some() {
            self.calibration_dir = calibration_dir;
        }
        if let Some(instances) = instances {
            self.instances = instances;
        }
        if realtime {
            self.clock = ClockMode::Realtime;
        }
        self
    }
}
