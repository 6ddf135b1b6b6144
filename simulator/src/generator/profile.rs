use crate::generator::template::{sway, PosturePreset};
use posturecore::clock::ManualClock;
use posturecore::pose::{Keypoint, Pose};
use posturecore::prelude::{KeypointSource, Millis, SourceResult};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One stretch of the scripted scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSegment {
    pub posture: PosturePreset,
    pub frames: usize,
}

/// Configuration for generating a synthetic pose stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    /// Uniform per-coordinate noise in pixels.
    pub jitter_px: f32,
    pub sway_px: f32,
    pub sway_period_frames: usize,
    pub min_confidence: f32,
    pub max_confidence: f32,
    /// Played in order, then repeated.
    pub segments: Vec<ScenarioSegment>,
    pub description: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            jitter_px: 2.0,
            sway_px: 6.0,
            sway_period_frames: 120,
            min_confidence: 0.75,
            max_confidence: 0.98,
            segments: vec![
                ScenarioSegment {
                    posture: PosturePreset::Upright,
                    frames: 50,
                },
                ScenarioSegment {
                    posture: PosturePreset::Slouched,
                    frames: 950,
                },
                ScenarioSegment {
                    posture: PosturePreset::Upright,
                    frames: 100,
                },
                ScenarioSegment {
                    posture: PosturePreset::RaisedLeftShoulder,
                    frames: 200,
                },
                ScenarioSegment {
                    posture: PosturePreset::Away,
                    frames: 50,
                },
            ],
            description: None,
        }
    }
}

impl GeneratorConfig {
    fn scenario_length(&self) -> usize {
        self.segments.iter().map(|segment| segment.frames).sum()
    }

    /// Preset played at `frame`; upright when no segments are configured.
    pub fn preset_at(&self, frame: usize) -> PosturePreset {
        let total = self.scenario_length();
        if total == 0 {
            return PosturePreset::Upright;
        }
        let mut offset = frame % total;
        for segment in &self.segments {
            if offset < segment.frames {
                return segment.posture;
            }
            offset -= segment.frames;
        }
        PosturePreset::Upright
    }
}

fn noise(rng: &mut StdRng, amplitude: f32) -> f32 {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..amplitude)
    } else {
        0.0
    }
}

pub fn build_pose(config: &GeneratorConfig, frame: usize, rng: &mut StdRng) -> Option<Pose> {
    let joints = config.preset_at(frame).joints()?;
    let shift = sway(frame, config.sway_px, config.sway_period_frames);
    let keypoints = joints
        .iter()
        .map(|&(id, x, y)| {
            let confidence = if config.min_confidence < config.max_confidence {
                rng.gen_range(config.min_confidence..config.max_confidence)
            } else {
                config.max_confidence
            };
            Keypoint::new(
                id,
                x + shift + noise(rng, config.jitter_px),
                y + noise(rng, config.jitter_px),
                confidence,
            )
        })
        .collect::<Vec<_>>();
    let score = keypoints.iter().map(|kp| kp.confidence).sum::<f32>() / keypoints.len() as f32;
    Some(Pose::new(keypoints, score))
}

/// Deterministic keypoint source replaying the configured scenario.
pub struct SyntheticSource {
    config: GeneratorConfig,
    rng: StdRng,
    frame: usize,
    /// Advanced by one frame per detection when replaying faster than real time.
    clock: Option<(ManualClock, Millis)>,
}

impl SyntheticSource {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            frame: 0,
            clock: None,
        }
    }

    pub fn with_simulated_clock(mut self, clock: ManualClock, frame_ms: Millis) -> Self {
        self.clock = Some((clock, frame_ms));
        self
    }

    pub fn next_pose(&mut self) -> Option<Pose> {
        if let Some((clock, frame_ms)) = &self.clock {
            clock.advance(*frame_ms);
        }
        let pose = build_pose(&self.config, self.frame, &mut self.rng);
        self.frame += 1;
        pose
    }
}

impl KeypointSource for SyntheticSource {
    async fn detect(&mut self) -> SourceResult<Option<Pose>> {
        Ok(self.next_pose())
    }
}
