use anyhow::Context;
use clap::Parser;
use generator::profile::build_pose;
use gui_bridge::bridge::GuiBridge;
use log::warn;
use posturecore::clock::SystemClock;
use posturecore::prelude::Clock;
use posturecore::PostureMetricEngine;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Synthetic posture monitor driver")]
struct Args {
    /// Classify a single synthetic frame and exit
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Frames per instance; overrides the workflow file
    #[arg(long)]
    frames: Option<usize>,
    /// Persist calibration in this directory
    #[arg(long)]
    calibration_dir: Option<PathBuf>,
    /// Delete any stored calibration before running
    #[arg(long, default_value_t = false)]
    reset_calibration: bool,
    #[arg(long)]
    instances: Option<usize>,
    /// Use wall-clock time and the configured frame cadence
    #[arg(long, default_value_t = false)]
    realtime: bool,
    /// Append a JSON summary line to this file
    #[arg(long)]
    report: Option<PathBuf>,
    /// Keep the GUI bridge alive for overlay clients
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn append_report<T: Serialize>(path: &Path, summary: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(summary).context("encoding run summary")?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening report {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("writing report {}", path.display()))?;
    Ok(())
}

async fn interrupted() {
    if let Err(err) = signal::ctrl_c().await {
        warn!("cannot listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    }
    .with_overrides(
        args.frames,
        args.calibration_dir,
        args.instances,
        args.realtime,
    );

    let runner = Runner::new(workflow_config.clone());
    let gui_bridge = GuiBridge::new(workflow_config.settings);
    if args.reset_calibration {
        runner.reset_calibration()?;
        gui_bridge.publish_status("Stored calibration cleared.");
    }
    if args.serve {
        gui_bridge.serve(workflow_config.bridge_addr)?;
    }

    if args.offline {
        let mut rng = StdRng::seed_from_u64(workflow_config.generator.seed);
        let pose = build_pose(&workflow_config.generator, 0, &mut rng);
        let settings = runner
            .calibration_store()?
            .derive_settings(&workflow_config.settings, SystemClock.now_ms());
        let analysis = PostureMetricEngine::analyze(pose.as_ref(), &settings);

        println!(
            "Offline frame -> good {}, shoulder {:.1}px, slouch {:.1} deg: {}",
            analysis.is_good_posture,
            analysis.shoulder_alignment,
            analysis.slouch_level,
            analysis.feedback
        );
        gui_bridge.publish_analysis(&analysis, settings);
        if let Some(path) = args.report.as_deref() {
            append_report(path, &analysis)?;
        }
    } else {
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for the monitor")?;
        let result = runtime
            .block_on(runner.execute(Some(gui_bridge.observer()), interrupted()))
            .context("running posture workflow")?;

        for instance in &result.instances {
            println!(
                "Instance {} -> frames {}, fps {:.1}, good {}, bad {}, alerts {} (suppressed {}), calibration {:?}",
                instance.instance,
                instance.frames,
                instance.fps,
                instance.metrics.good_frames,
                instance.metrics.bad_frames,
                instance.metrics.alerts_emitted,
                instance.metrics.alerts_suppressed,
                instance.calibration
            );
            gui_bridge.publish_summary(instance);
        }
        println!(
            "Workflow run -> {} frames across {} instance(s), {} alerts shown",
            result.frames(),
            result.instances.len(),
            result.alerts_emitted()
        );
        if let Some(path) = args.report.as_deref() {
            append_report(path, &result)?;
        }
    }

    if args.serve {
        gui_bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
