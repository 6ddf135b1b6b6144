use crate::gui_bridge::model::VisualizationModel;
use crate::workflow::runner::{FrameObserver, InstanceReport};
use anyhow::{Context, Result};
use log::{error, info};
use posturecore::{AnalysisResult, EffectiveSettings, FrameReport, Pose, PostureMetricEngine};
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    thread,
};
use tokio::runtime::Builder;
use warp::{Filter, Rejection, Reply};

#[derive(Debug)]
struct BridgeState {
    latest: VisualizationModel,
    /// Thresholds applied to poses posted from outside the pipeline.
    settings: EffectiveSettings,
}

/// HTTP endpoint for overlay clients: latest frame out, ad-hoc poses in.
#[derive(Clone)]
pub struct GuiBridge {
    state: Arc<RwLock<BridgeState>>,
}

impl GuiBridge {
    pub fn new(settings: EffectiveSettings) -> Self {
        let latest = VisualizationModel {
            settings,
            ..VisualizationModel::default()
        };
        Self {
            state: Arc::new(RwLock::new(BridgeState { latest, settings })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BridgeState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BridgeState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn publish_frame(&self, instance: usize, report: &FrameReport, fps: f64) {
        let mut state = self.write();
        let metrics = state.latest.metrics;
        state.latest = VisualizationModel {
            metrics,
            ..VisualizationModel::from_report(instance, report, fps)
        };
        state.settings = report.settings;
    }

    pub fn publish_analysis(&self, analysis: &AnalysisResult, settings: EffectiveSettings) {
        let mut state = self.write();
        state.latest = VisualizationModel::from_analysis(analysis, settings);
        state.settings = settings;
    }

    pub fn publish_summary(&self, report: &InstanceReport) {
        let mut state = self.write();
        state.latest.metrics = Some(report.metrics);
        state.latest.fps = report.fps;
        info!(
            "[GUI] instance {}: {} frames at {:.1} fps, {} alerts",
            report.instance, report.frames, report.fps, report.metrics.alerts_emitted
        );
    }

    pub fn publish_status(&self, message: &str) {
        info!("[GUI] {}", message);
    }

    /// Observer that mirrors every processed frame into the bridge.
    pub fn observer(&self) -> FrameObserver {
        let bridge = self.clone();
        Arc::new(move |instance: usize, report: &FrameReport, fps: f64| {
            bridge.publish_frame(instance, report, fps)
        })
    }

    pub fn snapshot(&self) -> VisualizationModel {
        self.read().latest.clone()
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let bridge = self.clone();
        let bridge_filter = warp::any().map(move || bridge.clone());

        let status_route = warp::path("status")
            .and(warp::path::end())
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: GuiBridge| warp::reply::json(&bridge.snapshot()));

        let analyze_route = warp::path("analyze")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::json())
            .and(bridge_filter)
            .map(|pose: Pose, bridge: GuiBridge| {
                let settings = bridge.read().settings;
                let result = PostureMetricEngine::analyze(Some(&pose), &settings);
                warp::reply::json(&result)
            });

        status_route.or(analyze_route)
    }

    /// Serves the routes on a dedicated thread until the process exits.
    pub fn serve(&self, addr: SocketAddr) -> Result<thread::JoinHandle<()>> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for the GUI bridge")?;
        let routes = self.routes();
        let handle = thread::Builder::new()
            .name("gui-bridge".into())
            .spawn(move || {
                runtime.block_on(async move {
                    match warp::serve(routes).try_bind_ephemeral(addr) {
                        Ok((bound, server)) => {
                            info!("[GUI] bridge listening on http://{}", bound);
                            server.await;
                        }
                        Err(err) => error!("[GUI] cannot bind {}: {}", addr, err),
                    }
                });
            })
            .context("spawning GUI bridge thread")?;
        Ok(handle)
    }
}
