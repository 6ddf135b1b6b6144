pub mod engine;
pub mod metrics;

pub use engine::{AnalysisResult, PostureMetricEngine, Side, SlouchSeverity, Verdict};
pub use metrics::PostureMetrics;
