use crate::alerts::sink::{Alert, Permission};
use crate::pose::{JointId, Pose};

/// Why a calibration capture was refused. Checked in declaration order.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RejectReason {
    #[error("missing key body points: {0:?}")]
    MissingJoints(Vec<JointId>),
    #[error("{joint} confidence {confidence:.2} is below {minimum:.2}")]
    LowConfidence {
        joint: JointId,
        confidence: f32,
        minimum: f32,
    },
    #[error("shoulders are not level ({alignment:.1}px apart, at most {limit:.0}px allowed)")]
    ShouldersNotLevel { alignment: f32, limit: f32 },
    #[error("head is tilted ({tilt:.1}px between ears, at most {limit:.0}px allowed)")]
    HeadTilted { tilt: f32, limit: f32 },
    #[error("face the camera directly: nose is not between the ears")]
    NotFacingCamera,
}

/// Failure of the durable key-value store holding calibration records.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("record encoding: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("corrupt record under {key}: {detail}")]
    Corrupt { key: String, detail: String },
}

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("calibration rejected: {0}")]
    Rejected(#[from] RejectReason),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("broadcast transport unavailable")]
    Unavailable,
    #[error("publish on {topic} failed: {detail}")]
    Publish { topic: String, detail: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("alert rejected by platform: {0}")]
    Rejected(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("keypoint inference failed: {0}")]
    Inference(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
pub type CalibrationResult<T> = Result<T, CalibrationError>;
pub type TransportResult<T> = Result<T, TransportError>;
pub type SourceResult<T> = Result<T, SourceError>;

/// Milliseconds since the Unix epoch (or any fixed origin for simulated clocks).
pub type Millis = u64;

/// Supplies zero or one detected pose per frame.
#[allow(async_fn_in_trait)]
pub trait KeypointSource {
    async fn detect(&mut self) -> SourceResult<Option<Pose>>;
}

/// Durable string key-value storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&mut self, key: &str) -> StorageResult<()>;
}

/// Receiving half of a topic subscription. Never blocks.
pub trait Subscription: Send {
    fn try_next(&mut self) -> Option<String>;
}

/// Best-effort, unordered pub/sub between sibling instances.
pub trait BroadcastTransport: Send + Sync {
    fn publish(&self, topic: &str, payload: String) -> TransportResult<()>;
    fn subscribe(&self, topic: &str) -> TransportResult<Box<dyn Subscription>>;
}

/// Platform surface that shows alerts to the user.
pub trait AlertSink: Send {
    fn permission(&self) -> Permission;
    /// Must be idempotent; the answer may only be visible on a later call.
    fn request_permission(&mut self);
    fn emit(&mut self, alert: &Alert) -> Result<(), AlertError>;
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Millis;
}
