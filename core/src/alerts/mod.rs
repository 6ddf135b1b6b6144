pub mod gate;
pub mod sink;
pub mod tracker;
pub mod transport;

pub use gate::{FireOutcome, NotificationGate};
pub use sink::{Alert, AlertStyle, LogAlertSink, Permission};
pub use tracker::{
    AlertTier, BadPostureSession, TemporalStatusTracker, TierAlert, TrackerState, TrackerUpdate,
};
pub use transport::{CooldownMessage, LocalBus, Unavailable, DEFAULT_TOPIC};
