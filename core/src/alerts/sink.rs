use serde::{Deserialize, Serialize};

use crate::prelude::{AlertError, AlertSink};
use crate::telemetry::log::LogManager;

pub const MIN_AUTO_DISMISS_MS: u64 = 5_000;
pub const MAX_AUTO_DISMISS_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; a request may still be granted.
    Prompt,
}

/// Presentation options shared by every alert an instance emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertStyle {
    pub title: String,
    pub vibration_pattern: Option<Vec<u32>>,
    /// Alerts sharing a tag replace each other instead of stacking.
    pub tag: String,
    pub renotify: bool,
    pub require_interaction: bool,
    pub auto_dismiss_ms: u64,
}

impl Default for AlertStyle {
    fn default() -> Self {
        Self {
            title: "Posture Alert".to_string(),
            vibration_pattern: Some(vec![200, 100, 200]),
            tag: "posture-alert".to_string(),
            renotify: true,
            require_interaction: false,
            auto_dismiss_ms: 10_000,
        }
    }
}

impl AlertStyle {
    pub fn build(&self, body: &str) -> Alert {
        Alert {
            title: self.title.clone(),
            body: body.to_string(),
            vibration_pattern: self.vibration_pattern.clone(),
            tag: self.tag.clone(),
            renotify: self.renotify,
            require_interaction: self.require_interaction,
            auto_dismiss_ms: self
                .auto_dismiss_ms
                .clamp(MIN_AUTO_DISMISS_MS, MAX_AUTO_DISMISS_MS),
        }
    }
}

/// A user-visible alert ready for a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub vibration_pattern: Option<Vec<u32>>,
    pub tag: String,
    pub renotify: bool,
    pub require_interaction: bool,
    pub auto_dismiss_ms: u64,
}

/// Sink that writes alerts to the log. Always permitted.
#[derive(Debug)]
pub struct LogAlertSink {
    logger: LogManager,
}

impl LogAlertSink {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("posture::alert"),
        }
    }
}

impl Default for LogAlertSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink for LogAlertSink {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&mut self) {}

    fn emit(&mut self, alert: &Alert) -> Result<(), AlertError> {
        self.logger.warn(&format!(
            "[{}] {} (tag {}, dismiss in {}s)",
            alert.title,
            alert.body,
            alert.tag,
            alert.auto_dismiss_ms / 1000
        ));
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Shared {
        emitted: Vec<Alert>,
        permission_requests: usize,
        permission: Option<Permission>,
        fail: bool,
    }

    /// Sink that records alerts; clones observe the same state.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        shared: Arc<Mutex<Shared>>,
    }

    impl RecordingSink {
        pub fn granted() -> Self {
            let sink = Self::default();
            sink.set_permission(Permission::Granted);
            sink
        }

        pub fn set_permission(&self, permission: Permission) {
            self.shared.lock().unwrap().permission = Some(permission);
        }

        pub fn fail_emits(&self) {
            self.shared.lock().unwrap().fail = true;
        }

        pub fn emitted(&self) -> Vec<Alert> {
            self.shared.lock().unwrap().emitted.clone()
        }

        pub fn permission_requests(&self) -> usize {
            self.shared.lock().unwrap().permission_requests
        }
    }

    impl AlertSink for RecordingSink {
        fn permission(&self) -> Permission {
            self.shared
                .lock()
                .unwrap()
                .permission
                .unwrap_or(Permission::Prompt)
        }

        fn request_permission(&mut self) {
            self.shared.lock().unwrap().permission_requests += 1;
        }

        fn emit(&mut self, alert: &Alert) -> Result<(), AlertError> {
            let mut shared = self.shared.lock().unwrap();
            if shared.fail {
                return Err(AlertError::Rejected("blocked by test".into()));
            }
            shared.emitted.push(alert.clone());
            Ok(())
        }
    }
}
