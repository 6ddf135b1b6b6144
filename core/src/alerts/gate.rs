use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::alerts::sink::{AlertStyle, Permission};
use crate::alerts::transport::CooldownMessage;
use crate::prelude::{AlertSink, BroadcastTransport, Millis, Subscription};
use crate::settings::EffectiveSettings;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FireOutcome {
    Disabled,
    /// Permission was requested; the caller has to fire again once granted.
    PermissionPending,
    Suppressed { remaining_ms: Millis },
    Emitted,
    /// The sink refused the alert. The cooldown still advanced.
    EmitFailed,
}

/// Cooldown- and permission-gated alert emitter shared across sibling instances.
pub struct NotificationGate {
    instance_id: String,
    last_fire_at: Option<Millis>,
    cooldown_ms: Millis,
    enabled: bool,
    style: AlertStyle,
    sink: Box<dyn AlertSink>,
    transport: Arc<dyn BroadcastTransport>,
    topic: String,
    subscription: Option<Box<dyn Subscription>>,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl NotificationGate {
    pub fn new(
        sink: Box<dyn AlertSink>,
        transport: Arc<dyn BroadcastTransport>,
        topic: &str,
        settings: &EffectiveSettings,
        style: AlertStyle,
        metrics: MetricsRecorder,
    ) -> Self {
        let logger = LogManager::new("posture::gate");
        let subscription = match transport.subscribe(topic) {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                logger.warn(&format!(
                    "{}; cooldown is enforced for this instance only",
                    err
                ));
                None
            }
        };

        Self {
            instance_id: Uuid::new_v4().to_string(),
            last_fire_at: None,
            cooldown_ms: settings.notification_cooldown_ms,
            enabled: settings.notifications_enabled,
            style,
            sink,
            transport,
            topic: topic.to_string(),
            subscription,
            metrics,
            logger,
        }
    }

    pub fn last_fire_at(&self) -> Option<Millis> {
        self.last_fire_at
    }

    pub fn is_shared(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn apply_settings(&mut self, settings: &EffectiveSettings) {
        self.cooldown_ms = settings.notification_cooldown_ms;
        self.enabled = settings.notifications_enabled;
    }

    pub fn fire(&mut self, message: &str, now: Millis) -> FireOutcome {
        if !self.enabled {
            return FireOutcome::Disabled;
        }

        if self.sink.permission() != Permission::Granted {
            self.logger.debug("alert permission not granted, requesting");
            self.sink.request_permission();
            self.metrics.record_alert_blocked();
            return FireOutcome::PermissionPending;
        }

        if let Some(last) = self.last_fire_at {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.cooldown_ms {
                self.metrics.record_alert_suppressed();
                return FireOutcome::Suppressed {
                    remaining_ms: self.cooldown_ms - elapsed,
                };
            }
        }

        self.last_fire_at = Some(now);
        self.announce(now);

        let alert = self.style.build(message);
        match self.sink.emit(&alert) {
            Ok(()) => {
                self.metrics.record_alert_emitted();
                self.logger.record(&format!("alert emitted: {}", message));
                FireOutcome::Emitted
            }
            Err(err) => {
                self.logger.warn(&format!("alert emission failed: {}", err));
                FireOutcome::EmitFailed
            }
        }
    }

    fn announce(&self, now: Millis) {
        let message = CooldownMessage::NotificationSent {
            instance_id: self.instance_id.clone(),
            timestamp: now,
        };
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(err) => {
                self.logger.warn(&format!("cannot encode broadcast: {}", err));
                return;
            }
        };
        if let Err(err) = self.transport.publish(&self.topic, payload) {
            self.logger.debug(&format!("broadcast skipped: {}", err));
        }
    }

    /// Applies every pending sibling broadcast. Returns how many were applied.
    pub fn poll_broadcasts(&mut self) -> usize {
        let mut pending = Vec::new();
        if let Some(subscription) = self.subscription.as_mut() {
            while let Some(payload) = subscription.try_next() {
                pending.push(payload);
            }
        }

        let mut applied = 0;
        for payload in pending {
            match serde_json::from_str::<CooldownMessage>(&payload) {
                Ok(message) => {
                    if self.receive(&message) {
                        applied += 1;
                    }
                }
                Err(err) => self
                    .logger
                    .debug(&format!("ignoring undecodable broadcast: {}", err)),
            }
        }
        applied
    }

    /// Folds a sibling's fire time into the local cooldown without alerting.
    /// Messages from this instance are ignored.
    pub fn receive(&mut self, message: &CooldownMessage) -> bool {
        let CooldownMessage::NotificationSent {
            instance_id,
            timestamp,
        } = message;
        if *instance_id == self.instance_id {
            return false;
        }
        let latest = self.last_fire_at.map_or(*timestamp, |last| last.max(*timestamp));
        self.last_fire_at = Some(latest);
        true
    }
}
