use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::prelude::{BroadcastTransport, Millis, Subscription, TransportError, TransportResult};

pub const DEFAULT_TOPIC: &str = "posture-notifications";
const DEFAULT_CAPACITY: usize = 64;

/// Message exchanged between sibling instances to share cooldown state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CooldownMessage {
    #[serde(rename_all = "camelCase")]
    NotificationSent {
        instance_id: String,
        timestamp: Millis,
    },
}

/// In-process bus with one broadcast channel per topic.
#[derive(Debug)]
pub struct LocalBus {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
}

impl LocalBus {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        })
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl BroadcastTransport for LocalBus {
    fn publish(&self, topic: &str, payload: String) -> TransportResult<()> {
        // No subscribers is not a failure; there is simply nobody to tell.
        let _ = self.sender(topic).send(payload);
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> TransportResult<Box<dyn Subscription>> {
        Ok(Box::new(BusSubscription {
            receiver: self.sender(topic).subscribe(),
        }))
    }
}

struct BusSubscription {
    receiver: broadcast::Receiver<String>,
}

impl Subscription for BusSubscription {
    fn try_next(&mut self) -> Option<String> {
        loop {
            match self.receiver.try_recv() {
                Ok(payload) => return Some(payload),
                // Overwritten messages are lost; keep reading what is left.
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Transport for environments without a cross-instance channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unavailable;

impl BroadcastTransport for Unavailable {
    fn publish(&self, _topic: &str, _payload: String) -> TransportResult<()> {
        Err(TransportError::Unavailable)
    }

    fn subscribe(&self, _topic: &str) -> TransportResult<Box<dyn Subscription>> {
        Err(TransportError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_wire_format_is_camel_case_with_type_tag() {
        let msg = CooldownMessage::NotificationSent {
            instance_id: "abc".into(),
            timestamp: 1234,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "notification_sent");
        assert_eq!(json["instanceId"], "abc");
        assert_eq!(json["timestamp"], 1234);
    }

    #[test]
    fn subscribers_receive_only_their_topic() {
        let bus = LocalBus::new();
        let mut alerts = bus.subscribe("alerts").unwrap();
        let mut other = bus.subscribe("other").unwrap();

        bus.publish("alerts", "one".into()).unwrap();
        bus.publish("alerts", "two".into()).unwrap();

        assert_eq!(alerts.try_next().as_deref(), Some("one"));
        assert_eq!(alerts.try_next().as_deref(), Some("two"));
        assert!(alerts.try_next().is_none());
        assert!(other.try_next().is_none());
    }

    #[test]
    fn lagging_subscriber_keeps_latest_messages() {
        let bus = LocalBus::with_capacity(2);
        let mut sub = bus.subscribe("t").unwrap();
        for i in 0..5 {
            bus.publish("t", i.to_string()).unwrap();
        }
        assert_eq!(sub.try_next().as_deref(), Some("3"));
        assert_eq!(sub.try_next().as_deref(), Some("4"));
    }

    #[test]
    fn publishing_without_subscribers_succeeds() {
        let bus = LocalBus::new();
        assert!(bus.publish("nobody", "x".into()).is_ok());
        assert_eq!(
            Unavailable.publish("t", "x".into()),
            Err(TransportError::Unavailable)
        );
        assert!(Unavailable.subscribe("t").is_err());
    }
}
