//! Coordinator event system.
//!
//! The scan coordinator reports what it is doing through [`ProximityEvent`]s
//! on a broadcast channel. The report cycle's output travels the same way.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use nearby_types::{DeviceView, TransportId};

/// Devices classified Immediate on one report tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityReport {
    /// When the report was produced.
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Immediate devices, possibly none.
    pub immediate: Vec<DeviceView>,
}

impl ProximityReport {
    /// Create a report stamped with the current time.
    pub fn now(immediate: Vec<DeviceView>) -> Self {
        Self {
            generated_at: OffsetDateTime::now_utc(),
            immediate,
        }
    }
}

/// Events emitted by the scan coordinator.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ProximityEvent {
    /// A peripheral was seen for the first time.
    Discovered {
        identity: Uuid,
        transport_id: TransportId,
        rssi: f32,
    },
    /// A connect was issued to read the peripheral's identity.
    ConnectRequested { transport_id: TransportId },
    /// A device completed the identity handshake.
    Identified {
        identity: Uuid,
        user_id: i64,
        user_name: String,
    },
    /// An identity payload was unreadable or carried user id 0.
    IdentityRejected {
        transport_id: TransportId,
        reason: String,
    },
    /// A connect attempt failed.
    ConnectFailed {
        transport_id: TransportId,
        reason: String,
    },
    /// Discovery resumed after a connect phase.
    ScanRestarted {
        /// Connects still outstanding when the phase ended.
        abandoned: usize,
    },
    /// Output of one report tick.
    Report(ProximityReport),
}

/// Sender for coordinator events.
pub type EventSender = broadcast::Sender<ProximityEvent>;

/// Receiver for coordinator events.
pub type EventReceiver = broadcast::Receiver<ProximityEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: ProximityEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = ProximityEvent::ConnectRequested {
            transport_id: TransportId::from("AA:BB:CC:DD:EE:FF"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "connect_requested");
        assert_eq!(json["transport_id"], "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_report_serialization() {
        let report = ProximityReport::now(Vec::new());
        let json = serde_json::to_string(&ProximityEvent::Report(report.clone())).unwrap();
        assert!(json.contains("\"type\":\"report\""));
        let back: ProximityEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ProximityEvent::Report(report));
    }

    #[tokio::test]
    async fn test_dispatcher_fan_out() {
        let dispatcher = EventDispatcher::new(8);
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();
        assert_eq!(dispatcher.receiver_count(), 2);

        dispatcher.send(ProximityEvent::ScanRestarted { abandoned: 2 });
        assert_eq!(a.recv().await.unwrap(), ProximityEvent::ScanRestarted { abandoned: 2 });
        assert_eq!(b.recv().await.unwrap(), ProximityEvent::ScanRestarted { abandoned: 2 });
    }

    #[test]
    fn test_send_without_receivers() {
        EventDispatcher::default().send(ProximityEvent::ScanRestarted { abandoned: 0 });
    }
}
