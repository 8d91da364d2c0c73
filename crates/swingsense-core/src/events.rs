//! Supervisor event system.
//!
//! The supervisor and its session manager publish every state transition,
//! link change and recording change on a broadcast channel. Events are
//! serializable so they can be logged as JSON or forwarded.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::supervisor::{ConnectionState, LinkStats};

/// Events emitted while supervising a peripheral.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SupervisorEvent {
    /// The connection state machine moved.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// Discovery returned a candidate.
    DeviceFound { id: String, name: Option<String> },
    /// Discovery timed out or the scanner failed.
    ScanMissed,
    /// Link established and notifications enabled.
    Connected { id: String },
    /// Transport connect failed.
    ConnectFailed { error: String },
    /// Notification subscribe failed; the link was dropped.
    SubscribeFailed { error: String },
    /// The transport reported the link down.
    LinkLost { stats: LinkStats },
    /// The supervisor is sleeping before the next scan.
    BackoffScheduled { delay: Duration },
    /// A recording file was opened.
    SessionOpened { index: u32, path: PathBuf },
    /// A recording file was closed, by a Stop frame or by link loss.
    SessionClosed {
        index: u32,
        path: PathBuf,
        lines: u64,
        inferred: bool,
    },
    /// A notification had neither control nor sample length.
    FrameRejected { length: usize },
    /// A recording file operation failed.
    StorageFailed { error: String },
}

/// Sender for supervisor events.
pub type EventSender = broadcast::Sender<SupervisorEvent>;

/// Receiver for supervisor events.
pub type EventReceiver = broadcast::Receiver<SupervisorEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SupervisorEvent::SessionOpened {
            index: 2,
            path: PathBuf::from("swing/swing_2.csv"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"session_opened\""));
        assert!(json.contains("\"index\":2"));

        let back: SupervisorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_state_change_serialization() {
        let event = SupervisorEvent::StateChanged {
            from: ConnectionState::Scanning,
            to: ConnectionState::Connecting,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"from\":\"scanning\""));
        assert!(json.contains("\"to\":\"connecting\""));
    }

    #[tokio::test]
    async fn test_event_channel() {
        let (tx, mut rx) = event_channel(4);
        tx.send(SupervisorEvent::ScanMissed).unwrap();
        assert_eq!(rx.recv().await.unwrap(), SupervisorEvent::ScanMissed);
    }

    #[test]
    fn test_send_without_receivers_is_harmless() {
        let (tx, rx) = event_channel(100);
        drop(rx);
        assert!(tx.send(SupervisorEvent::ScanMissed).is_err());
    }
}
