//! Cross-tab sync channel
//!
//! Tabs exchange `{"event": "logout", "ts": <millis>}` messages over a
//! broadcast bus. Each endpoint filters out its own publications, so a tab
//! only reacts to what its peers did. Delivery is best effort: a slow
//! receiver that lags behind the buffer skips the missed messages.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Sync event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncEvent {
    Logout,
    Ping,
    Pong,
}

/// Wire message shared by the tab bus and the session WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub event: SyncEvent,
    /// Unix time in milliseconds
    pub ts: i64,
}

impl SyncMessage {
    pub fn new(event: SyncEvent) -> Self {
        Self {
            event,
            ts: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn logout() -> Self {
        Self::new(SyncEvent::Logout)
    }
}

#[derive(Debug, Clone)]
struct Envelope {
    origin: Uuid,
    message: SyncMessage,
}

/// Shared bus connecting every tab of one browser profile
#[derive(Clone)]
pub struct TabBus {
    tx: broadcast::Sender<Envelope>,
}

impl TabBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Open an endpoint for a new tab
    pub fn connect(&self) -> (TabPublisher, TabReceiver) {
        let tab_id = Uuid::new_v4();
        let publisher = TabPublisher {
            tab_id,
            tx: self.tx.clone(),
        };
        let receiver = TabReceiver {
            tab_id,
            rx: self.tx.subscribe(),
        };
        (publisher, receiver)
    }
}

impl Default for TabBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Sending half owned by a tab's store
#[derive(Clone)]
pub struct TabPublisher {
    tab_id: Uuid,
    tx: broadcast::Sender<Envelope>,
}

impl TabPublisher {
    pub fn tab_id(&self) -> Uuid {
        self.tab_id
    }

    pub fn publish(&self, message: SyncMessage) {
        // No other tab listening is fine
        let _ = self.tx.send(Envelope {
            origin: self.tab_id,
            message,
        });
    }
}

/// Receiving half, yields messages published by other tabs
pub struct TabReceiver {
    tab_id: Uuid,
    rx: broadcast::Receiver<Envelope>,
}

impl TabReceiver {
    /// Next message from a peer; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<SyncMessage> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if envelope.origin == self.tab_id => continue,
                Ok(envelope) => return Some(envelope.message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Tab sync receiver lagged, {} messages skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_schema() {
        let msg = SyncMessage {
            event: SyncEvent::Logout,
            ts: 1700000000000,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"event": "logout", "ts": 1700000000000i64}));

        let parsed: SyncMessage = serde_json::from_str(r#"{"event":"ping","ts":5}"#).unwrap();
        assert_eq!(parsed.event, SyncEvent::Ping);
    }

    #[tokio::test]
    async fn test_peer_receives_but_sender_does_not() {
        let bus = TabBus::default();
        let (tab_a, mut rx_a) = bus.connect();
        let (_tab_b, mut rx_b) = bus.connect();

        tab_a.publish(SyncMessage::logout());

        let got = rx_b.recv().await.unwrap();
        assert_eq!(got.event, SyncEvent::Logout);

        // Tab A's only pending message is its own
        let own = tokio::time::timeout(std::time::Duration::from_millis(50), rx_a.recv()).await;
        assert!(own.is_err());
    }
}
