//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! The outbox crawler re-broadcasts every event it dispatched successfully,
//! so in-process observers see events in commit order without polling.

use chrono::{DateTime, Utc};
use immersion_core::events::Topic;
use immersion_core::types::DbId;
use immersion_db::models::outbox::OutboxEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// DomainEvent
// ---------------------------------------------------------------------------

/// A domain event read back from the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Id of the outbox row.
    pub id: DbId,
    pub topic: Topic,
    /// Topic-specific data, usually the ids of the touched entities.
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Decode an outbox row. Returns `None` for an unknown topic.
    pub fn from_outbox(row: &OutboxEvent) -> Option<Self> {
        Some(Self {
            id: row.id,
            topic: Topic::parse(&row.topic)?,
            payload: row.payload.clone(),
            occurred_at: row.occurred_at,
        })
    }

    /// Read an integer id from the payload.
    pub fn payload_id(&self, key: &str) -> Option<DbId> {
        self.payload.get(key).and_then(serde_json::Value::as_i64)
    }

    /// Read a string from the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(serde_json::Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: DomainEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn row(topic: &str) -> OutboxEvent {
        let now = Utc::now();
        OutboxEvent {
            id: 7,
            topic: topic.to_string(),
            payload: serde_json::json!({ "convention_id": 42, "role": "beneficiary" }),
            status: "pending".to_string(),
            attempts: 0,
            last_error: None,
            occurred_at: now,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn decodes_known_topic() {
        let event = DomainEvent::from_outbox(&row("ConventionSubmitted")).expect("known topic");
        assert_eq!(event.id, 7);
        assert_eq!(event.topic, Topic::ConventionSubmitted);
        assert_eq!(event.payload_id("convention_id"), Some(42));
        assert_eq!(event.payload_str("role"), Some("beneficiary"));
        assert_eq!(event.payload_id("missing"), None);
    }

    #[test]
    fn unknown_topic_is_rejected() {
        assert!(DomainEvent::from_outbox(&row("SomethingElse")).is_none());
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = DomainEvent::from_outbox(&row("AgencyRegistered")).unwrap();
        bus.publish(event);

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.topic, Topic::AgencyRegistered);
        assert_eq!(e2.id, 7);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(DomainEvent::from_outbox(&row("AgencyClosed")).unwrap());
    }
}
