//! Event types for the TradeOps event system
//!
//! Provides the shared event definitions and EventBus used to broadcast
//! batch lifecycle changes from the ingestion pipeline to SSE subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Batch lifecycle events
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. Status values travel as plain strings so the event layer
/// stays decoupled from the service-local state enums.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OpsEvent {
    /// A new ingestion batch was registered from an upload
    BatchCreated {
        /// Batch UUID assigned at upload
        batch_id: Uuid,
        /// Seller account the batch belongs to
        seller: String,
        /// When the batch was created
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Batch moved to a new lifecycle state
    BatchStateChanged {
        /// Batch UUID
        batch_id: Uuid,
        /// State before the transition
        old_status: String,
        /// State after the transition
        new_status: String,
        /// When the transition happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress update within a long-running stage
    BatchProgress {
        /// Batch UUID
        batch_id: Uuid,
        /// Overall progress, 0-100
        progress: i64,
        /// Operator-facing description of the current work
        stage_message: String,
        /// When the update was emitted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Batch reached the done state
    BatchCompleted {
        /// Batch UUID
        batch_id: Uuid,
        /// Number of ledger rows committed by the transform stage
        cleaned_count: u64,
        /// When the batch completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Batch entered the error state
    BatchFailed {
        /// Batch UUID
        batch_id: Uuid,
        /// Failure description recorded on the batch
        error_message: String,
        /// When the failure was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl OpsEvent {
    /// Get event type name for logging and SSE event framing
    pub fn event_type(&self) -> &'static str {
        match self {
            OpsEvent::BatchCreated { .. } => "BatchCreated",
            OpsEvent::BatchStateChanged { .. } => "BatchStateChanged",
            OpsEvent::BatchProgress { .. } => "BatchProgress",
            OpsEvent::BatchCompleted { .. } => "BatchCompleted",
            OpsEvent::BatchFailed { .. } => "BatchFailed",
        }
    }

    /// Batch the event refers to
    pub fn batch_id(&self) -> Uuid {
        match self {
            OpsEvent::BatchCreated { batch_id, .. }
            | OpsEvent::BatchStateChanged { batch_id, .. }
            | OpsEvent::BatchProgress { batch_id, .. }
            | OpsEvent::BatchCompleted { batch_id, .. }
            | OpsEvent::BatchFailed { batch_id, .. } => *batch_id,
        }
    }
}

/// Broadcast bus for batch lifecycle events
///
/// Wraps a tokio broadcast channel. Cloning is cheap and every clone feeds
/// the same set of subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OpsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow subscribers
    /// start losing the oldest entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use tradeops_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(1000);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<OpsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: OpsEvent) -> Result<usize, broadcast::error::SendError<OpsEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// The pipeline uses this for all emissions: a batch run must not fail
    /// just because no dashboard is watching.
    pub fn emit_lossy(&self, event: OpsEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> OpsEvent {
        OpsEvent::BatchStateChanged {
            batch_id: Uuid::new_v4(),
            old_status: "uploaded".to_string(),
            new_status: "parsing".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let event = sample_event();
        bus.emit(event.clone()).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "BatchStateChanged");
        assert_eq!(received.batch_id(), event.batch_id());
    }

    #[test]
    fn emit_lossy_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit_lossy(sample_event());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(sample_event()).unwrap();
        assert_eq!(json["type"], "BatchStateChanged");
        assert_eq!(json["old_status"], "uploaded");
        assert_eq!(json["new_status"], "parsing");
    }
}
