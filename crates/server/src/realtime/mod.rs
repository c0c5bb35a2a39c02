//! Real-time event relay.
//!
//! Route handlers, webhook receivers and background tasks publish
//! [`RealtimeEvent`]s on the process-wide [`EventBus`] held in `AppState`.
//! Each open browser session subscribes through `GET /api/events` and receives
//! only its own tenant's events as Server-Sent Events.

use parley_core::UserId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per subscriber before it starts lagging.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Event names published by the server.
pub mod events {
    pub const MESSAGE_CREATED: &str = "message.created";
    pub const MESSAGE_UPDATED: &str = "message.updated";
    pub const CONTACT_CREATED: &str = "contact.created";
    pub const CONTACT_UPDATED: &str = "contact.updated";
    pub const PAYMENT_UPDATED: &str = "payment.updated";
    pub const ORDER_UPDATED: &str = "order.updated";
    pub const QUOTATION_UPDATED: &str = "quotation.updated";
    pub const BROADCAST_PROGRESS: &str = "broadcast.progress";
    pub const REMINDER_DUE: &str = "reminder.due";
}

/// One event addressed to a tenant's browser sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub tenant_id: UserId,
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RealtimeEvent {
    /// Build an event from any serializable payload.
    #[must_use]
    pub fn new(tenant_id: UserId, event: &str, data: &impl Serialize) -> Self {
        Self {
            tenant_id,
            event: event.to_string(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Whether the name can be written as an SSE `event:` field.
    ///
    /// Blank names and names containing control characters (`\r`, `\n`, ...)
    /// are rejected.
    #[must_use]
    pub fn has_valid_name(&self) -> bool {
        !self.event.trim().is_empty() && !self.event.chars().any(char::is_control)
    }
}

/// Fan-out bus for realtime events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many subscribers received it.
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        trace!(tenant = %event.tenant_id, event = %event.event, "publishing realtime event");
        self.sender.send(event).unwrap_or(0)
    }

    /// Convenience wrapper around [`RealtimeEvent::new`] + [`Self::publish`].
    pub fn emit(&self, tenant_id: UserId, event: &str, data: &impl Serialize) -> usize {
        self.publish(RealtimeEvent::new(tenant_id, event, data))
    }

    /// Subscribe to all events. Callers filter by tenant.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }

    /// Current number of subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let delivered = bus.emit(UserId::new(1), events::MESSAGE_CREATED, &json!({"id": 5}));
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.tenant_id, UserId::new(1));
        assert_eq!(event.event, "message.created");
        assert_eq!(event.data["id"], 5);
    }

    #[test]
    fn test_event_name_validation() {
        let named = |name: &str| RealtimeEvent::new(UserId::new(1), name, &());
        assert!(named(events::ORDER_UPDATED).has_valid_name());
        assert!(named("custom event").has_valid_name());
        assert!(!named("").has_valid_name());
        assert!(!named("   ").has_valid_name());
        assert!(!named("order.updated\nevent: spoof").has_valid_name());
        assert!(!named("order.updated\r").has_valid_name());
        assert!(!named("order\u{0}updated").has_valid_name());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.emit(UserId::new(1), events::ORDER_UPDATED, &()), 0);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_receiver_reports_lag() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.emit(UserId::new(1), events::MESSAGE_UPDATED, &i);
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert!(rx.recv().await.is_ok());
    }
}
