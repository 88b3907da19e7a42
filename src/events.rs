//! Informational events for whoever is presenting the app
//!
//! Delivery problems never surface as errors to the caller; they become queue
//! state plus one of these events.

use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StorefrontEvent {
    /// Order persisted to the pending queue, delivery underway
    OrderQueued { order_id: String },
    /// Notifier accepted the order
    OrderSent { order_id: String },
    /// Delivery failed; the order stays pending
    OrderQueuedForRetry { order_id: String, attempt_count: u32, reason: String },
    SweepStarted { pending: usize },
    SweepFinished { delivered: usize, failed: usize },
    OrderResolvedManually { order_id: String },
}

impl StorefrontEvent {
    /// Severity used when the event is logged or shown
    pub fn level(&self) -> EventLevel {
        match self {
            StorefrontEvent::OrderSent { .. } | StorefrontEvent::OrderResolvedManually { .. } => EventLevel::Success,
            StorefrontEvent::OrderQueuedForRetry { .. } => EventLevel::Error,
            StorefrontEvent::SweepFinished { delivered, .. } if *delivered > 0 => EventLevel::Success,
            _ => EventLevel::Info,
        }
    }

    /// One-line message for a toast or terminal
    pub fn message(&self) -> String {
        match self {
            StorefrontEvent::OrderQueued { order_id } => format!("Order {} is being processed...", order_id),
            StorefrontEvent::OrderSent { order_id } => format!("Order {} placed successfully!", order_id),
            StorefrontEvent::OrderQueuedForRetry { order_id, .. } => {
                format!("Order {} failed to send and is queued for retry.", order_id)
            }
            StorefrontEvent::SweepStarted { pending } => format!("Retrying {} pending order(s)...", pending),
            StorefrontEvent::SweepFinished { delivered, failed } => {
                format!("{} order(s) sent successfully, {} still pending.", delivered, failed)
            }
            StorefrontEvent::OrderResolvedManually { order_id } => format!("Order {} marked as sent.", order_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Info,
    Success,
    Error,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StorefrontEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, event: StorefrontEvent) {
        tracing::debug!(event = ?event, "Storefront event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorefrontEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
