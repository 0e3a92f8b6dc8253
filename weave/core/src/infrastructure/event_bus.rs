// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Field Event Bus - Pub/Sub for field events
//!
//! In-memory fan-out over a tokio broadcast channel. Events published while
//! nobody listens are dropped; a receiver that falls behind by more than the
//! channel capacity loses the oldest events and is told how many.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::field::FieldEvent;

/// Event bus for publishing and subscribing to field events
#[derive(Clone)]
pub struct FieldEventBus {
    sender: Arc<broadcast::Sender<FieldEvent>>,
}

impl FieldEventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers. Returns the number of receivers
    /// that got it.
    pub fn publish(&self, event: FieldEvent) -> usize {
        debug!(event = event.name(), "Publishing field event");

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to field event");
        }
        receiver_count
    }

    /// Raw broadcast receiver, as required by the `Field` contract
    pub fn raw_subscribe(&self) -> broadcast::Receiver<FieldEvent> {
        self.sender.subscribe()
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FieldEventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for field events
pub struct EventReceiver {
    receiver: broadcast::Receiver<FieldEvent>,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<FieldEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<FieldEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Field event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<FieldEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Field event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::CoherenceChange;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = FieldEventBus::new(10);
        let mut receiver = bus.subscribe();

        let delivered = bus.publish(FieldEvent::CoherenceChanged(CoherenceChange::new(70.0, 76.0)));
        assert_eq!(delivered, 1);

        match receiver.recv().await.unwrap() {
            FieldEvent::CoherenceChanged(change) => assert_eq!(change.current, 76.0),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = FieldEventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(
            bus.publish(FieldEvent::CoherenceChanged(CoherenceChange::new(1.0, 2.0))),
            0
        );
    }

    #[tokio::test]
    async fn test_lagged_receiver() {
        let bus = FieldEventBus::new(2);
        let mut receiver = bus.subscribe();

        for i in 0..5 {
            bus.publish(FieldEvent::CoherenceChanged(CoherenceChange::new(i as f64, i as f64 + 1.0)));
        }

        assert!(matches!(receiver.try_recv(), Err(EventBusError::Lagged(3))));
        assert!(receiver.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_empty_receiver() {
        let bus = FieldEventBus::new(4);
        let mut receiver = bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
