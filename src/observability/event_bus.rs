//! Tokio broadcast event bus for graph notifications.

use crate::config::DEFAULT_EVENT_BUS_CAPACITY;
use crate::models::{GraphEvent, Iri};
use std::sync::OnceLock;
use tokio::sync::broadcast;

/// Broadcasts appear/disappear events to async subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
}

/// Filtered receiver that yields events matching a predicate.
pub struct FilteredReceiver<F> {
    receiver: broadcast::Receiver<GraphEvent>,
    predicate: F,
}

impl EventBus {
    /// Creates a new event bus with the given buffer capacity.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers (best effort).
    pub fn publish(&self, event: GraphEvent) {
        metrics::counter!("graphmux_event_bus_publish_total").increment(1);
        if self.sender.send(event).is_err() {
            // No subscribers; the event is dropped.
            metrics::counter!("graphmux_event_bus_unobserved_total").increment(1);
        }
    }

    /// Subscribes to every event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Subscribes with a predicate to filter events by type or attributes.
    #[must_use]
    pub fn subscribe_filtered<F>(&self, predicate: F) -> FilteredReceiver<F>
    where
        F: Fn(&GraphEvent) -> bool,
    {
        FilteredReceiver {
            receiver: self.sender.subscribe(),
            predicate,
        }
    }

    /// Subscribes to events about one name.
    #[must_use]
    pub fn subscribe_name(&self, name: Iri) -> FilteredReceiver<impl Fn(&GraphEvent) -> bool> {
        self.subscribe_filtered(move |event| event.name() == &name)
    }

    /// Subscribes to events of the given type (`graph_appeared`,
    /// `mgraph_appeared` or `disappeared`).
    #[must_use]
    pub fn subscribe_event_type(
        &self,
        event_type: &'static str,
    ) -> FilteredReceiver<impl Fn(&GraphEvent) -> bool> {
        self.subscribe_filtered(move |event| event.event_type() == event_type)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUS_CAPACITY)
    }
}

impl<F> FilteredReceiver<F>
where
    F: Fn(&GraphEvent) -> bool,
{
    /// Receives the next event that matches the predicate.
    ///
    /// Lagged events are counted and skipped.
    pub async fn recv(&mut self) -> Result<GraphEvent, broadcast::error::RecvError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if (self.predicate)(&event) {
                        return Ok(event);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    metrics::counter!("graphmux_event_bus_lagged_total").increment(skipped);
                },
                Err(err) => return Err(err),
            }
        }
    }
}

static GLOBAL_EVENT_BUS: OnceLock<EventBus> = OnceLock::new();

/// Returns the global event bus, initializing it on first use.
#[must_use]
pub fn global_event_bus() -> &'static EventBus {
    GLOBAL_EVENT_BUS.get_or_init(EventBus::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GraphFlavor;

    #[tokio::test]
    async fn test_subscribe_event_type_skips_non_matching() {
        let bus = EventBus::new(16);
        let mut filtered = bus.subscribe_event_type("mgraph_appeared");

        bus.publish(GraphEvent::disappeared(Iri::new("urn:a")));
        bus.publish(GraphEvent::appeared(Iri::new("urn:b"), GraphFlavor::Mutable));

        let event = filtered.recv().await.expect("receive event");
        assert_eq!(event.name(), &Iri::new("urn:b"));
    }

    #[tokio::test]
    async fn test_subscribe_name() {
        let bus = EventBus::new(16);
        let mut filtered = bus.subscribe_name(Iri::new("urn:b"));

        bus.publish(GraphEvent::appeared(Iri::new("urn:a"), GraphFlavor::Immutable));
        bus.publish(GraphEvent::disappeared(Iri::new("urn:b")));

        let event = filtered.recv().await.expect("receive event");
        assert_eq!(event.event_type(), "disappeared");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.receiver_count(), 0);
        bus.publish(GraphEvent::disappeared(Iri::new("urn:a")));
    }

    #[test]
    fn test_global_event_bus_is_shared() {
        assert!(std::ptr::eq(global_event_bus(), global_event_bus()));
    }
}
