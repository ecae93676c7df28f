//! Appearance notifications.
//!
//! Events are queued while the cache lock is held and delivered after it is
//! released. A single thread drains the queue at a time, so listeners see
//! events in the order they were queued even when several threads trigger
//! them concurrently.

use crate::models::{GraphEvent, GraphFlavor, Iri};
use crate::observability::EventBus;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Receives appear/disappear notifications for published names.
///
/// This is the seam for publishing graphs to an outer registry. All methods
/// have empty default bodies.
///
/// # Implementor Notes
///
/// - Hooks are called without any multiplexer lock held, so they may call
///   back into the multiplexer
/// - Redundant calls are possible (for example a disappear for a name that
///   was never announced) and must be tolerated
/// - A panicking hook is logged and skipped
/// - Delivery is asynchronous with respect to the triggering call: when
///   another thread is already draining, that thread delivers the events and
///   the call may return before its own hooks have run. Ordering across all
///   events is still preserved
pub trait GraphListener: Send + Sync {
    /// An immutable graph was published under `name`.
    fn graph_appears(&self, _name: &Iri) {}

    /// A mutable graph was published under `name`.
    fn mgraph_appears(&self, _name: &Iri) {}

    /// Whatever was published under `name` is gone.
    fn tc_disappears(&self, _name: &Iri) {}
}

/// Queue of pending events plus the listeners they are delivered to.
pub struct Notifier {
    pending: Mutex<VecDeque<GraphEvent>>,
    draining: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn GraphListener>>>,
    event_bus: EventBus,
}

impl Notifier {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
            event_bus,
        }
    }

    pub const fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn add_listener(&self, listener: Arc<dyn GraphListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Queues an event for delivery. Called inside critical sections.
    pub fn enqueue(&self, event: GraphEvent) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(event);
    }

    pub fn appeared(&self, name: &Iri, flavor: GraphFlavor) {
        self.enqueue(GraphEvent::appeared(name.clone(), flavor));
    }

    pub fn disappeared(&self, name: &Iri) {
        self.enqueue(GraphEvent::disappeared(name.clone()));
    }

    /// Delivers queued events. Must be called with no multiplexer lock held.
    ///
    /// If another thread is already draining, returns immediately and leaves
    /// the events to that thread.
    pub fn drain(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            while let Some(event) = self.pop() {
                self.deliver(event);
            }
            self.draining.store(false, Ordering::Release);

            // Events queued between the last pop and the flag reset.
            if self.is_idle() {
                return;
            }
        }
    }

    fn pop(&self) -> Option<GraphEvent> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn is_idle(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn deliver(&self, event: GraphEvent) {
        metrics::counter!("graphmux_notifications_total", "kind" => event.event_type())
            .increment(1);
        tracing::debug!(
            name = %event.name(),
            kind = event.event_type(),
            "Delivering graph notification"
        );

        let listeners: Vec<Arc<dyn GraphListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| match &event {
                GraphEvent::Appeared {
                    name,
                    flavor: GraphFlavor::Immutable,
                    ..
                } => listener.graph_appears(name),
                GraphEvent::Appeared {
                    name,
                    flavor: GraphFlavor::Mutable,
                    ..
                } => listener.mgraph_appears(name),
                GraphEvent::Disappeared { name, .. } => listener.tc_disappears(name),
            }));

            if let Err(panic_info) = outcome {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                metrics::counter!("graphmux_hook_panics_total").increment(1);
                tracing::error!(
                    name = %event.name(),
                    kind = event.event_type(),
                    panic_message = %panic_msg,
                    "Graph listener panicked"
                );
            }
        }

        self.event_bus.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl GraphListener for Recorder {
        fn graph_appears(&self, name: &Iri) {
            self.seen.lock().unwrap().push(format!("graph {name}"));
        }

        fn mgraph_appears(&self, name: &Iri) {
            self.seen.lock().unwrap().push(format!("mgraph {name}"));
        }

        fn tc_disappears(&self, name: &Iri) {
            self.seen.lock().unwrap().push(format!("gone {name}"));
        }
    }

    struct Panicker;

    impl GraphListener for Panicker {
        fn graph_appears(&self, _name: &Iri) {
            panic!("listener failure");
        }
    }

    #[test]
    fn test_events_are_delivered_in_order() {
        let notifier = Notifier::new(EventBus::new(16));
        let recorder = Arc::new(Recorder::default());
        notifier.add_listener(recorder.clone());

        let name = Iri::new("urn:g");
        notifier.disappeared(&name);
        notifier.appeared(&name, GraphFlavor::Mutable);
        notifier.appeared(&name, GraphFlavor::Immutable);
        notifier.drain();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec!["gone urn:g", "mgraph urn:g", "graph urn:g"]
        );
        assert!(notifier.is_idle());
    }

    #[test]
    fn test_panicking_listener_does_not_stop_delivery() {
        let notifier = Notifier::new(EventBus::new(16));
        let recorder = Arc::new(Recorder::default());
        notifier.add_listener(Arc::new(Panicker));
        notifier.add_listener(recorder.clone());

        notifier.appeared(&Iri::new("urn:g"), GraphFlavor::Immutable);
        notifier.drain();

        assert_eq!(*recorder.seen.lock().unwrap(), vec!["graph urn:g"]);
    }

    #[tokio::test]
    async fn test_events_reach_the_bus() {
        let bus = EventBus::new(16);
        let mut receiver = bus.subscribe();
        let notifier = Notifier::new(bus);

        notifier.appeared(&Iri::new("urn:g"), GraphFlavor::Mutable);
        notifier.drain();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "mgraph_appeared");
    }
}
