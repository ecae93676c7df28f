//! Observability: logging setup and the notification event bus.
//!
//! Metrics are emitted through the `metrics` facade; installing an exporter
//! is left to the embedding application.

mod event_bus;
mod logging;

pub use event_bus::{EventBus, FilteredReceiver, global_event_bus};
pub use logging::init_logging;
