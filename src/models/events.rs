//! Appearance events for named collections.

use super::{GraphFlavor, Iri};
use crate::current_timestamp;
use uuid::Uuid;

/// Shared event metadata.
#[derive(Debug, Clone)]
pub struct EventMeta {
    /// Unique identifier for this event.
    pub event_id: String,
    /// Event source component.
    pub source: &'static str,
    /// Timestamp (Unix epoch seconds).
    pub timestamp: u64,
}

impl EventMeta {
    /// Creates new event metadata using the current timestamp.
    #[must_use]
    pub fn new(source: &'static str) -> Self {
        Self::with_timestamp(source, current_timestamp())
    }

    /// Creates new event metadata with a specified timestamp.
    #[must_use]
    pub fn with_timestamp(source: &'static str, timestamp: u64) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            source,
            timestamp,
        }
    }
}

/// A named collection entered or left the published namespace.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// A collection became available, either because it was created or
    /// because a provider serving it was registered.
    Appeared {
        /// Event metadata.
        meta: EventMeta,
        /// Name of the collection.
        name: Iri,
        /// Whether the published collection is mutable.
        flavor: GraphFlavor,
    },
    /// A collection is no longer published under this name.
    ///
    /// May be emitted for names that were never announced, for example when
    /// a create retracts whatever a lower-weight provider had published.
    Disappeared {
        /// Event metadata.
        meta: EventMeta,
        /// Name of the collection.
        name: Iri,
    },
}

impl GraphEvent {
    /// Creates an appearance event.
    #[must_use]
    pub fn appeared(name: Iri, flavor: GraphFlavor) -> Self {
        Self::Appeared {
            meta: EventMeta::new("multiplexer"),
            name,
            flavor,
        }
    }

    /// Creates a disappearance event.
    #[must_use]
    pub fn disappeared(name: Iri) -> Self {
        Self::Disappeared {
            meta: EventMeta::new("multiplexer"),
            name,
        }
    }

    /// Returns the event type as a static label.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Appeared {
                flavor: GraphFlavor::Immutable,
                ..
            } => "graph_appeared",
            Self::Appeared {
                flavor: GraphFlavor::Mutable,
                ..
            } => "mgraph_appeared",
            Self::Disappeared { .. } => "disappeared",
        }
    }

    /// Returns the name the event is about.
    #[must_use]
    pub const fn name(&self) -> &Iri {
        match self {
            Self::Appeared { name, .. } | Self::Disappeared { name, .. } => name,
        }
    }

    /// Returns the event metadata.
    #[must_use]
    pub const fn meta(&self) -> &EventMeta {
        match self {
            Self::Appeared { meta, .. } | Self::Disappeared { meta, .. } => meta,
        }
    }
}
