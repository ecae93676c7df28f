//! # Graphmux
//!
//! Federates a set of weighted RDF storage providers into a single namespace
//! of named graphs.
//!
//! Graphmux sits between callers that address graphs by IRI and the storage
//! backends that actually hold the triples. Every backend implements the
//! [`WeightedProvider`] contract; the [`TcProviderMultiplexer`] picks the
//! heaviest provider that can serve a name and caches the lock-bearing handle
//! it hands out, so that every caller asking for the same mutable graph shares
//! the same read/write lock.
//!
//! ## Features
//!
//! - Weight-ordered provider selection with a deterministic tie-break
//! - One live [`LockableGraph`] handle per name, held weakly by the cache
//! - Appear/disappear notifications when providers come and go
//! - Reentrant per-graph read/write locks
//! - A [`TcManager`] facade with query-engine name resolution
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use graphmux::{Iri, TcManager, Triple};
//! use graphmux::storage::InMemoryProvider;
//!
//! let manager = TcManager::new();
//! manager.add_provider(Arc::new(InMemoryProvider::new("memory", 100)))?;
//!
//! let name = Iri::new("urn:example:graph");
//! let graph = manager.create_mgraph(&name)?;
//! graph.add(Triple::new(Iri::new("urn:s"), Iri::new("urn:p"), Iri::new("urn:o")))?;
//!
//! // Same handle, same lock.
//! let again = manager.get_mgraph(&name)?;
//! assert!(std::sync::Arc::ptr_eq(&graph, &again));
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod graph;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{GraphmuxConfig, ProviderConfig};
pub use graph::{
    GraphLock, LockableGraph, LockableGraphRef, LockableGraphWrapper, MutableGraph,
    MutableGraphRef, SimpleMutableGraph,
};
pub use models::{
    BlankNode, GraphEvent, GraphFlavor, ImmutableGraph, Iri, Literal, ProvidedCollection, Subject,
    Term, Triple, TripleCollection,
};
pub use services::{QueryDataset, QueryEngine, QueryResult, TcManager};
pub use storage::{GraphListener, TcProviderMultiplexer, WeightedProvider};

/// Error type for graphmux operations.
///
/// Every failure kind maps to its own variant so callers can branch on
/// semantics rather than on message strings.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `NoSuchEntity` | No registered provider can serve the name |
/// | `AlreadyExists` | A provider refuses to create a name it already holds |
/// | `EntityUndeletable` | The owning provider refuses to delete the name |
/// | `UnsupportedOperation` | No provider accepted a create or delete |
/// | `InvalidArgument` | A provider rejects the shape of a name or argument |
/// | `BackendFailure` | A provider failed unexpectedly |
/// | `OperationFailed` | Poisoned locks, config I/O, logging init, lock upgrades |
#[derive(Debug, ThisError)]
pub enum Error {
    /// No provider can serve this name.
    #[error("no such entity: {0}")]
    NoSuchEntity(Iri),

    /// Creation was attempted for a name that is already resolvable.
    #[error("entity already exists: {0}")]
    AlreadyExists(Iri),

    /// The owning provider refused to delete the name.
    #[error("entity cannot be deleted: {0}")]
    EntityUndeletable(Iri),

    /// No provider accepted the operation.
    ///
    /// Raised when:
    /// - Every provider refused a create
    /// - The name exists but no provider could delete it
    /// - A query is executed without a query engine
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A provider rejected the argument shape (for example an empty name).
    ///
    /// The multiplexer treats this like `NoSuchEntity` while iterating
    /// providers and never surfaces it from resolution.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A provider failed unexpectedly.
    #[error("provider '{provider}' failed: {cause}")]
    BackendFailure {
        /// Stable key of the provider that failed.
        provider: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation inside the core itself failed.
    ///
    /// Raised when:
    /// - An internal lock is poisoned
    /// - A configuration file cannot be read or parsed
    /// - Logging has already been initialized
    /// - A thread tries to upgrade a graph read lock to a write lock
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns `true` if this is a `NoSuchEntity`.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchEntity(_))
    }

    /// Returns `true` for the kinds the multiplexer recovers from while
    /// iterating providers (`NoSuchEntity` and `InvalidArgument`).
    #[must_use]
    pub const fn is_skippable(&self) -> bool {
        matches!(self, Self::NoSuchEntity(_) | Self::InvalidArgument(_))
    }

    /// Returns `true` when a provider refused a create or delete and the next
    /// provider should be tried.
    #[must_use]
    pub const fn is_refusal(&self) -> bool {
        matches!(self, Self::UnsupportedOperation(_) | Self::InvalidArgument(_))
    }

    /// Returns `true` if this is a `BackendFailure`.
    #[must_use]
    pub const fn is_backend_failure(&self) -> bool {
        matches!(self, Self::BackendFailure { .. })
    }

    /// Shorthand for a poisoned internal lock.
    pub(crate) fn poisoned(operation: &str) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        }
    }
}

/// Result type alias for graphmux operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
