//! Weighted provider trait.

use crate::Result;
use crate::graph::MutableGraphRef;
use crate::models::{ImmutableGraph, Iri, ProvidedCollection};
use std::collections::HashSet;

/// A storage backend that serves named triple collections.
///
/// Providers are the authoritative source of the graphs behind each name.
/// The multiplexer consults them in descending [`weight`](Self::weight)
/// order, breaking ties by [`name`](Self::name).
///
/// # Error Contract
///
/// | Method | Expected Errors |
/// |--------|-----------------|
/// | `get_graph`, `get_mgraph`, `get_triples` | `NoSuchEntity`, `InvalidArgument` |
/// | `create_mgraph`, `create_graph` | `AlreadyExists`, `UnsupportedOperation`, `InvalidArgument` |
/// | `delete` | `NoSuchEntity`, `EntityUndeletable`, `UnsupportedOperation` |
///
/// Anything unexpected should be reported as `BackendFailure`.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn WeightedProvider>`
/// - A name returned by a listing must be fetchable, and a fetchable name
///   must be listed until it is deleted
/// - `get_mgraph` may return a lockable or a plain graph; plain graphs are
///   wrapped by the multiplexer
pub trait WeightedProvider: Send + Sync {
    /// Returns the stable key used to break weight ties.
    ///
    /// Must be unique among the providers registered with one multiplexer.
    fn name(&self) -> &str;

    /// Returns the priority of this provider; higher wins.
    fn weight(&self) -> i32;

    /// Lists the names of immutable graphs.
    fn list_graphs(&self) -> HashSet<Iri>;

    /// Lists the names of mutable graphs.
    fn list_mgraphs(&self) -> HashSet<Iri>;

    /// Lists every name this provider serves.
    fn list_names(&self) -> HashSet<Iri> {
        let mut names = self.list_graphs();
        names.extend(self.list_mgraphs());
        names
    }

    /// Returns the immutable graph with the given name.
    ///
    /// Providers that hold a mutable graph under the name may return a
    /// snapshot of it.
    fn get_graph(&self, name: &Iri) -> Result<ImmutableGraph>;

    /// Returns the mutable graph with the given name.
    fn get_mgraph(&self, name: &Iri) -> Result<MutableGraphRef>;

    /// Returns the collection with the given name in whichever flavor the
    /// provider holds it.
    fn get_triples(&self, name: &Iri) -> Result<ProvidedCollection>;

    /// Creates an empty mutable graph.
    fn create_mgraph(&self, name: &Iri) -> Result<MutableGraphRef>;

    /// Creates an immutable graph holding `triples`.
    fn create_graph(&self, name: &Iri, triples: ImmutableGraph) -> Result<ImmutableGraph>;

    /// Deletes the collection with the given name.
    fn delete(&self, name: &Iri) -> Result<()>;

    /// Returns every name under which this provider holds a graph equal to
    /// `graph`.
    fn get_names(&self, graph: &ImmutableGraph) -> HashSet<Iri>;

    /// Releases backend resources.
    ///
    /// Called when the owning manager shuts down. Calls made after `close`
    /// should fail with `BackendFailure`.
    fn close(&self) {}
}
