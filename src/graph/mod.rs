//! Mutable graphs and their locks.
//!
//! # Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`MutableGraph`] | A live triple set: add, remove, filter, size, snapshot |
//! | [`LockableGraph`] | A mutable graph that exposes one shared [`GraphLock`] |
//!
//! Providers may hand out plain mutable graphs; [`MutableGraphRef::into_lockable`]
//! wraps those in a [`LockableGraphWrapper`] so that everything the
//! multiplexer returns carries a lock.
//!
//! # Lock discipline
//!
//! On a lockable graph every mutation takes the write lock and every read
//! takes the read lock for the duration of the call. `filter` returns a
//! materialized `Vec`, never a cursor, so results cannot outlive the lock
//! they were read under. Callers that need several reads to agree (e.g.
//! `size` followed by `filter`) hold [`GraphLock::read`] across them.

mod lock;
mod memory;
mod wrapper;

pub use lock::{GraphLock, ReadGuard, WriteGuard};
pub use memory::SimpleMutableGraph;
pub use wrapper::LockableGraphWrapper;

use crate::Result;
use crate::models::{ImmutableGraph, Iri, Subject, Term, Triple};
use std::sync::Arc;

/// A live, mutable set of triples.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn MutableGraph>`
/// - Use interior mutability for the triple set
/// - Backend I/O failures surface as `Error::BackendFailure`
pub trait MutableGraph: Send + Sync {
    /// Adds a triple; returns `true` if the set changed.
    fn add(&self, triple: Triple) -> Result<bool>;

    /// Removes a triple; returns `true` if the set changed.
    fn remove(&self, triple: &Triple) -> Result<bool>;

    /// Returns every triple matching the pattern; `None` positions are
    /// wildcards.
    fn filter(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> Result<Vec<Triple>>;

    /// Returns the number of triples.
    fn size(&self) -> Result<usize>;

    /// Checks whether a triple is present.
    fn contains(&self, triple: &Triple) -> Result<bool> {
        let found = self.filter(
            Some(triple.subject()),
            Some(triple.predicate()),
            Some(triple.object()),
        )?;
        Ok(!found.is_empty())
    }

    /// Adds several triples; returns how many were new.
    fn extend(&self, triples: Vec<Triple>) -> Result<usize> {
        let mut added = 0;
        for triple in triples {
            if self.add(triple)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Returns a detached, frozen copy of the current contents.
    fn snapshot(&self) -> Result<ImmutableGraph> {
        Ok(self.filter(None, None, None)?.into_iter().collect())
    }
}

/// A mutable graph that exposes the read/write lock guarding it.
pub trait LockableGraph: MutableGraph {
    /// Returns the lock shared by every user of this handle.
    ///
    /// The same lock instance is returned on every call.
    fn lock(&self) -> &GraphLock;
}

/// Shared handle to a lockable graph.
pub type LockableGraphRef = Arc<dyn LockableGraph>;

/// A mutable graph as returned by a provider.
#[derive(Clone)]
pub enum MutableGraphRef {
    /// The provider's graph carries its own lock.
    Lockable(LockableGraphRef),
    /// The provider's graph has no lock; it is wrapped before use.
    Plain(Arc<dyn MutableGraph>),
}

impl MutableGraphRef {
    /// Returns `true` if the provider's graph already carries a lock.
    #[must_use]
    pub const fn is_lockable(&self) -> bool {
        matches!(self, Self::Lockable(_))
    }

    /// Returns a lockable handle, wrapping plain graphs with a fresh lock.
    #[must_use]
    pub fn into_lockable(self) -> LockableGraphRef {
        match self {
            Self::Lockable(graph) => graph,
            Self::Plain(graph) => Arc::new(LockableGraphWrapper::new(graph)),
        }
    }

    /// Returns the graph as a plain mutable graph.
    #[must_use]
    pub fn as_mutable(&self) -> Arc<dyn MutableGraph> {
        match self {
            Self::Lockable(graph) => Arc::clone(graph) as Arc<dyn MutableGraph>,
            Self::Plain(graph) => Arc::clone(graph),
        }
    }
}

impl From<LockableGraphRef> for MutableGraphRef {
    fn from(graph: LockableGraphRef) -> Self {
        Self::Lockable(graph)
    }
}

impl From<Arc<dyn MutableGraph>> for MutableGraphRef {
    fn from(graph: Arc<dyn MutableGraph>) -> Self {
        Self::Plain(graph)
    }
}
