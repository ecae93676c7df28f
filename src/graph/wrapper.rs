//! Lock wrapper for graphs without a lock of their own.

use super::{GraphLock, LockableGraph, MutableGraph, SimpleMutableGraph};
use crate::Result;
use crate::models::{ImmutableGraph, Iri, Subject, Term, Triple};
use std::fmt;
use std::sync::Arc;

/// Makes any [`MutableGraph`] lockable.
///
/// Every mutating call takes the embedded write lock and every reading call
/// takes the read lock for its duration. Since the lock is reentrant, callers
/// that already hold it (e.g. a read lock around a multi-step traversal) can
/// keep calling through the wrapper.
pub struct LockableGraphWrapper {
    inner: Arc<dyn MutableGraph>,
    lock: GraphLock,
}

impl LockableGraphWrapper {
    /// Wraps a graph with a fresh lock.
    #[must_use]
    pub fn new(inner: Arc<dyn MutableGraph>) -> Self {
        Self {
            inner,
            lock: GraphLock::new(),
        }
    }

    /// Creates a lockable, empty in-memory graph.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(SimpleMutableGraph::new()))
    }

    /// Returns the wrapped graph.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn MutableGraph> {
        &self.inner
    }
}

impl fmt::Debug for LockableGraphWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockableGraphWrapper")
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

impl MutableGraph for LockableGraphWrapper {
    fn add(&self, triple: Triple) -> Result<bool> {
        let _guard = self.lock.write()?;
        self.inner.add(triple)
    }

    fn remove(&self, triple: &Triple) -> Result<bool> {
        let _guard = self.lock.write()?;
        self.inner.remove(triple)
    }

    fn filter(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> Result<Vec<Triple>> {
        let _guard = self.lock.read()?;
        self.inner.filter(subject, predicate, object)
    }

    fn size(&self) -> Result<usize> {
        let _guard = self.lock.read()?;
        self.inner.size()
    }

    fn contains(&self, triple: &Triple) -> Result<bool> {
        let _guard = self.lock.read()?;
        self.inner.contains(triple)
    }

    fn extend(&self, triples: Vec<Triple>) -> Result<usize> {
        let _guard = self.lock.write()?;
        self.inner.extend(triples)
    }

    fn snapshot(&self) -> Result<ImmutableGraph> {
        let _guard = self.lock.read()?;
        self.inner.snapshot()
    }
}

impl LockableGraph for LockableGraphWrapper {
    fn lock(&self) -> &GraphLock {
        &self.lock
    }
}
