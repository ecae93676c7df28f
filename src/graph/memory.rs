//! In-memory mutable graph.
//!
//! [`SimpleMutableGraph`] is thread-safe for individual calls but exposes no
//! lock of its own, so it is a plain [`MutableGraph`]. Wrap it in a
//! [`LockableGraphWrapper`](super::LockableGraphWrapper) to get a lockable
//! handle.

use super::MutableGraph;
use crate::models::{ImmutableGraph, Iri, Subject, Term, Triple};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::RwLock;

/// In-memory triple set backed by a `BTreeSet`.
#[derive(Debug, Default)]
pub struct SimpleMutableGraph {
    triples: RwLock<BTreeSet<Triple>>,
}

impl SimpleMutableGraph {
    /// Creates a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph holding the given triples.
    pub fn from_triples<I>(triples: I) -> Self
    where
        I: IntoIterator<Item = Triple>,
    {
        Self {
            triples: RwLock::new(triples.into_iter().collect()),
        }
    }
}

impl MutableGraph for SimpleMutableGraph {
    fn add(&self, triple: Triple) -> Result<bool> {
        let mut triples = self
            .triples
            .write()
            .map_err(|_| Error::poisoned("graph_add"))?;
        Ok(triples.insert(triple))
    }

    fn remove(&self, triple: &Triple) -> Result<bool> {
        let mut triples = self
            .triples
            .write()
            .map_err(|_| Error::poisoned("graph_remove"))?;
        Ok(triples.remove(triple))
    }

    fn filter(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> Result<Vec<Triple>> {
        let triples = self
            .triples
            .read()
            .map_err(|_| Error::poisoned("graph_filter"))?;
        Ok(triples
            .iter()
            .filter(|t| t.matches(subject, predicate, object))
            .cloned()
            .collect())
    }

    fn size(&self) -> Result<usize> {
        self.triples
            .read()
            .map(|t| t.len())
            .map_err(|_| Error::poisoned("graph_size"))
    }

    fn contains(&self, triple: &Triple) -> Result<bool> {
        self.triples
            .read()
            .map(|t| t.contains(triple))
            .map_err(|_| Error::poisoned("graph_contains"))
    }

    fn extend(&self, new_triples: Vec<Triple>) -> Result<usize> {
        let mut triples = self
            .triples
            .write()
            .map_err(|_| Error::poisoned("graph_extend"))?;
        Ok(new_triples
            .into_iter()
            .filter(|t| triples.insert(t.clone()))
            .count())
    }

    fn snapshot(&self) -> Result<ImmutableGraph> {
        let triples = self
            .triples
            .read()
            .map_err(|_| Error::poisoned("graph_snapshot"))?;
        Ok(triples.iter().cloned().collect())
    }
}
