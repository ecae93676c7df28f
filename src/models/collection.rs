//! Triple collections: frozen graphs and the two-flavor collection enums.

use super::term::{Iri, Subject, Term, Triple};
use crate::Result;
use crate::graph::{LockableGraphRef, MutableGraph, MutableGraphRef};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A frozen set of triples.
///
/// Cloning is cheap (the set is shared). Equality is triple-set equality with
/// blank nodes compared by identity, an approximation of graph isomorphism:
/// two graphs that differ only in blank-node renaming compare unequal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImmutableGraph {
    triples: Arc<BTreeSet<Triple>>,
}

impl ImmutableGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a graph from an iterator of triples.
    pub fn from_triples<I>(triples: I) -> Self
    where
        I: IntoIterator<Item = Triple>,
    {
        Self {
            triples: Arc::new(triples.into_iter().collect()),
        }
    }

    /// Takes a snapshot of a mutable graph.
    ///
    /// The snapshot is detached: later changes to `graph` are not visible
    /// through it.
    pub fn snapshot_of<G: MutableGraph + ?Sized>(graph: &G) -> Result<Self> {
        graph.snapshot()
    }

    /// Returns the number of triples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Returns `true` if the graph has no triples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Checks whether a triple is in the graph.
    #[must_use]
    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Iterates over the triples in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Returns the triples matching a pattern; `None` positions are wildcards.
    #[must_use]
    pub fn filter(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> Vec<Triple> {
        self.triples
            .iter()
            .filter(|t| t.matches(subject, predicate, object))
            .cloned()
            .collect()
    }

    /// Returns a graph holding the triples of both graphs.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.iter().chain(other.iter()).cloned().collect()
    }
}

impl FromIterator<Triple> for ImmutableGraph {
    fn from_iter<T: IntoIterator<Item = Triple>>(iter: T) -> Self {
        Self::from_triples(iter)
    }
}

impl<'a> IntoIterator for &'a ImmutableGraph {
    type Item = &'a Triple;
    type IntoIter = std::collections::btree_set::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}

/// Which flavor a named collection has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphFlavor {
    /// A frozen graph.
    Immutable,
    /// A live, mutable graph.
    Mutable,
}

impl GraphFlavor {
    /// Returns the flavor as a static label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Immutable => "graph",
            Self::Mutable => "mgraph",
        }
    }
}

impl fmt::Display for GraphFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collection as handed out by a provider: the mutable flavor may or may
/// not carry its own lock.
#[derive(Clone)]
pub enum ProvidedCollection {
    /// A frozen graph.
    Graph(ImmutableGraph),
    /// A live graph, lockable or not.
    MGraph(MutableGraphRef),
}

impl ProvidedCollection {
    /// Returns the flavor of this collection.
    #[must_use]
    pub const fn flavor(&self) -> GraphFlavor {
        match self {
            Self::Graph(_) => GraphFlavor::Immutable,
            Self::MGraph(_) => GraphFlavor::Mutable,
        }
    }
}

impl fmt::Debug for ProvidedCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph(graph) => f.debug_tuple("Graph").field(graph).finish(),
            Self::MGraph(graph) => f
                .debug_struct("MGraph")
                .field("lockable", &graph.is_lockable())
                .finish_non_exhaustive(),
        }
    }
}

/// A collection as handed out by the multiplexer: the mutable flavor always
/// carries a lock.
#[derive(Clone)]
pub enum TripleCollection {
    /// A frozen graph.
    Graph(ImmutableGraph),
    /// The unique live handle for a mutable graph.
    MGraph(LockableGraphRef),
}

impl TripleCollection {
    /// Returns the flavor of this collection.
    #[must_use]
    pub const fn flavor(&self) -> GraphFlavor {
        match self {
            Self::Graph(_) => GraphFlavor::Immutable,
            Self::MGraph(_) => GraphFlavor::Mutable,
        }
    }

    /// Returns the frozen graph, if this is one.
    #[must_use]
    pub const fn as_graph(&self) -> Option<&ImmutableGraph> {
        match self {
            Self::Graph(graph) => Some(graph),
            Self::MGraph(_) => None,
        }
    }

    /// Returns the live handle, if this is a mutable graph.
    #[must_use]
    pub const fn as_mgraph(&self) -> Option<&LockableGraphRef> {
        match self {
            Self::Graph(_) => None,
            Self::MGraph(graph) => Some(graph),
        }
    }

    /// Returns a frozen view of the current contents.
    pub fn snapshot(&self) -> Result<ImmutableGraph> {
        match self {
            Self::Graph(graph) => Ok(graph.clone()),
            Self::MGraph(graph) => graph.snapshot(),
        }
    }

    /// Returns the number of triples.
    pub fn size(&self) -> Result<usize> {
        match self {
            Self::Graph(graph) => Ok(graph.len()),
            Self::MGraph(graph) => graph.size(),
        }
    }
}

impl fmt::Debug for TripleCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph(graph) => f.debug_tuple("Graph").field(graph).finish(),
            Self::MGraph(_) => f.debug_struct("MGraph").finish_non_exhaustive(),
        }
    }
}
