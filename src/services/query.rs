//! Query engine seam.
//!
//! Query parsing and evaluation live outside graphmux. An engine only tells
//! the manager which graphs a query reads; the manager resolves those names,
//! holds their read locks, and hands the engine a [`QueryDataset`].

use crate::Result;
use crate::models::{ImmutableGraph, Iri, Term, TripleCollection};
use std::collections::{BTreeMap, HashSet};

/// An external query engine.
pub trait QueryEngine: Send + Sync {
    /// Returns the graph names `query` reads, or `None` if the engine cannot
    /// tell, in which case every known name is resolved.
    fn referenced_graphs(&self, query: &str) -> Result<Option<HashSet<Iri>>>;

    /// Evaluates `query` against `dataset`.
    ///
    /// Called while the read lock of every mutable graph in the dataset is
    /// held by the calling thread.
    fn execute(&self, dataset: &QueryDataset, query: &str) -> Result<QueryResult>;
}

/// The resolved graphs a query runs against.
#[derive(Debug, Clone)]
pub struct QueryDataset {
    default_graph: Iri,
    graphs: BTreeMap<Iri, TripleCollection>,
}

impl QueryDataset {
    /// Creates a dataset from resolved collections.
    #[must_use]
    pub const fn new(default_graph: Iri, graphs: BTreeMap<Iri, TripleCollection>) -> Self {
        Self {
            default_graph,
            graphs,
        }
    }

    /// Returns the name of the default graph.
    #[must_use]
    pub const fn default_graph_name(&self) -> &Iri {
        &self.default_graph
    }

    /// Returns the default graph.
    #[must_use]
    pub fn default_graph(&self) -> Option<&TripleCollection> {
        self.graphs.get(&self.default_graph)
    }

    /// Returns the named graph `name`.
    #[must_use]
    pub fn graph(&self, name: &Iri) -> Option<&TripleCollection> {
        self.graphs.get(name)
    }

    /// Iterates over the graphs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&Iri, &TripleCollection)> {
        self.graphs.iter()
    }

    /// Returns the number of graphs, the default graph included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Returns `true` if the dataset holds no graphs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

/// Result of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// Answer to an ASK-style query.
    Boolean(bool),
    /// Result of a CONSTRUCT- or DESCRIBE-style query.
    Graph(ImmutableGraph),
    /// Solutions of a SELECT-style query, one map per row.
    Bindings(Vec<BTreeMap<String, Term>>),
}
