//! In-memory provider.
//!
//! Provides a non-persistent implementation of [`WeightedProvider`] for use
//! in tests, development, and as the default wiring built from
//! configuration.

use crate::config::ProviderConfig;
use crate::graph::{LockableGraphWrapper, MutableGraph, MutableGraphRef, SimpleMutableGraph};
use crate::models::{ImmutableGraph, Iri, ProvidedCollection};
use crate::storage::traits::WeightedProvider;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Clone)]
enum Stored {
    Graph(ImmutableGraph),
    MGraph(MutableGraphRef),
}

/// In-memory provider.
///
/// Holds immutable graphs and mutable graphs in a single name map guarded by
/// an `RwLock`. Data is not persisted between runs.
///
/// # Options
///
/// | Option | Effect |
/// |--------|--------|
/// | `with_union_graph` | Publishes the union of all stored graphs as an undeletable graph |
/// | `with_lockable_graphs` | Hands out natively lockable mutable graphs instead of plain ones |
/// | `with_undeletable` | Refuses deletion of the given name |
///
/// # Example
///
/// ```rust,ignore
/// use graphmux::storage::InMemoryProvider;
///
/// let provider = InMemoryProvider::new("memory", 100)
///     .with_union_graph(Iri::new("urn:x-graphmux:union"));
/// ```
pub struct InMemoryProvider {
    name: String,
    weight: i32,
    union_graph: Option<Iri>,
    lockable_graphs: bool,
    undeletable: HashSet<Iri>,
    collections: RwLock<HashMap<Iri, Stored>>,
    closed: AtomicBool,
}

impl InMemoryProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new(name: impl Into<String>, weight: i32) -> Self {
        Self {
            name: name.into(),
            weight,
            union_graph: None,
            lockable_graphs: false,
            undeletable: HashSet::new(),
            collections: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a provider from a `[[providers]]` configuration entry.
    #[must_use]
    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut provider = Self::new(config.name.clone(), config.weight)
            .with_lockable_graphs(config.lockable_graphs);
        if let Some(union_graph) = &config.union_graph {
            provider = provider.with_union_graph(Iri::new(union_graph));
        }
        for name in &config.undeletable {
            provider = provider.with_undeletable(Iri::new(name));
        }
        provider
    }

    /// Publishes the union of all stored graphs under `name`.
    #[must_use]
    pub fn with_union_graph(mut self, name: Iri) -> Self {
        self.union_graph = Some(name);
        self
    }

    /// Hands out natively lockable mutable graphs.
    #[must_use]
    pub const fn with_lockable_graphs(mut self, lockable: bool) -> Self {
        self.lockable_graphs = lockable;
        self
    }

    /// Refuses deletion of `name`.
    #[must_use]
    pub fn with_undeletable(mut self, name: Iri) -> Self {
        self.undeletable.insert(name);
        self
    }

    /// Returns the number of stored collections, not counting the union graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns `true` if no collections are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`close`](WeightedProvider::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::BackendFailure {
                provider: self.name.clone(),
                cause: "provider is closed".to_string(),
            });
        }
        Ok(())
    }

    fn check_name(name: &Iri) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "graph name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn is_union_graph(&self, name: &Iri) -> bool {
        self.union_graph.as_ref() == Some(name)
    }

    fn lookup(&self, name: &Iri) -> Result<Option<Stored>> {
        self.ensure_open()?;
        Self::check_name(name)?;
        let collections = self
            .collections
            .read()
            .map_err(|_| Error::poisoned("memory_provider_lookup"))?;
        Ok(collections.get(name).cloned())
    }

    fn build_union(&self) -> Result<ImmutableGraph> {
        let stored: Vec<Stored> = {
            let collections = self
                .collections
                .read()
                .map_err(|_| Error::poisoned("memory_provider_union"))?;
            collections.values().cloned().collect()
        };

        let mut union = ImmutableGraph::empty();
        for collection in stored {
            let graph = match collection {
                Stored::Graph(graph) => graph,
                Stored::MGraph(graph) => graph.as_mutable().snapshot()?,
            };
            union = union.union(&graph);
        }
        Ok(union)
    }

    fn new_mgraph(&self) -> MutableGraphRef {
        if self.lockable_graphs {
            MutableGraphRef::Lockable(Arc::new(LockableGraphWrapper::in_memory()))
        } else {
            MutableGraphRef::Plain(Arc::new(SimpleMutableGraph::new()))
        }
    }

    fn insert_new(&self, name: &Iri, stored: Stored) -> Result<()> {
        self.ensure_open()?;
        Self::check_name(name)?;
        if self.is_union_graph(name) {
            return Err(Error::AlreadyExists(name.clone()));
        }
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Error::poisoned("memory_provider_create"))?;
        if collections.contains_key(name) {
            return Err(Error::AlreadyExists(name.clone()));
        }
        collections.insert(name.clone(), stored);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryProvider")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("union_graph", &self.union_graph)
            .field("lockable_graphs", &self.lockable_graphs)
            .field("collections", &self.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl WeightedProvider for InMemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> i32 {
        self.weight
    }

    fn list_graphs(&self) -> HashSet<Iri> {
        if self.is_closed() {
            return HashSet::new();
        }
        let mut names: HashSet<Iri> = self
            .collections
            .read()
            .map(|c| {
                c.iter()
                    .filter(|(_, stored)| matches!(stored, Stored::Graph(_)))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default();
        names.extend(self.union_graph.clone());
        names
    }

    fn list_mgraphs(&self) -> HashSet<Iri> {
        if self.is_closed() {
            return HashSet::new();
        }
        self.collections
            .read()
            .map(|c| {
                c.iter()
                    .filter(|(_, stored)| matches!(stored, Stored::MGraph(_)))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_graph(&self, name: &Iri) -> Result<ImmutableGraph> {
        let stored = self.lookup(name)?;
        if self.is_union_graph(name) {
            return self.build_union();
        }
        match stored {
            Some(Stored::Graph(graph)) => Ok(graph),
            Some(Stored::MGraph(_)) | None => Err(Error::NoSuchEntity(name.clone())),
        }
    }

    fn get_mgraph(&self, name: &Iri) -> Result<MutableGraphRef> {
        match self.lookup(name)? {
            Some(Stored::MGraph(graph)) => Ok(graph),
            Some(Stored::Graph(_)) | None => Err(Error::NoSuchEntity(name.clone())),
        }
    }

    fn get_triples(&self, name: &Iri) -> Result<ProvidedCollection> {
        let stored = self.lookup(name)?;
        if self.is_union_graph(name) {
            return self.build_union().map(ProvidedCollection::Graph);
        }
        match stored {
            Some(Stored::Graph(graph)) => Ok(ProvidedCollection::Graph(graph)),
            Some(Stored::MGraph(graph)) => Ok(ProvidedCollection::MGraph(graph)),
            None => Err(Error::NoSuchEntity(name.clone())),
        }
    }

    fn create_mgraph(&self, name: &Iri) -> Result<MutableGraphRef> {
        let graph = self.new_mgraph();
        self.insert_new(name, Stored::MGraph(graph.clone()))?;
        tracing::debug!(provider = %self.name, name = %name, "Created mutable graph");
        Ok(graph)
    }

    fn create_graph(&self, name: &Iri, triples: ImmutableGraph) -> Result<ImmutableGraph> {
        self.insert_new(name, Stored::Graph(triples.clone()))?;
        tracing::debug!(provider = %self.name, name = %name, "Created immutable graph");
        Ok(triples)
    }

    fn delete(&self, name: &Iri) -> Result<()> {
        self.ensure_open()?;
        Self::check_name(name)?;
        if self.is_union_graph(name) || self.undeletable.contains(name) {
            return Err(Error::EntityUndeletable(name.clone()));
        }
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Error::poisoned("memory_provider_delete"))?;
        collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NoSuchEntity(name.clone()))
    }

    fn get_names(&self, graph: &ImmutableGraph) -> HashSet<Iri> {
        if self.is_closed() {
            return HashSet::new();
        }
        self.collections
            .read()
            .map(|c| {
                c.iter()
                    .filter(|(_, stored)| matches!(stored, Stored::Graph(g) if g == graph))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(provider = %self.name, "Closed in-memory provider");
        }
    }
}
