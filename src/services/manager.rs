//! Manager facade.
//!
//! [`TcManager`] is the single entry point callers use. It owns one
//! [`TcProviderMultiplexer`], forwards every name-keyed call to it, and
//! adds query dispatch on top.
//!
//! # Example
//!
//! ```rust,ignore
//! use graphmux::{GraphmuxConfig, TcManager};
//!
//! let config = GraphmuxConfig::load_default().with_env_overrides();
//! let manager = TcManager::from_config(&config)?;
//!
//! let graph = manager.create_mgraph(&Iri::new("urn:example:g"))?;
//! // ...
//! manager.shutdown()?;
//! ```

use super::query::{QueryDataset, QueryEngine, QueryResult};
use crate::config::GraphmuxConfig;
use crate::graph::{LockableGraph, LockableGraphRef, ReadGuard};
use crate::models::{ImmutableGraph, Iri, TripleCollection};
use crate::observability::EventBus;
use crate::storage::{GraphListener, InMemoryProvider, TcProviderMultiplexer, WeightedProvider};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, RwLock};
use tracing::instrument;

/// Front door over the multiplexer.
pub struct TcManager {
    multiplexer: TcProviderMultiplexer,
    query_engine: RwLock<Option<Arc<dyn QueryEngine>>>,
}

impl TcManager {
    /// Creates a manager with no providers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_multiplexer(TcProviderMultiplexer::new())
    }

    /// Creates a manager around an existing multiplexer.
    #[must_use]
    pub const fn with_multiplexer(multiplexer: TcProviderMultiplexer) -> Self {
        Self {
            multiplexer,
            query_engine: RwLock::new(None),
        }
    }

    /// Builds a manager from configuration, registering one
    /// [`InMemoryProvider`] per `[[providers]]` entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if two providers share a name.
    pub fn from_config(config: &GraphmuxConfig) -> Result<Self> {
        let multiplexer =
            TcProviderMultiplexer::with_event_bus(EventBus::new(config.event_bus_capacity));
        multiplexer.set_caching_enabled(config.caching_enabled)?;

        let manager = Self::with_multiplexer(multiplexer);
        for provider in &config.providers {
            manager.add_provider(Arc::new(InMemoryProvider::from_config(provider)))?;
        }
        tracing::info!(
            providers = config.providers.len(),
            caching_enabled = config.caching_enabled,
            "Graph manager configured"
        );
        Ok(manager)
    }

    /// Returns the underlying multiplexer.
    #[must_use]
    pub const fn multiplexer(&self) -> &TcProviderMultiplexer {
        &self.multiplexer
    }

    // =========================================================================
    // Providers and notifications
    // =========================================================================

    /// Registers a provider.
    pub fn add_provider(&self, provider: Arc<dyn WeightedProvider>) -> Result<()> {
        self.multiplexer.add_provider(provider)
    }

    /// Deregisters a provider, returning it without closing it.
    pub fn remove_provider(&self, name: &str) -> Result<Option<Arc<dyn WeightedProvider>>> {
        self.multiplexer.remove_provider(name)
    }

    /// Returns the registered providers in resolution order.
    pub fn providers(&self) -> Result<Vec<Arc<dyn WeightedProvider>>> {
        self.multiplexer.providers()
    }

    /// Registers a listener for appear/disappear notifications.
    pub fn add_listener(&self, listener: Arc<dyn GraphListener>) {
        self.multiplexer.add_listener(listener);
    }

    /// Returns the event bus notifications are published to.
    #[must_use]
    pub const fn event_bus(&self) -> &EventBus {
        self.multiplexer.event_bus()
    }

    /// Turns the handle cache on or off.
    pub fn set_caching_enabled(&self, enabled: bool) -> Result<()> {
        self.multiplexer.set_caching_enabled(enabled)
    }

    /// Returns `true` if mutable graph handles are cached.
    #[must_use]
    pub fn is_caching_enabled(&self) -> bool {
        self.multiplexer.is_caching_enabled()
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Returns the immutable graph `name`.
    pub fn get_graph(&self, name: &Iri) -> Result<ImmutableGraph> {
        self.multiplexer.get_graph(name)
    }

    /// Returns the unique lockable handle for the mutable graph `name`.
    pub fn get_mgraph(&self, name: &Iri) -> Result<LockableGraphRef> {
        self.multiplexer.get_mgraph(name)
    }

    /// Returns the collection `name` in whichever flavor it is held.
    pub fn get_triples(&self, name: &Iri) -> Result<TripleCollection> {
        self.multiplexer.get_triples(name)
    }

    /// Creates an empty mutable graph.
    pub fn create_mgraph(&self, name: &Iri) -> Result<LockableGraphRef> {
        self.multiplexer.create_mgraph(name)
    }

    /// Creates an immutable graph holding `triples`.
    pub fn create_graph(&self, name: &Iri, triples: &ImmutableGraph) -> Result<ImmutableGraph> {
        self.multiplexer.create_graph(name, triples)
    }

    /// Deletes the collection `name`.
    pub fn delete(&self, name: &Iri) -> Result<()> {
        self.multiplexer.delete(name)
    }

    /// Returns every known name.
    pub fn list_names(&self) -> Result<HashSet<Iri>> {
        self.multiplexer.list_names()
    }

    /// Returns every known immutable graph name.
    pub fn list_graphs(&self) -> Result<HashSet<Iri>> {
        self.multiplexer.list_graphs()
    }

    /// Returns every known mutable graph name.
    pub fn list_mgraphs(&self) -> Result<HashSet<Iri>> {
        self.multiplexer.list_mgraphs()
    }

    /// Returns every name under which a graph equal to `graph` is held.
    pub fn get_names(&self, graph: &ImmutableGraph) -> Result<HashSet<Iri>> {
        self.multiplexer.get_names(graph)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Installs the query engine, replacing any previous one.
    pub fn set_query_engine(&self, engine: Arc<dyn QueryEngine>) -> Result<()> {
        let mut slot = self
            .query_engine
            .write()
            .map_err(|_| Error::poisoned("set_query_engine"))?;
        *slot = Some(engine);
        Ok(())
    }

    /// Removes the query engine.
    pub fn clear_query_engine(&self) -> Result<()> {
        let mut slot = self
            .query_engine
            .write()
            .map_err(|_| Error::poisoned("clear_query_engine"))?;
        *slot = None;
        Ok(())
    }

    /// Runs `query` with `default_graph` as the default graph.
    ///
    /// Resolves the default graph and every graph the engine reports (every
    /// known name if it cannot tell), then holds the read lock of each
    /// mutable graph, in name order, while the engine runs.
    ///
    /// # Errors
    ///
    /// - `UnsupportedOperation` if no query engine is installed
    /// - `NoSuchEntity` if a referenced graph does not exist
    #[instrument(skip(self, query), fields(operation = "execute_query"))]
    pub fn execute_query(&self, query: &str, default_graph: &Iri) -> Result<QueryResult> {
        let engine = self
            .query_engine
            .read()
            .map_err(|_| Error::poisoned("execute_query"))?
            .clone()
            .ok_or_else(|| {
                Error::UnsupportedOperation("no query engine is installed".to_string())
            })?;

        let mut names: BTreeSet<Iri> = match engine.referenced_graphs(query)? {
            Some(referenced) => referenced.into_iter().collect(),
            None => self.list_names()?.into_iter().collect(),
        };
        names.insert(default_graph.clone());

        let mut graphs = BTreeMap::new();
        for name in names {
            let collection = self.get_triples(&name)?;
            graphs.insert(name, collection);
        }
        let dataset = QueryDataset::new(default_graph.clone(), graphs);

        let _guards: Vec<ReadGuard<'_>> = dataset
            .iter()
            .filter_map(|(_, collection)| collection.as_mgraph())
            .map(|graph| graph.lock().read())
            .collect::<Result<_>>()?;
        tracing::debug!(graphs = dataset.len(), "Executing query");

        engine.execute(&dataset, query)
    }

    /// Closes every registered provider.
    pub fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down graph manager");
        self.multiplexer.close_providers()
    }
}

impl Default for TcManager {
    fn default() -> Self {
        Self::new()
    }
}
