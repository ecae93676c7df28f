//! Weighted provider multiplexer.
//!
//! [`TcProviderMultiplexer`] federates a dynamic set of [`WeightedProvider`]s
//! into one namespace of named collections.
//!
//! # Resolution
//!
//! Providers are consulted in descending weight, ties broken by provider
//! name. `NoSuchEntity` and `InvalidArgument` move on to the next provider;
//! every other error is surfaced. A `BackendFailure` additionally evicts the
//! cache entry for the name.
//!
//! # Handle identity
//!
//! Mutable graphs are always returned as [`LockableGraphRef`]s. The cache
//! keeps a weak reference to each handle it gave out, so while any caller
//! holds a handle for a name, every resolution of that name returns the same
//! handle and therefore the same [`GraphLock`](crate::graph::GraphLock).
//!
//! # Locks
//!
//! | Lock | Guards | Held across provider calls |
//! |------|--------|----------------------------|
//! | lifecycle mutex | add/remove provider, create, delete | yes |
//! | per-name gate | resolution, create, and delete of one name | yes |
//! | cache `RwLock` | the name map only | never |
//!
//! Locks are always taken in that order. Notifications are queued inside the
//! cache lock and delivered once every lock is released.

mod cache;
mod notify;
mod registry;

pub use notify::GraphListener;

use crate::graph::{LockableGraphRef, MutableGraphRef};
use crate::models::{GraphFlavor, ImmutableGraph, Iri, ProvidedCollection, TripleCollection};
use crate::observability::EventBus;
use crate::storage::traits::WeightedProvider;
use crate::{Error, Result};
use cache::{CacheEntry, CacheMap, GraphCache, NameGates};
use notify::Notifier;
use registry::{ProviderRegistry, ProviderSnapshot, position_of};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::instrument;

/// Federates weighted providers and enforces one live handle per mutable
/// graph name.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use graphmux::storage::{InMemoryProvider, TcProviderMultiplexer};
///
/// let mux = TcProviderMultiplexer::new();
/// mux.add_provider(Arc::new(InMemoryProvider::new("memory", 10)))?;
///
/// let name = Iri::new("urn:example:g");
/// let created = mux.create_mgraph(&name)?;
/// assert!(Arc::ptr_eq(&created, &mux.get_mgraph(&name)?));
/// ```
pub struct TcProviderMultiplexer {
    registry: ProviderRegistry,
    cache: GraphCache,
    gates: NameGates,
    lifecycle: Mutex<()>,
    /// Bumped under the cache write lock whenever the registry changes.
    generation: AtomicU64,
    caching_enabled: AtomicBool,
    notifier: Notifier,
}

impl TcProviderMultiplexer {
    /// Creates a multiplexer with no providers and caching enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::with_event_bus(EventBus::default())
    }

    /// Creates a multiplexer that publishes notifications to `event_bus`.
    #[must_use]
    pub fn with_event_bus(event_bus: EventBus) -> Self {
        Self {
            registry: ProviderRegistry::new(),
            cache: GraphCache::new(),
            gates: NameGates::new(),
            lifecycle: Mutex::new(()),
            generation: AtomicU64::new(0),
            caching_enabled: AtomicBool::new(true),
            notifier: Notifier::new(event_bus),
        }
    }

    /// Returns the event bus notifications are published to.
    #[must_use]
    pub const fn event_bus(&self) -> &EventBus {
        self.notifier.event_bus()
    }

    /// Registers a listener for appear/disappear notifications.
    pub fn add_listener(&self, listener: Arc<dyn GraphListener>) {
        self.notifier.add_listener(listener);
    }

    /// Returns the registered providers in resolution order.
    pub fn providers(&self) -> Result<Vec<Arc<dyn WeightedProvider>>> {
        Ok(self.registry.snapshot()?.iter().cloned().collect())
    }

    /// Returns `true` if mutable graph handles are cached.
    #[must_use]
    pub fn is_caching_enabled(&self) -> bool {
        self.caching_enabled.load(Ordering::Acquire)
    }

    /// Turns the handle cache on or off. Turning it off clears it.
    ///
    /// While caching is off every resolution goes to the providers, provider
    /// registration changes emit no notifications, and handle identity is
    /// only guaranteed for providers that hand out lockable graphs
    /// themselves.
    pub fn set_caching_enabled(&self, enabled: bool) -> Result<()> {
        let mut entries = self.cache.write()?;
        self.caching_enabled.store(enabled, Ordering::Release);
        if !enabled {
            entries.clear();
        }
        tracing::info!(enabled, "Graph cache toggled");
        Ok(())
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Returns the unique lockable handle for the mutable graph `name`.
    ///
    /// # Errors
    ///
    /// `NoSuchEntity` if no provider holds a mutable graph under `name`.
    #[instrument(skip(self), fields(operation = "get_mgraph"))]
    pub fn get_mgraph(&self, name: &Iri) -> Result<LockableGraphRef> {
        loop {
            if let Some(handle) = self.cache.live_handle(name)? {
                metrics::counter!("graphmux_cache_hits_total").increment(1);
                return Ok(handle);
            }
            metrics::counter!("graphmux_cache_misses_total").increment(1);

            let resolved = self
                .gates
                .with_gate(name, || self.resolve_mgraph_gated(name))?;
            if let Some(handle) = resolved {
                return Ok(handle);
            }
            tracing::debug!(name = %name, "Providers changed during resolution, retrying");
        }
    }

    /// Resolves under the name gate. `None` means the registry changed while
    /// providers were consulted and the caller must retry.
    fn resolve_mgraph_gated(&self, name: &Iri) -> Result<Option<LockableGraphRef>> {
        if let Some(handle) = self.cache.live_handle(name)? {
            return Ok(Some(handle));
        }

        let generation = self.generation.load(Ordering::Acquire);
        let providers = self.registry.snapshot()?;
        let (owner, handle) = self.fetch_mgraph(&providers, name)?;

        let mut entries = self.cache.write()?;
        if self.generation.load(Ordering::Acquire) != generation {
            return Ok(None);
        }
        if self.is_caching_enabled() {
            entries.insert(name.clone(), CacheEntry::mutable(&owner, &handle));
        }
        drop(entries);

        tracing::debug!(name = %name, provider = %owner, "Resolved mutable graph");
        Ok(Some(handle))
    }

    fn fetch_mgraph(
        &self,
        providers: &ProviderSnapshot,
        name: &Iri,
    ) -> Result<(String, LockableGraphRef)> {
        for provider in providers.iter() {
            match provider.get_mgraph(name) {
                Ok(graph) => return Ok((provider.name().to_string(), graph.into_lockable())),
                Err(e) if e.is_skippable() => {},
                Err(e) => return Err(self.on_provider_error(name, e)),
            }
        }
        Err(Error::NoSuchEntity(name.clone()))
    }

    /// Returns the immutable graph `name` from the highest-ranked provider
    /// that has one. Immutable results are never cached.
    #[instrument(skip(self), fields(operation = "get_graph"))]
    pub fn get_graph(&self, name: &Iri) -> Result<ImmutableGraph> {
        let providers = self.registry.snapshot()?;
        for provider in providers.iter() {
            match provider.get_graph(name) {
                Ok(graph) => return Ok(graph),
                Err(e) if e.is_skippable() => {},
                Err(e) => return Err(self.on_provider_error(name, e)),
            }
        }
        Err(Error::NoSuchEntity(name.clone()))
    }

    /// Returns the collection `name` in whichever flavor the winning
    /// provider holds it.
    ///
    /// Mutable results go through [`get_mgraph`](Self::get_mgraph), so they
    /// share the cached handle.
    #[instrument(skip(self), fields(operation = "get_triples"))]
    pub fn get_triples(&self, name: &Iri) -> Result<TripleCollection> {
        if let Some(handle) = self.cache.live_handle(name)? {
            metrics::counter!("graphmux_cache_hits_total").increment(1);
            return Ok(TripleCollection::MGraph(handle));
        }

        let providers = self.registry.snapshot()?;
        for provider in providers.iter() {
            match provider.get_triples(name) {
                Ok(ProvidedCollection::Graph(graph)) => return Ok(TripleCollection::Graph(graph)),
                Ok(ProvidedCollection::MGraph(_)) => {
                    return self.get_mgraph(name).map(TripleCollection::MGraph);
                },
                Err(e) if e.is_skippable() => {},
                Err(e) => return Err(self.on_provider_error(name, e)),
            }
        }
        Err(Error::NoSuchEntity(name.clone()))
    }

    /// Evicts the suspect cache entry after a backend failure, then hands
    /// the error back.
    fn on_provider_error(&self, name: &Iri, err: Error) -> Error {
        if err.is_backend_failure() {
            tracing::warn!(name = %name, error = %err, "Provider failed, evicting cache entry");
            match self.cache.write() {
                Ok(mut entries) => {
                    entries.remove(name);
                },
                Err(poisoned) => return poisoned,
            }
        }
        err
    }

    // =========================================================================
    // Creation and deletion
    // =========================================================================

    /// Creates an empty mutable graph with the first provider that accepts.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if a provider already holds `name`
    /// - `UnsupportedOperation` if every provider refuses
    #[instrument(skip(self), fields(operation = "create_mgraph"))]
    pub fn create_mgraph(&self, name: &Iri) -> Result<LockableGraphRef> {
        let created = self.create_with(name, GraphFlavor::Mutable, |provider| {
            provider
                .create_mgraph(name)
                .map(|graph| Published::Mutable(graph.into_lockable()))
        });
        match created? {
            Published::Mutable(handle) => Ok(handle),
            Published::Immutable(_) => Err(Error::OperationFailed {
                operation: "create_mgraph".to_string(),
                cause: "provider returned an immutable graph".to_string(),
            }),
        }
    }

    /// Creates an immutable graph holding `triples` with the first provider
    /// that accepts.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if a provider already holds `name`
    /// - `UnsupportedOperation` if every provider refuses
    #[instrument(
        skip(self, triples),
        fields(operation = "create_graph", triples = triples.len())
    )]
    pub fn create_graph(&self, name: &Iri, triples: &ImmutableGraph) -> Result<ImmutableGraph> {
        let created = self.create_with(name, GraphFlavor::Immutable, |provider| {
            provider
                .create_graph(name, triples.clone())
                .map(Published::Immutable)
        });
        match created? {
            Published::Immutable(graph) => Ok(graph),
            Published::Mutable(_) => Err(Error::OperationFailed {
                operation: "create_graph".to_string(),
                cause: "provider returned a mutable graph".to_string(),
            }),
        }
    }

    fn create_with<F>(&self, name: &Iri, flavor: GraphFlavor, create: F) -> Result<Published>
    where
        F: Fn(&dyn WeightedProvider) -> Result<Published>,
    {
        let result = {
            let _lifecycle = self.lifecycle();
            self.gates.with_gate(name, || {
                let providers = self.registry.snapshot()?;
                for provider in providers.iter() {
                    match create(provider.as_ref()) {
                        Ok(published) => {
                            self.record_created(name, provider.name(), &published)?;
                            tracing::info!(
                                name = %name,
                                provider = %provider.name(),
                                flavor = %flavor,
                                "Created collection"
                            );
                            return Ok(published);
                        },
                        Err(e) if e.is_refusal() => {},
                        Err(e) => return Err(self.on_provider_error(name, e)),
                    }
                }
                Err(Error::UnsupportedOperation(format!(
                    "no provider can create {flavor} {name}"
                )))
            })
        };
        self.notifier.drain();
        result
    }

    fn record_created(&self, name: &Iri, owner: &str, published: &Published) -> Result<()> {
        let mut entries = self.cache.write()?;
        self.notifier.disappeared(name);
        if self.is_caching_enabled() {
            entries.insert(name.clone(), published.entry(owner));
        }
        self.notifier.appeared(name, published.flavor());
        Ok(())
    }

    /// Deletes `name` with the first provider that can.
    ///
    /// # Errors
    ///
    /// - `EntityUndeletable` if the provider holding `name` refuses
    /// - `UnsupportedOperation` if `name` exists but no provider deleted it
    /// - `NoSuchEntity` if no provider holds `name`
    #[instrument(skip(self), fields(operation = "delete"))]
    pub fn delete(&self, name: &Iri) -> Result<()> {
        let result = {
            let _lifecycle = self.lifecycle();
            self.gates.with_gate(name, || self.delete_gated(name))
        };
        self.notifier.drain();
        result
    }

    fn delete_gated(&self, name: &Iri) -> Result<()> {
        let providers = self.registry.snapshot()?;
        for provider in providers.iter() {
            match provider.delete(name) {
                Ok(()) => {
                    let mut entries = self.cache.write()?;
                    let owner = entries.get(name).map(|e| e.owner.clone());
                    match owner {
                        Some(owner) if owner == provider.name() => {
                            entries.remove(name);
                            self.notifier.disappeared(name);
                        },
                        Some(_) => {},
                        // Nothing cached: the name may have been published
                        // by resolution alone, so retract it anyway.
                        None => self.notifier.disappeared(name),
                    }
                    drop(entries);
                    tracing::info!(name = %name, provider = %provider.name(), "Deleted collection");
                    return Ok(());
                },
                Err(
                    Error::UnsupportedOperation(_)
                    | Error::NoSuchEntity(_)
                    | Error::InvalidArgument(_),
                ) => {},
                Err(e) => return Err(self.on_provider_error(name, e)),
            }
        }

        if Self::exists_in_any(&providers, name)? {
            return Err(Error::UnsupportedOperation(format!(
                "no provider can delete {name}"
            )));
        }
        Err(Error::NoSuchEntity(name.clone()))
    }

    fn exists_in_any(providers: &ProviderSnapshot, name: &Iri) -> Result<bool> {
        for provider in providers.iter() {
            match provider.get_triples(name) {
                Ok(_) => return Ok(true),
                Err(e) if e.is_skippable() => {},
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Returns every name served by any provider.
    pub fn list_names(&self) -> Result<HashSet<Iri>> {
        self.union_over_providers(|p| p.list_names())
    }

    /// Returns every immutable graph name served by any provider.
    pub fn list_graphs(&self) -> Result<HashSet<Iri>> {
        self.union_over_providers(|p| p.list_graphs())
    }

    /// Returns every mutable graph name served by any provider.
    pub fn list_mgraphs(&self) -> Result<HashSet<Iri>> {
        self.union_over_providers(|p| p.list_mgraphs())
    }

    /// Returns every name under which some provider holds a graph equal to
    /// `graph`.
    pub fn get_names(&self, graph: &ImmutableGraph) -> Result<HashSet<Iri>> {
        self.union_over_providers(|p| p.get_names(graph))
    }

    fn union_over_providers<F>(&self, list: F) -> Result<HashSet<Iri>>
    where
        F: Fn(&dyn WeightedProvider) -> HashSet<Iri>,
    {
        let providers = self.registry.snapshot()?;
        Ok(providers.iter().flat_map(|p| list(p.as_ref())).collect())
    }

    // =========================================================================
    // Provider lifecycle
    // =========================================================================

    /// Registers a provider and publishes the names it now wins.
    ///
    /// For each name the provider lists: a cache entry owned by a
    /// lower-ranked provider is retracted (disappear) and the name is
    /// republished under the new provider (appear); an entry owned by a
    /// higher-ranked provider is left alone; a name with no entry is
    /// published under the new provider.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if a provider with the same name is registered
    /// - the first error the provider raised while a name it lists was
    ///   fetched; the provider stays registered and the names it could not
    ///   serve keep their current owner
    #[instrument(
        skip(self, provider),
        fields(
            operation = "add_provider",
            provider = %provider.name(),
            weight = provider.weight()
        )
    )]
    pub fn add_provider(&self, provider: Arc<dyn WeightedProvider>) -> Result<()> {
        let result = {
            let _lifecycle = self.lifecycle();
            self.provider_added(&provider)
        };
        self.notifier.drain();
        result
    }

    fn provider_added(&self, provider: &Arc<dyn WeightedProvider>) -> Result<()> {
        let count = self.registry.insert(Arc::clone(provider))?;
        self.bump_generation()?;
        metrics::gauge!("graphmux_providers_registered").set(count as f64);
        tracing::info!(
            provider = %provider.name(),
            weight = provider.weight(),
            "Registered provider"
        );

        if !self.is_caching_enabled() {
            return Ok(());
        }

        let providers = self.registry.snapshot()?;
        let Some(added_at) = position_of(&providers, provider.name()) else {
            return Ok(());
        };

        let mut names: Vec<Iri> = provider.list_names().into_iter().collect();
        names.sort();
        let mut first_failure = None;
        for name in names {
            if self.is_outranked(&providers, added_at, &name)? {
                continue;
            }
            // Fetch before touching the entry so a failing provider leaves
            // the current owner published.
            match Self::fetch_published(provider.as_ref(), &name) {
                Ok(Some(published)) => {
                    self.publish_over(&providers, added_at, &name, provider.name(), &published)?;
                },
                Ok(None) => {},
                Err(e) => {
                    tracing::warn!(
                        name = %name,
                        provider = %provider.name(),
                        error = %e,
                        "Provider failed while publishing name, keeping current owner"
                    );
                    first_failure.get_or_insert(e);
                },
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Returns `true` if `name` is published under a provider ranked above
    /// position `added_at`.
    fn is_outranked(
        &self,
        providers: &ProviderSnapshot,
        added_at: usize,
        name: &Iri,
    ) -> Result<bool> {
        Ok(self
            .cache
            .owner_of(name)?
            .and_then(|owner| position_of(providers, &owner))
            .is_some_and(|owner_at| owner_at < added_at))
    }

    /// Publishes `name` under the provider at `added_at`, retracting the
    /// entry of a lower-ranked owner first.
    fn publish_over(
        &self,
        providers: &ProviderSnapshot,
        added_at: usize,
        name: &Iri,
        owner: &str,
        published: &Published,
    ) -> Result<()> {
        let mut entries = self.cache.write()?;
        let owner_at = entries.get(name).map(|e| position_of(providers, &e.owner));
        match owner_at {
            Some(Some(owner_at)) if owner_at < added_at => return Ok(()),
            Some(owner_at) if owner_at.is_none_or(|at| at > added_at) => {
                entries.remove(name);
                self.notifier.disappeared(name);
            },
            // No entry, or a resolution through the new provider that ran
            // after it was registered. Its live handle is kept.
            _ => {},
        }
        Self::insert_published(&mut entries, name, owner, published);
        self.notifier.appeared(name, published.flavor());
        Ok(())
    }

    /// Deregisters the provider called `name` and moves the names it had
    /// published to the next provider that serves them.
    ///
    /// The provider is returned, not closed.
    ///
    /// # Errors
    ///
    /// The first error a successor provider raised while its name was being
    /// republished. The provider is deregistered even then, and the names
    /// whose successor failed stay unpublished until they are resolved again.
    #[instrument(skip(self), fields(operation = "remove_provider"))]
    pub fn remove_provider(&self, name: &str) -> Result<Option<Arc<dyn WeightedProvider>>> {
        let result = {
            let _lifecycle = self.lifecycle();
            self.provider_removed(name)
        };
        self.notifier.drain();
        result
    }

    fn provider_removed(&self, name: &str) -> Result<Option<Arc<dyn WeightedProvider>>> {
        let Some(removed) = self.registry.remove(name)? else {
            tracing::debug!(provider = %name, "Provider was not registered");
            return Ok(None);
        };
        self.bump_generation()?;
        let providers = self.registry.snapshot()?;
        metrics::gauge!("graphmux_providers_registered").set(providers.len() as f64);
        tracing::info!(provider = %name, "Deregistered provider");

        if !self.is_caching_enabled() {
            return Ok(Some(removed));
        }

        let mut names: Vec<Iri> = removed.list_names().into_iter().collect();
        names.extend(self.cache.names_owned_by(name)?);
        names.sort();
        names.dedup();

        let mut first_failure = None;
        for graph_name in names {
            let evicted = {
                let mut entries = self.cache.write()?;
                if entries.get(&graph_name).is_some_and(|e| e.owner == name) {
                    entries.remove(&graph_name);
                    self.notifier.disappeared(&graph_name);
                    true
                } else {
                    false
                }
            };
            if evicted && let Err(e) = self.publish_successor(&providers, &graph_name) {
                first_failure.get_or_insert(e);
            }
        }
        first_failure.map_or(Ok(Some(removed)), Err)
    }

    /// Publishes `name` under the highest-ranked provider that serves it.
    ///
    /// A failing provider ends the walk; a lower-ranked one never takes over
    /// a name a higher-ranked one could not answer for.
    fn publish_successor(&self, providers: &ProviderSnapshot, name: &Iri) -> Result<()> {
        for provider in providers.iter() {
            match Self::fetch_published(provider.as_ref(), name) {
                Ok(Some(published)) => {
                    let mut entries = self.cache.write()?;
                    Self::insert_published(&mut entries, name, provider.name(), &published);
                    self.notifier.appeared(name, published.flavor());
                    return Ok(());
                },
                Ok(None) => {},
                Err(e) => {
                    tracing::warn!(
                        name = %name,
                        provider = %provider.name(),
                        error = %e,
                        "Successor provider failed, name left unpublished"
                    );
                    return Err(e);
                },
            }
        }
        tracing::debug!(name = %name, "No successor provider, name is gone");
        Ok(())
    }

    /// Fetches `name` from `provider`. `None` if the provider does not serve
    /// it.
    fn fetch_published(provider: &dyn WeightedProvider, name: &Iri) -> Result<Option<Published>> {
        match provider.get_triples(name) {
            Ok(ProvidedCollection::Graph(graph)) => Ok(Some(Published::Immutable(graph))),
            Ok(ProvidedCollection::MGraph(graph)) => {
                Ok(Some(Published::from_provider_mgraph(graph)))
            },
            Err(e) if e.is_skippable() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Keeps a live handle that a concurrent resolution already installed
    /// for the same owner.
    fn insert_published(entries: &mut CacheMap, name: &Iri, owner: &str, published: &Published) {
        let keep = entries
            .get(name)
            .is_some_and(|e| e.owner == owner && e.live().is_some());
        if !keep {
            entries.insert(name.clone(), published.entry(owner));
        }
    }

    fn bump_generation(&self) -> Result<()> {
        let _entries = self.cache.write()?;
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn lifecycle(&self) -> MutexGuard<'_, ()> {
        // The lifecycle mutex guards no data of its own.
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Closes every registered provider.
    pub fn close_providers(&self) -> Result<()> {
        for provider in self.registry.snapshot()?.iter() {
            tracing::info!(provider = %provider.name(), "Closing provider");
            provider.close();
        }
        Ok(())
    }

    #[cfg(test)]
    fn cached_entry_count(&self) -> usize {
        self.cache.entry_count()
    }
}

impl Default for TcProviderMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

/// A freshly created or republished collection.
enum Published {
    Immutable(ImmutableGraph),
    Mutable(LockableGraphRef),
}

impl Published {
    fn from_provider_mgraph(graph: MutableGraphRef) -> Self {
        Self::Mutable(graph.into_lockable())
    }

    const fn flavor(&self) -> GraphFlavor {
        match self {
            Self::Immutable(_) => GraphFlavor::Immutable,
            Self::Mutable(_) => GraphFlavor::Mutable,
        }
    }

    fn entry(&self, owner: &str) -> CacheEntry {
        match self {
            Self::Immutable(_) => CacheEntry::immutable(owner),
            Self::Mutable(handle) => CacheEntry::mutable(owner, handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LockableGraph, MutableGraph};
    use crate::models::{Literal, Triple};
    use crate::storage::InMemoryProvider;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.seen.lock().unwrap())
        }
    }

    impl GraphListener for Recorder {
        fn graph_appears(&self, name: &Iri) {
            self.seen.lock().unwrap().push(format!("graph+ {name}"));
        }

        fn mgraph_appears(&self, name: &Iri) {
            self.seen.lock().unwrap().push(format!("mgraph+ {name}"));
        }

        fn tc_disappears(&self, name: &Iri) {
            self.seen.lock().unwrap().push(format!("- {name}"));
        }
    }

    fn triple(o: &str) -> Triple {
        Triple::new(Iri::new("urn:s"), Iri::new("urn:p"), Literal::plain(o))
    }

    fn mux_with(providers: &[(&str, i32)]) -> TcProviderMultiplexer {
        let mux = TcProviderMultiplexer::new();
        for (name, weight) in providers {
            mux.add_provider(Arc::new(InMemoryProvider::new(*name, *weight)))
                .unwrap();
        }
        mux
    }

    #[test]
    fn test_empty_multiplexer() {
        let mux = TcProviderMultiplexer::new();
        let name = Iri::new("urn:g");
        assert!(matches!(mux.get_mgraph(&name), Err(Error::NoSuchEntity(_))));
        assert!(matches!(mux.get_graph(&name), Err(Error::NoSuchEntity(_))));
        assert!(matches!(mux.get_triples(&name), Err(Error::NoSuchEntity(_))));
        assert!(matches!(
            mux.create_mgraph(&name),
            Err(Error::UnsupportedOperation(_))
        ));
        assert!(matches!(mux.delete(&name), Err(Error::NoSuchEntity(_))));
        assert!(mux.list_names().unwrap().is_empty());
    }

    #[test]
    fn test_resolution_returns_same_handle() {
        let mux = mux_with(&[("memory", 1)]);
        let name = Iri::new("urn:g");
        let created = mux.create_mgraph(&name).unwrap();
        let first = mux.get_mgraph(&name).unwrap();
        let second = mux.get_mgraph(&name).unwrap();

        assert!(Arc::ptr_eq(&created, &first));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(std::ptr::eq(first.lock(), second.lock()));
    }

    #[test]
    fn test_reclaimed_handle_is_rematerialized() {
        let mux = mux_with(&[("memory", 1)]);
        let name = Iri::new("urn:g");
        mux.create_mgraph(&name).unwrap().add(triple("a")).unwrap();

        let again = mux.get_mgraph(&name).unwrap();
        assert_eq!(again.size().unwrap(), 1);
    }

    #[test]
    fn test_create_emits_disappear_then_appear() {
        let mux = mux_with(&[("memory", 1)]);
        let recorder = Arc::new(Recorder::default());
        mux.add_listener(recorder.clone());

        mux.create_mgraph(&Iri::new("urn:m")).unwrap();
        mux.create_graph(&Iri::new("urn:g"), &ImmutableGraph::empty())
            .unwrap();

        assert_eq!(
            recorder.take(),
            vec!["- urn:m", "mgraph+ urn:m", "- urn:g", "graph+ urn:g"]
        );
    }

    #[test]
    fn test_create_existing_name_fails() {
        let mux = mux_with(&[("memory", 1)]);
        let name = Iri::new("urn:g");
        mux.create_mgraph(&name).unwrap();
        assert!(matches!(
            mux.create_mgraph(&name),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_get_triples_routes_mutable_through_cache() {
        let mux = mux_with(&[("memory", 1)]);
        let name = Iri::new("urn:g");
        let handle = mux.create_mgraph(&name).unwrap();

        match mux.get_triples(&name).unwrap() {
            TripleCollection::MGraph(graph) => assert!(Arc::ptr_eq(&graph, &handle)),
            TripleCollection::Graph(_) => panic!("expected a mutable graph"),
        }
    }

    #[test]
    fn test_delete_evicts_and_notifies() {
        let mux = mux_with(&[("memory", 1)]);
        let recorder = Arc::new(Recorder::default());
        let name = Iri::new("urn:g");
        let _handle = mux.create_mgraph(&name).unwrap();
        mux.add_listener(recorder.clone());

        mux.delete(&name).unwrap();
        assert_eq!(recorder.take(), vec!["- urn:g"]);
        assert_eq!(mux.cached_entry_count(), 0);
        assert!(matches!(mux.get_triples(&name), Err(Error::NoSuchEntity(_))));
    }

    #[test]
    fn test_delete_undeletable_is_surfaced() {
        let mux = TcProviderMultiplexer::new();
        let name = Iri::new("urn:sys");
        mux.add_provider(Arc::new(
            InMemoryProvider::new("memory", 1).with_undeletable(name.clone()),
        ))
        .unwrap();
        mux.create_mgraph(&name).unwrap();

        assert!(matches!(
            mux.delete(&name),
            Err(Error::EntityUndeletable(_))
        ));
        assert!(mux.get_mgraph(&name).is_ok());
    }

    #[test]
    fn test_caching_disabled_clears_cache() {
        let mux = mux_with(&[("memory", 1)]);
        let name = Iri::new("urn:g");
        let _handle = mux.create_mgraph(&name).unwrap();
        assert_eq!(mux.cached_entry_count(), 1);

        mux.set_caching_enabled(false).unwrap();
        assert!(!mux.is_caching_enabled());
        assert_eq!(mux.cached_entry_count(), 0);

        let _again = mux.get_mgraph(&name).unwrap();
        assert_eq!(mux.cached_entry_count(), 0);
    }

    #[test]
    fn test_duplicate_provider_name_rejected() {
        let mux = mux_with(&[("memory", 1)]);
        let err = mux
            .add_provider(Arc::new(InMemoryProvider::new("memory", 5)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(mux.providers().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_unknown_provider() {
        let mux = mux_with(&[("memory", 1)]);
        assert!(mux.remove_provider("other").unwrap().is_none());
    }

    #[test]
    fn test_close_providers() {
        let provider = Arc::new(InMemoryProvider::new("memory", 1));
        let mux = TcProviderMultiplexer::new();
        mux.add_provider(provider.clone()).unwrap();

        mux.close_providers().unwrap();
        assert!(provider.is_closed());
    }
}
