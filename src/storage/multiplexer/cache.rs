//! Named-graph cache and per-name resolution gates.

use crate::graph::{LockableGraph, LockableGraphRef};
use crate::models::Iri;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard, Weak};

/// What the multiplexer remembers about one published name.
#[derive(Clone)]
pub struct CacheEntry {
    /// Name of the provider the name is published under.
    pub owner: String,
    /// The handle given out for a mutable graph; `None` for immutable
    /// graphs.
    pub graph: Option<Weak<dyn LockableGraph>>,
}

impl CacheEntry {
    pub fn mutable(owner: &str, graph: &LockableGraphRef) -> Self {
        Self {
            owner: owner.to_string(),
            graph: Some(Arc::downgrade(graph)),
        }
    }

    pub fn immutable(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            graph: None,
        }
    }

    /// Returns the cached handle if it has not been reclaimed.
    pub fn live(&self) -> Option<LockableGraphRef> {
        self.graph.as_ref().and_then(Weak::upgrade)
    }
}

pub type CacheMap = HashMap<Iri, CacheEntry>;

/// Name to entry map.
///
/// Only map operations happen under the lock; provider calls never do.
#[derive(Default)]
pub struct GraphCache {
    entries: RwLock<CacheMap>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live handle cached for `name`, if any.
    pub fn live_handle(&self, name: &Iri) -> Result<Option<LockableGraphRef>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::poisoned("cache_lookup"))?;
        Ok(entries.get(name).and_then(CacheEntry::live))
    }

    /// Returns the name of the provider `name` is published under.
    pub fn owner_of(&self, name: &Iri) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::poisoned("cache_owner"))?;
        Ok(entries.get(name).map(|e| e.owner.clone()))
    }

    /// Returns every name published under `owner`, sorted.
    pub fn names_owned_by(&self, owner: &str) -> Result<Vec<Iri>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::poisoned("cache_names_owned_by"))?;
        let mut names: Vec<Iri> = entries
            .iter()
            .filter(|(_, e)| e.owner == owner)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Returns the number of entries, live or not.
    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Takes the exclusive section.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, CacheMap>> {
        self.entries
            .write()
            .map_err(|_| Error::poisoned("cache_write"))
    }
}

/// Serializes resolutions of the same name without blocking other names.
#[derive(Default)]
pub struct NameGates {
    gates: Mutex<HashMap<Iri, Arc<Mutex<()>>>>,
}

impl NameGates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the gate for `name`.
    ///
    /// Gates are not reentrant: `f` must not pass through the gate of the
    /// same name again.
    pub fn with_gate<T>(&self, name: &Iri, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let gate = {
            let mut gates = self
                .gates
                .lock()
                .map_err(|_| Error::poisoned("gate_acquire"))?;
            Arc::clone(gates.entry(name.clone()).or_default())
        };

        let result = {
            // The gate guards no data, so a panic in an earlier holder is harmless.
            let _held = gate.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        self.release(name, &gate);
        result
    }

    fn release(&self, name: &Iri, gate: &Arc<Mutex<()>>) {
        let Ok(mut gates) = self.gates.lock() else {
            return;
        };
        // One reference in the map plus ours means nobody else is waiting.
        if Arc::strong_count(gate) == 2 {
            gates.remove(name);
        }
    }

    /// Returns the number of gates currently allocated.
    #[cfg(test)]
    pub fn gate_count(&self) -> usize {
        self.gates.lock().map(|g| g.len()).unwrap_or(0)
    }
}
