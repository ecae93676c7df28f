//! Ordered, copy-on-write provider registry.

use crate::storage::traits::WeightedProvider;
use crate::{Error, Result};
use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

/// Immutable view of the registered providers in resolution order.
pub type ProviderSnapshot = Arc<Vec<Arc<dyn WeightedProvider>>>;

/// Resolution order: weight descending, then name ascending.
pub fn resolution_order(a: &dyn WeightedProvider, b: &dyn WeightedProvider) -> Ordering {
    b.weight()
        .cmp(&a.weight())
        .then_with(|| a.name().cmp(b.name()))
}

/// Returns the position of the provider called `name` in `providers`.
pub fn position_of(providers: &[Arc<dyn WeightedProvider>], name: &str) -> Option<usize> {
    providers.iter().position(|p| p.name() == name)
}

/// Providers sorted by [`resolution_order`].
///
/// Readers take a cheap snapshot and iterate it without holding any lock;
/// writers replace the whole vector.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<ProviderSnapshot>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current providers in resolution order.
    pub fn snapshot(&self) -> Result<ProviderSnapshot> {
        self.providers
            .read()
            .map(|p| Arc::clone(&p))
            .map_err(|_| Error::poisoned("registry_snapshot"))
    }

    /// Inserts a provider at its ordered position.
    ///
    /// Fails with `InvalidArgument` if a provider with the same name is
    /// already registered.
    pub fn insert(&self, provider: Arc<dyn WeightedProvider>) -> Result<usize> {
        let mut providers = self
            .providers
            .write()
            .map_err(|_| Error::poisoned("registry_insert"))?;
        if position_of(&providers, provider.name()).is_some() {
            return Err(Error::InvalidArgument(format!(
                "a provider named '{}' is already registered",
                provider.name()
            )));
        }

        let mut next: Vec<_> = providers.iter().cloned().collect();
        let index = next
            .binary_search_by(|p| resolution_order(p.as_ref(), provider.as_ref()))
            .unwrap_or_else(|i| i);
        next.insert(index, provider);
        let len = next.len();
        *providers = Arc::new(next);
        Ok(len)
    }

    /// Removes the provider called `name`, returning it if it was registered.
    pub fn remove(&self, name: &str) -> Result<Option<Arc<dyn WeightedProvider>>> {
        let mut providers = self
            .providers
            .write()
            .map_err(|_| Error::poisoned("registry_remove"))?;
        let Some(index) = position_of(&providers, name) else {
            return Ok(None);
        };

        let mut next: Vec<_> = providers.iter().cloned().collect();
        let removed = next.remove(index);
        *providers = Arc::new(next);
        Ok(Some(removed))
    }
}
