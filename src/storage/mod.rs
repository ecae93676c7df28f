//! Storage layer: providers and the multiplexer that federates them.
//!
//! - **Providers** ([`WeightedProvider`]): backends that own named triple
//!   collections, ranked by weight
//! - **Multiplexer** ([`TcProviderMultiplexer`]): one namespace over all
//!   registered providers, with a weak handle cache
//! - **In-memory provider** ([`InMemoryProvider`]): the reference backend

// Allow cast precision loss for gauge values.
#![allow(clippy::cast_precision_loss)]
// Allow significant_drop_tightening - guards are dropped explicitly where
// notifications must not be delivered under the cache lock.
#![allow(clippy::significant_drop_tightening)]
// Allow match_same_arms for explicit error-kind handling.
#![allow(clippy::match_same_arms)]

pub mod memory;
pub mod multiplexer;
pub mod traits;

pub use memory::InMemoryProvider;
pub use multiplexer::{GraphListener, TcProviderMultiplexer};
pub use traits::WeightedProvider;
