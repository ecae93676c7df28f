//! Storage backend traits.

mod provider;

pub use provider::WeightedProvider;
