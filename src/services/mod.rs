//! Caller-facing services.
//!
//! - [`TcManager`]: the front door over the multiplexer
//! - [`QueryEngine`]: the seam for an external query engine

mod manager;
mod query;

pub use manager::TcManager;
pub use query::{QueryDataset, QueryEngine, QueryResult};
