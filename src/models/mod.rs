//! Data models for graphmux.
//!
//! RDF terms, triples, the two collection flavors and the events emitted
//! when named collections appear or disappear.

mod collection;
mod events;
mod term;

pub use collection::{GraphFlavor, ImmutableGraph, ProvidedCollection, TripleCollection};
pub use events::{EventMeta, GraphEvent};
pub use term::{BlankNode, Iri, Literal, Subject, Term, Triple};
