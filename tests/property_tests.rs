//! Property-based tests for provider resolution.
//!
//! Uses proptest to verify invariants across random provider sets:
//! - Resolution order is weight descending, then name ascending
//! - `list_names` is exactly the union of provider listings
//! - The highest-ranked provider holding a name serves it
//! - Delete makes a name unresolvable

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use graphmux::storage::InMemoryProvider;
use graphmux::{ImmutableGraph, Iri, Literal, TcProviderMultiplexer, Triple, WeightedProvider};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Unique provider names mapped to weights and the graph names they hold.
fn provider_sets() -> impl Strategy<Value = BTreeMap<String, (i32, Vec<u8>)>> {
    prop::collection::btree_map(
        "[a-z]{1,8}",
        (-5i32..5, prop::collection::vec(0u8..12, 0..6)),
        1..8,
    )
}

fn graph_name(n: u8) -> Iri {
    Iri::new(format!("urn:g{n}"))
}

/// A graph that records which provider it came from.
fn marker(provider: &str) -> ImmutableGraph {
    ImmutableGraph::from_triples([Triple::new(
        Iri::new("urn:s"),
        Iri::new("urn:from"),
        Literal::plain(provider),
    )])
}

fn build(set: &BTreeMap<String, (i32, Vec<u8>)>) -> TcProviderMultiplexer {
    let mux = TcProviderMultiplexer::new();
    for (key, (weight, names)) in set {
        let provider = InMemoryProvider::new(key.clone(), *weight);
        for n in names {
            // Duplicate indices in one provider are expected to collide.
            let _ = provider.create_graph(&graph_name(*n), marker(key));
        }
        mux.add_provider(Arc::new(provider)).unwrap();
    }
    mux
}

proptest! {
    /// Property: providers are ordered by weight descending, ties by name.
    #[test]
    fn prop_resolution_order(set in provider_sets()) {
        let mux = build(&set);
        let actual: Vec<(i32, String)> = mux
            .providers()
            .unwrap()
            .iter()
            .map(|p| (p.weight(), p.name().to_string()))
            .collect();

        let mut expected: Vec<(i32, String)> = set
            .iter()
            .map(|(key, (weight, _))| (*weight, key.clone()))
            .collect();
        expected.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        prop_assert_eq!(actual, expected);
    }

    /// Property: `list_names` contains a name iff some provider lists it.
    #[test]
    fn prop_list_names_is_union(set in provider_sets()) {
        let mux = build(&set);
        let expected: HashSet<Iri> = set
            .values()
            .flat_map(|(_, names)| names.iter().map(|n| graph_name(*n)))
            .collect();

        prop_assert_eq!(mux.list_names().unwrap(), expected.clone());
        prop_assert_eq!(mux.list_graphs().unwrap(), expected);
        prop_assert!(mux.list_mgraphs().unwrap().is_empty());
    }

    /// Property: a name is served by the highest-ranked provider holding it.
    #[test]
    fn prop_highest_ranked_provider_wins(set in provider_sets(), n in 0u8..12) {
        let mux = build(&set);
        let name = graph_name(n);

        let winner = mux
            .providers()
            .unwrap()
            .iter()
            .find(|p| p.list_names().contains(&name))
            .map(|p| p.name().to_string());

        match winner {
            Some(key) => prop_assert_eq!(mux.get_graph(&name).unwrap(), marker(&key)),
            None => prop_assert!(mux.get_graph(&name).unwrap_err().is_not_found()),
        }
    }

    /// Property: after a successful delete the winning copy is gone.
    #[test]
    fn prop_delete_removes_winning_copy(set in provider_sets(), n in 0u8..12) {
        let mux = build(&set);
        let name = graph_name(n);
        let holders = set
            .values()
            .filter(|(_, names)| names.contains(&n))
            .count();

        if holders == 0 {
            prop_assert!(mux.delete(&name).unwrap_err().is_not_found());
        } else {
            // Every holder deletes one copy; then the name is gone.
            for _ in 0..holders {
                mux.delete(&name).unwrap();
            }
            prop_assert!(mux.get_triples(&name).unwrap_err().is_not_found());
            prop_assert!(!mux.list_names().unwrap().contains(&name));
        }
    }
}
