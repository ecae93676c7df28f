//! Concurrency tests for the multiplexer.
//!
//! Hammers resolution, creation and provider registration from several
//! threads to find races and deadlocks:
//! - Concurrent resolutions of one name share a single handle
//! - Concurrent creates of one name have a single winner
//! - Resolution racing provider registration settles on the winner
//! - Resolution while a provider is still publishing its names
//! - Mixed read/write workloads on one graph

// Concurrency tests use expect/unwrap for simplicity - panics are acceptable in tests
// Excessive nesting is acceptable in concurrent test code with thread spawns
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::excessive_nesting
)]

use graphmux::storage::InMemoryProvider;
use graphmux::{
    Error, ImmutableGraph, Iri, Literal, LockableGraph, MutableGraph, MutableGraphRef,
    ProvidedCollection, Result, TcProviderMultiplexer, Triple, WeightedProvider,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

fn triple(o: &str) -> Triple {
    Triple::new(Iri::new("urn:s"), Iri::new("urn:p"), Literal::plain(o))
}

fn single_provider_mux() -> Arc<TcProviderMultiplexer> {
    let mux = Arc::new(TcProviderMultiplexer::new());
    mux.add_provider(Arc::new(InMemoryProvider::new("memory", 1)))
        .unwrap();
    mux
}

/// Provider whose first `list_names` call signals `entered` and then waits
/// on `release`.
struct GatedListingProvider {
    inner: InMemoryProvider,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

impl GatedListingProvider {
    fn new(
        inner: InMemoryProvider,
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            inner,
            entered: Mutex::new(Some(entered)),
            release: Mutex::new(Some(release)),
        }
    }
}

impl WeightedProvider for GatedListingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn weight(&self) -> i32 {
        self.inner.weight()
    }

    fn list_graphs(&self) -> HashSet<Iri> {
        self.inner.list_graphs()
    }

    fn list_mgraphs(&self) -> HashSet<Iri> {
        self.inner.list_mgraphs()
    }

    fn list_names(&self) -> HashSet<Iri> {
        if let Some(entered) = self.entered.lock().unwrap().take() {
            entered.send(()).unwrap();
            if let Some(release) = self.release.lock().unwrap().take() {
                release.recv_timeout(Duration::from_secs(10)).unwrap();
            }
        }
        self.inner.list_names()
    }

    fn get_graph(&self, name: &Iri) -> Result<ImmutableGraph> {
        self.inner.get_graph(name)
    }

    fn get_mgraph(&self, name: &Iri) -> Result<MutableGraphRef> {
        self.inner.get_mgraph(name)
    }

    fn get_triples(&self, name: &Iri) -> Result<ProvidedCollection> {
        self.inner.get_triples(name)
    }

    fn create_mgraph(&self, name: &Iri) -> Result<MutableGraphRef> {
        self.inner.create_mgraph(name)
    }

    fn create_graph(&self, name: &Iri, triples: ImmutableGraph) -> Result<ImmutableGraph> {
        self.inner.create_graph(name, triples)
    }

    fn delete(&self, name: &Iri) -> Result<()> {
        self.inner.delete(name)
    }

    fn get_names(&self, graph: &ImmutableGraph) -> HashSet<Iri> {
        self.inner.get_names(graph)
    }
}

/// Joins every handle, failing if the whole batch takes longer than `limit`.
fn join_within(handles: Vec<thread::JoinHandle<()>>, limit: Duration) {
    let start = Instant::now();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(start.elapsed() < limit, "threads did not finish in time");
}

#[test]
fn test_concurrent_resolution_returns_one_handle() {
    let mux = single_provider_mux();
    let name = Iri::new("urn:h");
    let _keep = mux.create_mgraph(&name).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let mux = Arc::clone(&mux);
            let name = name.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..1000)
                    .map(|_| Arc::as_ptr(&mux.get_mgraph(&name).unwrap()).cast::<()>() as usize)
                    .collect::<HashSet<usize>>()
            })
        })
        .collect();

    let identities: HashSet<usize> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(identities.len(), 1);
}

#[test]
fn test_first_resolutions_race_to_one_handle() {
    // No handle is held up front, so the first resolvers race to populate
    // the cache; every handle held at the same time must be the same one.
    let provider = InMemoryProvider::new("memory", 1);
    let name = Iri::new("urn:h");
    provider.create_mgraph(&name).unwrap();
    let mux = Arc::new(TcProviderMultiplexer::new());
    mux.add_provider(Arc::new(provider)).unwrap();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let mux = Arc::clone(&mux);
            let name = name.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let graph = mux.get_mgraph(&name).unwrap();
                // Hold until everyone has resolved.
                barrier.wait();
                Arc::as_ptr(&graph).cast::<()>() as usize
            })
        })
        .collect();

    let identities: HashSet<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(identities.len(), 1);
}

#[test]
fn test_concurrent_create_has_one_winner() {
    let mux = single_provider_mux();
    let name = Iri::new("urn:contested");
    let created = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let mux = Arc::clone(&mux);
            let name = name.clone();
            let barrier = Arc::clone(&barrier);
            let created = Arc::clone(&created);
            let rejected = Arc::clone(&rejected);
            thread::spawn(move || {
                barrier.wait();
                match mux.create_mgraph(&name) {
                    Ok(_) => {
                        created.fetch_add(1, Ordering::SeqCst);
                    },
                    Err(Error::AlreadyExists(_)) => {
                        rejected.fetch_add(1, Ordering::SeqCst);
                    },
                    Err(e) => panic!("unexpected error: {e}"),
                }
            })
        })
        .collect();
    join_within(handles, Duration::from_secs(30));

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(rejected.load(Ordering::SeqCst), threads - 1);
}

#[test]
fn test_resolution_racing_registration_settles_on_winner() {
    let name = Iri::new("urn:r");
    let low = InMemoryProvider::new("low", 1);
    low.create_mgraph(&name).unwrap();
    let high = InMemoryProvider::new("high", 10);
    high.create_mgraph(&name)
        .unwrap()
        .as_mutable()
        .add(triple("from-high"))
        .unwrap();

    let mux = Arc::new(TcProviderMultiplexer::new());
    mux.add_provider(Arc::new(low)).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let mux = Arc::clone(&mux);
            let name = name.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let graph = mux.get_mgraph(&name).unwrap();
                    assert!(graph.size().unwrap() <= 1);
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(5));
    mux.add_provider(Arc::new(high)).unwrap();
    join_within(readers, Duration::from_secs(30));

    let settled = mux.get_mgraph(&name).unwrap();
    assert!(settled.contains(&triple("from-high")).unwrap());

    // While `settled` is held, every later resolution shares it.
    let expected = Arc::as_ptr(&settled).cast::<()>() as usize;
    let checkers: Vec<_> = (0..4)
        .map(|_| {
            let mux = Arc::clone(&mux);
            let name = name.clone();
            thread::spawn(move || {
                (0..100)
                    .map(|_| Arc::as_ptr(&mux.get_mgraph(&name).unwrap()).cast::<()>() as usize)
                    .collect::<HashSet<usize>>()
            })
        })
        .collect();
    let identities: HashSet<usize> = checkers
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(identities, HashSet::from([expected]));
}

#[test]
fn test_resolution_during_registration_keeps_one_handle() {
    let name = Iri::new("urn:x");
    let inner = InMemoryProvider::new("p", 1);
    inner.create_mgraph(&name).unwrap();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let provider = GatedListingProvider::new(inner, entered_tx, release_rx);

    let mux = Arc::new(TcProviderMultiplexer::new());
    let registering = {
        let mux = Arc::clone(&mux);
        thread::spawn(move || mux.add_provider(Arc::new(provider)).unwrap())
    };

    // The provider is registered but has not published its names yet.
    entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    let first = mux.get_mgraph(&name).unwrap();

    release_tx.send(()).unwrap();
    registering.join().unwrap();

    let second = mux.get_mgraph(&name).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(std::ptr::eq(first.lock(), second.lock()));
}

#[test]
fn test_register_and_deregister_under_load() {
    let mux = single_provider_mux();
    let names: Vec<Iri> = (0..16).map(|i| Iri::new(format!("urn:g{i}"))).collect();
    let held: Vec<_> = names
        .iter()
        .map(|n| mux.create_mgraph(n).unwrap())
        .collect();

    let churn = {
        let mux = Arc::clone(&mux);
        thread::spawn(move || {
            for round in 0..50 {
                let key = format!("extra-{round}");
                mux.add_provider(Arc::new(InMemoryProvider::new(key.clone(), 0)))
                    .unwrap();
                mux.remove_provider(&key).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|t| {
            let mux = Arc::clone(&mux);
            let names = names.clone();
            thread::spawn(move || {
                for i in 0..400 {
                    let name = &names[(t + i) % names.len()];
                    mux.get_mgraph(name).unwrap();
                    let _ = mux.list_names().unwrap();
                }
            })
        })
        .collect();

    churn.join().unwrap();
    join_within(readers, Duration::from_secs(30));

    // Lower-weight providers never displaced the handles that were held.
    for (name, graph) in names.iter().zip(&held) {
        assert!(Arc::ptr_eq(graph, &mux.get_mgraph(name).unwrap()));
    }
    assert_eq!(mux.providers().unwrap().len(), 1);
    assert_eq!(mux.providers().unwrap()[0].name(), "memory");
}

#[test]
fn test_mixed_read_write_workload() {
    let mux = single_provider_mux();
    let name = Iri::new("urn:busy");
    let graph = mux.create_mgraph(&name).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let mux = Arc::clone(&mux);
            let name = name.clone();
            thread::spawn(move || {
                let graph = mux.get_mgraph(&name).unwrap();
                for i in 0..100 {
                    graph.add(triple(&format!("{t}-{i}"))).unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let mux = Arc::clone(&mux);
            let name = name.clone();
            thread::spawn(move || {
                let graph = mux.get_mgraph(&name).unwrap();
                for _ in 0..100 {
                    let _read = graph.lock().read().unwrap();
                    // Size and filter agree while the read lock is held.
                    let size = graph.size().unwrap();
                    assert_eq!(graph.filter(None, None, None).unwrap().len(), size);
                }
            })
        })
        .collect();

    join_within(writers, Duration::from_secs(30));
    join_within(readers, Duration::from_secs(30));
    assert_eq!(graph.size().unwrap(), 400);
}
