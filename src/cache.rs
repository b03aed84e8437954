//! Single-flight, shared-future caches used by the agent's description
//! cache and the search core's minimax/successors caches.
//!
//! The first reader for a key publishes a *pending* slot
//! synchronously, before its first `.await`, so a second reader
//! arriving in the same scheduler tick attaches to the same slot
//! instead of recomputing.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

type Published<V, E> = Option<Result<V, Arc<E>>>;

async fn await_slot<V: Clone, E>(rx: &mut watch::Receiver<Published<V, E>>) -> Result<V, Arc<E>> {
    loop {
        if let Some(v) = rx.borrow().clone() {
            return v;
        }
        if rx.changed().await.is_err() {
            panic!("cache single-flight writer dropped without publishing a value");
        }
    }
}

/// Awaits a [`BudgetedCache::probe_or_reserve`] slot handed back as
/// [`Probe::UseExisting`]. Exposed so callers outside this module
/// (the minimax core) can await the shared future they attached to.
pub async fn await_value<V: Clone, E>(
    mut rx: watch::Receiver<Published<V, E>>,
) -> Result<V, Arc<E>> {
    await_slot(&mut rx).await
}

/// A plain single-flight cache with no budget concept: used for the
/// successors cache and C4's description cache.
pub struct SingleFlightCache<K, V, E> {
    slots: DashMap<K, watch::Receiver<Published<V, E>>>,
}

impl<K, V, E> SingleFlightCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        SingleFlightCache {
            slots: DashMap::new(),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Computes `compute()` for `key` if no entry exists yet;
    /// otherwise awaits the existing (possibly still pending) entry.
    /// Returns the shared, cloned result either way.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let (tx, existing_rx) = match self.slots.entry(key) {
            Entry::Occupied(e) => (None, Some(e.get().clone())),
            Entry::Vacant(e) => {
                let (tx, rx) = watch::channel(None);
                e.insert(rx);
                (Some(tx), None)
            }
        };

        if let Some(mut rx) = existing_rx {
            return await_slot(&mut rx).await;
        }

        let tx = tx.expect("vacant branch always produces a sender");
        let result = compute().await.map_err(Arc::new);
        let _ = tx.send(Some(result.clone()));
        result
    }
}

impl<K, V, E> Default for SingleFlightCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// What a [`BudgetedCache::probe_or_reserve`] call found.
pub enum Probe<V, E> {
    /// An entry with sufficient budget already exists (or is
    /// in-flight); await it instead of recomputing.
    UseExisting(watch::Receiver<Published<V, E>>),
    /// No entry existed, or the existing one had insufficient
    /// budget and has now been replaced; the caller owns this sender
    /// and must publish exactly once.
    Reserved(watch::Sender<Published<V, E>>),
}

/// The minimax cache: like [`SingleFlightCache`], but entries carry a
/// budget, reuse is tolerant within `budget_cache_tolerance`, and a
/// strictly-larger budget request *upgrades* (replaces) the entry.
/// Old waiters keep awaiting the old (weaker) slot.
pub struct BudgetedCache<K, V, E> {
    slots: DashMap<K, (f64, watch::Receiver<Published<V, E>>)>,
    tolerance: f64,
}

impl<K, V, E> BudgetedCache<K, V, E>
where
    K: Eq + Hash + Clone,
{
    pub fn new(tolerance: f64) -> Self {
        BudgetedCache {
            slots: DashMap::new(),
            tolerance,
        }
    }

    fn sufficient(existing_budget: f64, requested_budget: f64, tolerance: f64) -> bool {
        existing_budget >= requested_budget || (existing_budget - requested_budget).abs() < tolerance
    }

    /// Atomically decides whether an existing entry for `key` covers
    /// `requested_budget`; if not, replaces it with a fresh pending
    /// slot reserved for the caller to fill.
    pub fn probe_or_reserve(&self, key: K, requested_budget: f64) -> Probe<V, E> {
        match self.slots.entry(key) {
            Entry::Occupied(mut e) => {
                let (existing_budget, existing_rx) = e.get().clone();
                if Self::sufficient(existing_budget, requested_budget, self.tolerance) {
                    Probe::UseExisting(existing_rx)
                } else {
                    let (tx, rx) = watch::channel(None);
                    e.insert((requested_budget, rx));
                    Probe::Reserved(tx)
                }
            }
            Entry::Vacant(e) => {
                let (tx, rx) = watch::channel(None);
                e.insert((requested_budget, rx));
                Probe::Reserved(tx)
            }
        }
    }
}

impl<K, V, E> Clone for BudgetedCache<K, V, E>
where
    K: Eq + Hash + Clone,
{
    fn clone(&self) -> Self {
        // Caches are always held behind an `Arc` by callers; this impl
        // exists only so generic code can derive `Clone` on structs
        // that embed one without boxing. It is never actually invoked
        // on a populated cache in this crate.
        BudgetedCache::new(self.tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    #[derive(Debug, Clone, PartialEq)]
    struct Never;
    impl std::fmt::Display for Never {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "never")
        }
    }
    impl std::error::Error for Never {}

    #[tokio::test]
    async fn concurrent_misses_compute_exactly_once() {
        let cache: StdArc<SingleFlightCache<&'static str, u32, Never>> =
            StdArc::new(SingleFlightCache::new());
        let calls = StdArc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("k", || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            Ok::<u32, Never>(42)
                        }
                    })
                    .await
                    .unwrap()
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn budgeted_cache_reuses_within_tolerance_and_upgrades_beyond_it() {
        let cache: BudgetedCache<&'static str, f64, Never> = BudgetedCache::new(0.1);
        match cache.probe_or_reserve("s", 10.0) {
            Probe::Reserved(tx) => {
                tx.send(Some(Ok(0.5))).unwrap();
            }
            Probe::UseExisting(_) => panic!("first probe must reserve"),
        }
        match cache.probe_or_reserve("s", 10.05) {
            Probe::UseExisting(_) => {}
            Probe::Reserved(_) => panic!("within tolerance must reuse"),
        }
        match cache.probe_or_reserve("s", 50.0) {
            Probe::Reserved(_) => {}
            Probe::UseExisting(_) => panic!("far larger budget must upgrade"),
        }
    }
}
