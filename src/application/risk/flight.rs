//! Single-flight execution keyed by an identifier.
//!
//! The first caller for a key becomes the leader and runs the computation;
//! callers arriving while it runs wait on a watch channel and receive a clone
//! of the leader's result. If the leader is dropped before finishing, its
//! entry is removed and waiting callers race to become the next leader.

use std::future::Future;
use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

enum Role<V> {
    Leader(watch::Sender<Option<V>>),
    Follower(watch::Receiver<Option<V>>),
}

pub struct SingleFlight<K, V>
where
    K: Eq + Hash,
{
    inflight: DashMap<K, watch::Receiver<Option<V>>>,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }
}

/// Removes the leader's entry however the leader exits.
struct Release<'a, K: Eq + Hash, V> {
    map: &'a DashMap<K, watch::Receiver<Option<V>>>,
    key: &'a K,
}

impl<K: Eq + Hash, V> Drop for Release<'_, K, V> {
    fn drop(&mut self) {
        self.map.remove(self.key);
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a computation in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    #[must_use]
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }

    /// Claim the key or subscribe to the current leader. The map guard is
    /// released before this returns.
    fn join(&self, key: &K) -> Role<V> {
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(e) => Role::Follower(e.get().clone()),
            Entry::Vacant(v) => {
                let (tx, rx) = watch::channel(None);
                v.insert(rx);
                Role::Leader(tx)
            }
        }
    }

    /// Run `compute` unless a computation for `key` is already running, in
    /// which case wait for and return its result.
    pub async fn run<F, Fut>(&self, key: &K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let tx = loop {
            match self.join(key) {
                Role::Leader(tx) => break tx,
                Role::Follower(mut rx) => {
                    if let Ok(value) = rx.wait_for(Option::is_some).await {
                        if let Some(v) = value.as_ref() {
                            return v.clone();
                        }
                    }
                }
            }
        };
        let release = Release {
            map: &self.inflight,
            key,
        };
        let value = compute().await;
        tx.send_replace(Some(value.clone()));
        drop(release);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_computation() {
        let flight = Arc::new(SingleFlight::<String, usize>::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let flight = Arc::clone(&flight);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                flight
                    .run(&"u1".to_string(), || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        runs.fetch_add(1, Ordering::SeqCst) + 100
                    })
                    .await
            }));
        }
        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == 100));
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let flight = SingleFlight::<&'static str, u32>::new();
        let (a, b) = tokio::join!(
            flight.run(&"a", || async { 1 }),
            flight.run(&"b", || async { 2 })
        );
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn cancelled_leader_hands_over() {
        let flight = Arc::new(SingleFlight::<u8, u8>::new());
        let leader = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight
                    .run(&1, || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        0
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(flight.is_in_flight(&1));
        let follower = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move { flight.run(&1, || async { 7 }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();
        assert_eq!(follower.await.unwrap(), 7);
        assert_eq!(flight.in_flight(), 0);
    }
}
