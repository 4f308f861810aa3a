//! Keyed singleflight: at most one fetch per key is in progress at a time.
//!
//! The first caller for a cold key becomes the leader and spawns the fetch on
//! its own task; every caller that arrives while it runs joins the same
//! [`Shared`] future and observes the identical `Result`. Running the fetch on
//! a spawned task means a leader whose request is cancelled does not strand
//! the callers that joined it.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

/// The fetch task ended without producing a result (it panicked or the
/// runtime shut down underneath it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("in-flight fetch aborted before settling")]
pub struct FlightAborted;

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct InFlight<T, E> {
    id: u64,
    flight: Flight<T, E>,
}

pub struct SingleFlight<K, T, E> {
    flights: Arc<DashMap<K, InFlight<T, E>>>,
    next_id: Arc<AtomicU64>,
}

impl<K, T, E> Clone for SingleFlight<K, T, E> {
    fn clone(&self) -> Self {
        Self {
            flights: self.flights.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<K, T, E> Default for SingleFlight<K, T, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Removes the in-flight marker when the fetch task finishes, including on
/// unwind. Only the marker with a matching id is removed.
struct Landing<K: Eq + Hash, T, E> {
    flights: Arc<DashMap<K, InFlight<T, E>>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, T, E> Drop for Landing<K, T, E> {
    fn drop(&mut self) {
        self.flights.remove_if(&self.key, |_, f| f.id == self.id);
    }
}

impl<K, T, E> SingleFlight<K, T, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + From<FlightAborted> + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight fetch for `key`, or start `fetch` if there is none.
    ///
    /// `fetch` is only invoked by the leader. The in-flight marker is cleared
    /// before any caller observes the result, so the next call after
    /// settlement starts a new fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let flight = match self.flights.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                debug!(key = ?key, "joining in-flight fetch");
                occupied.get().flight.clone()
            }
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let landing = Landing {
                    flights: self.flights.clone(),
                    key: key.clone(),
                    id,
                };
                let fut = fetch();
                let handle = tokio::spawn(async move {
                    let result = fut.await;
                    drop(landing);
                    result
                });
                let flight = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => {
                            error!(error = %e, "in-flight fetch task failed");
                            Err(E::from(FlightAborted))
                        }
                    }
                }
                .boxed()
                .shared();
                vacant.insert(InFlight {
                    id,
                    flight: flight.clone(),
                });
                flight
            }
        };

        flight.await
    }

    /// Whether a fetch for `key` is currently running.
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.flights.contains_key(key)
    }
}
