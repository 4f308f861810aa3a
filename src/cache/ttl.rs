//! TTL read-through cache with singleflight refresh.
//!
//! Entries are stored per key with the instant they were fetched. Refreshes
//! go through [`SingleFlight`], so concurrent readers of a stale key join one
//! fetch.
//!
//! Failed refreshes never touch the stored entry: its data and timestamp stay
//! as they were, so the next `read` retries immediately and fallback paths can
//! still serve the stale value.

use crate::cache::singleflight::{FlightAborted, SingleFlight};
use crate::utils::fmt_duration;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A stored value and when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub fetched_at: Instant,
    /// Set by [`TtlCache::invalidate`]; the data is kept as a stale fallback
    /// but is never served as fresh.
    pub invalidated: bool,
}

impl<T> CacheEntry<T> {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        !self.invalidated && self.age() < ttl
    }
}

/// Point-in-time view of one key, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct EntryState {
    pub ttl: Duration,
    pub age: Option<Duration>,
    pub fresh: bool,
    pub invalidated: bool,
    pub in_flight: bool,
}

pub struct TtlCache<K, T, E> {
    entries: Arc<DashMap<K, CacheEntry<T>>>,
    /// Bumped by `invalidate`; a refresh started under an older generation
    /// stores its result as already invalidated.
    generations: Arc<DashMap<K, u64>>,
    ttls: Arc<HashMap<K, Duration>>,
    default_ttl: Duration,
    flights: SingleFlight<K, T, E>,
}

impl<K, T, E> Clone for TtlCache<K, T, E> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            generations: self.generations.clone(),
            ttls: self.ttls.clone(),
            default_ttl: self.default_ttl,
            flights: self.flights.clone(),
        }
    }
}

impl<K, T, E> TtlCache<K, T, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Display + From<FlightAborted> + Send + Sync + 'static,
{
    /// Create a cache where every key uses `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_ttls(default_ttl, HashMap::new())
    }

    /// Create a cache with per-key TTL overrides.
    pub fn with_ttls(default_ttl: Duration, ttls: HashMap<K, Duration>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generations: Arc::new(DashMap::new()),
            ttls: Arc::new(ttls),
            default_ttl,
            flights: SingleFlight::new(),
        }
    }

    pub fn ttl(&self, key: &K) -> Duration {
        self.ttls.get(key).copied().unwrap_or(self.default_ttl)
    }

    /// Return the cached value if fresh, otherwise refresh through the
    /// singleflight (joining any refresh already running for `key`).
    pub async fn read<F, Fut>(&self, key: K, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let ttl = self.ttl(&key);
        if let Some(entry) = self.entries.get(&key)
            && entry.is_fresh(ttl)
        {
            debug!(key = ?key, age = fmt_duration(entry.age()), "cache hit");
            return Ok(entry.data.clone());
        }

        let entries = self.entries.clone();
        let generations = self.generations.clone();
        let store_key = key.clone();

        self.flights
            .get_or_fetch(key, move || {
                let started_generation = generation_of(&generations, &store_key);
                let fut = fetch();
                async move {
                    let started = Instant::now();
                    match fut.await {
                        Ok(data) => {
                            let invalidated =
                                generation_of(&generations, &store_key) != started_generation;
                            store(&entries, store_key.clone(), data.clone(), invalidated);
                            info!(
                                key = ?store_key,
                                duration = fmt_duration(started.elapsed()),
                                invalidated,
                                "cache refreshed"
                            );
                            Ok(data)
                        }
                        Err(e) => {
                            warn!(
                                key = ?store_key,
                                error = %e,
                                duration = fmt_duration(started.elapsed()),
                                "cache refresh failed, keeping previous entry"
                            );
                            Err(e)
                        }
                    }
                }
            })
            .await
    }

    /// Force the next `read` of `key` to refetch. The current data is kept as
    /// a stale fallback.
    pub fn invalidate(&self, key: &K) {
        *self.generations.entry(key.clone()).or_insert(0) += 1;
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.invalidated = true;
        }
        debug!(key = ?key, "cache entry invalidated");
    }

    /// Return whatever is stored for `key` right now (possibly nothing) and,
    /// if that is not fresh, start a background `read` without awaiting it.
    pub fn read_stale_while_revalidate<F, Fut>(&self, key: K, fetch: F) -> Option<CacheEntry<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let current = self.peek(&key);
        let fresh = current
            .as_ref()
            .is_some_and(|entry| entry.is_fresh(self.ttl(&key)));

        if !fresh {
            let cache = self.clone();
            tokio::spawn(async move {
                // Failures are already logged by `read`.
                let _ = cache.read(key, fetch).await;
            });
        }

        current
    }

    /// The stored entry for `key`, fresh or not.
    pub fn peek(&self, key: &K) -> Option<CacheEntry<T>> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.flights.is_in_flight(key)
    }

    pub fn state(&self, key: &K) -> EntryState {
        let ttl = self.ttl(key);
        let entry = self.entries.get(key);
        EntryState {
            ttl,
            age: entry.as_ref().map(|e| e.age()),
            fresh: entry.as_ref().is_some_and(|e| e.is_fresh(ttl)),
            invalidated: entry.as_ref().is_some_and(|e| e.invalidated),
            in_flight: self.is_in_flight(key),
        }
    }
}

fn generation_of<K: Eq + Hash>(generations: &DashMap<K, u64>, key: &K) -> u64 {
    generations.get(key).map(|g| *g).unwrap_or(0)
}

/// Replace the entry wholesale, never moving `fetched_at` backwards.
fn store<K, T>(entries: &DashMap<K, CacheEntry<T>>, key: K, data: T, invalidated: bool)
where
    K: Eq + Hash + Debug,
{
    let entry = CacheEntry {
        data,
        fetched_at: Instant::now(),
        invalidated,
    };
    match entries.entry(key) {
        Entry::Occupied(mut occupied) => {
            // Single-flight serialises stores per key, so this only guards
            // against entries written outside a flight.
            if occupied.get().fetched_at > entry.fetched_at {
                debug!(key = ?occupied.key(), "discarding refresh older than stored entry");
                return;
            }
            occupied.insert(entry);
        }
        Entry::Vacant(vacant) => {
            vacant.insert(entry);
        }
    }
}
