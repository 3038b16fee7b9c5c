//! Per-field satellite snapshot cache.
//!
//! Entries live for a fixed TTL and are replaced, never mutated, when they expire.
//! Concurrent misses on the same key share one in-flight load.

use crate::config::CacheSettings;
use crate::domain::SatelliteSnapshot;
use crate::errors::SnapshotError;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

type LoadResult = Result<Arc<SatelliteSnapshot>, SnapshotError>;
type InFlightLoad = Shared<BoxFuture<'static, LoadResult>>;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Arc<SatelliteSnapshot>,
    pub expires_at: Instant,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Result of a cache lookup
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub snapshot: Arc<SatelliteSnapshot>,
    pub cache_hit: bool,
}

#[derive(Clone)]
pub struct SatelliteCache {
    inner: Arc<Inner>,
}

struct Inner {
    entries: DashMap<String, CacheEntry>,
    in_flight: Mutex<HashMap<String, InFlightLoad>>,
    ttl: Duration,
    max_entries: usize,
}

impl SatelliteCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self::with_limits(settings.ttl, settings.max_entries)
    }

    pub fn with_limits(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                in_flight: Mutex::new(HashMap::new()),
                ttl,
                max_entries: max_entries.max(1),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Live entry for `key`, if any
    pub fn get(&self, key: &str) -> Option<Arc<SatelliteSnapshot>> {
        let entry = self.inner.entries.get(key)?;
        entry
            .is_live(Instant::now())
            .then(|| Arc::clone(&entry.value))
    }

    pub fn set(&self, key: &str, snapshot: Arc<SatelliteSnapshot>) {
        self.inner.store(key.to_string(), snapshot);
    }

    /// Drop an entry. Returns whether one was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.entries.remove(key).is_some()
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Return the live snapshot for `key`, or run `loader` and cache its result.
    ///
    /// Callers arriving while a load for the same key is running wait for that load
    /// instead of starting another one. Failed loads are not cached.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        loader: F,
    ) -> Result<CacheLookup, SnapshotError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<SatelliteSnapshot, SnapshotError>> + Send + 'static,
    {
        if let Some(snapshot) = self.get(key) {
            return Ok(CacheLookup {
                snapshot,
                cache_hit: true,
            });
        }

        let load = {
            let mut in_flight = self.inner.lock_in_flight();

            // a load may have finished between the first check and taking the lock
            if let Some(snapshot) = self.get(key) {
                return Ok(CacheLookup {
                    snapshot,
                    cache_hit: true,
                });
            }

            match in_flight.get(key) {
                Some(existing) => {
                    debug!("Joining in-flight satellite load for {}", key);
                    existing.clone()
                }
                None => {
                    let load = self.start_load(key.to_string(), loader());
                    in_flight.insert(key.to_string(), load.clone());
                    load
                }
            }
        };

        load.await.map(|snapshot| CacheLookup {
            snapshot,
            cache_hit: false,
        })
    }

    fn start_load<Fut>(&self, key: String, fut: Fut) -> InFlightLoad
    where
        Fut: Future<Output = Result<SatelliteSnapshot, SnapshotError>> + Send + 'static,
    {
        let cache = self.clone();
        async move {
            let result = fut.await.map(Arc::new);
            if let Ok(snapshot) = &result {
                cache.set(&key, Arc::clone(snapshot));
            }
            cache.inner.lock_in_flight().remove(&key);
            result
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlightLoad>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store(&self, key: String, value: Arc<SatelliteSnapshot>) {
        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
                stored_at: now,
            },
        );
        self.prune(now);
    }

    fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Drop expired entries, then the oldest ones until within `max_entries`
    fn prune(&self, now: Instant) {
        self.purge_expired(now);
        if self.entries.len() <= self.max_entries {
            return;
        }

        let mut entries: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stored_at))
            .collect();
        entries.sort_by_key(|(_, stored_at)| *stored_at);

        for (key, _) in entries {
            if self.entries.len() <= self.max_entries {
                break;
            }
            self.entries.remove(&key);
        }
    }
}
