//! `MetricsCache`: a generic, sharded LRU+TTL cache with miss-coalescing,
//! backing `cache.stats`/`cache.invalidate`.
//!
//! Used by `ClusterService` (view memoization) and `DiscoveryEngine`
//! (nothing cache-heavy there today, but the type is shared rather than
//! duplicated, replacing global mutable caches and singletons with
//! explicit, injected services). Every cache is constructed explicitly
//! with a [`CacheConfig`] and owned by the component that uses it, never
//! as a module-level static.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::{Condvar, Mutex};

const NUM_SHARDS: usize = 16;

/// Construction parameters for a [`MetricsCache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum entries per cache (not per shard, divided across shards).
    pub max_entries: usize,
    /// Time-to-live for a cached entry.
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self { max_entries, ttl }
    }
}

/// Point-in-time cache statistics, as returned by `cache.stats`.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evictions: u64,
    pub entries: usize,
}

struct Shard<K, V> {
    lru: LruCache<K, (V, Instant)>,
    stats: CacheStats,
}

/// In-flight coalescing slot: the first thread to miss a key computes the
/// value; every other concurrent miss for the same key blocks on the
/// `Condvar` instead of recomputing ("concurrent misses for the same
/// key coalesce: one thread computes, the rest wait on a completion
/// handle").
enum Pending<V, E> {
    Computing,
    Done(Result<V, E>),
}

/// A sharded LRU+TTL cache. Reads and writes are linearizable per key
/// (each key hashes to exactly one shard, guarded by its own lock), so
/// cache hits and misses are indistinguishable to callers except for
/// timing.
pub struct MetricsCache<K, V> {
    shards: Vec<Mutex<Shard<K, V>>>,
    inflight: Mutex<HashMap<u64, Arc<(Mutex<Pending<V, String>>, Condvar)>>>,
    ttl: Duration,
}

impl<K, V> MetricsCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        let per_shard = (config.max_entries / NUM_SHARDS).max(1);
        let cap = std::num::NonZeroUsize::new(per_shard).unwrap();
        let shards = (0..NUM_SHARDS)
            .map(|_| {
                Mutex::new(Shard {
                    lru: LruCache::new(cap),
                    stats: CacheStats::default(),
                })
            })
            .collect();
        Self {
            shards,
            inflight: Mutex::new(HashMap::new()),
            ttl: config.ttl,
        }
    }

    fn shard_for(&self, key: &K) -> (&Mutex<Shard<K, V>>, u64) {
        use std::hash::Hasher;
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        let h = hasher.finish();
        (&self.shards[(h as usize) % self.shards.len()], h)
    }

    /// Direct lookup without triggering a compute. Respects TTL.
    pub fn get(&self, key: &K) -> Option<V> {
        let (shard, _) = self.shard_for(key);
        let mut shard = shard.lock();
        if let Some((value, inserted_at)) = shard.lru.get(key).cloned() {
            if inserted_at.elapsed() <= self.ttl {
                shard.stats.hits += 1;
                return Some(value);
            }
            shard.lru.pop(key);
            shard.stats.evictions += 1;
        }
        shard.stats.misses += 1;
        None
    }

    pub fn put(&self, key: K, value: V) {
        let (shard, _) = self.shard_for(&key);
        let mut shard = shard.lock();
        if shard.lru.put(key, (value, Instant::now())).is_some() {
            shard.stats.evictions = shard.stats.evictions.saturating_add(0);
        }
        shard.stats.entries = shard.lru.len();
    }

    /// Fetch-or-compute with coalescing: if another thread is already
    /// computing `key`, block on its result instead of recomputing.
    /// `compute` must not panic across the unwind boundary in a way that
    /// poisons shared state; errors are propagated as `Err(String)` to
    /// every coalesced waiter.
    pub fn get_or_compute<E, F>(&self, key: K, compute: F) -> Result<V, String>
    where
        E: std::fmt::Display,
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let (_, hash) = self.shard_for(&key);
        let (slot, is_leader) = {
            let mut inflight = self.inflight.lock();
            if let Some(existing) = inflight.get(&hash) {
                (Arc::clone(existing), false)
            } else {
                let slot = Arc::new((Mutex::new(Pending::Computing), Condvar::new()));
                inflight.insert(hash, Arc::clone(&slot));
                (slot, true)
            }
        };

        let (pending_lock, condvar) = &*slot;

        if is_leader {
            let result = compute().map_err(|e| e.to_string());
            if let Ok(value) = &result {
                self.put(key.clone(), value.clone());
            }
            let mut guard = pending_lock.lock();
            *guard = Pending::Done(result.clone());
            condvar.notify_all();
            drop(guard);
            self.inflight.lock().remove(&hash);
            result
        } else {
            let mut guard = pending_lock.lock();
            loop {
                match &*guard {
                    Pending::Done(result) => {
                        let (shard, _) = self.shard_for(&key);
                        shard.lock().stats.coalesced += 1;
                        break result.clone();
                    }
                    Pending::Computing => {
                        condvar.wait(&mut guard);
                    }
                }
            }
        }
    }

    /// Aggregate statistics across all shards, as returned by `cache.stats`.
    pub fn stats(&self) -> CacheStats {
        let mut total = CacheStats::default();
        for shard in &self.shards {
            let shard = shard.lock();
            total.hits += shard.stats.hits;
            total.misses += shard.stats.misses;
            total.coalesced += shard.stats.coalesced;
            total.evictions += shard.stats.evictions;
            total.entries += shard.lru.len();
        }
        total
    }

    /// Drop every entry, backing `cache.invalidate()` with no prefix.
    /// Prefix-scoped invalidation is left to callers that key on
    /// structured (e.g. tuple) keys and can filter before calling this on
    /// a rebuilt cache instance; `MetricsCache` itself is generic over `K`
    /// and has no notion of "prefix".
    pub fn invalidate_all(&self) {
        for shard in &self.shards {
            let mut shard = shard.lock();
            shard.lru.clear();
            shard.stats = CacheStats::default();
        }
    }

    /// Remove entries matching a predicate, e.g. "every key touching
    /// snapshot hash H" ("every write is followed by a cache
    /// invalidation for the affected prefix").
    pub fn invalidate_matching(&self, mut matches: impl FnMut(&K) -> bool) {
        for shard in &self.shards {
            let mut shard = shard.lock();
            let stale: Vec<K> = shard
                .lru
                .iter()
                .filter(|(k, _)| matches(k))
                .map(|(k, _)| k.clone())
                .collect();
            for k in stale {
                shard.lru.pop(&k);
            }
            shard.stats.entries = shard.lru.len();
        }
    }
}
