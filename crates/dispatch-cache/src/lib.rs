//! TTL-bounded response memoization with single-flight coalescing (§4.3).
//!
//! Unlike a `tower::Layer` wrapping one inner service, this cache is a
//! resource the dispatcher's workers call directly: `get`/`put` for the
//! common path, and [`Cache::get_or_compute`] when many workers might be
//! racing to populate the same key (the "thundering herd on one URL"
//! case §4.3 calls out) — only the first caller for a given key actually
//! runs its `compute` future; the rest subscribe to its result.
//!
//! # Example
//!
//! ```
//! use dispatch_cache::{Cache, CacheConfig};
//! use std::time::{Duration, Instant};
//!
//! # async fn example() {
//! let cache: Cache<String, u32> = Cache::new(CacheConfig::builder().ttl(Duration::from_secs(30)).build());
//! let now = Instant::now();
//!
//! let value = cache
//!     .get_or_compute("key".to_string(), now, || async { 42 })
//!     .await;
//! assert_eq!(value, 42);
//! assert_eq!(cache.get(&"key".to_string(), now), Some(42));
//! # }
//! ```

mod config;
mod error;
mod events;
mod eviction;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder, CacheableFn};
pub use error::CacheError;
pub use events::CacheEvent;

use parking_lot::Mutex;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use store::CacheStore;
use tokio::sync::broadcast;

/// A leader's in-flight single-flight computation: followers subscribe to
/// `sender` and receive the leader's result once it completes.
struct InFlight<V> {
    sender: broadcast::Sender<V>,
}

/// A TTL-bounded, LRU-evicting cache with single-flight `get_or_compute`.
pub struct Cache<K, V> {
    store: Mutex<CacheStore<K, V>>,
    inflight: Mutex<hashbrown::HashMap<K, InFlight<V>>>,
    config: Arc<CacheConfig<V>>,
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + 'static,
{
    pub fn new(config: CacheConfig<V>) -> Self {
        let store = Mutex::new(CacheStore::new(config.max_entries, config.ttl));
        Self {
            store,
            inflight: Mutex::new(hashbrown::HashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Returns the cached value for `key` iff it hasn't expired as of `now`.
    /// Non-blocking: a brief lock, no I/O, no single-flight involvement.
    pub fn get(&self, key: &K, now: Instant) -> Option<V> {
        let mut store = self.store.lock();
        let hit = store.get(key, now);
        drop(store);
        self.emit_hit_or_miss(hit.is_some(), now);
        hit
    }

    /// Inserts or overwrites `key`, evicting the LRU entry if the store is
    /// at `max_entries`.
    pub fn put(&self, key: K, value: V, now: Instant) {
        let mut store = self.store.lock();
        let was_full = store.len() >= self.config.max_entries;
        let evicted = store.insert(key, value, now);
        drop(store);
        if was_full && evicted.is_some() {
            self.config.event_listeners.emit(&CacheEvent::Eviction {
                cache_name: self.config.name.clone(),
                timestamp: now,
            });
        }
    }

    /// Returns the cached value if present; otherwise computes it, with at
    /// most one `compute` future running per key at a time. Concurrent
    /// callers for the same key while a computation is in flight await that
    /// same result rather than each starting their own.
    ///
    /// The result is written to the cache only if
    /// [`CacheConfig`]'s `cacheable` predicate accepts it.
    pub async fn get_or_compute<F, Fut>(&self, key: K, now: Instant, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(hit) = self.get(&key, now) {
            return hit;
        }

        let mut receiver = None;
        {
            let mut inflight = self.inflight.lock();
            match inflight.get(&key) {
                Some(leader) => receiver = Some(leader.sender.subscribe()),
                None => {
                    let (sender, _) = broadcast::channel(1);
                    inflight.insert(key.clone(), InFlight { sender });
                }
            }
        }

        if let Some(mut rx) = receiver {
            self.config.event_listeners.emit(&CacheEvent::SingleFlightJoined {
                cache_name: self.config.name.clone(),
                timestamp: now,
            });
            return match rx.recv().await {
                Ok(value) => value,
                // Leader's sender was dropped without sending: extremely
                // unlikely (the leader always sends before returning), but
                // if it happens, fall back to computing ourselves.
                Err(_) => compute().await,
            };
        }

        let value = compute().await;
        if (self.config.cacheable)(&value) {
            self.put(key.clone(), value.clone(), now);
        }
        let leader = self.inflight.lock().remove(&key);
        if let Some(leader) = leader {
            let _ = leader.sender.send(value.clone());
        }
        value
    }

    /// Current number of live entries (expired-but-unread entries still
    /// count until evicted by a subsequent `get`/`put`).
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit_hit_or_miss(&self, hit: bool, now: Instant) {
        let event = if hit {
            CacheEvent::Hit {
                cache_name: self.config.name.clone(),
                timestamp: now,
            }
        } else {
            CacheEvent::Miss {
                cache_name: self.config.name.clone(),
                timestamp: now,
            }
        };
        self.config.event_listeners.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn miss_then_hit() {
        let cache: Cache<String, u32> = Cache::new(CacheConfig::builder().build());
        let now = Instant::now();
        assert_eq!(cache.get(&"k".to_string(), now), None);
        cache.put("k".to_string(), 7, now);
        assert_eq!(cache.get(&"k".to_string(), now), Some(7));
    }

    #[tokio::test]
    async fn ttl_expires_entries() {
        let cache: Cache<String, u32> = Cache::new(CacheConfig::builder().ttl(Duration::from_secs(1)).build());
        let t0 = Instant::now();
        cache.put("k".to_string(), 1, t0);
        assert_eq!(cache.get(&"k".to_string(), t0 + Duration::from_millis(999)), Some(1));
        assert_eq!(cache.get(&"k".to_string(), t0 + Duration::from_secs(1)), None);
    }

    #[tokio::test]
    async fn lru_eviction_at_capacity() {
        let cache: Cache<&'static str, u32> = Cache::new(CacheConfig::builder().max_entries(1).build());
        let now = Instant::now();
        cache.put("a", 1, now);
        cache.put("b", 2, now);
        assert_eq!(cache.get(&"a", now), None);
        assert_eq!(cache.get(&"b", now), Some(2));
    }

    #[tokio::test]
    async fn get_or_compute_caches_result() {
        let cache: Cache<String, u32> = Cache::new(CacheConfig::builder().build());
        let now = Instant::now();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let value = cache
            .get_or_compute("k".to_string(), now, move || async move {
                c.fetch_add(1, Ordering::SeqCst);
                99
            })
            .await;
        assert_eq!(value, 99);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&"k".to_string(), now), Some(99));
    }

    #[tokio::test]
    async fn get_or_compute_single_flights_concurrent_callers() {
        let cache: Arc<Cache<String, u32>> = Arc::new(Cache::new(CacheConfig::builder().build()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("shared".to_string(), Instant::now(), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        7
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn uncacheable_results_are_not_stored() {
        let cache: Cache<String, u32> = Cache::new(CacheConfig::builder().cacheable(|v: &u32| *v < 10).build());
        let now = Instant::now();
        cache.get_or_compute("k".to_string(), now, || async { 500 }).await;
        assert_eq!(cache.get(&"k".to_string(), now), None);
    }
}
