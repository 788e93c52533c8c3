//! TTL counter store used by alert inhibition
//!
//! `CounterStore` is the only cross-event shared mutable resource in the
//! pipeline. Implementations must make `increment` atomic per key: the
//! inhibition engine performs no locking of its own.

use crate::error::{AuditError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Key/value counter buckets with atomic increment-with-expiry
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add `delta` to the counter for `key` inside the bucket path `buckets`
    ///
    /// An absent (or expired) counter is created at `delta` and expires
    /// `ttl` from now. An existing counter keeps its expiry. Returns the
    /// post-increment count.
    async fn increment(
        &self,
        buckets: &[String],
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64>;

    /// Store name for logging
    fn name(&self) -> &str {
        "counter"
    }
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: i64,
    expires_at: Instant,
}

/// Minimum time between sweeps of expired counters
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Counters {
    entries: HashMap<(String, String), Counter>,
    last_sweep: Instant,
}

impl Counters {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, c| c.expires_at > now);
        self.last_sweep = now;
        before - self.entries.len()
    }
}

/// In-memory counter store for single-process use and testing
///
/// Counters are keyed by (bucket path, key). An expired counter is reset
/// on its next increment, and `increment` sweeps out every expired
/// counter at most once per minute. `purge_expired` sweeps on demand.
#[derive(Debug)]
pub struct MemoryCounterStore {
    counters: Mutex<Counters>,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self {
            counters: Mutex::new(Counters {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current live value of a counter, if any
    pub fn get(&self, buckets: &[String], key: &str) -> Option<i64> {
        let counters = self.counters.lock().unwrap_or_else(|p| p.into_inner());
        counters
            .entries
            .get(&(bucket_path(buckets), key.to_string()))
            .filter(|c| c.expires_at > Instant::now())
            .map(|c| c.value)
    }

    /// Drop every expired counter, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.counters
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .sweep(Instant::now())
    }

    /// Number of counters held, expired ones included
    pub fn len(&self) -> usize {
        self.counters
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(
        &self,
        buckets: &[String],
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64> {
        if buckets.is_empty() {
            return Err(AuditError::Store {
                buckets: Vec::new(),
                key: key.to_string(),
                reason: "no bucket given".to_string(),
            });
        }

        let now = Instant::now();
        let mut counters = self.counters.lock().map_err(|e| AuditError::Store {
            buckets: buckets.to_vec(),
            key: key.to_string(),
            reason: format!("lock poisoned: {}", e),
        })?;

        if now.duration_since(counters.last_sweep) >= SWEEP_INTERVAL {
            counters.sweep(now);
        }

        let counter = counters
            .entries
            .entry((bucket_path(buckets), key.to_string()))
            .and_modify(|c| {
                if c.expires_at <= now {
                    *c = Counter {
                        value: 0,
                        expires_at: now + ttl,
                    };
                }
            })
            .or_insert(Counter {
                value: 0,
                expires_at: now + ttl,
            });
        counter.value += delta;

        Ok(counter.value)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Nested bucket names collapse to one `a/b/c` path
fn bucket_path(buckets: &[String]) -> String {
    buckets.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buckets() -> Vec<String> {
        vec!["audit_inhibit_record".to_string()]
    }

    #[tokio::test]
    async fn test_increment_creates_then_counts() {
        let store = MemoryCounterStore::new();
        let ttl = Duration::from_secs(300);

        assert_eq!(store.increment(&buckets(), "k", 1, ttl).await.unwrap(), 1);
        assert_eq!(store.increment(&buckets(), "k", 1, ttl).await.unwrap(), 2);
        assert_eq!(store.increment(&buckets(), "other", 1, ttl).await.unwrap(), 1);
        assert_eq!(store.get(&buckets(), "k"), Some(2));
    }

    #[tokio::test]
    async fn test_buckets_are_separate() {
        let store = MemoryCounterStore::new();
        let ttl = Duration::from_secs(60);
        let a = vec!["a".to_string()];
        let b = vec!["b".to_string()];

        store.increment(&a, "k", 1, ttl).await.unwrap();
        assert_eq!(store.increment(&b, "k", 1, ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_buckets_is_error() {
        let store = MemoryCounterStore::new();
        let result = store.increment(&[], "k", 1, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(AuditError::Store { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_expires_after_ttl() {
        let store = MemoryCounterStore::new();
        let ttl = Duration::from_secs(300);

        store.increment(&buckets(), "k", 1, ttl).await.unwrap();
        store.increment(&buckets(), "k", 1, ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(store.get(&buckets(), "k"), Some(2));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get(&buckets(), "k"), None);
        assert_eq!(store.increment(&buckets(), "k", 1, ttl).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_counter_keeps_expiry() {
        let store = MemoryCounterStore::new();
        let ttl = Duration::from_secs(10);

        store.increment(&buckets(), "k", 1, ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        store.increment(&buckets(), "k", 1, ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        // second increment did not push the expiry out
        assert_eq!(store.get(&buckets(), "k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryCounterStore::new();
        store
            .increment(&buckets(), "short", 1, Duration::from_secs(1))
            .await
            .unwrap();
        store
            .increment(&buckets(), "long", 1, Duration::from_secs(100))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_sweeps_expired_counters() {
        let store = MemoryCounterStore::new();
        let ttl = Duration::from_secs(30);
        for i in 0..100 {
            store
                .increment(&buckets(), &format!("k{}", i), 1, ttl)
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 100);

        // expired but inside the sweep interval: kept until the next sweep
        tokio::time::advance(Duration::from_secs(31)).await;
        store.increment(&buckets(), "fresh", 1, ttl).await.unwrap();
        assert_eq!(store.len(), 101);

        tokio::time::advance(Duration::from_secs(30)).await;
        store.increment(&buckets(), "later", 1, ttl).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&buckets(), "later"), Some(1));
    }
}
