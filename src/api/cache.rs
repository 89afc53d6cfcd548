// CourseSync - Course Content Sync
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Response cache
//!
//! Every read from the platform goes through a [`ResponseCache`] keyed by request
//! identity (`"{METHOD} {url}"`). Entries expire after a fixed TTL and are dropped
//! lazily the next time they are looked up.
//!
//! There is no per-key locking. Two concurrent misses on the same key both run their
//! fetch and the last one to finish wins the slot. Reads are idempotent, so the only
//! cost is a duplicate request.

use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Default entry lifetime (one hour)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Build the cache key for a request
pub fn request_key(method: &reqwest::Method, url: &str) -> String {
    format!("{} {}", method.as_str(), url)
}

/// Key-value storage behind a [`ResponseCache`]
pub trait CacheStore<V>: Send + Sync {
    /// Live value for `key`, if any
    fn get(&self, key: &str) -> Option<V>;

    /// Store `value` until `expires_at`
    fn set(&self, key: String, value: V, expires_at: Instant);

    /// Drop every entry that expired at or before `now`
    fn expire(&self, now: Instant);

    /// Number of stored entries (expired ones included until they are dropped)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory [`CacheStore`]
#[derive(Debug)]
pub struct MemoryCacheStore<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V> Default for MemoryCacheStore<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> MemoryCacheStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // A panic while holding the lock cannot leave a half-written entry behind.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V: Clone + Send> CacheStore<V> for MemoryCacheStore<V> {
    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    fn set(&self, key: String, value: V, expires_at: Instant) {
        self.entries().insert(key, CacheEntry { value, expires_at });
    }

    fn expire(&self, now: Instant) {
        self.entries().retain(|_, entry| entry.expires_at > now);
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}

/// Get-or-fetch cache with a fixed TTL
#[derive(Clone)]
pub struct ResponseCache<V> {
    store: Arc<dyn CacheStore<V>>,
    ttl: Duration,
}

impl<V> std::fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.store.len())
            .finish()
    }
}

impl<V: Clone + Send + 'static> ResponseCache<V> {
    /// Cache backed by a [`MemoryCacheStore`]
    pub fn new(ttl: Duration) -> Self {
        Self::with_store(Arc::new(MemoryCacheStore::new()), ttl)
    }

    pub fn with_store(store: Arc<dyn CacheStore<V>>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drop expired entries now instead of waiting for their next lookup
    pub fn purge_expired(&self) {
        self.store.expire(Instant::now());
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result
    ///
    /// A failed fetch caches nothing and its error is returned unchanged. Storing a
    /// new entry first drops every expired one, so one-off keys do not accumulate.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.store.get(key) {
            tracing::debug!(key, "response cache hit");
            return Ok(value);
        }

        tracing::debug!(key, "response cache miss");
        let value = fetch().await?;
        let now = Instant::now();
        self.store.expire(now);
        self.store.set(key.to_string(), value.clone(), now + self.ttl);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CourseError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn counted_fetch(calls: &AtomicUsize, value: &str) -> Result<String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value.to_string())
    }

    #[test]
    fn test_request_key() {
        assert_eq!(
            request_key(&reqwest::Method::GET, "https://www.example.com/api-2.0/x"),
            "GET https://www.example.com/api-2.0/x"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_does_not_refetch() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_fetch("GET a", || counted_fetch(&calls, "one")).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = cache.get_or_fetch("GET a", || counted_fetch(&calls, "two")).await.unwrap();

        assert_eq!(first, "one");
        assert_eq!(second, "one");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_fetched_once_more() {
        let cache = ResponseCache::new(DEFAULT_CACHE_TTL);
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch("GET a", || counted_fetch(&calls, "one")).await.unwrap();
        tokio::time::advance(DEFAULT_CACHE_TTL + Duration::from_secs(1)).await;

        let refreshed = cache.get_or_fetch("GET a", || counted_fetch(&calls, "two")).await.unwrap();
        let again = cache.get_or_fetch("GET a", || counted_fetch(&calls, "three")).await.unwrap();

        assert_eq!(refreshed, "two");
        assert_eq!(again, "two");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache: ResponseCache<String> = ResponseCache::new(DEFAULT_CACHE_TTL);

        let result = cache
            .get_or_fetch("GET a", || async {
                Err(CourseError::api_failed("boom", Some(500), None))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());

        let calls = AtomicUsize::new(0);
        let value = cache.get_or_fetch("GET a", || counted_fetch(&calls, "ok")).await.unwrap();
        assert_eq!(value, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache = ResponseCache::new(DEFAULT_CACHE_TTL);
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch("GET a", || counted_fetch(&calls, "a")).await.unwrap();
        cache.get_or_fetch("POST a", || counted_fetch(&calls, "b")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch("GET a", || counted_fetch(&calls, "a")).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.get_or_fetch("GET b", || counted_fetch(&calls, "b")).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        cache.purge_expired();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_drops_expired_entries() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch("GET page=1", || counted_fetch(&calls, "1")).await.unwrap();
        cache.get_or_fetch("GET page=2", || counted_fetch(&calls, "2")).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;

        cache.get_or_fetch("GET page=3", || counted_fetch(&calls, "3")).await.unwrap();
        assert_eq!(cache.len(), 1);
    }
}
