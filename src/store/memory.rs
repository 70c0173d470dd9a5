// ABOUTME: In-memory state store with LRU bounding, TTL expiry, and background cleanup
// ABOUTME: Single-process backend; multi-replica deployments use the Redis backend instead
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use super::StateStore;
use crate::config::environment::StoreBackendConfig;
use crate::errors::AppResult;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Stored value with absolute expiry
#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory state store with LRU eviction and background cleanup.
///
/// Uses `Arc<RwLock<LruCache>>` for shared state between store operations and
/// the background cleanup task. `LruCache` bounds memory so an attacker
/// cannot grow the store without bound by starting federation flows.
#[derive(Clone)]
pub struct InMemoryStateStore {
    entries: Arc<RwLock<LruCache<String, Entry>>>,
    shutdown_tx: Option<Arc<tokio::sync::mpsc::Sender<()>>>,
}

impl InMemoryStateStore {
    /// Fallback capacity when configuration specifies zero entries
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100_000) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Create a store with default sizing and background cleanup enabled
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&StoreBackendConfig::default(), true)
    }

    /// Create a store for tests: bounded, no background task
    #[must_use]
    pub fn new_for_tests() -> Self {
        Self::with_config(&StoreBackendConfig::default(), false)
    }

    /// Create a store from backend configuration
    #[must_use]
    pub fn with_config(config: &StoreBackendConfig, enable_background_cleanup: bool) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(Self::DEFAULT_CAPACITY);
        let entries = Arc::new(RwLock::new(LruCache::new(capacity)));

        let shutdown_tx = if enable_background_cleanup {
            let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
            let entries_clone = entries.clone();
            let cleanup_interval = config.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(cleanup_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            Self::cleanup_expired(&entries_clone).await;
                        }
                        _ = shutdown_rx.recv() => {
                            tracing::debug!("state store cleanup task received shutdown signal");
                            break;
                        }
                    }
                }
            });

            Some(Arc::new(shutdown_tx))
        } else {
            None
        };

        Self {
            entries,
            shutdown_tx,
        }
    }

    /// Remove all expired entries
    async fn cleanup_expired(entries: &Arc<RwLock<LruCache<String, Entry>>>) {
        let mut guard = entries.write().await;

        // Collect first: the cache cannot be mutated while iterating
        let expired_keys: Vec<String> = guard
            .iter()
            .filter_map(|(k, v)| v.is_expired().then(|| k.clone()))
            .collect();

        for key in &expired_keys {
            guard.pop(key);
        }

        let removed = expired_keys.len();
        drop(guard);
        if removed > 0 {
            tracing::debug!("cleaned up {removed} expired state entries");
        }
    }

    /// Signal the cleanup task to stop
    pub async fn shutdown(&self) {
        if let Some(tx) = &self.shutdown_tx {
            let _ = tx.send(()).await;
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()> {
        let entry = Entry::new(value.to_vec(), ttl);
        self.entries.write().await.push(key.to_owned(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut guard = self.entries.write().await;
        // LruCache::get is mutable (updates access order); expired entries
        // are dropped on observation rather than waiting for cleanup
        match guard.get(key) {
            Some(entry) if entry.is_expired() => {
                guard.pop(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.write().await.pop(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        // Single write-lock removal gives the read-once guarantee: of any
        // number of concurrent callers, exactly one gets the value
        let removed = self.entries.write().await.pop(key);
        match removed {
            Some(entry) if entry.is_expired() => Ok(None),
            Some(entry) => Ok(Some(entry.data)),
            None => Ok(None),
        }
    }
}
