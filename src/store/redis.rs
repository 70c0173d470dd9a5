// ABOUTME: Redis state store backend for multi-replica deployments
// ABOUTME: Uses per-key PX expiry and GETDEL for atomic single-use consumption
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use super::StateStore;
use crate::errors::{AppError, AppResult};
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Redis-backed state store.
///
/// Redis owns expiry (`PX` on write), so lazy-expiry semantics hold across
/// replicas for free; `GETDEL` supplies the atomic read-and-delete that
/// single-use records require.
#[derive(Clone)]
pub struct RedisStateStore {
    connection: ConnectionManager,
}

impl RedisStateStore {
    /// Connect to Redis and build a managed connection
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the initial connection fails
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::storage(format!("invalid Redis URL: {e}")))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| AppError::storage(format!("Redis connection failed: {e}")))?;
        Ok(Self { connection })
    }

    fn ttl_millis(ttl: Duration) -> u64 {
        // Sub-millisecond TTLs round up so a put is never already expired
        u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
    }
}

#[async_trait::async_trait]
impl StateStore for RedisStateStore {
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(Self::ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| AppError::storage(format!("Redis SET failed: {e}")))
    }

    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(|e| AppError::storage(format!("Redis GET failed: {e}")))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| AppError::storage(format!("Redis DEL failed: {e}")))
    }

    async fn take(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        redis::cmd("GETDEL")
            .arg(key)
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(|e| AppError::storage(format!("Redis GETDEL failed: {e}")))
    }
}
