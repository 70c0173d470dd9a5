// ABOUTME: Ephemeral state store abstraction with per-key TTL semantics
// ABOUTME: Pluggable backends (in-memory, Redis) owning all single-use protocol state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

//! # Ephemeral State Store
//!
//! The single source of truth shared across request handlers: CSRF state,
//! authorization codes, sessions, refresh tokens, and the access-token
//! revocation list all live here and nowhere else.
//!
//! Contract:
//! - an expired key is absent to `get`/`take` even before physical purge
//!   (lazy expiry) - callers must not rely on eager cleanup;
//! - `take` is an atomic read-and-delete, which is what gives state tokens
//!   and authorization codes their exactly-once semantics;
//! - concurrent `put`/`delete` on one key must not corrupt state
//!   (last-writer-wins); a deleted key never reappears.

/// Backend selection from configuration
pub mod factory;
/// In-memory implementation
pub mod memory;
/// Redis implementation
pub mod redis;

use crate::errors::AppResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub use factory::state_store_from_config;
pub use memory::InMemoryStateStore;
pub use redis::RedisStateStore;

/// TTL-aware key/value store for ephemeral protocol state
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Store a value under `key` for at most `ttl`
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()>;

    /// Fetch a value; expired keys are absent
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Atomically fetch and remove a value; expired keys are absent.
    /// At most one concurrent caller observes the value.
    async fn take(&self, key: &str) -> AppResult<Option<Vec<u8>>>;
}

/// Store a serializable record
pub async fn put_json<T: Serialize + Sync>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> AppResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.put(key, &bytes, ttl).await
}

/// Fetch and deserialize a record
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> AppResult<Option<T>> {
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Atomically fetch-and-remove and deserialize a record
pub async fn take_json<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> AppResult<Option<T>> {
    match store.take(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Key namespaces for each record class.
///
/// All callers build keys through these helpers so a record class can never
/// collide with another.
pub mod keys {
    /// CSRF state for a federation flow
    #[must_use]
    pub fn auth_state(state: &str) -> String {
        format!("fedstate:{state}")
    }

    /// Single-use authorization code
    #[must_use]
    pub fn auth_code(code: &str) -> String {
        format!("authcode:{code}")
    }

    /// First-party session
    #[must_use]
    pub fn session(session_id: &str) -> String {
        format!("session:{session_id}")
    }

    /// Server-side refresh token record
    #[must_use]
    pub fn refresh_token(token: &str) -> String {
        format!("refresh:{token}")
    }

    /// Revocation marker for an access token `jti`
    #[must_use]
    pub fn revoked_jti(jti: &str) -> String {
        format!("revoked:{jti}")
    }
}
