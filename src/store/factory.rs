// ABOUTME: State store factory selecting a backend from configuration
// ABOUTME: REDIS_URL set selects Redis; otherwise the bounded in-memory store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use super::{InMemoryStateStore, RedisStateStore, StateStore};
use crate::config::environment::StoreBackendConfig;
use crate::errors::AppResult;
use std::sync::Arc;
use tracing::info;

/// Build the state store selected by configuration
///
/// # Errors
///
/// Returns an error if the Redis backend is selected and the connection fails
pub async fn state_store_from_config(
    config: &StoreBackendConfig,
) -> AppResult<Arc<dyn StateStore>> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStateStore::connect(url).await?;
            info!("state store backend: redis");
            Ok(Arc::new(store))
        }
        None => {
            info!(
                max_entries = config.max_entries,
                "state store backend: in-memory"
            );
            Ok(Arc::new(InMemoryStateStore::with_config(config, true)))
        }
    }
}
