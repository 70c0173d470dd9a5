// ABOUTME: OAuth2 endpoint rate limiting with per-IP fixed windows
// ABOUTME: DashMap sharding keeps the hot path lock-free on reads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use crate::config::environment::RateLimitConfig;
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitStatus {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Window limit for this endpoint
    pub limit: u32,
    /// Requests remaining in the current window
    pub remaining: u32,
    /// Seconds until the window resets
    pub retry_after_secs: u64,
}

/// Per-IP rate limiter for the OAuth2 endpoint set.
///
/// Uses `DashMap` for fine-grained locking instead of a global mutex; each
/// entry is `(request_count, window_start)` per `(ip, endpoint)`.
#[derive(Clone)]
pub struct OAuth2RateLimiter {
    state: Arc<DashMap<(IpAddr, &'static str), (u32, Instant)>>,
    config: RateLimitConfig,
}

impl OAuth2RateLimiter {
    /// Create a rate limiter from configuration
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            state: Arc::new(DashMap::new()),
            config,
        }
    }

    fn limit_for(&self, endpoint: &str) -> u32 {
        match endpoint {
            "authorize" => self.config.authorize_limit,
            "introspect" => self.config.introspect_limit,
            "revoke" => self.config.revoke_limit,
            _ => self.config.token_limit,
        }
    }

    /// Check and count a request against the window for `(ip, endpoint)`.
    /// Entry API gives an atomic read-modify-write without a full-map lock.
    #[must_use]
    pub fn check(&self, endpoint: &'static str, client_ip: IpAddr) -> RateLimitStatus {
        let limit = self.limit_for(endpoint);
        let window = Duration::from_secs(self.config.window_secs);
        let now = Instant::now();

        let mut entry = self.state.entry((client_ip, endpoint)).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) >= window {
            *count = 0;
            *window_start = now;
        }

        let elapsed = now.duration_since(*window_start);
        let retry_after_secs = window.saturating_sub(elapsed).as_secs();

        if *count >= limit {
            return RateLimitStatus {
                allowed: false,
                limit,
                remaining: 0,
                retry_after_secs,
            };
        }

        *count += 1;
        RateLimitStatus {
            allowed: true,
            limit,
            remaining: limit - *count,
            retry_after_secs,
        }
    }
}
