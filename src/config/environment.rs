// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses env vars into a typed ServerConfig with startup validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

//! Environment-based configuration management for production deployment

use super::oauth::OAuthConfig;
use crate::constants::{oauth, ports, store};
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Lifetimes for every record class owned by the state store
#[derive(Debug, Clone)]
pub struct TtlConfig {
    /// CSRF state lifetime for federation flows
    pub state_ttl: Duration,
    /// Authorization code lifetime
    pub code_ttl: Duration,
    /// First-party session lifetime
    pub session_ttl: Duration,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            state_ttl: Duration::from_secs(oauth::STATE_TTL_SECS),
            code_ttl: Duration::from_secs(oauth::CODE_TTL_SECS),
            session_ttl: Duration::from_secs(oauth::SESSION_TTL_SECS),
            access_token_ttl: Duration::from_secs(oauth::ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::from_secs(oauth::REFRESH_TOKEN_TTL_SECS),
        }
    }
}

impl TtlConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            state_ttl: env_duration_secs("AUTH_STATE_TTL_SECS", defaults.state_ttl),
            code_ttl: env_duration_secs("AUTH_CODE_TTL_SECS", defaults.code_ttl),
            session_ttl: env_duration_secs("AUTH_SESSION_TTL_SECS", defaults.session_ttl),
            access_token_ttl: env_duration_secs(
                "AUTH_ACCESS_TOKEN_TTL_SECS",
                defaults.access_token_ttl,
            ),
            refresh_token_ttl: env_duration_secs(
                "AUTH_REFRESH_TOKEN_TTL_SECS",
                defaults.refresh_token_ttl,
            ),
        }
    }
}

/// State store backend selection and sizing
#[derive(Debug, Clone)]
pub struct StoreBackendConfig {
    /// Redis connection URL; `None` selects the in-memory backend
    pub redis_url: Option<String>,
    /// Bounded entry count for the in-memory backend
    pub max_entries: usize,
    /// Background cleanup cadence for the in-memory backend
    pub cleanup_interval: Duration,
}

impl Default for StoreBackendConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            max_entries: store::DEFAULT_MAX_ENTRIES,
            cleanup_interval: Duration::from_secs(store::DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }
}

/// Per-endpoint request limits for the OAuth2 rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Window length in seconds
    pub window_secs: u64,
    /// `GET /oauth/authorize` requests per window per IP
    pub authorize_limit: u32,
    /// `POST /oauth/token` requests per window per IP
    pub token_limit: u32,
    /// `POST /oauth/introspect` requests per window per IP
    pub introspect_limit: u32,
    /// `POST /oauth/revoke` requests per window per IP
    pub revoke_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            authorize_limit: 30,
            token_limit: 60,
            introspect_limit: 120,
            revoke_limit: 60,
        }
    }
}

/// Top-level server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Issuer base URL advertised in discovery metadata and token claims
    pub issuer_url: String,
    /// First-party destination the callback redirects to
    pub post_login_redirect_url: String,
    /// Token signing secret
    pub jwt_secret: Vec<u8>,
    /// Path to the pre-provisioned clients JSON file
    pub clients_file: Option<PathBuf>,
    /// Record lifetimes
    pub ttls: TtlConfig,
    /// State store backend
    pub store: StoreBackendConfig,
    /// Upstream provider credentials
    pub oauth: OAuthConfig,
    /// OAuth2 endpoint rate limits
    pub rate_limits: RateLimitConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but unparseable, or if the
    /// signing secret is present but too short.
    pub fn from_env() -> Result<Self> {
        let http_port = match env::var("AUTH_HTTP_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("AUTH_HTTP_PORT is not a valid port: {value}"))?,
            Err(_) => ports::DEFAULT_HTTP_PORT,
        };

        let issuer_url = env::var("AUTH_ISSUER_URL")
            .unwrap_or_else(|_| format!("http://localhost:{http_port}"));
        let issuer_url = issuer_url.trim_end_matches('/').to_owned();

        let post_login_redirect_url = env::var("AUTH_POST_LOGIN_REDIRECT_URL")
            .unwrap_or_else(|_| format!("{issuer_url}/dashboard"));

        let jwt_secret = match env::var("AUTH_JWT_SECRET") {
            Ok(secret) => {
                anyhow::ensure!(
                    secret.len() >= 32,
                    "AUTH_JWT_SECRET must be at least 32 bytes ({} provided)",
                    secret.len()
                );
                secret.into_bytes()
            }
            Err(_) => {
                warn!(
                    "AUTH_JWT_SECRET is not set; using an ephemeral secret - \
                     issued tokens will not survive a restart"
                );
                crate::auth::generate_jwt_secret()?.to_vec()
            }
        };

        let clients_file = env::var("AUTH_CLIENTS_FILE").ok().map(PathBuf::from);

        let store = StoreBackendConfig {
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            ..StoreBackendConfig::default()
        };

        Ok(Self {
            http_port,
            issuer_url,
            post_login_redirect_url,
            jwt_secret,
            clients_file,
            ttls: TtlConfig::from_env(),
            store,
            oauth: OAuthConfig::from_env(),
            rate_limits: RateLimitConfig::default(),
        })
    }

    /// Validate configuration that cannot be checked at parse time.
    /// Fails loudly at startup rather than issuing a broken flow later.
    ///
    /// # Errors
    ///
    /// Returns an error if an enabled upstream provider has broken
    /// credentials.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.oauth.validate_and_log(),
            "upstream provider configuration is invalid"
        );
        Ok(())
    }

    /// One-line summary for startup logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "issuer={} port={} store={} providers=[{}{}] clients_file={}",
            self.issuer_url,
            self.http_port,
            if self.store.redis_url.is_some() {
                "redis"
            } else {
                "memory"
            },
            if self.oauth.github.enabled {
                "github "
            } else {
                ""
            },
            if self.oauth.google.enabled {
                "google"
            } else {
                ""
            },
            self.clients_file
                .as_ref()
                .map_or_else(|| "none".into(), |p| p.display().to_string()),
        )
    }
}

fn env_duration_secs(var: &str, default: Duration) -> Duration {
    env::var(var)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
