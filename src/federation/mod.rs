// ABOUTME: Federation module organizing upstream identity provider clients
// ABOUTME: One polymorphic trait per provider; no per-provider branching in handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

//! # Federation Client
//!
//! Drives the upstream authorization-code exchange and user-profile fetch
//! for each supported identity provider. Providers differ in wire details
//! (GitHub wants `Accept: application/json` and a `User-Agent`; Google is
//! plain form-encoded OIDC), so each lives behind the one
//! [`FederationProvider`] trait and handlers never branch on provider name.
//!
//! Error policy: network failure, malformed JSON, a provider `error` field,
//! or a missing `access_token` are all a [`FederationError`] - a
//! provider-auth failure distinct from client/protocol errors. There are no
//! automatic retries; the recovery path is a fresh `/authorize` from the
//! user.

/// GitHub provider implementation
pub mod github;
/// Google provider implementation
pub mod google;

use crate::constants::upstream;
use crate::models::UpstreamProfile;
use std::collections::HashMap;
use std::time::Duration;

pub use github::GitHubProvider;
pub use google::GoogleProvider;

/// Tokens returned by an upstream code exchange.
///
/// Only held in memory for the duration of the callback; never persisted and
/// never forwarded to first-party clients.
#[derive(Debug, Clone)]
pub struct UpstreamTokens {
    /// Bearer token for the userinfo fetch
    pub access_token: String,
    /// Scopes the provider actually granted, when reported
    pub scope: Option<String>,
}

/// Federation failure taxonomy
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    #[error("provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("provider {0} is not configured")]
    ProviderNotConfigured(String),

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("provider rejected the exchange: {error}: {}", .description.as_deref().unwrap_or("no description"))]
    ProviderRejected {
        /// Provider's `error` code
        error: String,
        /// Provider's `error_description`, when present
        description: Option<String>,
    },

    #[error("profile fetch failed: {0}")]
    ProfileFetchFailed(String),
}

/// Uniform interface over upstream identity providers
#[async_trait::async_trait]
pub trait FederationProvider: Send + Sync {
    /// Provider name as it appears in URLs and session records
    fn name(&self) -> &'static str;

    /// Build the upstream authorization URL embedding client id, scope,
    /// `response_type=code`, and the CSRF state
    fn build_authorization_url(&self, state: &str) -> String;

    /// Redirect URI registered with the provider for this deployment
    fn redirect_uri(&self) -> &str;

    /// Exchange an authorization code for upstream tokens (server-to-server)
    async fn exchange_code(&self, code: &str) -> Result<UpstreamTokens, FederationError>;

    /// Fetch the authenticated user's profile with bearer auth.
    /// A non-2xx response is a hard failure.
    async fn fetch_profile(
        &self,
        access_token: &str,
    ) -> Result<UpstreamProfile, FederationError>;
}

/// Registry of configured federation providers
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn FederationProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Build the registry from provider configuration, skipping providers
    /// whose credentials are absent
    #[must_use]
    pub fn from_config(config: &crate::config::oauth::OAuthConfig, issuer_url: &str) -> Self {
        let http = shared_http_client();
        let mut registry = Self::new();

        if config.github.enabled {
            if let Some(provider) = GitHubProvider::from_config(&config.github, issuer_url, http.clone()) {
                registry.register(Box::new(provider));
            }
        }
        if config.google.enabled {
            if let Some(provider) = GoogleProvider::from_config(&config.google, issuer_url, http) {
                registry.register(Box::new(provider));
            }
        }

        registry
    }

    /// Register a provider
    pub fn register(&mut self, provider: Box<dyn FederationProvider>) {
        let name = provider.name().to_owned();
        self.providers.insert(name, provider);
    }

    /// Get a provider by name; unknown or unconfigured providers are a
    /// [`FederationError`]
    pub fn get(&self, name: &str) -> Result<&dyn FederationProvider, FederationError> {
        self.providers
            .get(name)
            .map(AsRef::as_ref)
            .ok_or_else(|| FederationError::ProviderNotConfigured(name.to_owned()))
    }

    /// List all registered provider names
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared upstream HTTP client with a bounded timeout.
///
/// Upstream calls are the only outbound I/O in the request path; the
/// timeout bounds how long a callback can stall behind a slow provider.
#[must_use]
pub fn shared_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(upstream::PROVIDER_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}

/// Default upstream redirect URI when the deployment does not override it
pub(crate) fn default_redirect_uri(issuer_url: &str, provider: &str) -> String {
    format!("{issuer_url}/auth/{provider}/callback")
}
