// ABOUTME: OAuth configuration types for upstream identity providers
// ABOUTME: Handles GitHub and Google client credentials and redirect settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use tracing::{info, warn};

/// Upstream provider configuration for federated login
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OAuthConfig {
    /// GitHub OAuth app configuration
    pub github: OAuthProviderConfig,
    /// Google OAuth app configuration
    pub google: OAuthProviderConfig,
}

impl OAuthConfig {
    /// Load upstream provider configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            github: OAuthProviderConfig::load(
                "GITHUB_CLIENT_ID",
                "GITHUB_CLIENT_SECRET",
                "GITHUB_REDIRECT_URI",
                &["read:user".into(), "user:email".into()],
            ),
            google: OAuthProviderConfig::load(
                "GOOGLE_CLIENT_ID",
                "GOOGLE_CLIENT_SECRET",
                "GOOGLE_REDIRECT_URI",
                &["openid".into(), "email".into(), "profile".into()],
            ),
        }
    }

    /// Validate all configured providers, logging diagnostics.
    /// Returns false if an enabled provider has broken credentials.
    #[must_use]
    pub fn validate_and_log(&self) -> bool {
        self.github.validate_and_log("github") && self.google.validate_and_log("google")
    }
}

/// Provider-specific OAuth configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OAuthProviderConfig {
    /// OAuth client ID
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<String>,
    /// OAuth redirect URI
    pub redirect_uri: Option<String>,
    /// OAuth scopes requested upstream
    pub scopes: Vec<String>,
    /// Enable this provider
    pub enabled: bool,
}

impl OAuthProviderConfig {
    fn load(id_var: &str, secret_var: &str, redirect_var: &str, default_scopes: &[String]) -> Self {
        let client_id = env::var(id_var).ok().filter(|v| !v.is_empty());
        let client_secret = env::var(secret_var).ok().filter(|v| !v.is_empty());
        let redirect_uri = env::var(redirect_var).ok().filter(|v| !v.is_empty());
        let enabled = client_id.is_some() && client_secret.is_some();

        Self {
            client_id,
            client_secret,
            redirect_uri,
            scopes: default_scopes.to_vec(),
            enabled,
        }
    }

    /// Compute SHA256 fingerprint of the client secret for debugging
    /// (first 8 hex chars). Allows comparing secrets without logging values.
    #[must_use]
    pub fn secret_fingerprint(&self) -> Option<String> {
        self.client_secret.as_ref().map(|secret| {
            let mut hasher = Sha256::new();
            hasher.update(secret.as_bytes());
            let result = hasher.finalize();
            format!("{result:x}").chars().take(8).collect()
        })
    }

    /// Validate provider credentials and log diagnostics.
    /// Returns true if the provider is disabled or its credentials look sane.
    #[must_use]
    pub fn validate_and_log(&self, provider_name: &str) -> bool {
        if !self.enabled {
            info!("OAuth provider {provider_name} is disabled (credentials not set)");
            return true;
        }

        let Some(client_id) = self.client_id.as_deref().filter(|v| !v.is_empty()) else {
            warn!("OAuth provider {provider_name}: client_id is missing or empty");
            return false;
        };

        if self
            .client_secret
            .as_deref()
            .is_none_or(|v| v.is_empty())
        {
            warn!("OAuth provider {provider_name}: client_secret is missing or empty");
            return false;
        }

        info!(
            provider = provider_name,
            client_id_len = client_id.len(),
            secret_fingerprint = ?self.secret_fingerprint(),
            redirect_uri = ?self.redirect_uri,
            "OAuth provider configured"
        );
        true
    }
}
