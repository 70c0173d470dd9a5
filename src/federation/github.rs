// ABOUTME: GitHub federation provider: authorization URL, code exchange, profile fetch
// ABOUTME: GitHub's token endpoint is form-encoded and only returns JSON when asked
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use super::{default_redirect_uri, FederationError, FederationProvider, UpstreamTokens};
use crate::config::oauth::OAuthProviderConfig;
use crate::models::UpstreamProfile;
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";

/// GitHub OAuth provider
pub struct GitHubProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
    http: reqwest::Client,
}

/// GitHub token endpoint response. GitHub reports errors in a 200 body,
/// so the error fields live alongside the success fields.
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Subset of the GitHub user object we map into a profile
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

impl GitHubProvider {
    /// Build a provider from configuration; `None` if credentials are absent
    #[must_use]
    pub fn from_config(
        config: &OAuthProviderConfig,
        issuer_url: &str,
        http: reqwest::Client,
    ) -> Option<Self> {
        let client_id = config.client_id.clone()?;
        let client_secret = config.client_secret.clone()?;
        let redirect_uri = config
            .redirect_uri
            .clone()
            .unwrap_or_else(|| default_redirect_uri(issuer_url, "github"));

        Some(Self {
            client_id,
            client_secret,
            redirect_uri,
            scopes: config.scopes.join(" "),
            http,
        })
    }
}

#[async_trait::async_trait]
impl FederationProvider for GitHubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    fn build_authorization_url(&self, state: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?client_id={}&redirect_uri={}&scope={}&state={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scopes),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<UpstreamTokens, FederationError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(TOKEN_URL)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| FederationError::TokenExchangeFailed(e.to_string()))?;

        let token_response: GitHubTokenResponse = response
            .json()
            .await
            .map_err(|e| FederationError::TokenExchangeFailed(format!("parse error: {e}")))?;

        if let Some(error) = token_response.error {
            return Err(FederationError::ProviderRejected {
                error,
                description: token_response.error_description,
            });
        }

        let access_token = token_response.access_token.ok_or_else(|| {
            FederationError::TokenExchangeFailed("response contained no access_token".into())
        })?;

        Ok(UpstreamTokens {
            access_token,
            scope: token_response.scope,
        })
    }

    async fn fetch_profile(
        &self,
        access_token: &str,
    ) -> Result<UpstreamProfile, FederationError> {
        let response = self
            .http
            .get(USER_URL)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Accept", "application/vnd.github+json")
            // GitHub rejects requests without a User-Agent
            .header("User-Agent", "advison-auth-server")
            .send()
            .await
            .map_err(|e| FederationError::ProfileFetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FederationError::ProfileFetchFailed(format!(
                "userinfo returned {}",
                response.status()
            )));
        }

        let user: GitHubUser = response
            .json()
            .await
            .map_err(|e| FederationError::ProfileFetchFailed(format!("parse error: {e}")))?;

        Ok(UpstreamProfile {
            id: user.id.to_string(),
            email: user.email,
            name: user.name.or(Some(user.login)),
            picture: user.avatar_url,
        })
    }
}
