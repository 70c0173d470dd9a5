// ABOUTME: Google federation provider: authorization URL, code exchange, OIDC userinfo
// ABOUTME: Plain form-encoded token exchange against Google's OAuth2/OIDC endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use super::{default_redirect_uri, FederationError, FederationProvider, UpstreamTokens};
use crate::config::oauth::OAuthProviderConfig;
use crate::models::UpstreamProfile;
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Google OAuth provider
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// OIDC userinfo claims we map into a profile
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleProvider {
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
            .unwrap_or_else(|| default_redirect_uri(issuer_url, "google"));

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
impl FederationProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    fn build_authorization_url(&self, state: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
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
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| FederationError::TokenExchangeFailed(e.to_string()))?;

        let token_response: GoogleTokenResponse = response
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
            .get(USERINFO_URL)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| FederationError::ProfileFetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FederationError::ProfileFetchFailed(format!(
                "userinfo returned {}",
                response.status()
            )));
        }

        let info: GoogleUserInfo = response
            .json()
            .await
            .map_err(|e| FederationError::ProfileFetchFailed(format!("parse error: {e}")))?;

        Ok(UpstreamProfile {
            id: info.sub,
            email: info.email,
            name: info.name,
            picture: info.picture,
        })
    }
}
