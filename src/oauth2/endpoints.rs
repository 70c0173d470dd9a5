// ABOUTME: OAuth 2.0 authorization and token endpoint implementation
// ABOUTME: Single-use codes, PKCE verification, refresh rotation, fail-closed introspection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use super::models::{
    AuthorizeRequest, AuthorizeResponse, IntrospectionResponse, OAuth2Error, TokenRequest,
    TokenResponse,
};
use crate::auth::AuthManager;
use crate::clients::ClientRegistry;
use crate::config::environment::TtlConfig;
use crate::constants::oauth;
use crate::models::{AuthorizationCode, Client, RefreshTokenRecord};
use crate::store::{self, keys, StateStore};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Client credentials presented with a token request, either as form fields
/// or via HTTP Basic
#[derive(Debug, Default)]
pub struct ClientCredentials {
    /// Client identifier
    pub client_id: Option<String>,
    /// Client secret, absent for public clients
    pub client_secret: Option<String>,
}

/// OAuth 2.0 Authorization Server
pub struct OAuth2AuthorizationServer {
    clients: Arc<ClientRegistry>,
    auth_manager: Arc<AuthManager>,
    store: Arc<dyn StateStore>,
    ttls: TtlConfig,
}

impl OAuth2AuthorizationServer {
    #[must_use]
    pub fn new(
        clients: Arc<ClientRegistry>,
        auth_manager: Arc<AuthManager>,
        store: Arc<dyn StateStore>,
        ttls: TtlConfig,
    ) -> Self {
        Self {
            clients,
            auth_manager,
            store,
            ttls,
        }
    }

    /// Handle an authorization request (GET /oauth/authorize).
    ///
    /// `subject` is the authenticated end user, resolved by the route layer
    /// from an existing first-party session. Client and redirect URI
    /// validation happens before anything else: a request with an unregistered
    /// redirect URI is rejected outright, never redirected to.
    ///
    /// # Errors
    ///
    /// Returns an [`OAuth2Error`] on any validation failure
    pub async fn authorize(
        &self,
        request: AuthorizeRequest,
        subject: Option<Uuid>,
    ) -> Result<AuthorizeResponse, OAuth2Error> {
        let Some(client) = self.clients.get(&request.client_id) else {
            tracing::warn!(client_id = %request.client_id, "authorize: unknown client");
            return Err(OAuth2Error::invalid_client());
        };

        if request.response_type != "code" {
            return Err(OAuth2Error::invalid_request(
                "Only 'code' response_type is supported",
            ));
        }

        if !client.owns_redirect_uri(&request.redirect_uri) {
            tracing::warn!(
                client_id = %request.client_id,
                redirect_uri = %request.redirect_uri,
                "authorize: redirect_uri is not registered for this client"
            );
            return Err(OAuth2Error::invalid_request("Invalid redirect_uri"));
        }

        let scope = match &request.scope {
            Some(requested) if !requested.trim().is_empty() => {
                if !client.allows_scopes(requested) {
                    return Err(OAuth2Error::invalid_scope(
                        "Requested scope exceeds what this client is allowed",
                    ));
                }
                requested.clone()
            }
            _ => client.allowed_scopes.join(" "),
        };

        Self::validate_pkce_params(client, &request)?;

        let Some(subject) = subject else {
            return Err(OAuth2Error::invalid_request(
                "User authentication required: complete a federated login first",
            ));
        };

        let code = self
            .issue_authorization_code(client, subject, &scope, &request)
            .await?;

        Ok(AuthorizeResponse {
            code,
            state: request.state,
        })
    }

    /// Validate PKCE parameters at authorize time (RFC 7636).
    ///
    /// PKCE is optional for confidential clients and mandatory for public
    /// ones; only the `S256` method is accepted.
    fn validate_pkce_params(
        client: &Client,
        request: &AuthorizeRequest,
    ) -> Result<(), OAuth2Error> {
        if let Some(code_challenge) = &request.code_challenge {
            if code_challenge.len() < oauth::PKCE_MIN_LEN
                || code_challenge.len() > oauth::PKCE_MAX_LEN
            {
                return Err(OAuth2Error::invalid_request(
                    "code_challenge must be between 43 and 128 characters",
                ));
            }

            let method = request.code_challenge_method.as_deref().unwrap_or("S256");
            if method != "S256" {
                return Err(OAuth2Error::invalid_request(
                    "code_challenge_method must be 'S256' (plain is not supported)",
                ));
            }
        } else if !client.is_confidential() {
            return Err(OAuth2Error::invalid_request(
                "code_challenge is required for public clients (PKCE)",
            ));
        }

        Ok(())
    }

    /// Mint and persist a single-use authorization code.
    /// The store write is the last step; nothing is half-written on failure.
    async fn issue_authorization_code(
        &self,
        client: &Client,
        subject: Uuid,
        scope: &str,
        request: &AuthorizeRequest,
    ) -> Result<String, OAuth2Error> {
        let code = AuthManager::generate_token_string().map_err(|e| {
            tracing::error!("failed to generate authorization code: {e}");
            OAuth2Error::invalid_request("Failed to generate authorization code")
        })?;

        let ttl_secs = i64::try_from(self.ttls.code_ttl.as_secs()).unwrap_or(600);
        let auth_code = AuthorizationCode {
            code: code.clone(),
            client_id: client.client_id.clone(),
            subject,
            scope: scope.to_owned(),
            redirect_uri: request.redirect_uri.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        };

        store::put_json(
            self.store.as_ref(),
            &keys::auth_code(&code),
            &auth_code,
            self.ttls.code_ttl,
        )
        .await
        .map_err(|e| {
            tracing::error!(client_id = %client.client_id, "failed to store authorization code: {e}");
            OAuth2Error::invalid_request("Failed to store authorization code")
        })?;

        Ok(code)
    }

    /// Handle a token request (POST /oauth/token)
    ///
    /// # Errors
    ///
    /// Returns an [`OAuth2Error`] if client authentication or the grant fails
    pub async fn token(
        &self,
        request: TokenRequest,
        credentials: ClientCredentials,
    ) -> Result<TokenResponse, OAuth2Error> {
        // HTTP Basic takes precedence over form fields (RFC 6749 section 2.3.1)
        let client_id = credentials
            .client_id
            .or_else(|| request.client_id.clone())
            .ok_or_else(|| OAuth2Error::invalid_request("Missing client_id"))?;
        let client_secret = credentials
            .client_secret
            .or_else(|| request.client_secret.clone());

        let client = self
            .clients
            .authenticate(&client_id, client_secret.as_deref())
            .map_err(|e| {
                tracing::warn!(client_id = %client_id, "client authentication failed: {e}");
                OAuth2Error::invalid_client()
            })?;

        match request.grant_type.as_str() {
            "authorization_code" => self.handle_authorization_code_grant(client, request).await,
            "refresh_token" => self.handle_refresh_token_grant(client, request).await,
            _ => Err(OAuth2Error::unsupported_grant_type()),
        }
    }

    /// Handle the authorization_code grant
    async fn handle_authorization_code_grant(
        &self,
        client: &Client,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = request
            .code
            .ok_or_else(|| OAuth2Error::invalid_request("Missing authorization code"))?;

        let redirect_uri = request
            .redirect_uri
            .ok_or_else(|| OAuth2Error::invalid_request("Missing redirect_uri"))?;

        let auth_code = self
            .consume_auth_code(&code, &client.client_id, &redirect_uri)
            .await?;

        // PKCE verification happens after consumption so a failed verifier
        // still burns the code
        Self::verify_pkce(&auth_code, request.code_verifier.as_deref(), &client.client_id)?;

        let access = self
            .auth_manager
            .issue_access_token(
                &auth_code.subject.to_string(),
                &auth_code.scope,
                None,
                self.access_token_duration(),
            )
            .map_err(|e| {
                tracing::error!(client_id = %client.client_id, "failed to issue access token: {e}");
                OAuth2Error::invalid_request("Failed to generate access token")
            })?;

        let refresh_token = self
            .issue_refresh_token(&client.client_id, auth_code.subject, &auth_code.scope)
            .await?;

        Ok(TokenResponse {
            access_token: access.token,
            token_type: "Bearer".to_owned(),
            expires_in: i64::try_from(self.ttls.access_token_ttl.as_secs()).unwrap_or(3600),
            scope: Some(auth_code.scope),
            refresh_token: Some(refresh_token),
        })
    }

    /// Handle the refresh_token grant with rotation
    async fn handle_refresh_token_grant(
        &self,
        client: &Client,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let refresh_token_value = request
            .refresh_token
            .ok_or_else(|| OAuth2Error::invalid_request("Missing refresh_token"))?;

        // Atomic take both validates single-use and performs the delete half
        // of rotation; a replayed refresh token finds nothing
        let old_record: RefreshTokenRecord = store::take_json(
            self.store.as_ref(),
            &keys::refresh_token(&refresh_token_value),
        )
        .await
        .map_err(|e| {
            tracing::error!(client_id = %client.client_id, "failed to consume refresh token: {e}");
            OAuth2Error::invalid_grant("Failed to consume refresh token")
        })?
        .ok_or_else(|| {
            tracing::warn!(
                client_id = %client.client_id,
                "refresh token not found, already rotated, or expired"
            );
            OAuth2Error::invalid_grant("Invalid or expired refresh token")
        })?;

        if old_record.is_expired(Utc::now()) {
            return Err(OAuth2Error::invalid_grant("Invalid or expired refresh token"));
        }

        if old_record.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                "refresh token belongs to a different client"
            );
            return Err(OAuth2Error::invalid_grant("Invalid or expired refresh token"));
        }

        let access = self
            .auth_manager
            .issue_access_token(
                &old_record.subject.to_string(),
                &old_record.scope,
                None,
                self.access_token_duration(),
            )
            .map_err(|e| {
                tracing::error!(client_id = %client.client_id, "failed to issue access token: {e}");
                OAuth2Error::invalid_request("Failed to generate access token")
            })?;

        let new_refresh_token = self
            .issue_refresh_token(&client.client_id, old_record.subject, &old_record.scope)
            .await?;

        tracing::info!(
            client_id = %client.client_id,
            subject = %old_record.subject,
            "refresh token rotated"
        );

        Ok(TokenResponse {
            access_token: access.token,
            token_type: "Bearer".to_owned(),
            expires_in: i64::try_from(self.ttls.access_token_ttl.as_secs()).unwrap_or(3600),
            scope: Some(old_record.scope),
            refresh_token: Some(new_refresh_token),
        })
    }

    /// Atomically consume an authorization code and validate its bindings.
    ///
    /// `take` removes the record in the same operation that reads it, so a
    /// second redemption attempt finds nothing regardless of interleaving.
    async fn consume_auth_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<AuthorizationCode, OAuth2Error> {
        let auth_code: AuthorizationCode =
            store::take_json(self.store.as_ref(), &keys::auth_code(code))
                .await
                .map_err(|e| {
                    tracing::error!(client_id = %client_id, "failed to consume authorization code: {e}");
                    OAuth2Error::invalid_grant("Failed to consume authorization code")
                })?
                .ok_or_else(|| {
                    tracing::warn!(
                        client_id = %client_id,
                        "authorization code not found, already used, or expired"
                    );
                    OAuth2Error::invalid_grant("Invalid or expired authorization code")
                })?;

        if auth_code.is_expired(Utc::now()) {
            return Err(OAuth2Error::invalid_grant(
                "Invalid or expired authorization code",
            ));
        }

        if auth_code.client_id != client_id {
            tracing::warn!(
                client_id = %client_id,
                "authorization code was issued to a different client"
            );
            return Err(OAuth2Error::invalid_grant(
                "Authorization code was not issued to this client",
            ));
        }

        if auth_code.redirect_uri != redirect_uri {
            tracing::warn!(client_id = %client_id, "redirect_uri mismatch at token exchange");
            return Err(OAuth2Error::invalid_grant("redirect_uri mismatch"));
        }

        Ok(auth_code)
    }

    /// Verify the PKCE code_verifier against the stored challenge (RFC 7636)
    fn verify_pkce(
        auth_code: &AuthorizationCode,
        code_verifier: Option<&str>,
        client_id: &str,
    ) -> Result<(), OAuth2Error> {
        let Some(stored_challenge) = &auth_code.code_challenge else {
            if code_verifier.is_some() {
                return Err(OAuth2Error::invalid_grant(
                    "code_verifier provided but no code_challenge was issued",
                ));
            }
            return Ok(());
        };

        let verifier = code_verifier
            .ok_or_else(|| OAuth2Error::invalid_grant("code_verifier is required (PKCE)"))?;

        // RFC 7636 section 4.1: 43-128 characters from the unreserved set
        if verifier.len() < oauth::PKCE_MIN_LEN || verifier.len() > oauth::PKCE_MAX_LEN {
            return Err(OAuth2Error::invalid_grant(
                "code_verifier must be between 43 and 128 characters",
            ));
        }

        if !verifier
            .chars()
            .all(|c| matches!(c, 'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~'))
        {
            return Err(OAuth2Error::invalid_grant(
                "code_verifier contains invalid characters",
            ));
        }

        let method = auth_code.code_challenge_method.as_deref().unwrap_or("S256");
        if method != "S256" {
            return Err(OAuth2Error::invalid_grant(
                "Only the S256 code_challenge_method is supported",
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let computed_challenge = general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize());

        // Constant-time comparison to prevent timing attacks
        if computed_challenge
            .as_bytes()
            .ct_eq(stored_challenge.as_bytes())
            .into()
        {
            Ok(())
        } else {
            tracing::warn!(client_id = %client_id, "PKCE verification failed");
            Err(OAuth2Error::invalid_grant("Invalid code_verifier"))
        }
    }

    /// Mint and persist an opaque refresh token
    async fn issue_refresh_token(
        &self,
        client_id: &str,
        subject: Uuid,
        scope: &str,
    ) -> Result<String, OAuth2Error> {
        let token = AuthManager::generate_token_string().map_err(|e| {
            tracing::error!("failed to generate refresh token: {e}");
            OAuth2Error::invalid_request("Failed to generate refresh token")
        })?;

        let ttl_secs = i64::try_from(self.ttls.refresh_token_ttl.as_secs())
            .unwrap_or(30 * 24 * 3600);
        let now = Utc::now();
        let record = RefreshTokenRecord {
            token: token.clone(),
            client_id: client_id.to_owned(),
            subject,
            scope: scope.to_owned(),
            expires_at: now + Duration::seconds(ttl_secs),
            created_at: now,
        };

        store::put_json(
            self.store.as_ref(),
            &keys::refresh_token(&token),
            &record,
            self.ttls.refresh_token_ttl,
        )
        .await
        .map_err(|e| {
            tracing::error!(client_id = %client_id, "failed to store refresh token: {e}");
            OAuth2Error::invalid_request("Failed to store refresh token")
        })?;

        Ok(token)
    }

    /// Introspect token material (RFC 7662). Never errors: anything
    /// unverifiable is reported inactive.
    pub async fn introspect(&self, token: &str) -> IntrospectionResponse {
        self.auth_manager.introspect(token).await.into()
    }

    /// Revoke token material (RFC 7009). Idempotent: unknown tokens are a
    /// successful no-op.
    pub async fn revoke(&self, token: &str) {
        if let Err(e) = self.auth_manager.revoke(token).await {
            // RFC 7009: the client cannot act on a revocation failure, so
            // the response stays 200; the failure is an operator concern
            tracing::error!("revocation store write failed: {e}");
        }
    }

    fn access_token_duration(&self) -> Duration {
        Duration::seconds(i64::try_from(self.ttls.access_token_ttl.as_secs()).unwrap_or(3600))
    }
}
