// ABOUTME: Session broker mapping completed federated logins to first-party sessions
// ABOUTME: Owns CSRF state lifecycle; upstream tokens never leave this module
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

//! # Session Broker
//!
//! Drives the federation flow end to end: start a login (mint CSRF state,
//! redirect upstream), complete a callback (consume the state exactly once,
//! exchange the code, fetch the profile), and persist the resulting
//! first-party session. The end user walks away with an opaque session id
//! only - raw provider tokens are dropped on the floor once the profile is
//! fetched.

/// HTTP routes for federated login and session lookup
pub mod routes;

use crate::auth::AuthManager;
use crate::config::environment::TtlConfig;
use crate::constants::oauth;
use crate::errors::{AppError, AppResult};
use crate::federation::{FederationError, ProviderRegistry};
use crate::models::{derive_subject, AuthorizationState, Session};
use crate::store::{self, keys, StateStore};
use chrono::{Duration, Utc};
use std::sync::Arc;
use url::Url;

/// Providers this deployment knows how to federate with
const KNOWN_PROVIDERS: &[&str] = &["github", "google"];

/// Outcome of a completed federated login
#[derive(Debug, Clone)]
pub struct CompletedLogin {
    /// Opaque session id handed to the browser
    pub session_id: String,
    /// First-party destination carrying only the session id
    pub redirect_url: String,
}

/// Broker between the federation client and first-party sessions
pub struct SessionBroker {
    store: Arc<dyn StateStore>,
    auth_manager: Arc<AuthManager>,
    providers: Arc<ProviderRegistry>,
    ttls: TtlConfig,
    post_login_redirect_url: String,
}

impl SessionBroker {
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        auth_manager: Arc<AuthManager>,
        providers: Arc<ProviderRegistry>,
        ttls: TtlConfig,
        post_login_redirect_url: String,
    ) -> Self {
        Self {
            store,
            auth_manager,
            providers,
            ttls,
            post_login_redirect_url,
        }
    }

    /// Start a federation flow: mint CSRF state and build the upstream
    /// authorization URL. The state write is the last step, so a failure
    /// here leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or unconfigured providers, or if the
    /// state store write fails
    pub async fn begin_login(
        &self,
        provider_name: &str,
        return_to: Option<String>,
    ) -> AppResult<String> {
        let provider = self.lookup_provider(provider_name)?;

        let state = AuthManager::generate_state_token()?;
        let authorization_url = provider.build_authorization_url(&state);

        let auth_state = AuthorizationState {
            state: state.clone(),
            provider: provider_name.to_owned(),
            created_at: Utc::now(),
            redirect_uri: provider.redirect_uri().to_owned(),
            code_challenge: None,
            code_challenge_method: None,
            return_to,
        };

        store::put_json(
            self.store.as_ref(),
            &keys::auth_state(&state),
            &auth_state,
            self.ttls.state_ttl,
        )
        .await?;

        tracing::debug!(provider = provider_name, "federation flow started");
        Ok(authorization_url)
    }

    /// Complete a federation callback.
    ///
    /// The state is consumed atomically before anything else happens: an
    /// absent, expired, or replayed state fails here and no session is
    /// created. Upstream failures after that point surface as provider-auth
    /// failures; they never fall back to a degraded session.
    ///
    /// # Errors
    ///
    /// Returns 400-class errors for state problems and 502-class errors for
    /// upstream failures
    pub async fn complete_login(
        &self,
        provider_name: &str,
        code: &str,
        state: &str,
    ) -> AppResult<CompletedLogin> {
        let auth_state: AuthorizationState =
            store::take_json(self.store.as_ref(), &keys::auth_state(state))
                .await?
                .ok_or_else(|| {
                    tracing::warn!(
                        provider = provider_name,
                        "callback with unknown, expired, or replayed state"
                    );
                    AppError::invalid_input("Invalid state")
                })?;

        if auth_state.provider != provider_name {
            tracing::warn!(
                provider = provider_name,
                state_provider = %auth_state.provider,
                "callback provider does not match the provider the state was issued for"
            );
            return Err(AppError::invalid_input("Invalid state"));
        }

        let provider = self.lookup_provider(provider_name)?;

        let upstream_tokens = provider
            .exchange_code(code)
            .await
            .map_err(map_federation_error)?;

        let profile = provider
            .fetch_profile(&upstream_tokens.access_token)
            .await
            .map_err(map_federation_error)?;

        let subject = derive_subject(provider_name, &profile.id);

        let access_ttl =
            Duration::seconds(i64::try_from(self.ttls.access_token_ttl.as_secs()).unwrap_or(3600));
        let access = self.auth_manager.issue_access_token(
            &subject.to_string(),
            oauth::DEFAULT_SESSION_SCOPE,
            Some(provider_name),
            access_ttl,
        )?;

        let session_id = AuthManager::generate_state_token()?;
        let session_ttl_secs =
            i64::try_from(self.ttls.session_ttl.as_secs()).unwrap_or(86_400);
        let now = Utc::now();
        let session = Session {
            session_id: session_id.clone(),
            subject,
            provider: provider_name.to_owned(),
            scope: oauth::DEFAULT_SESSION_SCOPE.to_owned(),
            access_token: access.token,
            access_token_jti: access.jti,
            refresh_token: None,
            issued_at: now,
            expires_at: now + Duration::seconds(session_ttl_secs),
        };

        // Last write of the phase: a failure above leaves no session behind
        store::put_json(
            self.store.as_ref(),
            &keys::session(&session_id),
            &session,
            self.ttls.session_ttl,
        )
        .await?;

        tracing::info!(
            provider = provider_name,
            subject = %subject,
            "federated login completed"
        );

        let destination = auth_state
            .return_to
            .unwrap_or_else(|| self.post_login_redirect_url.clone());
        let redirect_url = append_session_param(&destination, &session_id);

        Ok(CompletedLogin {
            session_id,
            redirect_url,
        })
    }

    /// Look up a session, re-minting its access token if it has expired
    /// while the session itself is still live.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails
    pub async fn session(&self, session_id: &str) -> AppResult<Option<Session>> {
        let Some(mut session) =
            store::get_json::<Session>(self.store.as_ref(), &keys::session(session_id)).await?
        else {
            return Ok(None);
        };

        let now = Utc::now();
        if session.is_expired(now) {
            return Ok(None);
        }

        if self.auth_manager.validate_token(&session.access_token).is_err() {
            let access_ttl = Duration::seconds(
                i64::try_from(self.ttls.access_token_ttl.as_secs()).unwrap_or(3600),
            );
            let access = self.auth_manager.issue_access_token(
                &session.subject.to_string(),
                &session.scope,
                Some(&session.provider),
                access_ttl,
            )?;
            session.access_token = access.token;
            session.access_token_jti = access.jti;

            let remaining = session
                .expires_at
                .signed_duration_since(now)
                .to_std()
                .unwrap_or_default();
            store::put_json(
                self.store.as_ref(),
                &keys::session(session_id),
                &session,
                remaining,
            )
            .await?;
            tracing::debug!(session_id, "session access token re-minted");
        }

        Ok(Some(session))
    }

    /// Revoke a session and the access token it carries. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error only if the state store fails
    pub async fn revoke_session(&self, session_id: &str) -> AppResult<()> {
        let Some(session) =
            store::take_json::<Session>(self.store.as_ref(), &keys::session(session_id)).await?
        else {
            return Ok(());
        };

        self.auth_manager
            .revoke_jti(&session.access_token_jti, session.expires_at)
            .await?;

        if let Some(refresh_token) = &session.refresh_token {
            self.store
                .delete(&keys::refresh_token(refresh_token))
                .await?;
        }

        tracing::info!(session_id, subject = %session.subject, "session revoked");
        Ok(())
    }

    /// Resolve the authenticated subject behind a session id, for the
    /// authorize endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the state store fails
    pub async fn resolve_subject(&self, session_id: &str) -> AppResult<Option<uuid::Uuid>> {
        Ok(self.session(session_id).await?.map(|s| s.subject))
    }

    fn lookup_provider(
        &self,
        provider_name: &str,
    ) -> Result<&dyn crate::federation::FederationProvider, AppError> {
        self.providers.get(provider_name).map_err(|e| match e {
            FederationError::ProviderNotConfigured(name)
                if KNOWN_PROVIDERS.contains(&name.as_str()) =>
            {
                // A known provider without credentials is a deployment
                // problem, not a caller problem
                AppError::config(format!("provider {name} is not configured"))
            }
            _ => AppError::not_found(format!("Provider {provider_name}")),
        })
    }
}

/// Map upstream failures to the provider-auth error class (502-class),
/// keeping them distinct from client/protocol errors
fn map_federation_error(e: FederationError) -> AppError {
    AppError::external_auth(e.to_string()).with_source(e)
}

/// Append the opaque session id to the first-party destination
fn append_session_param(destination: &str, session_id: &str) -> String {
    Url::parse(destination).map_or_else(
        |_| format!("{destination}?session={session_id}"),
        |mut url| {
            url.query_pairs_mut().append_pair("session", session_id);
            url.to_string()
        },
    )
}
