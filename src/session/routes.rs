// ABOUTME: axum route handlers for federated login and session lookup
// ABOUTME: /auth/{provider}, its callback, and session retrieval/revocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use crate::errors::AppError;
use crate::routes::found_redirect;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Build the federation/session router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/:provider", get(handle_login))
        .route("/auth/:provider/callback", get(handle_callback))
        .route(
            "/auth/session/:id",
            get(handle_session_lookup).delete(handle_session_revoke),
        )
}

/// Query parameters for starting a login
#[derive(Debug, Deserialize)]
struct LoginQuery {
    /// First-party destination override after login completes
    return_to: Option<String>,
}

/// Query parameters of the provider callback. Providers report user denial
/// and their own failures through `error`/`error_description`.
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Session lookup response for downstream clients (dashboard, CLI)
#[derive(Debug, Serialize)]
struct SessionTokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
    scope: String,
    subject: String,
    provider: String,
}

/// GET /auth/{provider}: start a federated login
async fn handle_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<LoginQuery>,
) -> Response {
    match state.broker.begin_login(&provider, query.return_to).await {
        Ok(authorization_url) => found_redirect(&authorization_url),
        Err(e) => e.into_response(),
    }
}

/// GET /auth/{provider}/callback: complete a federated login
async fn handle_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        let description = query
            .error_description
            .unwrap_or_else(|| "no description".to_owned());
        tracing::warn!(provider = %provider, error = %error, "provider returned an error on callback");
        return AppError::invalid_input(format!("Provider returned {error}: {description}"))
            .into_response();
    }

    let (Some(code), Some(state_param)) = (query.code, query.state) else {
        return AppError::invalid_input("Missing code or state parameter").into_response();
    };

    match state
        .broker
        .complete_login(&provider, &code, &state_param)
        .await
    {
        Ok(login) => found_redirect(&login.redirect_url),
        Err(e) => e.into_response(),
    }
}

/// GET /auth/session/{id}: retrieve the session's tokens
async fn handle_session_lookup(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.broker.session(&session_id).await {
        Ok(Some(session)) => {
            // The broker guarantees the stored access token currently
            // verifies, so introspection yields its live expiry
            let introspection = state.oauth2.introspect(&session.access_token).await;
            let expires_in = introspection
                .exp
                .map_or(0, |exp| exp - Utc::now().timestamp());

            Json(SessionTokenResponse {
                access_token: session.access_token,
                token_type: "Bearer".to_owned(),
                expires_in,
                scope: session.scope,
                subject: session.subject.to_string(),
                provider: session.provider,
            })
            .into_response()
        }
        Ok(None) => AppError::not_found("Session").into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /auth/session/{id}: revoke a session. Idempotent 204.
async fn handle_session_revoke(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.broker.revoke_session(&session_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
