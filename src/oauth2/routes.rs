// ABOUTME: axum route handlers for the OAuth 2.0 endpoint set
// ABOUTME: Thin handlers: rate limit, extract, delegate to OAuth2AuthorizationServer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use super::endpoints::ClientCredentials;
use super::models::{AuthorizeRequest, IntrospectRequest, OAuth2Error, RevokeRequest, TokenRequest};
use super::rate_limiting::RateLimitStatus;
use crate::routes::found_redirect;
use crate::server::AppState;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use base64::{engine::general_purpose, Engine as _};
use std::net::SocketAddr;
use url::Url;

/// Session cookie carrying the first-party session id
const SESSION_COOKIE: &str = "advison_session";

/// Build the OAuth2 endpoint router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/oauth/authorize", get(handle_authorize))
        .route("/oauth/token", post(handle_token))
        .route("/oauth/introspect", post(handle_introspect))
        .route("/oauth/revoke", post(handle_revoke))
        .route(
            "/.well-known/oauth-authorization-server",
            get(handle_discovery),
        )
}

/// GET /oauth/authorize
async fn handle_authorize(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(request): Query<AuthorizeRequest>,
) -> Response {
    let status = state.rate_limiter.check("authorize", addr.ip());
    if !status.allowed {
        return rate_limited_response(&status);
    }

    // The end user authenticates with a first-party session, carried either
    // as a query parameter or the session cookie
    let session_id = request
        .session
        .clone()
        .or_else(|| session_cookie(&headers));

    let subject = match &session_id {
        Some(id) => match state.broker.resolve_subject(id).await {
            Ok(subject) => subject,
            Err(e) => return e.into_response(),
        },
        None => None,
    };

    let redirect_uri = request.redirect_uri.clone();
    match state.oauth2.authorize(request, subject).await {
        Ok(response) => {
            let location = append_code_params(&redirect_uri, &response.code, response.state.as_deref());
            found_redirect(&location)
        }
        Err(e) => oauth2_error_response(&e),
    }
}

/// POST /oauth/token (form-encoded)
async fn handle_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    let status = state.rate_limiter.check("token", addr.ip());
    if !status.allowed {
        return rate_limited_response(&status);
    }

    let credentials = basic_credentials(&headers);
    match state.oauth2.token(request, credentials).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => oauth2_error_response(&e),
    }
}

/// POST /oauth/introspect (RFC 7662). Always 200; unknown tokens are
/// `{"active": false}`.
async fn handle_introspect(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(request): Form<IntrospectRequest>,
) -> Response {
    let status = state.rate_limiter.check("introspect", addr.ip());
    if !status.allowed {
        return rate_limited_response(&status);
    }

    let response = state.oauth2.introspect(&request.token).await;
    Json(response).into_response()
}

/// POST /oauth/revoke (RFC 7009). Always 200 with an empty body.
async fn handle_revoke(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(request): Form<RevokeRequest>,
) -> Response {
    let status = state.rate_limiter.check("revoke", addr.ip());
    if !status.allowed {
        return rate_limited_response(&status);
    }

    state.oauth2.revoke(&request.token).await;
    StatusCode::OK.into_response()
}

/// GET /.well-known/oauth-authorization-server (RFC 8414)
async fn handle_discovery(State(state): State<AppState>) -> Json<serde_json::Value> {
    let issuer = &state.config.issuer_url;
    Json(serde_json::json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/oauth/authorize"),
        "token_endpoint": format!("{issuer}/oauth/token"),
        "introspection_endpoint": format!("{issuer}/oauth/introspect"),
        "revocation_endpoint": format!("{issuer}/oauth/revoke"),
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "response_types_supported": ["code"],
        "response_modes_supported": ["query"],
        "token_endpoint_auth_methods_supported": [
            "client_secret_post",
            "client_secret_basic",
            "none"
        ],
        "scopes_supported": ["read:user", "read:tools"],
        "code_challenge_methods_supported": ["S256"]
    }))
}

/// All protocol errors use the RFC 6749 JSON shape with HTTP 400
fn oauth2_error_response(error: &OAuth2Error) -> Response {
    (StatusCode::BAD_REQUEST, Json(error)).into_response()
}

/// 429 with rate limit headers
fn rate_limited_response(status: &RateLimitStatus) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [
            ("x-ratelimit-limit", status.limit.to_string()),
            ("x-ratelimit-remaining", status.remaining.to_string()),
            ("retry-after", status.retry_after_secs.to_string()),
        ],
        Json(OAuth2Error::invalid_request("Rate limit exceeded")),
    )
        .into_response()
}

/// Append `code` and passthrough `state` to the validated redirect URI
fn append_code_params(redirect_uri: &str, code: &str, state: Option<&str>) -> String {
    Url::parse(redirect_uri).map_or_else(
        |_| {
            let mut location = format!("{redirect_uri}?code={}", urlencoding::encode(code));
            if let Some(state) = state {
                location.push_str(&format!("&state={}", urlencoding::encode(state)));
            }
            location
        },
        |mut url| {
            url.query_pairs_mut().append_pair("code", code);
            if let Some(state) = state {
                url.query_pairs_mut().append_pair("state", state);
            }
            url.to_string()
        },
    )
}

/// Extract the session id from the cookie header, if present
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_owned())
    })
}

/// Extract client credentials from HTTP Basic auth (RFC 6749 section 2.3.1).
/// The id and secret are form-urlencoded inside the Basic payload.
fn basic_credentials(headers: &HeaderMap) -> ClientCredentials {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
    else {
        return ClientCredentials::default();
    };

    let Some(decoded) = general_purpose::STANDARD
        .decode(value.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    else {
        return ClientCredentials::default();
    };

    let Some((id, secret)) = decoded.split_once(':') else {
        return ClientCredentials::default();
    };

    ClientCredentials {
        client_id: urlencoding::decode(id).ok().map(|v| v.into_owned()),
        client_secret: urlencoding::decode(secret).ok().map(|v| v.into_owned()),
    }
}
