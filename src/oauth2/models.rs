// ABOUTME: OAuth 2.0 request/response models and RFC 6749 error bodies
// ABOUTME: Wire shapes for authorize, token, introspect, and revoke endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use serde::{Deserialize, Serialize};

/// OAuth 2.0 Authorization Request (query parameters of `/oauth/authorize`)
#[derive(Debug, Deserialize, Clone)]
pub struct AuthorizeRequest {
    /// Response type (only `code` is supported)
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Redirect URI for the response
    pub redirect_uri: String,
    /// Requested scopes
    pub scope: Option<String>,
    /// State parameter for CSRF protection, echoed back unchanged
    pub state: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method (only `S256` is accepted)
    pub code_challenge_method: Option<String>,
    /// First-party session id, as an alternative to the session cookie
    pub session: Option<String>,
}

/// OAuth 2.0 Authorization Response
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    /// Authorization code
    pub code: String,
    /// State parameter (if provided in the request)
    pub state: Option<String>,
}

/// OAuth 2.0 Token Request (form body of `/oauth/token`)
#[derive(Debug, Deserialize, Default)]
pub struct TokenRequest {
    /// Grant type (`authorization_code` or `refresh_token`)
    pub grant_type: String,
    /// Authorization code (for `authorization_code` grant)
    pub code: Option<String>,
    /// Redirect URI (must match the one the code was issued for)
    pub redirect_uri: Option<String>,
    /// Client ID; may instead arrive via HTTP Basic
    pub client_id: Option<String>,
    /// Client secret; may instead arrive via HTTP Basic, absent for public clients
    pub client_secret: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    pub refresh_token: Option<String>,
    /// PKCE code verifier (RFC 7636, for `authorization_code` grant)
    pub code_verifier: Option<String>,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Access token (JWT)
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Expires in seconds
    pub expires_in: i64,
    /// Scopes granted
    pub scope: Option<String>,
    /// Refresh token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Token Introspection Request (RFC 7662)
#[derive(Debug, Deserialize)]
pub struct IntrospectRequest {
    /// The token to introspect
    pub token: String,
    /// Caller's hint about the token type; accepted but not required
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

/// Token Introspection Response (RFC 7662)
#[derive(Debug, Serialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active
    pub active: bool,
    /// Space-separated scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiration timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Owning client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl From<crate::auth::Introspection> for IntrospectionResponse {
    fn from(value: crate::auth::Introspection) -> Self {
        Self {
            active: value.active,
            scope: value.scope,
            sub: value.sub,
            exp: value.exp,
            client_id: value.client_id,
        }
    }
}

/// Token Revocation Request (RFC 7009)
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    /// The token to revoke
    pub token: String,
    /// Caller's hint about the token type; accepted but not required
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

/// OAuth 2.0 Error Response
#[derive(Debug, Serialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable error description
    pub error_description: Option<String>,
    /// URI for error information
    pub error_uri: Option<String>,
}

impl OAuth2Error {
    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self {
            error: "invalid_request".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self {
            error: "invalid_client".to_owned(),
            error_description: Some("Client authentication failed".to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self {
            error: "invalid_grant".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self {
            error: "unsupported_grant_type".to_owned(),
            error_description: Some("Grant type not supported".to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `invalid_scope` error (RFC 6749 Section 4.1.2.1)
    #[must_use]
    pub fn invalid_scope(description: &str) -> Self {
        Self {
            error: "invalid_scope".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }
}
