// ABOUTME: OAuth 2.0 authorization endpoint set: authorize, token, introspect, revoke
// ABOUTME: Protocol models, endpoint implementation, rate limiting, and axum routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

/// OAuth 2.0 authorization server endpoints
pub mod endpoints;
/// OAuth 2.0 data models and types
pub mod models;
/// Rate limiting for OAuth 2.0 endpoints
pub mod rate_limiting;
/// HTTP routes for the endpoint set
pub mod routes;

pub use endpoints::{ClientCredentials, OAuth2AuthorizationServer};
pub use models::{
    AuthorizeRequest, AuthorizeResponse, IntrospectRequest, IntrospectionResponse, OAuth2Error,
    RevokeRequest, TokenRequest, TokenResponse,
};
pub use rate_limiting::{OAuth2RateLimiter, RateLimitStatus};
