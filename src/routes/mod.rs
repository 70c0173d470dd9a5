// ABOUTME: Route module organization for HTTP endpoints outside the OAuth2/session domains
// ABOUTME: Health checks plus small response helpers shared by route handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

/// Health check and system status routes
pub mod health;

pub use health::HealthRoutes;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// A plain 302 redirect. OAuth2 flows conventionally use 302 Found rather
/// than axum's 303/307 helpers.
pub(crate) fn found_redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}
