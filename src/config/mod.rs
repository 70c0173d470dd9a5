// ABOUTME: Configuration module organizing environment and provider settings
// ABOUTME: Centralizes env-var parsing so handlers never read the environment directly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

/// Environment-based server configuration
pub mod environment;
/// Upstream OAuth provider credentials
pub mod oauth;

pub use environment::ServerConfig;
pub use oauth::{OAuthConfig, OAuthProviderConfig};
