// ABOUTME: Centralized constants for ports, token lifetimes, and protocol defaults
// ABOUTME: Single source of truth so TTLs and limits are not scattered through handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

/// Network port defaults
pub mod ports {
    /// Default HTTP port for the authorization server
    pub const DEFAULT_HTTP_PORT: u16 = 8080;
}

/// Service identity used in logs and token claims
pub mod service {
    /// Service name for structured logging
    pub const SERVICE_NAME: &str = "advison-auth-server";

    /// Audience claim embedded in every first-party JWT
    pub const TOKEN_AUDIENCE: &str = "advison";
}

/// OAuth2 protocol defaults and lifetimes
pub mod oauth {
    /// CSRF state lifetime for federation flows (10 minutes)
    pub const STATE_TTL_SECS: u64 = 600;

    /// Authorization code lifetime (10 minutes)
    pub const CODE_TTL_SECS: u64 = 600;

    /// First-party session lifetime (24 hours)
    pub const SESSION_TTL_SECS: u64 = 86_400;

    /// Access token lifetime (1 hour)
    pub const ACCESS_TOKEN_TTL_SECS: u64 = 3_600;

    /// Refresh token lifetime (30 days)
    pub const REFRESH_TOKEN_TTL_SECS: u64 = 30 * 86_400;

    /// Scope granted to sessions created by a federated login
    pub const DEFAULT_SESSION_SCOPE: &str = "read:user read:tools";

    /// Entropy for opaque codes and refresh tokens (256 bits)
    pub const OPAQUE_TOKEN_BYTES: usize = 32;

    /// Entropy for state tokens and session ids (128 bits, hex-encoded)
    pub const STATE_TOKEN_BYTES: usize = 16;

    /// PKCE `code_challenge`/`code_verifier` length bounds (RFC 7636)
    pub const PKCE_MIN_LEN: usize = 43;
    /// Upper bound per RFC 7636 section 4.1
    pub const PKCE_MAX_LEN: usize = 128;
}

/// Upstream HTTP client limits
pub mod upstream {
    /// Bounded timeout for provider token/userinfo round trips
    pub const PROVIDER_TIMEOUT_SECS: u64 = 10;
}

/// Ephemeral state store defaults
pub mod store {
    /// Bounded entry count for the in-memory backend
    pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

    /// Background cleanup cadence for the in-memory backend
    pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
}
