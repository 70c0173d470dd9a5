// ABOUTME: Core domain records for the authorization server state machine
// ABOUTME: Clients, CSRF state, authorization codes, refresh tokens, sessions, upstream profiles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving stable subjects from `(provider, provider_user_id)`.
/// Changing this value would re-key every federated identity.
pub const SUBJECT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x14, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30,
    0xc8,
]);

/// Pre-provisioned OAuth2 client record.
///
/// Immutable after provisioning; looked up by `client_id` on every
/// token-issuing request. A client without a `client_secret_hash` is a public
/// client and must use PKCE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier
    pub client_id: String,
    /// Argon2 PHC-string hash of the client secret; `None` for public clients
    #[serde(default)]
    pub client_secret_hash: Option<String>,
    /// Registered redirect URIs (exact match required)
    pub redirect_uris: Vec<String>,
    /// Scopes this client may request
    pub allowed_scopes: Vec<String>,
    /// Display name
    pub client_name: String,
}

impl Client {
    /// Whether this client was provisioned with a secret
    #[must_use]
    pub const fn is_confidential(&self) -> bool {
        self.client_secret_hash.is_some()
    }

    /// Exact-match redirect URI ownership check
    #[must_use]
    pub fn owns_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    /// Whether every requested scope is within the client's allowed set
    #[must_use]
    pub fn allows_scopes(&self, requested: &str) -> bool {
        requested
            .split_whitespace()
            .all(|scope| self.allowed_scopes.iter().any(|s| s == scope))
    }
}

/// CSRF state for an in-flight federation login.
///
/// Created when a federation flow starts, consumed (read-once) on the
/// matching callback. A state token is valid for exactly one callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationState {
    /// Opaque state token carried through the upstream round trip
    pub state: String,
    /// Provider this flow was started against
    pub provider: String,
    /// When the flow started
    pub created_at: DateTime<Utc>,
    /// Upstream redirect URI used for this flow
    pub redirect_uri: String,
    /// Optional PKCE challenge carried into the first-party code
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// PKCE challenge method (only `S256` is accepted)
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// First-party destination override after login completes
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Single-use authorization code record.
///
/// Redeemed exactly once at `/oauth/token`, then gone; redemption after
/// consumption or expiry must fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The opaque code value
    pub code: String,
    /// Client the code was issued to
    pub client_id: String,
    /// Subject the code authorizes
    pub subject: Uuid,
    /// Space-separated granted scopes
    pub scope: String,
    /// Redirect URI the code is bound to
    pub redirect_uri: String,
    /// PKCE challenge the verifier must match
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// PKCE challenge method
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationCode {
    /// Whether the code has passed its absolute expiry
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Server-side refresh token record.
///
/// Refresh tokens are opaque; validity is determined solely by this record's
/// presence in the state store. Rotated on every use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// The opaque token value
    pub token: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Subject the token refreshes for
    pub subject: Uuid,
    /// Space-separated granted scopes
    pub scope: String,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
    /// When this record was created
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Whether the record has passed its absolute expiry
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// First-party session created by a completed federated login.
///
/// Persists in the state store until TTL or explicit revoke. Downstream
/// clients hold only the opaque `session_id`; the raw provider token is never
/// stored or forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier handed to the browser
    pub session_id: String,
    /// Stable internal subject
    pub subject: Uuid,
    /// Provider that authenticated this session
    pub provider: String,
    /// Space-separated session scopes
    pub scope: String,
    /// First-party access token minted for this session
    pub access_token: String,
    /// `jti` of the access token, for revocation on logout
    pub access_token_jti: String,
    /// Optional refresh token backing this session
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the session was created
    pub issued_at: DateTime<Utc>,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has passed its absolute expiry
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Transient profile data fetched from an upstream provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamProfile {
    /// Provider-scoped user identifier
    pub id: String,
    /// Email, if the provider exposes one
    #[serde(default)]
    pub email: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar URL
    #[serde(default)]
    pub picture: Option<String>,
}

/// Derive the stable internal subject for a federated identity.
///
/// Scoped to `(provider, provider_user_id)` so the same upstream account
/// always maps to the same subject, and identities never collide across
/// providers.
#[must_use]
pub fn derive_subject(provider: &str, provider_user_id: &str) -> Uuid {
    let name = format!("{provider}:{provider_user_id}");
    Uuid::new_v5(&SUBJECT_NAMESPACE, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_is_stable_and_provider_scoped() {
        let a = derive_subject("github", "1234");
        let b = derive_subject("github", "1234");
        let c = derive_subject("google", "1234");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn redirect_uri_check_is_exact_match() {
        let client = Client {
            client_id: "web".into(),
            client_secret_hash: None,
            redirect_uris: vec!["https://app.example.com/callback".into()],
            allowed_scopes: vec!["read:user".into()],
            client_name: "Web".into(),
        };
        assert!(client.owns_redirect_uri("https://app.example.com/callback"));
        assert!(!client.owns_redirect_uri("https://app.example.com/callback/extra"));
        assert!(!client.owns_redirect_uri("https://evil.example.com/callback"));
    }

    #[test]
    fn scope_subset_check() {
        let client = Client {
            client_id: "web".into(),
            client_secret_hash: None,
            redirect_uris: vec![],
            allowed_scopes: vec!["read:user".into(), "read:tools".into()],
            client_name: "Web".into(),
        };
        assert!(client.allows_scopes("read:user"));
        assert!(client.allows_scopes("read:user read:tools"));
        assert!(!client.allows_scopes("read:user admin"));
    }
}
