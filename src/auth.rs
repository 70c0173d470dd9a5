// ABOUTME: Token issuer: signed JWT access tokens plus opaque codes and refresh tokens
// ABOUTME: Verification fails closed; revocation is checked against the state store, not signature alone
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

//! # Token Issuance and Verification
//!
//! The sole producer and verifier of signed token material. Access tokens
//! are HS256 JWTs signed with the server-held secret; authorization codes,
//! refresh tokens, and session ids are opaque CSPRNG values whose validity
//! is determined solely by server-side lookup.
//!
//! Revocation is not a signature property: `introspect` consults the state
//! store's revocation list in addition to signature and expiry, so a revoked
//! token reports inactive even while its signature still verifies.

use crate::constants::{oauth, service};
use crate::errors::{AppError, AppResult};
use crate::store::{self, keys, StateStore};
use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// `JWT` validation error with detailed information
#[derive(Debug, Clone)]
pub enum JwtValidationError {
    /// Token has expired
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
        /// Current time for reference
        current_time: DateTime<Utc>,
    },
    /// Token signature is invalid
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token is malformed (not proper `JWT` format)
    TokenMalformed {
        /// Details about malformation
        details: String,
    },
}

impl std::fmt::Display for JwtValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenExpired {
                expired_at,
                current_time,
            } => {
                let expired_for = current_time.signed_duration_since(*expired_at);
                write!(
                    f,
                    "token expired {} seconds ago at {}",
                    expired_for.num_seconds(),
                    expired_at.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
            Self::TokenInvalid { reason } => {
                write!(f, "token signature is invalid: {reason}")
            }
            Self::TokenMalformed { details } => {
                write!(f, "token is malformed: {details}")
            }
        }
    }
}

impl std::error::Error for JwtValidationError {}

/// Claims embedded in every first-party access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject the token was issued for
    pub sub: String,
    /// Space-separated granted scopes
    pub scope: String,
    /// Provider that authenticated the subject, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Issued-at timestamp (seconds)
    pub iat: i64,
    /// Expiration timestamp (seconds)
    pub exp: i64,
    /// Not-before timestamp (seconds), when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Unique token id, the unit of revocation
    pub jti: String,
    /// Audience (who the token is intended for)
    pub aud: String,
}

/// Result of issuing an access token
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    /// The signed token
    pub token: String,
    /// Token id recorded for revocation
    pub jti: String,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
}

/// Introspection outcome (RFC 7662 shape, before serialization)
#[derive(Debug, Clone)]
pub struct Introspection {
    /// Whether the token is currently active
    pub active: bool,
    /// Space-separated scopes, when active
    pub scope: Option<String>,
    /// Subject, when active
    pub sub: Option<String>,
    /// Expiry timestamp, when active
    pub exp: Option<i64>,
    /// Owning client, for opaque tokens bound to one
    pub client_id: Option<String>,
}

impl Introspection {
    /// The uniform "not active" answer; unknown and invalid tokens are
    /// indistinguishable by design
    #[must_use]
    pub const fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            sub: None,
            exp: None,
            client_id: None,
        }
    }
}

/// Token issuer and verifier
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    store: Arc<dyn StateStore>,
}

impl AuthManager {
    /// Create a token issuer from the server-held signing secret
    #[must_use]
    pub fn new(secret: &[u8], store: Arc<dyn StateStore>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            store,
        }
    }

    /// Issue a signed access token
    ///
    /// # Errors
    ///
    /// Returns an error if JWT encoding fails or the system RNG fails
    pub fn issue_access_token(
        &self,
        subject: &str,
        scope: &str,
        provider: Option<&str>,
        ttl: Duration,
    ) -> AppResult<IssuedAccessToken> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: subject.to_owned(),
            scope: scope.to_owned(),
            provider: provider.map(str::to_owned),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            nbf: None,
            jti: jti.clone(),
            aud: service::TOKEN_AUDIENCE.to_owned(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("failed to sign access token: {e}")))?;

        Ok(IssuedAccessToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Validate a token's signature and lifetime against the current time
    ///
    /// # Errors
    ///
    /// Returns a [`JwtValidationError`] describing expiry, bad signature, or
    /// malformation. Revocation is *not* checked here; see [`Self::introspect`].
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtValidationError> {
        self.validate_token_at(token, Utc::now())
    }

    /// Validate a token against an explicit instant.
    ///
    /// Signature verification happens with expiry checking disabled, then
    /// `exp`/`nbf` are compared against `now` here, so tests can exercise
    /// lifetimes without sleeping.
    pub fn validate_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Claims, JwtValidationError> {
        let claims = self.decode_token_claims(token)?;

        let expired_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
        if now.timestamp() > claims.exp {
            return Err(JwtValidationError::TokenExpired {
                expired_at,
                current_time: now,
            });
        }

        if let Some(nbf) = claims.nbf {
            if now.timestamp() < nbf {
                return Err(JwtValidationError::TokenInvalid {
                    reason: "token is not yet valid (nbf)".into(),
                });
            }
        }

        Ok(claims)
    }

    /// Decode claims, verifying the signature but not the lifetime
    fn decode_token_claims(&self, token: &str) -> Result<Claims, JwtValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_audience(&[service::TOKEN_AUDIENCE]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| Self::convert_jwt_error(&e))
    }

    /// Convert JWT library errors to detailed validation errors
    fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> JwtValidationError {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::InvalidSignature => JwtValidationError::TokenInvalid {
                reason: "token signature verification failed".into(),
            },
            ErrorKind::InvalidAudience => JwtValidationError::TokenInvalid {
                reason: "token audience does not match this issuer".into(),
            },
            ErrorKind::InvalidToken => JwtValidationError::TokenMalformed {
                details: "token format is invalid".into(),
            },
            ErrorKind::Base64(base64_err) => JwtValidationError::TokenMalformed {
                details: format!("token contains invalid base64: {base64_err}"),
            },
            ErrorKind::Json(json_err) => JwtValidationError::TokenMalformed {
                details: format!("token contains invalid JSON: {json_err}"),
            },
            _ => JwtValidationError::TokenInvalid {
                reason: format!("token validation failed: {e}"),
            },
        }
    }

    /// Whether an access token's `jti` has been revoked
    ///
    /// # Errors
    ///
    /// Returns an error if the state store lookup fails
    pub async fn is_revoked(&self, jti: &str) -> AppResult<bool> {
        Ok(self.store.get(&keys::revoked_jti(jti)).await?.is_some())
    }

    /// Introspect any token material: signed access token, opaque refresh
    /// token, or session id.
    ///
    /// Fails closed: store errors and unverifiable tokens report inactive.
    pub async fn introspect(&self, token: &str) -> Introspection {
        // Signed access token path
        if let Ok(claims) = self.validate_token(token) {
            match self.is_revoked(&claims.jti).await {
                Ok(false) => {
                    return Introspection {
                        active: true,
                        scope: Some(claims.scope),
                        sub: Some(claims.sub),
                        exp: Some(claims.exp),
                        client_id: None,
                    };
                }
                Ok(true) => return Introspection::inactive(),
                Err(e) => {
                    tracing::error!("revocation lookup failed during introspection: {e}");
                    return Introspection::inactive();
                }
            }
        }

        // Opaque refresh token path
        match store::get_json::<crate::models::RefreshTokenRecord>(
            self.store.as_ref(),
            &keys::refresh_token(token),
        )
        .await
        {
            Ok(Some(record)) if !record.is_expired(Utc::now()) => {
                return Introspection {
                    active: true,
                    scope: Some(record.scope),
                    sub: Some(record.subject.to_string()),
                    exp: Some(record.expires_at.timestamp()),
                    client_id: Some(record.client_id),
                };
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("refresh token lookup failed during introspection: {e}");
                return Introspection::inactive();
            }
        }

        // Unredeemed authorization code path
        match store::get_json::<crate::models::AuthorizationCode>(
            self.store.as_ref(),
            &keys::auth_code(token),
        )
        .await
        {
            Ok(Some(code)) if !code.is_expired(Utc::now()) => {
                return Introspection {
                    active: true,
                    scope: Some(code.scope),
                    sub: Some(code.subject.to_string()),
                    exp: Some(code.expires_at.timestamp()),
                    client_id: Some(code.client_id),
                };
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("authorization code lookup failed during introspection: {e}");
                return Introspection::inactive();
            }
        }

        // Session id path
        match store::get_json::<crate::models::Session>(self.store.as_ref(), &keys::session(token))
            .await
        {
            Ok(Some(session)) if !session.is_expired(Utc::now()) => Introspection {
                active: true,
                scope: Some(session.scope),
                sub: Some(session.subject.to_string()),
                exp: Some(session.expires_at.timestamp()),
                client_id: None,
            },
            Ok(_) => Introspection::inactive(),
            Err(e) => {
                tracing::error!("session lookup failed during introspection: {e}");
                Introspection::inactive()
            }
        }
    }

    /// Revoke any token material. Idempotent: unknown tokens are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error only if the state store write fails
    pub async fn revoke(&self, token: &str) -> AppResult<()> {
        // Signed access token: record the jti until the token would have
        // expired anyway. Claims are decoded without lifetime validation so
        // an already-expired token is still a successful no-op.
        if let Ok(claims) = self.decode_token_claims(token) {
            let remaining = claims.exp - Utc::now().timestamp();
            if remaining > 0 {
                let ttl = std::time::Duration::from_secs(remaining.unsigned_abs());
                self.store
                    .put(&keys::revoked_jti(&claims.jti), b"1", ttl)
                    .await?;
                tracing::info!(jti = %claims.jti, "access token revoked");
            }
            return Ok(());
        }

        // Opaque material: deleting the backing record is the revocation
        self.store.delete(&keys::refresh_token(token)).await?;
        self.store.delete(&keys::session(token)).await?;
        Ok(())
    }

    /// Revoke an access token by its `jti`, with an explicit expiry horizon
    ///
    /// # Errors
    ///
    /// Returns an error if the state store write fails
    pub async fn revoke_jti(&self, jti: &str, expires_at: DateTime<Utc>) -> AppResult<()> {
        let remaining = expires_at.timestamp() - Utc::now().timestamp();
        if remaining > 0 {
            let ttl = std::time::Duration::from_secs(remaining.unsigned_abs());
            self.store.put(&keys::revoked_jti(jti), b"1", ttl).await?;
        }
        Ok(())
    }

    /// Generate an opaque token (authorization code, refresh token):
    /// 256 bits from the system CSPRNG, URL-safe base64 without padding
    ///
    /// # Errors
    ///
    /// Returns an error if the system RNG fails - the server cannot operate
    /// securely without working RNG
    pub fn generate_token_string() -> AppResult<String> {
        let rng = SystemRandom::new();
        let mut bytes = vec![0u8; oauth::OPAQUE_TOKEN_BYTES];
        rng.fill(&mut bytes).map_err(|e| {
            tracing::error!("CRITICAL: SystemRandom failed - cannot generate secure bytes: {e}");
            AppError::internal("system RNG failure")
        })?;
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(&bytes))
    }

    /// Generate a state token or session id: 128 bits, hex-encoded
    ///
    /// # Errors
    ///
    /// Returns an error if the system RNG fails
    pub fn generate_state_token() -> AppResult<String> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; oauth::STATE_TOKEN_BYTES];
        rng.fill(&mut bytes).map_err(|e| {
            tracing::error!("CRITICAL: SystemRandom failed - cannot generate secure bytes: {e}");
            AppError::internal("system RNG failure")
        })?;
        Ok(hex::encode(bytes))
    }
}

/// Generate a random `JWT` secret
///
/// # Errors
///
/// Returns an error if the system RNG fails - this is a critical security
/// failure and the server cannot operate securely without working RNG
pub fn generate_jwt_secret() -> Result<[u8; 64]> {
    let rng = SystemRandom::new();
    let mut secret = [0u8; 64];

    rng.fill(&mut secret).map_err(|e| {
        tracing::error!("CRITICAL: failed to generate cryptographically secure JWT secret: {e}");
        anyhow::anyhow!("system RNG failure - cannot generate secure JWT secret")
    })?;

    Ok(secret)
}
