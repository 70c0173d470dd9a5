// ABOUTME: Pre-provisioned OAuth2 client registry loaded from a JSON file
// ABOUTME: Secret verification via Argon2 PHC hashes; no dynamic registration surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

//! # Client Registry
//!
//! Client records are provisioned out-of-band and loaded once at startup;
//! there is no registration endpoint. Lookup happens on every token-issuing
//! request, so the registry is a plain in-memory map behind an `Arc`.

use crate::errors::{AppError, AppResult};
use crate::models::Client;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Client authentication failure reasons.
///
/// All variants map to the same `invalid_client` protocol answer; the
/// distinction exists for logging only.
#[derive(Debug, Error)]
pub enum ClientAuthError {
    #[error("unknown client")]
    UnknownClient,

    #[error("client secret required")]
    SecretRequired,

    #[error("client secret mismatch")]
    SecretMismatch,
}

/// Registry of pre-provisioned OAuth2 clients
pub struct ClientRegistry {
    clients: HashMap<String, Client>,
}

impl ClientRegistry {
    /// Build a registry from in-memory records
    #[must_use]
    pub fn new(clients: Vec<Client>) -> Self {
        let clients = clients
            .into_iter()
            .map(|c| (c.client_id.clone(), c))
            .collect();
        Self { clients }
    }

    /// Build an empty registry (no clients provisioned)
    #[must_use]
    pub fn empty() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Load client records from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!(
                "failed to read clients file {}: {e}",
                path.display()
            ))
        })?;
        let clients: Vec<Client> = serde_json::from_str(&raw).map_err(|e| {
            AppError::config(format!(
                "failed to parse clients file {}: {e}",
                path.display()
            ))
        })?;
        info!(count = clients.len(), "loaded pre-provisioned clients");
        Ok(Self::new(clients))
    }

    /// Look up a client by id
    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<&Client> {
        self.clients.get(client_id)
    }

    /// Authenticate a client.
    ///
    /// Confidential clients must present their secret; public clients must
    /// not be asked for one (their protection is PKCE). A presented secret
    /// for a public client is rejected rather than ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientAuthError`] describing the failure
    pub fn authenticate(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<&Client, ClientAuthError> {
        let client = self
            .clients
            .get(client_id)
            .ok_or(ClientAuthError::UnknownClient)?;

        match (&client.client_secret_hash, client_secret) {
            (Some(hash), Some(secret)) => {
                verify_client_secret(client_id, secret, hash)?;
                Ok(client)
            }
            (Some(_), None) => Err(ClientAuthError::SecretRequired),
            (None, None) => Ok(client),
            (None, Some(_)) => Err(ClientAuthError::SecretMismatch),
        }
    }
}

/// Verify a client secret against its Argon2 PHC hash
fn verify_client_secret(
    client_id: &str,
    client_secret: &str,
    client_secret_hash: &str,
) -> Result<(), ClientAuthError> {
    let parsed_hash = PasswordHash::new(client_secret_hash).map_err(|e| {
        tracing::error!("failed to parse stored client secret hash: {e}");
        ClientAuthError::SecretMismatch
    })?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(client_secret.as_bytes(), &parsed_hash)
        .is_err()
    {
        tracing::warn!("client {client_id} secret validation failed");
        return Err(ClientAuthError::SecretMismatch);
    }

    Ok(())
}

/// Hash a client secret for provisioning
///
/// # Errors
///
/// Returns an error if hashing fails
pub fn hash_client_secret(client_secret: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(client_secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("failed to hash client secret: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confidential_client() -> Client {
        Client {
            client_id: "cli".into(),
            client_secret_hash: Some(hash_client_secret("shhh").unwrap()),
            redirect_uris: vec!["http://localhost:9000/callback".into()],
            allowed_scopes: vec!["read:user".into()],
            client_name: "CLI".into(),
        }
    }

    #[test]
    fn secret_roundtrip_verifies() {
        let registry = ClientRegistry::new(vec![confidential_client()]);
        assert!(registry.authenticate("cli", Some("shhh")).is_ok());
        assert!(matches!(
            registry.authenticate("cli", Some("wrong")),
            Err(ClientAuthError::SecretMismatch)
        ));
        assert!(matches!(
            registry.authenticate("cli", None),
            Err(ClientAuthError::SecretRequired)
        ));
    }

    #[test]
    fn unknown_client_is_rejected() {
        let registry = ClientRegistry::empty();
        assert!(matches!(
            registry.authenticate("ghost", None),
            Err(ClientAuthError::UnknownClient)
        ));
    }
}
