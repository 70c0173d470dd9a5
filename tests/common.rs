// ABOUTME: Shared test helpers: in-memory environment, test clients, stub federation provider
// ABOUTME: Used by the integration test suites via `mod common`
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use advison_auth_server::auth::AuthManager;
use advison_auth_server::clients::{hash_client_secret, ClientRegistry};
use advison_auth_server::config::environment::TtlConfig;
use advison_auth_server::federation::{
    FederationError, FederationProvider, ProviderRegistry, UpstreamTokens,
};
use advison_auth_server::models::{Client, UpstreamProfile};
use advison_auth_server::oauth2::OAuth2AuthorizationServer;
use advison_auth_server::session::SessionBroker;
use advison_auth_server::store::{InMemoryStateStore, StateStore};
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Deterministic signing secret for tests
pub const TEST_JWT_SECRET: &[u8] = b"test-signing-secret-0123456789abcdef";

/// Secret provisioned for the confidential test client
pub const WEB_CLIENT_SECRET: &str = "web-client-secret";

/// Fresh in-memory store without the background cleanup task
pub fn test_store() -> Arc<dyn StateStore> {
    Arc::new(InMemoryStateStore::new_for_tests())
}

/// Confidential client with a registered callback and both default scopes
pub fn confidential_client() -> Client {
    Client {
        client_id: "web-client".into(),
        client_secret_hash: Some(hash_client_secret(WEB_CLIENT_SECRET).unwrap()),
        redirect_uris: vec!["https://app.example.com/callback".into()],
        allowed_scopes: vec!["read:user".into(), "read:tools".into()],
        client_name: "Web Dashboard".into(),
    }
}

/// Public client (no secret); PKCE is its only protection
pub fn public_client() -> Client {
    Client {
        client_id: "cli-client".into(),
        client_secret_hash: None,
        redirect_uris: vec!["http://localhost:9090/callback".into()],
        allowed_scopes: vec!["read:user".into()],
        client_name: "Developer CLI".into(),
    }
}

/// Everything the OAuth2 endpoint tests need
pub struct TestEnv {
    pub store: Arc<dyn StateStore>,
    pub auth_manager: Arc<AuthManager>,
    pub oauth2: OAuth2AuthorizationServer,
}

/// Build an endpoint server over a fresh store with both test clients
pub fn setup_oauth2() -> TestEnv {
    let store = test_store();
    let auth_manager = Arc::new(AuthManager::new(TEST_JWT_SECRET, store.clone()));
    let clients = Arc::new(ClientRegistry::new(vec![
        confidential_client(),
        public_client(),
    ]));
    let oauth2 = OAuth2AuthorizationServer::new(
        clients,
        auth_manager.clone(),
        store.clone(),
        TtlConfig::default(),
    );
    TestEnv {
        store,
        auth_manager,
        oauth2,
    }
}

/// Federation provider double: deterministic exchange and profile, optional
/// hard failure to exercise the provider-error path
pub struct StubProvider {
    pub name: &'static str,
    pub fail_exchange: bool,
}

impl StubProvider {
    pub fn github() -> Self {
        Self {
            name: "github",
            fail_exchange: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            name: "github",
            fail_exchange: true,
        }
    }
}

#[async_trait::async_trait]
impl FederationProvider for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn redirect_uri(&self) -> &str {
        "http://localhost:8080/auth/github/callback"
    }

    fn build_authorization_url(&self, state: &str) -> String {
        format!("https://upstream.example.com/authorize?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<UpstreamTokens, FederationError> {
        if self.fail_exchange {
            return Err(FederationError::ProviderRejected {
                error: "bad_verification_code".into(),
                description: Some("The code passed is incorrect or expired.".into()),
            });
        }
        Ok(UpstreamTokens {
            access_token: format!("upstream-token-for-{code}"),
            scope: Some("read:user".into()),
        })
    }

    async fn fetch_profile(
        &self,
        _access_token: &str,
    ) -> Result<UpstreamProfile, FederationError> {
        Ok(UpstreamProfile {
            id: "4242".into(),
            email: Some("dev@example.com".into()),
            name: Some("Dev Example".into()),
            picture: None,
        })
    }
}

/// Session broker wired to a stub GitHub provider over the given store
pub fn setup_broker(store: Arc<dyn StateStore>, provider: StubProvider) -> SessionBroker {
    let auth_manager = Arc::new(AuthManager::new(TEST_JWT_SECRET, store.clone()));
    let mut providers = ProviderRegistry::new();
    providers.register(Box::new(provider));
    SessionBroker::new(
        store,
        auth_manager,
        Arc::new(providers),
        TtlConfig::default(),
        "http://localhost:8080/dashboard".into(),
    )
}

/// Generate a PKCE `code_verifier` (43-128 characters, base64url)
pub fn generate_code_verifier() -> String {
    use ring::rand::{SecureRandom, SystemRandom};
    let rng = SystemRandom::new();
    let mut random_bytes = [0u8; 32];
    rng.fill(&mut random_bytes).unwrap();
    general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Derive the S256 `code_challenge` from a verifier
pub fn generate_code_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}
