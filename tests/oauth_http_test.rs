// ABOUTME: HTTP-level tests driving the assembled axum router end to end
// ABOUTME: Discovery, introspection, revocation, callback errors, and the full login flow
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use advison_auth_server::auth::AuthManager;
use advison_auth_server::clients::ClientRegistry;
use advison_auth_server::config::environment::{
    RateLimitConfig, ServerConfig, StoreBackendConfig, TtlConfig,
};
use advison_auth_server::config::oauth::OAuthConfig;
use advison_auth_server::federation::ProviderRegistry;
use advison_auth_server::oauth2::{OAuth2AuthorizationServer, OAuth2RateLimiter};
use advison_auth_server::server::{build_router, AppState};
use advison_auth_server::session::SessionBroker;
use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::StubProvider;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

const ISSUER: &str = "http://localhost:8080";

fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 8080,
        issuer_url: ISSUER.into(),
        post_login_redirect_url: format!("{ISSUER}/dashboard"),
        jwt_secret: common::TEST_JWT_SECRET.to_vec(),
        clients_file: None,
        ttls: TtlConfig::default(),
        store: StoreBackendConfig::default(),
        oauth: OAuthConfig::default(),
        rate_limits: RateLimitConfig::default(),
    }
}

/// Assemble the full router over an in-memory store, test clients, and a
/// stub GitHub provider
fn test_app() -> Router {
    let store = common::test_store();
    let auth_manager = Arc::new(AuthManager::new(common::TEST_JWT_SECRET, store.clone()));
    let clients = Arc::new(ClientRegistry::new(vec![
        common::confidential_client(),
        common::public_client(),
    ]));

    let oauth2 = Arc::new(OAuth2AuthorizationServer::new(
        clients,
        auth_manager.clone(),
        store.clone(),
        TtlConfig::default(),
    ));

    let mut providers = ProviderRegistry::new();
    providers.register(Box::new(StubProvider::github()));
    let broker = Arc::new(SessionBroker::new(
        store,
        auth_manager,
        Arc::new(providers),
        TtlConfig::default(),
        format!("{ISSUER}/dashboard"),
    ));

    let state = AppState {
        oauth2,
        broker,
        rate_limiter: Arc::new(OAuth2RateLimiter::new(RateLimitConfig::default())),
        config: Arc::new(test_config()),
    };

    build_router(state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
        .body(Body::empty())
        .unwrap()
}

fn post_form(uri: &str, params: &[(&str, &str)]) -> Request<Body> {
    let body = serde_urlencoded::to_string(params).unwrap();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned()
}

fn query_param(url: &str, name: &str) -> Option<String> {
    url::Url::parse(url).ok().and_then(|u| {
        u.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    })
}

#[tokio::test]
async fn discovery_document_lists_the_endpoint_set() {
    let app = test_app();
    let response = app
        .oneshot(get("/.well-known/oauth-authorization-server"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["issuer"], ISSUER);
    assert_eq!(
        body["authorization_endpoint"],
        format!("{ISSUER}/oauth/authorize")
    );
    assert_eq!(body["token_endpoint"], format!("{ISSUER}/oauth/token"));
    assert_eq!(body["grant_types_supported"][0], "authorization_code");
    assert_eq!(body["code_challenge_methods_supported"][0], "S256");
}

#[tokio::test]
async fn introspect_unknown_token_returns_active_false_with_200() {
    let app = test_app();
    let response = app
        .oneshot(post_form(
            "/oauth/introspect",
            &[("token", "no-such-token")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["active"], false);
}

#[tokio::test]
async fn revoke_unknown_token_returns_200() {
    let app = test_app();
    let response = app
        .oneshot(post_form("/oauth/revoke", &[("token", "no-such-token")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn token_endpoint_rejects_unsupported_grant_type() {
    let app = test_app();
    let response = app
        .oneshot(post_form(
            "/oauth/token",
            &[
                ("grant_type", "password"),
                ("client_id", "web-client"),
                ("client_secret", common::WEB_CLIENT_SECRET),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn callback_with_unknown_state_is_400_invalid_state() {
    let app = test_app();
    let response = app
        .oneshot(get("/auth/github/callback?code=abc&state=never-issued"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Invalid state");
}

#[tokio::test]
async fn authorize_with_unregistered_redirect_uri_never_redirects() {
    let app = test_app();
    let response = app
        .oneshot(get(
            "/oauth/authorize?response_type=code&client_id=web-client\
             &redirect_uri=https%3A%2F%2Fevil.example.com%2Fcb&scope=read%3Auser",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = test_app();
    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn full_federated_login_and_code_exchange_flow() {
    let app = test_app();

    // 1. Start a federated login; we are redirected upstream
    let response = app.clone().oneshot(get("/auth/github")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let upstream_url = location(&response);
    let state = upstream_url.split("state=").nth(1).unwrap().to_owned();

    // 2. The provider calls back; we land on the dashboard with a session id
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/auth/github/callback?code=upstream-code&state={state}"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let destination = location(&response);
    assert!(destination.starts_with(&format!("{ISSUER}/dashboard?session=")));
    let session_id = query_param(&destination, "session").unwrap();

    // 3. Session lookup hands the CLI/dashboard a bearer token
    let response = app
        .clone()
        .oneshot(get(&format!("/auth/session/{session_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session_body = json_body(response).await;
    assert_eq!(session_body["token_type"], "Bearer");
    assert!(session_body["expires_in"].as_i64().unwrap() > 0);

    // 4. The session authorizes a first-party code grant
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/oauth/authorize?response_type=code&client_id=web-client\
             &redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback\
             &scope=read%3Auser&state=client-state&session={session_id}"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let redirect = location(&response);
    assert!(redirect.starts_with("https://app.example.com/callback?"));
    let code = query_param(&redirect, "code").unwrap();
    assert_eq!(query_param(&redirect, "state").as_deref(), Some("client-state"));

    // 5. The client exchanges the code for tokens
    let response = app
        .clone()
        .oneshot(post_form(
            "/oauth/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", "https://app.example.com/callback"),
                ("client_id", "web-client"),
                ("client_secret", common::WEB_CLIENT_SECRET),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = json_body(response).await;
    assert!(!tokens["access_token"].as_str().unwrap().is_empty());
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 3600);

    // 6. The issued token introspects active over HTTP
    let access_token = tokens["access_token"].as_str().unwrap().to_owned();
    let response = app
        .clone()
        .oneshot(post_form("/oauth/introspect", &[("token", &access_token)]))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["active"], true);

    // 7. Logout revokes the session
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/auth/session/{session_id}"))
                .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get(&format!("/auth/session/{session_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
