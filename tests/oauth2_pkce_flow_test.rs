// ABOUTME: OAuth 2.0 PKCE flow tests: S256 enforcement, verifier validation, public clients
// ABOUTME: Validates challenge format rules and that failed verification burns the code
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use advison_auth_server::oauth2::{AuthorizeRequest, ClientCredentials, TokenRequest};
use common::{generate_code_challenge, generate_code_verifier};
use uuid::Uuid;

fn pkce_authorize(challenge: &str, method: Option<&str>) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: "code".into(),
        client_id: "cli-client".into(),
        redirect_uri: "http://localhost:9090/callback".into(),
        scope: Some("read:user".into()),
        state: None,
        code_challenge: Some(challenge.into()),
        code_challenge_method: method.map(str::to_owned),
        session: None,
    }
}

fn pkce_token(code: &str, verifier: Option<&str>) -> TokenRequest {
    TokenRequest {
        grant_type: "authorization_code".into(),
        code: Some(code.into()),
        redirect_uri: Some("http://localhost:9090/callback".into()),
        client_id: Some("cli-client".into()),
        code_verifier: verifier.map(str::to_owned),
        ..TokenRequest::default()
    }
}

#[tokio::test]
async fn s256_flow_succeeds_with_matching_verifier() {
    let env = common::setup_oauth2();
    let verifier = generate_code_verifier();
    let challenge = generate_code_challenge(&verifier);

    let response = env
        .oauth2
        .authorize(pkce_authorize(&challenge, Some("S256")), Some(Uuid::new_v4()))
        .await
        .unwrap();

    let tokens = env
        .oauth2
        .token(
            pkce_token(&response.code, Some(&verifier)),
            ClientCredentials::default(),
        )
        .await
        .unwrap();
    assert!(!tokens.access_token.is_empty());
    assert_eq!(tokens.expires_in, 3600);
}

#[tokio::test]
async fn wrong_verifier_is_rejected() {
    let env = common::setup_oauth2();
    let verifier = generate_code_verifier();
    let challenge = generate_code_challenge(&verifier);

    let response = env
        .oauth2
        .authorize(pkce_authorize(&challenge, Some("S256")), Some(Uuid::new_v4()))
        .await
        .unwrap();

    let other_verifier = generate_code_verifier();
    let err = env
        .oauth2
        .token(
            pkce_token(&response.code, Some(&other_verifier)),
            ClientCredentials::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, "invalid_grant");
}

#[tokio::test]
async fn failed_verification_burns_the_code() {
    let env = common::setup_oauth2();
    let verifier = generate_code_verifier();
    let challenge = generate_code_challenge(&verifier);

    let response = env
        .oauth2
        .authorize(pkce_authorize(&challenge, Some("S256")), Some(Uuid::new_v4()))
        .await
        .unwrap();

    let bad = generate_code_verifier();
    env.oauth2
        .token(
            pkce_token(&response.code, Some(&bad)),
            ClientCredentials::default(),
        )
        .await
        .unwrap_err();

    // Retrying with the right verifier must also fail: consumption happened
    // before verification
    let err = env
        .oauth2
        .token(
            pkce_token(&response.code, Some(&verifier)),
            ClientCredentials::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, "invalid_grant");
}

#[tokio::test]
async fn missing_verifier_is_rejected_when_challenge_was_issued() {
    let env = common::setup_oauth2();
    let verifier = generate_code_verifier();
    let challenge = generate_code_challenge(&verifier);

    let response = env
        .oauth2
        .authorize(pkce_authorize(&challenge, Some("S256")), Some(Uuid::new_v4()))
        .await
        .unwrap();

    let err = env
        .oauth2
        .token(pkce_token(&response.code, None), ClientCredentials::default())
        .await
        .unwrap_err();
    assert_eq!(err.error, "invalid_grant");
}

#[tokio::test]
async fn plain_method_is_rejected_at_authorize() {
    let env = common::setup_oauth2();
    let verifier = generate_code_verifier();

    let err = env
        .oauth2
        .authorize(pkce_authorize(&verifier, Some("plain")), Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.error, "invalid_request");
}

#[tokio::test]
async fn out_of_range_challenge_length_is_rejected() {
    let env = common::setup_oauth2();

    let too_short = "a".repeat(42);
    let err = env
        .oauth2
        .authorize(pkce_authorize(&too_short, Some("S256")), Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.error, "invalid_request");

    let too_long = "a".repeat(129);
    let err = env
        .oauth2
        .authorize(pkce_authorize(&too_long, Some("S256")), Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.error, "invalid_request");
}

#[tokio::test]
async fn verifier_with_invalid_characters_is_rejected() {
    let env = common::setup_oauth2();
    let verifier = generate_code_verifier();
    let challenge = generate_code_challenge(&verifier);

    let response = env
        .oauth2
        .authorize(pkce_authorize(&challenge, Some("S256")), Some(Uuid::new_v4()))
        .await
        .unwrap();

    let invalid = format!("{}!!", "a".repeat(43));
    let err = env
        .oauth2
        .token(
            pkce_token(&response.code, Some(&invalid)),
            ClientCredentials::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, "invalid_grant");
}

#[tokio::test]
async fn public_client_without_pkce_is_rejected() {
    let env = common::setup_oauth2();

    let request = AuthorizeRequest {
        response_type: "code".into(),
        client_id: "cli-client".into(),
        redirect_uri: "http://localhost:9090/callback".into(),
        scope: Some("read:user".into()),
        state: None,
        code_challenge: None,
        code_challenge_method: None,
        session: None,
    };

    let err = env
        .oauth2
        .authorize(request, Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.error, "invalid_request");
}

#[tokio::test]
async fn verifier_without_challenge_is_rejected() {
    let env = common::setup_oauth2();

    // Confidential client, no PKCE at authorize time
    let response = env
        .oauth2
        .authorize(
            AuthorizeRequest {
                response_type: "code".into(),
                client_id: "web-client".into(),
                redirect_uri: "https://app.example.com/callback".into(),
                scope: Some("read:user".into()),
                state: None,
                code_challenge: None,
                code_challenge_method: None,
                session: None,
            },
            Some(Uuid::new_v4()),
        )
        .await
        .unwrap();

    let err = env
        .oauth2
        .token(
            TokenRequest {
                grant_type: "authorization_code".into(),
                code: Some(response.code),
                redirect_uri: Some("https://app.example.com/callback".into()),
                client_id: Some("web-client".into()),
                client_secret: Some(common::WEB_CLIENT_SECRET.into()),
                code_verifier: Some(generate_code_verifier()),
                ..TokenRequest::default()
            },
            ClientCredentials::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.error, "invalid_grant");
}
