// ABOUTME: HTTP server assembly: shared state construction, router composition, lifecycle
// ABOUTME: Request handling is stateless; everything shared lives behind Arcs in AppState
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

//! Server assembly and lifecycle.
//!
//! Handlers share nothing but [`AppState`]; all mutable state flows through
//! the state store, so any number of replicas can serve the same issuer when
//! the Redis backend is configured.

use crate::auth::AuthManager;
use crate::clients::ClientRegistry;
use crate::config::environment::ServerConfig;
use crate::federation::ProviderRegistry;
use crate::oauth2::{self, OAuth2AuthorizationServer, OAuth2RateLimiter};
use crate::routes::HealthRoutes;
use crate::session::{self, SessionBroker};
use crate::store::state_store_from_config;
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Inbound request timeout; generous enough to cover one bounded upstream
/// round trip during a callback
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state available to every route handler
#[derive(Clone)]
pub struct AppState {
    /// OAuth2 endpoint implementation
    pub oauth2: Arc<OAuth2AuthorizationServer>,
    /// Session broker for federation flows
    pub broker: Arc<SessionBroker>,
    /// Per-IP rate limiter for the OAuth2 endpoints
    pub rate_limiter: Arc<OAuth2RateLimiter>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build all shared resources from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the state store backend or clients file fails to
    /// initialize
    pub async fn from_config(config: Arc<ServerConfig>) -> Result<Self> {
        let store = state_store_from_config(&config.store).await?;

        let clients = match &config.clients_file {
            Some(path) => Arc::new(ClientRegistry::load(path)?),
            None => {
                warn!("no clients file configured; token endpoints will reject all clients");
                Arc::new(ClientRegistry::empty())
            }
        };

        let auth_manager = Arc::new(AuthManager::new(&config.jwt_secret, store.clone()));

        let providers = Arc::new(ProviderRegistry::from_config(
            &config.oauth,
            &config.issuer_url,
        ));
        info!(providers = ?providers.provider_names(), "federation providers registered");

        let oauth2 = Arc::new(OAuth2AuthorizationServer::new(
            clients,
            auth_manager.clone(),
            store.clone(),
            config.ttls.clone(),
        ));

        let broker = Arc::new(SessionBroker::new(
            store,
            auth_manager,
            providers,
            config.ttls.clone(),
            config.post_login_redirect_url.clone(),
        ));

        let rate_limiter = Arc::new(OAuth2RateLimiter::new(config.rate_limits.clone()));

        Ok(Self {
            oauth2,
            broker,
            rate_limiter,
            config,
        })
    }
}

/// Compose the full application router
#[must_use]
pub fn build_router(state: AppState) -> Router {
    oauth2::routes::router()
        .merge(session::routes::router())
        .with_state(state)
        .merge(HealthRoutes::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
                .layer(CorsLayer::permissive()),
        )
}

/// Validate configuration, build resources, and serve until shutdown
///
/// # Errors
///
/// Returns an error if configuration is invalid, resources fail to build,
/// or the listener cannot bind
pub async fn serve(config: ServerConfig) -> Result<()> {
    config.validate()?;
    info!("{}", config.summary());

    let http_port = config.http_port;
    let state = AppState::from_config(Arc::new(config)).await?;
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
