// ABOUTME: Server binary for the Advison OAuth2 federation broker
// ABOUTME: Loads env configuration, initializes logging, and serves until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Advison

//! # Advison Auth Server Binary
//!
//! Starts the OAuth2 authorization server with federated login against the
//! configured upstream providers.

use advison_auth_server::{config::environment::ServerConfig, logging, server};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "advison-auth-server")]
#[command(about = "Advison Auth - OAuth2 authorization server with federated login")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override the pre-provisioned clients file
    #[arg(long)]
    clients_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(clients_file) = args.clients_file {
        config.clients_file = Some(clients_file);
    }

    if let Err(e) = server::serve(config).await {
        error!("server exited with error: {e:#}");
        return Err(e);
    }

    Ok(())
}
