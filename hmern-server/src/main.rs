//! hMERN server
//!
//! Serves the license-gated plugin routes:
//! 1. Licensing plugin status endpoints
//! 2. Firewall admin endpoints, behind the license gate
//!
//! Usage:
//!   LICENSE_KEY=... FRONTEND_URL=https://app.example.com hmern-server --port 5000

use std::{net::SocketAddr, sync::Arc};
use anyhow::{Context, Result};
use clap::Parser;
use hmern_license::LicenseValidator;
use hmern_server::{build_router, ServerConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    let log_level = if config.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("hMERN server starting...");
    let license_config = config.license_config();
    if !license_config.has_license_key() {
        warn!("LICENSE_KEY is not set; licensed routes will answer with a configuration error");
    }
    match &license_config.domain {
        Some(domain) => info!("License domain: {}", domain),
        None => warn!("No license domain; set FRONTEND_URL or LICENSE_DOMAIN"),
    }
    if license_config.dev_bypass() {
        info!("Development mode on localhost: /status bypasses license validation");
    }

    let validator = Arc::new(
        LicenseValidator::from_config(license_config)
            .context("Failed to create license validator")?,
    );
    let app = build_router(validator, config.router_options())
        .context("Failed to register plugins")?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server failed")?;

    info!("hMERN server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
