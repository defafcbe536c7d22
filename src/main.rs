// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Crypto Dashboard API Server
//!
//! Signs users in with a password or Google and serves live cryptocurrency
//! market data to the dashboard.

use anyhow::Context;
use crypto_dashboard::{
    config::Config,
    db::{PgUserStore, UserStore},
    services::GoogleOAuthClient,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting Crypto Dashboard API");

    // Open the user store and make sure the schema exists
    let store = Arc::new(
        PgUserStore::connect(&config)
            .await
            .context("Failed to connect to Postgres")?,
    );
    store
        .ensure_schema()
        .await
        .context("Failed to bootstrap database schema")?;
    tracing::info!("User store ready");

    let oauth = Arc::new(
        GoogleOAuthClient::new(&config).context("Failed to initialize Google OAuth client")?,
    );

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store.clone(), oauth)?);

    // Build router
    let app = crypto_dashboard::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crypto_dashboard=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
