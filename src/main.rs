// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! DSPM Auth API Server
//!
//! Authentication gateway that fronts a managed identity provider for the
//! other DSPM services.

use anyhow::Context;
use dspm_auth::{config::Config, services::FirebaseAuth, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        port = config.port,
        environment = config.environment.as_str(),
        "Starting DSPM Auth Service"
    );

    let credentials = config
        .credentials
        .as_ref()
        .context("Identity provider credentials are not configured")?;
    let provider = FirebaseAuth::new(credentials, config.provider_timeout)
        .await
        .context("Failed to initialize identity provider client")?;
    tracing::info!(
        project = credentials.project_id(),
        "Identity provider client initialized"
    );

    let state = Arc::new(AppState::new(config.clone(), Arc::new(provider)));

    spawn_rate_limit_sweeper(state.clone());

    let app = dspm_auth::routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Periodically forget rate-limit windows that have run out.
fn spawn_rate_limit_sweeper(state: Arc<AppState>) {
    let period = state.rate_limiter.window();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = state.rate_limiter.sweep();
            if removed > 0 {
                tracing::debug!(
                    removed,
                    remaining = state.rate_limiter.tracked_sources(),
                    "Swept rate limit entries"
                );
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dspm_auth=debug"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
