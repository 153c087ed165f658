//! Signal Relay
//!
//! Room-scoped WebSocket signaling server.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Build registry, hub and collaborator stores
//! 5. Spawn the idle-room reaper (if enabled)
//! 6. Bind the HTTP + WebSocket listener and serve
//! 7. Wait for shutdown signal, then drain

#![warn(clippy::pedantic)]

use std::sync::Arc;
use std::time::Duration;

use signal_relay::config::Config;
use signal_relay::observability::init_metrics_recorder;
use signal_relay::routes::{self, AppState};
use signal_relay::tasks::{drain_within, start_room_reaper};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signal_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Signal Relay");

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        signal_channel_capacity = config.signal_channel_capacity,
        chat_history_limit = config.chat_history_limit,
        idle_timeout_seconds = config.idle_timeout_seconds,
        room_idle_ttl_seconds = config.room_idle_ttl_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to initialize metrics recorder");
        e
    })?;

    let bind_address = config.bind_address.clone();
    let grace = Duration::from_secs(config.shutdown_grace_seconds);
    let reap_interval = Duration::from_secs(config.room_reap_interval_seconds);
    let room_idle_ttl = config.room_idle_ttl();

    let state = Arc::new(AppState::new(config));
    let shutdown_token = CancellationToken::new();

    let reaper = room_idle_ttl.map(|ttl| {
        tokio::spawn(start_room_reaper(
            Arc::clone(&state),
            ttl,
            reap_interval,
            shutdown_token.child_token(),
        ))
    });
    if reaper.is_none() {
        info!("Idle-room reaper disabled");
    }

    let app = routes::build_routes(Arc::clone(&state), metrics_handle);

    // Bind failure is fatal
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, bind_address = %bind_address, "Failed to bind listener");
            e
        })?;
    info!(bind_address = %bind_address, "Signal Relay listening");

    let server_token = shutdown_token.child_token();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_token.cancelled().await })
            .await
    });

    state.health.set_ready();

    info!("Signal Relay running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!(
        active_connections = state.hub.active_connections(),
        "Shutdown signal received, initiating graceful shutdown..."
    );

    // Stop advertising readiness before closing anything
    state.health.set_not_ready();
    state.hub.shutdown();
    shutdown_token.cancel();

    drain_within(&state.hub, server, grace).await;
    if let Some(reaper) = reaper {
        if let Err(e) = reaper.await {
            warn!(error = %e, "Room reaper task failed");
        }
    }

    info!("Signal Relay shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
