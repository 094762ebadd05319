//! Pang Broker - Stateful chat session broker.
//!
//! Clients open a *connection* (a server-held session), then run chat
//! operations against it. The broker keeps per-connection, per-chat message
//! history and replays the whole chat to the text backend on every turn.
//!
//! ## Architecture
//!
//! ```text
//! Client → routes (resolve + touch connection) → ChatService
//!                                                  ├─ MessageAssembler (pending image)
//!                                                  ├─ Provider (backend call)
//!                                                  └─ format (strip markdown)
//! ```
//!
//! Connections expire after an idle TTL; every request that names a
//! connection restarts its countdown.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod assembler;
pub mod catalog;
pub mod chat;
pub mod error;
pub mod format;
pub mod image;
pub mod keepalive;
pub mod provider;
pub mod request;
pub mod routes;
pub mod session;

pub use assembler::MessageAssembler;
pub use chat::ChatService;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use format::strip_formatting;
pub use provider::{ChatRequest, ChatResponse, PollinationsProvider, Provider, ProviderError};
pub use routes::AppState;
pub use session::{Connection, ConnectionStore, Message};

use axum::Router;
use pang_common::config::Config;
use std::net::SocketAddr;
use std::time::Duration;

/// Build the broker router from configuration.
pub fn build_router(config: &Config) -> Router {
    routes::build_routes(AppState::from_config(config))
}

/// Build the broker router around prepared state.
pub fn build_router_with_state(state: AppState) -> Router {
    routes::build_routes(state)
}

/// Start the broker server and run until interrupted.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config.listen_addr().parse()?;

    let router = build_router(config);

    let keepalive_handle = config.keepalive.url.clone().map(|url| {
        keepalive::spawn_self_ping(
            reqwest::Client::new(),
            url,
            Duration::from_secs(config.keepalive.interval_secs),
        )
    });

    tracing::info!(
        api_url = %config.backend.api_url,
        default_model = %config.backend.default_model,
        ttl_ms = config.sessions.ttl_ms,
        "Starting Pang Broker on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Clean up on shutdown
    if let Some(handle) = keepalive_handle {
        handle.abort();
    }

    tracing::info!("Pang Broker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
