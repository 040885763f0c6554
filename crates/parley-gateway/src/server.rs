// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP/WebSocket server built on axum.
//!
//! Sets up routes, middleware, and shared state. The event pump must be
//! subscribed before `serve` begins accepting connections, so a transition
//! on another instance is never missed by a client that just connected.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use parley_config::model::ServerConfig;
use parley_coordinator::{Coordinator, IdentityResolver};
use parley_core::types::Participant;
use parley_core::ChatError;

use crate::agent_api;
use crate::handlers;
use crate::rooms::RoomRegistry;
use crate::ws;

/// Per-request deadline on the REST surface.
const REQUEST_DEADLINE: std::time::Duration = std::time::Duration::from_secs(30);

/// Per-node session state: who a socket is, and which conversation it is in.
///
/// Sender identity always comes from here, never from a client payload.
#[derive(Default)]
pub struct Sessions {
    pub participants: DashMap<String, Participant>,
    pub conversations: DashMap<String, String>,
}

/// Shared state for axum request handlers and websocket sessions.
#[derive(Clone)]
pub struct GatewayState {
    pub coordinator: Arc<Coordinator>,
    pub identity: IdentityResolver,
    pub rooms: Arc<RoomRegistry>,
    pub sessions: Arc<Sessions>,
}

impl GatewayState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            identity: IdentityResolver::new(),
            rooms: Arc::new(RoomRegistry::new()),
            sessions: Arc::new(Sessions::default()),
        }
    }
}

/// Build the full gateway router.
pub fn router(state: GatewayState) -> Router {
    let customer_routes = Router::new()
        .route("/api/conversations", post(handlers::start_conversation))
        .route(
            "/api/conversations/{id}/queue",
            post(handlers::queue_conversation),
        )
        .route(
            "/api/conversations/{id}/messages",
            get(handlers::get_messages).post(handlers::post_message),
        )
        .route(
            "/api/conversations/{id}",
            axum::routing::delete(handlers::close_conversation),
        );

    let agent_routes = Router::new()
        .route("/api/agent/queue", get(agent_api::queue_snapshot))
        .route(
            "/api/agent/conversations",
            get(agent_api::list_conversations),
        )
        .route(
            "/api/agent/conversations/{id}/accept",
            post(agent_api::accept_conversation),
        )
        .route(
            "/api/agent/conversations/{id}/messages",
            get(agent_api::get_messages),
        )
        .route(
            "/api/agent/conversations/{id}/close",
            post(agent_api::close_conversation),
        );

    let ws_routes = Router::new().route("/ws", get(ws::ws_handler));

    // REST requests carry a deadline; the websocket route is exempt since
    // sessions are long-lived.
    Router::new()
        .merge(
            Router::new()
                .merge(customer_routes)
                .merge(agent_routes)
                .layer(TimeoutLayer::new(REQUEST_DEADLINE)),
        )
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until `cancel` fires.
pub async fn run(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), ChatError> {
    let app = router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(ChatError::backend)?;

    info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(ChatError::backend)?;

    Ok(())
}
