use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use crate::{
    auth::AuthenticatedUser,
    error::{ApiError, ConnectError},
    metrics::{metrics_handler, metrics_middleware},
    socket::chat_socket,
    state::AppState,
};

pub mod actors;
pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod room;
pub mod socket;
pub mod state;
pub mod store;

/// Resolves the connection before upgrading, so rejected callers get a plain
/// HTTP error and nothing is registered.
async fn chat_ws_handler(
    State(state): State<Arc<AppState>>,
    Path(peer_username): Path<String>,
    caller: Result<AuthenticatedUser, ApiError>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let caller = match caller {
        Ok(AuthenticatedUser(user)) => Some(user),
        Err(ApiError::Connect(ConnectError::Unauthenticated)) => None,
        Err(e) => return e.into_response(),
    };

    let ctx = match state
        .connection_manager
        .resolve(caller, &peer_username)
        .await
    {
        Ok(ctx) => ctx,
        Err(e) => {
            debug!("Rejected chat with {}: {}", peer_username, e);
            return ApiError::from(e).into_response();
        }
    };

    match ws {
        Ok(ws) => ws
            .on_upgrade(move |socket| chat_socket(socket, ctx, state))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

pub fn murmur_route(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/chat/{peer_username}", any(chat_ws_handler))
        .route("/api/conversations", get(api::list_conversations))
        .route(
            "/api/conversations/{username}/messages",
            get(api::conversation_history),
        )
        .route("/api/presence/{username}", get(api::user_presence))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
