// Library interface for the native bridge
// Exposes the HTTP surface so it can be mounted into other applications

pub mod framing;
pub mod native;
pub mod websocket;

pub use native::ProcessConnector;
pub use websocket::handle_websocket;

use axum::{
    Json, Router,
    extract::{State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use relay_core::RelayHandle;

#[derive(Clone)]
pub struct BridgeState {
    pub relay: RelayHandle,
}

// HTTP routes that can be mounted into any axum router
pub fn create_routes(state: BridgeState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/state", get(get_state))
        .route("/health", get(health))
        .with_state(state)
}

async fn websocket_handler(
    State(state): State<BridgeState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state.relay))
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn get_state(State(state): State<BridgeState>) -> impl IntoResponse {
    match state.relay.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
