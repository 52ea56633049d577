//! WebSocket handler for live reload.
//!
//! Upgrades `/livereload` requests and hands the socket to a [`Connection`].

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;

use super::connection::Connection;
use super::hub::HubHandle;
use crate::state::AppState;

/// Handle WebSocket upgrade for live reload.
pub(crate) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let Some(hub) = state.live_reload.clone() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Register an established socket and run it until either side closes.
async fn handle_socket(socket: WebSocket, hub: HubHandle) {
    let connection = Connection::open(&hub);
    let (sink, stream) = socket.split();
    connection.run(sink, stream).await;
}
