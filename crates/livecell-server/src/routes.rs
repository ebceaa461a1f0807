//! HTTP and WebSocket routes for the livecell bridge.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Json},
    routing::get,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex as TokioMutex;
use tower_http::cors::CorsLayer;

use crate::bridge::Bridge;
use crate::protocol::{ClientMessage, ServerMessage};

type WsSender = Arc<TokioMutex<SplitSink<WebSocket, Message>>>;

/// Application state shared across handlers.
pub struct AppState {
    pub bridge: Bridge,
}

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/state", get(state_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Current session, run and cell state.
async fn state_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.bridge.snapshot())
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

/// Handle WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let sender: WsSender = Arc::new(TokioMutex::new(sender));

    // Subscribe before the snapshot so no transition falls in between
    let (subscription, mut rx) = state.bridge.bus().subscribe_channel();

    send_message(&sender, &state.bridge.snapshot()).await;

    let forward_sender = sender.clone();
    let forward_task = tokio::spawn(async move {
        let _subscription = subscription;
        while let Some(status) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&ServerMessage::Status(status)) else {
                continue;
            };
            let mut sender = forward_sender.lock().await;
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(msg, &state, &sender).await,
                Err(e) => {
                    tracing::warn!("Failed to parse client message: {} (input: {})", e, text);
                    send_message(
                        &sender,
                        &ServerMessage::Error {
                            message: format!("Invalid message format: {}", e),
                        },
                    )
                    .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    forward_task.abort();
}

/// Send a server message through the WebSocket.
async fn send_message(sender: &WsSender, msg: &ServerMessage) {
    if let Ok(json) = serde_json::to_string(msg) {
        let mut sender = sender.lock().await;
        let _ = sender.send(Message::Text(json.into())).await;
    }
}

/// Handle a client message.
///
/// Requests that wait on the compute server run in their own task so the
/// socket keeps reading edits while a run is in flight.
async fn handle_client_message(msg: ClientMessage, state: &Arc<AppState>, sender: &WsSender) {
    if msg.is_remote() {
        let bridge = state.bridge.clone();
        let sender = sender.clone();
        tokio::spawn(async move {
            if let Some(reply) = bridge.handle(msg).await {
                send_message(&sender, &reply).await;
            }
        });
    } else if let Some(reply) = state.bridge.handle(msg).await {
        send_message(sender, &reply).await;
    }
}
