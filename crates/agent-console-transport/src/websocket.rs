//! WebSocket surface for browser consoles.

use agent_console_core::{LevelTag, LogRecord};
use agent_console_session::ConsoleHandle;
use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::protocol::{ClientMessage, ServerMessage};

/// Greeting sent to every new connection. Not part of the timeline.
pub const WELCOME: &str = "🚀 Connected to the agent console. Send your goal to begin.";

/// WebSocket handler state.
#[derive(Clone)]
pub struct WsState {
    /// Console shared by all connections.
    pub console: ConsoleHandle,
}

/// Create the console router: `GET /health` and `GET /ws/chat`.
///
/// # Example
/// ```ignore
/// let app = create_router(console);
/// axum::serve(listener, app).await?;
/// ```
#[must_use]
pub fn create_router(console: ConsoleHandle) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/chat", get(ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(WsState { console })
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "agent": "ready" }))
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, mut receiver) = socket.split();
    let console = state.console;

    // Channel for sending messages to the client
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let welcome = LogRecord::received(LevelTag::new("INIT"), WELCOME);
    let _ = tx.send(ServerMessage::log(&welcome));

    // Timeline: history first, then live records.
    let mut records = console.timeline().history_plus_stream();
    let log_tx = tx.clone();
    let log_task = tokio::spawn(async move {
        while let Some(record) = records.next().await {
            if log_tx.send(ServerMessage::log(&record)).is_err() {
                break;
            }
        }
    });

    // Controller view: full snapshot, then diffs.
    let mut view_rx = console.view();
    let view_tx = tx.clone();
    let view_task = tokio::spawn(async move {
        let mut previous = view_rx.borrow_and_update().clone();
        for frame in ServerMessage::snapshot(&previous) {
            let _ = view_tx.send(frame);
        }
        while view_rx.changed().await.is_ok() {
            let current = view_rx.borrow_and_update().clone();
            for frame in ServerMessage::changes(&previous, &current) {
                if view_tx.send(frame).is_err() {
                    return;
                }
            }
            previous = current;
        }
    });

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                break;
            }
        };

        let client_msg = match ClientMessage::parse(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Invalid client message: {e}");
                let _ = tx.send(ServerMessage::Error {
                    message: format!("Invalid message: {e}"),
                });
                continue;
            }
        };

        if let Some(reply) = route_client_message(&console, client_msg) {
            let _ = tx.send(reply);
        }
    }

    log_task.abort();
    view_task.abort();
    send_task.abort();
    tracing::debug!("Console socket closed");
}

/// Apply one client message to the console, returning an immediate reply if any.
pub fn route_client_message(console: &ConsoleHandle, msg: ClientMessage) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Ping => Some(ServerMessage::Pong),
        ClientMessage::Goal { goal } if goal.trim().is_empty() => Some(ServerMessage::Error {
            message: "Goal cannot be empty".to_string(),
        }),
        ClientMessage::Goal { goal } => match console.submit(goal) {
            Ok(()) => None,
            Err(e) => Some(ServerMessage::Error {
                message: e.to_string(),
            }),
        },
    }
}
