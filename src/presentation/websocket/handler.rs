//! WebSocket Connection Handler
//!
//! Upgrades authenticated requests and runs the per-connection read loop.
//! Authentication happens in the [`AuthUser`] extractor, before the upgrade,
//! so rejected handshakes never register a connection.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::messages::{ClientEvent, Outbound};
use crate::presentation::middleware::AuthUser;
use crate::startup::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    user: AuthUser,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    let max_message_size = state.settings.websocket.max_message_size;
    let max_frame_size = state.settings.websocket.max_frame_size;

    ws.max_message_size(max_message_size)
        .max_frame_size(max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, user, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, user: AuthUser, state: AppState) {
    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let session = state.gateway.register_session(user.user_id, tx);
    let session_id = session.id;

    // Spawn task to forward messages from channel to WebSocket
    let mut sender_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Event(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(t) => t,
                        Err(e) => {
                            tracing::error!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close { reason } => {
                    let frame = CloseFrame {
                        code: close_code::AWAY,
                        reason: reason.into(),
                    };
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    });

    // Main message loop
    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(text.as_str()) {
                            Ok(event) => state.broker.handle_event(&session, event).await,
                            Err(e) => state.broker.reject_frame(&session, &e.to_string()),
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        state.broker.reject_frame(&session, "binary frames are not supported");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %session_id, "Connection closed");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong; pong replies are handled by axum
                        session.touch();
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            // Sender finished: socket gone or server-initiated close
            _ = &mut sender_task => {
                tracing::debug!(connection_id = %session_id, "Sender task finished");
                break;
            }
        }
    }

    // Cleanup; a no-op when housekeeping already evicted the connection
    state.gateway.unregister_session(session_id);
    sender_task.abort();

    let activity = session.activity();
    tracing::info!(
        user_id = user.user_id,
        connection_id = %session_id,
        connected_secs = (Utc::now() - session.connected_at).num_seconds(),
        messages_sent = activity.messages_sent,
        files_uploaded = activity.files_uploaded,
        bytes_sent = activity.bytes_sent,
        "User disconnected"
    );
}
