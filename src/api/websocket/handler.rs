//! WebSocket connection handler

use std::sync::Arc;
use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    response::Response,
};

use super::events::{parse_client_message, ClientCommand};
use super::state::{ClientId, RelayState};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<RelayState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: Arc<RelayState>) {
    let (client, mut rx) = state.register();

    loop {
        tokio::select! {
            // Frames queued for this client
            frame = rx.recv() => {
                match frame {
                    Some(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break; // Client disconnected
                        }
                    }
                    None => break,
                }
            }

            // Handle client messages
            result = socket.recv() => {
                match result {
                    Some(Ok(msg)) => {
                        if !handle_client_message(msg, client, &state, &mut socket).await {
                            break; // Client requested close
                        }
                    }
                    Some(Err(_)) => break, // WebSocket error
                    None => break, // Client disconnected
                }
            }
        }
    }

    state.unregister(client);
}

/// Handle a message from the client
/// Returns false if the connection should be closed
async fn handle_client_message(
    msg: Message,
    client: ClientId,
    state: &RelayState,
    socket: &mut WebSocket,
) -> bool {
    match msg {
        Message::Text(text) => {
            match parse_client_message(&text) {
                Some(ClientCommand::Subscribe { key, url }) => state.subscribe(client, &key, &url),
                Some(ClientCommand::Unsubscribe { url }) => state.unsubscribe(client, &url),
                Some(ClientCommand::Other { cmd }) => {
                    tracing::debug!(client, cmd = %cmd, "Ignoring unsupported command");
                }
                None => tracing::warn!(client, "Ignoring unrecognized message"),
            }
            true
        }
        Message::Binary(_) => true, // Ignore binary messages
        Message::Ping(data) => {
            let _ = socket.send(Message::Pong(data)).await;
            true
        }
        Message::Pong(_) => true, // Ignore pong responses
        Message::Close(_) => false, // Client requested close
    }
}
