//! Connection gateway: upgrades a request into a live game connection

use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use serde::Deserialize;
use warp::ws::{Message, WebSocket};

use crate::core::message::{ClientMessage, SocketMessage};
use crate::core::server::SharedGameServer;
use crate::core::Connection;

/// Query string of an upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct GatewayQuery {
    #[serde(rename = "gameId")]
    pub game_id: Option<String>,
}

impl GatewayQuery {
    /// The requested game, if one was named
    pub fn game(&self) -> Option<&str> {
        self.game_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

// Handle a WebSocket connection
pub async fn handle_ws_client(
    ws: WebSocket,
    query: GatewayQuery,
    authorization: Option<String>,
    server: SharedGameServer,
) {
    let game_id = match query.game() {
        Some(id) => id.to_string(),
        None => {
            warn!("Rejecting websocket connection without gameId");
            close(ws).await;
            return;
        }
    };

    let user = match server.identify(authorization.as_deref()) {
        Ok(user) => user,
        Err(e) => {
            warn!("Rejecting websocket connection for game {}: {}", game_id, e);
            close(ws).await;
            return;
        }
    };

    let (connection, mut outbound) =
        Connection::open(game_id.clone(), user, server.message_buffer_size());
    let connection_id = connection.id;

    if let Err(e) = server.room().register(connection) {
        error!("Failed to register client {}: {}", connection_id, e);
        close(ws).await;
        return;
    }

    let (mut ws_tx, mut ws_rx) = ws.split();

    // Drain the outbound buffer until the room closes it
    let writer = tokio::task::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if let Err(e) = ws_tx.send(Message::text(text)).await {
                debug!("Failed to send WebSocket message to {}: {}", connection_id, e);
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(msg) if msg.is_text() => {
                process_message(&msg, connection_id, &game_id, &server);
            }
            Ok(msg) if msg.is_close() => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket error for {}: {}", connection_id, e);
                break;
            }
        }
    }

    // Client disconnected
    if let Err(e) = server.room().unregister(connection_id, game_id.clone()) {
        error!("Error unregistering client {}: {}", connection_id, e);
    }
    if let Err(e) = writer.await {
        error!("Writer task for {} failed: {}", connection_id, e);
    }
    info!("Client {} disconnected from game {}", connection_id, game_id);
}

// Forward a client frame to its own game
fn process_message(msg: &Message, connection_id: uuid::Uuid, game_id: &str, server: &SharedGameServer) {
    let text = match msg.to_str() {
        Ok(s) => s,
        Err(_) => return,
    };

    let outgoing = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Chat { payload }) => SocketMessage::Chat {
            game_id: game_id.to_string(),
            payload,
        },
        Err(e) => {
            warn!("Ignoring frame from {}: {}", connection_id, e);
            return;
        }
    };

    match serde_json::to_string(&outgoing) {
        Ok(body) => {
            if let Err(e) = server.room().publish_from(connection_id, body) {
                error!("Failed to publish message from {}: {}", connection_id, e);
            }
        }
        Err(e) => error!("Failed to serialize message from {}: {}", connection_id, e),
    }
}

async fn close(mut ws: WebSocket) {
    let _ = ws.close().await;
}
