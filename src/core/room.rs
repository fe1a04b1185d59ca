//! Broadcast room: fan-out of game updates to live connections
//!
//! All membership changes and all publishes are events on one stream consumed
//! by a single worker task, so the membership map is never shared and never
//! locked. Delivery into a connection's buffer never waits: a connection whose
//! buffer is full is dropped from its game on the spot.

use log::{debug, info, trace, warn};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::connection::Connection;
use crate::core::message::SocketMessage;
use crate::error::{ArenaError, Result};

/// A serialized update waiting to be fanned out
#[derive(Debug, Clone)]
pub struct Update {
    /// Connection that produced the update, if it came from a client
    pub origin: Option<Uuid>,
    pub body: String,
}

/// Events processed by the room worker, in arrival order
#[derive(Debug)]
pub enum RoomEvent {
    Register(Connection),
    Unregister { connection_id: Uuid, game_id: String },
    Publish(Update),
    Members { game_id: String, reply: oneshot::Sender<Vec<Uuid>> },
    RoomCount { reply: oneshot::Sender<usize> },
}

/// Connections grouped by game identifier
#[derive(Debug, Default)]
pub struct GameRooms {
    games: HashMap<String, HashMap<Uuid, Connection>>,
}

impl GameRooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to its game's room, creating the room if needed
    pub fn register(&mut self, connection: Connection) {
        let game_id = connection.game_id.clone();
        let room = self.games.entry(game_id.clone()).or_insert_with(|| {
            debug!("Game room {} opened", game_id);
            HashMap::new()
        });
        info!(
            "Client {} ({}) joined game room {}",
            connection.id,
            connection.display_name(),
            game_id
        );
        room.insert(connection.id, connection);
    }

    /// Remove a connection, closing its outbound buffer. Returns false if it
    /// was not registered (for example already dropped as a slow consumer).
    pub fn unregister(&mut self, connection_id: Uuid, game_id: &str) -> bool {
        let removed = match self.games.get_mut(game_id) {
            Some(room) => room.remove(&connection_id),
            None => None,
        };
        match removed {
            Some(connection) => {
                info!(
                    "Client {} left game room {} after {:?}",
                    connection_id,
                    game_id,
                    connection.connection_duration()
                );
                self.close_if_empty(game_id);
                true
            }
            None => false,
        }
    }

    /// Deliver an update to every connection of the game named in its payload.
    /// Returns the number of connections that accepted it.
    pub fn publish(&mut self, update: Update) -> usize {
        let mut data: Value = match serde_json::from_str(&update.body) {
            Ok(data) => data,
            Err(e) => {
                warn!("Dropping malformed update: {}", e);
                return 0;
            }
        };

        let game_id = match data.get("gameID").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                warn!("Dropping update without gameID: {}", update.body);
                return 0;
            }
        };

        let room = match self.games.get_mut(&game_id) {
            Some(room) => room,
            None => {
                trace!("No live connections for game {}", game_id);
                return 0;
            }
        };

        let sender_exclusive = data
            .get("type")
            .and_then(Value::as_str)
            .map(SocketMessage::is_sender_exclusive)
            .unwrap_or(false);

        if sender_exclusive {
            let author = update
                .origin
                .and_then(|id| room.get(&id))
                .map(|c| c.display_name().to_string())
                .unwrap_or_else(|| "anonymous".to_string());
            if let Some(text) = data.get("payload").and_then(Value::as_str) {
                let stamped = format!("{}: {}", author, text);
                data["payload"] = Value::String(stamped);
            }
        }

        let text = match serde_json::to_string(&data) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize update for game {}: {}", game_id, e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, connection) in room.iter() {
            if sender_exclusive && update.origin == Some(*id) {
                continue;
            }
            match connection.try_deliver(&text) {
                Ok(()) => delivered += 1,
                Err(failure) => dead.push((*id, failure)),
            }
        }

        for (id, failure) in dead {
            // Dropping the connection closes its buffer
            room.remove(&id);
            warn!(
                "Disconnecting client {} from game {}: {:?}",
                id, game_id, failure
            );
        }
        self.close_if_empty(&game_id);

        debug!("Broadcast to {} clients in game {}", delivered, game_id);
        delivered
    }

    /// IDs of connections registered under a game
    pub fn members(&self, game_id: &str) -> Vec<Uuid> {
        self.games
            .get(game_id)
            .map(|room| room.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of games with at least one live connection
    pub fn room_count(&self) -> usize {
        self.games.len()
    }

    fn close_if_empty(&mut self, game_id: &str) {
        if self.games.get(game_id).map_or(false, |room| room.is_empty()) {
            self.games.remove(game_id);
            info!("Game room {} closed", game_id);
        }
    }

    fn handle(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::Register(connection) => self.register(connection),
            RoomEvent::Unregister {
                connection_id,
                game_id,
            } => {
                self.unregister(connection_id, &game_id);
            }
            RoomEvent::Publish(update) => {
                self.publish(update);
            }
            RoomEvent::Members { game_id, reply } => {
                let _ = reply.send(self.members(&game_id));
            }
            RoomEvent::RoomCount { reply } => {
                let _ = reply.send(self.room_count());
            }
        }
    }
}

/// Cloneable handle feeding the room worker's event stream
#[derive(Debug, Clone)]
pub struct RoomHandle {
    events: mpsc::UnboundedSender<RoomEvent>,
}

impl RoomHandle {
    fn send(&self, event: RoomEvent) -> Result<()> {
        self.events.send(event).map_err(|_| ArenaError::RoomClosed)
    }

    pub fn register(&self, connection: Connection) -> Result<()> {
        self.send(RoomEvent::Register(connection))
    }

    pub fn unregister(&self, connection_id: Uuid, game_id: String) -> Result<()> {
        self.send(RoomEvent::Unregister {
            connection_id,
            game_id,
        })
    }

    /// Publish a server-originated update
    pub fn publish(&self, body: String) -> Result<()> {
        self.send(RoomEvent::Publish(Update { origin: None, body }))
    }

    /// Publish an update sent by one of the room's connections
    pub fn publish_from(&self, origin: Uuid, body: String) -> Result<()> {
        self.send(RoomEvent::Publish(Update {
            origin: Some(origin),
            body,
        }))
    }

    /// Serialize and publish a socket message
    pub fn publish_message(&self, message: &SocketMessage) -> Result<()> {
        let body = serde_json::to_string(message)
            .map_err(|e| ArenaError::Validation(format!("Unserializable update: {}", e)))?;
        self.publish(body)
    }

    pub async fn members(&self, game_id: &str) -> Result<Vec<Uuid>> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomEvent::Members {
            game_id: game_id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| ArenaError::RoomClosed)
    }

    pub async fn room_count(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomEvent::RoomCount { reply })?;
        rx.await.map_err(|_| ArenaError::RoomClosed)
    }
}

/// Start the room worker. It stops once every handle has been dropped.
pub fn spawn_broadcast_room() -> (RoomHandle, JoinHandle<()>) {
    let (events, mut rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(async move {
        let mut rooms = GameRooms::new();
        while let Some(event) = rx.recv().await {
            rooms.handle(event);
        }
        debug!("Broadcast room worker stopped");
    });
    (RoomHandle { events }, worker)
}
