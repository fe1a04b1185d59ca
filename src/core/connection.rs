//! WebSocket connection management
//! Handles the outbound side of a single client connection

use log::debug;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Why a message could not be queued for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The outbound buffer is full; the client is not keeping up
    BufferFull,
    /// The write task is gone
    Closed,
}

/// One live channel to a single user, bound to one game.
///
/// The connection holds the only sender of its outbound buffer, so dropping
/// it closes the buffer and ends the write task that drains it.
#[derive(Debug)]
pub struct Connection {
    pub id: Uuid,
    pub game_id: String,
    pub user: Option<String>,
    sender: mpsc::Sender<String>,
    connected_at: Instant,
}

impl Connection {
    /// Create a connection and the receiving end of its outbound buffer
    pub fn open(
        game_id: String,
        user: Option<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let connection = Self {
            id: Uuid::new_v4(),
            game_id,
            user,
            sender,
            connected_at: Instant::now(),
        };
        (connection, receiver)
    }

    /// Queue a message without waiting
    pub fn try_deliver(&self, text: &str) -> Result<(), DeliveryFailure> {
        self.sender.try_send(text.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                debug!("Outbound buffer full for connection {}", self.id);
                DeliveryFailure::BufferFull
            }
            mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }

    /// Name shown to other players
    pub fn display_name(&self) -> &str {
        self.user.as_deref().unwrap_or("anonymous")
    }

    /// Calculate the connection duration
    pub fn connection_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_buffer_is_reported() {
        let (conn, mut rx) = Connection::open("g1".into(), None, 2);
        assert!(conn.try_deliver("a").is_ok());
        assert!(conn.try_deliver("b").is_ok());
        assert_eq!(conn.try_deliver("c"), Err(DeliveryFailure::BufferFull));

        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert!(conn.try_deliver("c").is_ok());
    }

    #[tokio::test]
    async fn test_dropping_connection_closes_buffer() {
        let (conn, mut rx) = Connection::open("g1".into(), Some("alice".into()), 4);
        assert_eq!(conn.display_name(), "alice");
        conn.try_deliver("last").unwrap();
        drop(conn);

        assert_eq!(rx.recv().await.as_deref(), Some("last"));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_closed_receiver_is_reported() {
        let (conn, rx) = Connection::open("g1".into(), None, 4);
        drop(rx);
        assert_eq!(conn.try_deliver("x"), Err(DeliveryFailure::Closed));
        assert_eq!(conn.display_name(), "anonymous");
    }
}
