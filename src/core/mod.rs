//! Coordination core: rooms, matchmaking, moves and ratings

pub mod connection;
pub mod matchmaker;
pub mod message;
pub mod pipeline;
pub mod rating;
pub mod room;
pub mod server;

// Re-export main components for convenience
pub use connection::{Connection, DeliveryFailure};
pub use matchmaker::{MatchPolicy, MatchQueue, MatchStatus, MatchTicket, Matchmaker};
pub use message::{ClientMessage, MoveRequest, MoveResponse, SocketMessage};
pub use pipeline::MovePipeline;
pub use rating::calculate_new_ratings;
pub use room::{spawn_broadcast_room, GameRooms, RoomEvent, RoomHandle, Update};
pub use server::{GameServer, GameServerSettings, GameView, JoinedGame, SharedGameServer};
