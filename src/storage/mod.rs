//! Persistence collaborators for games and players

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{
    CommitReceipt, GameSession, GameState, GameStore, LeaderboardEntry, MoveCommit, PlayerRecord,
    PlayerStore, Winner,
};
