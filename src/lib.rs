//! Chess Arena - coordination core for multiplayer turn-based chess
//!
//! This library provides live game rooms over WebSockets, rating-based
//! matchmaking, a serialized move pipeline and Elo rating updates.

pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod rules;
pub mod storage;

// Re-export main components
pub use config::*;
pub use constants::*;
pub use error::{ArenaError, Result};
