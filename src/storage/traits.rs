//! Abstract storage interfaces for pluggable backends
//!
//! The coordination core only needs atomic read-then-write access to game
//! records and to pairs of player ratings; these traits describe exactly that.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::rules::{Color, Outcome};

/// Lifecycle of a persisted game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    Waiting,
    InProgress,
    Finished,
}

impl GameState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::Waiting => "waiting",
            GameState::InProgress => "in_progress",
            GameState::Finished => "finished",
        }
    }
}

/// Winner marker of a finished game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    White,
    Black,
    Draw,
}

impl From<Outcome> for Winner {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::WhiteWin => Winner::White,
            Outcome::BlackWin => Winner::Black,
            Outcome::Draw => Winner::Draw,
        }
    }
}

/// Persisted game record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: String,
    pub position: String,
    pub white: String,
    pub black: Option<String>,
    pub state: GameState,
    pub winner: Option<Winner>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameSession {
    /// A game created by matchmaking: both seats filled, already running
    pub fn matched(white: String, black: String, position: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            position,
            white,
            black: Some(black),
            state: GameState::InProgress,
            winner: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A game opened by one player, waiting for an opponent to join
    pub fn open(white: String, position: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            position,
            white,
            black: None,
            state: GameState::Waiting,
            winner: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Identity seated on `color`, if any
    pub fn player(&self, color: Color) -> Option<&str> {
        match color {
            Color::White => Some(self.white.as_str()),
            Color::Black => self.black.as_deref(),
        }
    }

    /// Color played by `user`, if they are seated in this game
    pub fn color_of(&self, user: &str) -> Option<Color> {
        if self.white == user {
            Some(Color::White)
        } else if self.black.as_deref() == Some(user) {
            Some(Color::Black)
        } else {
            None
        }
    }
}

/// Registered player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub username: String,
    pub password_hash: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub rating: i32,
}

/// One validated move, ready to be committed
#[derive(Debug, Clone, PartialEq)]
pub struct MoveCommit {
    pub game_id: String,
    /// Position the move was validated against; the commit fails if the
    /// stored position is no longer this one
    pub expected_position: String,
    pub new_position: String,
    /// Present when the move ended the game
    pub outcome: Option<Outcome>,
}

/// What a commit changed
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub session: GameSession,
    /// New (white, black) ratings when the commit finished the game
    pub ratings: Option<(i32, i32)>,
}

/// Game record storage
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Persist a new game
    async fn create_game(&self, session: GameSession) -> Result<()>;

    /// Get a game by ID
    async fn get_game(&self, game_id: &str) -> Result<Option<GameSession>>;

    /// Seat `user` as black in a waiting game and start it
    async fn join_game(&self, game_id: &str, user: &str) -> Result<GameSession>;

    /// ID of an in-progress game `user` is playing in
    async fn find_active_game(&self, user: &str) -> Result<Option<String>>;

    /// Atomically store a move and, if it ends the game, the finished state
    /// and both players' new ratings
    async fn commit_move(&self, commit: MoveCommit) -> Result<CommitReceipt>;
}

/// Player record storage
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Create a player; usernames are unique
    async fn create_player(&self, player: PlayerRecord) -> Result<()>;

    /// Get a player by username
    async fn get_player(&self, username: &str) -> Result<Option<PlayerRecord>>;

    /// Highest rated players, best first
    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;
}
