//! Rules-engine collaborator
//!
//! The coordination core never interprets board positions itself. It asks a
//! [`RulesOracle`] to parse stored notation, list the legal move tokens and
//! apply one of them.

pub mod chess_oracle;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use chess_oracle::ChessOracle;

/// Side to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    WhiteWin,
    BlackWin,
    Draw,
}

impl Outcome {
    /// Result notation sent to clients
    pub fn notation(&self) -> &'static str {
        match self {
            Outcome::WhiteWin => "1-0",
            Outcome::BlackWin => "0-1",
            Outcome::Draw => "1/2-1/2",
        }
    }

    /// A win for `color`
    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => Outcome::WhiteWin,
            Color::Black => Outcome::BlackWin,
        }
    }
}

/// A parsed position together with what the oracle knows about it
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub notation: String,
    pub turn: Color,
    pub legal_moves: Vec<String>,
}

impl Position {
    /// Exact-match lookup of a submitted token among the legal moves
    pub fn is_legal(&self, token: &str) -> bool {
        self.legal_moves.iter().any(|m| m == token)
    }
}

/// Result of applying a legal move
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMove {
    pub notation: String,
    pub turn: Color,
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RulesError {
    /// Stored notation could not be parsed
    Parse(String),
    /// Token is not one of the position's legal moves
    IllegalMove(String),
}

impl fmt::Display for RulesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulesError::Parse(msg) => write!(f, "Position parse error: {}", msg),
            RulesError::IllegalMove(token) => write!(f, "Illegal move: {}", token),
        }
    }
}

impl std::error::Error for RulesError {}

/// Legality and outcome oracle over serialized positions
pub trait RulesOracle: Send + Sync {
    /// Notation of the standard starting position
    fn starting_position(&self) -> String;

    /// Parse stored notation into a position
    fn parse(&self, notation: &str) -> Result<Position, RulesError>;

    /// Apply a legal move token to a position
    fn apply(&self, position: &Position, token: &str) -> Result<AppliedMove, RulesError>;
}
