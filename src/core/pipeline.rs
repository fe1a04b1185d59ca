//! Move pipeline: validate one submitted move and commit it as a unit
//!
//! Moves for the same game are serialized by a per-game lock held across
//! load, validation, commit and broadcast. The store's commit is itself a
//! compare-and-set on the position the move was validated against.

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::message::{MoveResponse, SocketMessage};
use crate::core::room::RoomHandle;
use crate::error::{ArenaError, Result};
use crate::rules::{RulesError, RulesOracle};
use crate::storage::{GameState, GameStore, MoveCommit};

/// Advisory locks keyed by game ID
#[derive(Debug, Default)]
struct GameLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GameLocks {
    async fn acquire(&self, game_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(game_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release(&self, game_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // Only the map and this caller hold it: nobody is waiting
        if Arc::strong_count(&lock) == 2 {
            locks.remove(game_id);
        }
    }

    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

pub struct MovePipeline {
    games: Arc<dyn GameStore>,
    oracle: Arc<dyn RulesOracle>,
    room: RoomHandle,
    locks: GameLocks,
}

impl MovePipeline {
    pub fn new(games: Arc<dyn GameStore>, oracle: Arc<dyn RulesOracle>, room: RoomHandle) -> Self {
        Self {
            games,
            oracle,
            room,
            locks: GameLocks::default(),
        }
    }

    /// Validate and apply `token` on behalf of `caller`.
    ///
    /// On any error nothing is written and nothing is broadcast.
    pub async fn submit_move(&self, game_id: &str, caller: &str, token: &str) -> Result<MoveResponse> {
        let lock = self.locks.acquire(game_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(game_id, caller, token).await
        };
        self.locks.release(game_id, lock).await;
        result
    }

    async fn apply_locked(&self, game_id: &str, caller: &str, token: &str) -> Result<MoveResponse> {
        let game = self
            .games
            .get_game(game_id)
            .await?
            .ok_or_else(|| ArenaError::NotFound("Game not found".to_string()))?;

        if game.state != GameState::InProgress {
            return Err(ArenaError::InvalidState("Game is not in progress".to_string()));
        }

        let position = self.oracle.parse(&game.position).map_err(|e| {
            error!("Stored position of game {} is corrupt: {}", game_id, e);
            ArenaError::InternalInconsistency(format!("Game {}: {}", game_id, e))
        })?;

        // Turn is checked before legality
        if game.player(position.turn) != Some(caller) {
            return Err(ArenaError::Forbidden("Not your turn".to_string()));
        }

        if !position.is_legal(token) {
            return Err(ArenaError::IllegalMove("Illegal move".to_string()));
        }

        let applied = self.oracle.apply(&position, token).map_err(|e| match e {
            RulesError::IllegalMove(_) => ArenaError::IllegalMove("Illegal move".to_string()),
            RulesError::Parse(msg) => {
                error!("Rules oracle failed on game {}: {}", game_id, msg);
                ArenaError::InternalInconsistency(msg)
            }
        })?;

        let receipt = self
            .games
            .commit_move(MoveCommit {
                game_id: game_id.to_string(),
                expected_position: game.position.clone(),
                new_position: applied.notation.clone(),
                outcome: applied.outcome,
            })
            .await?;

        debug!("{} played {} in game {}", caller, token, game_id);
        if let Some(outcome) = applied.outcome {
            info!(
                "Game {} finished {} (ratings: {:?})",
                game_id,
                outcome.notation(),
                receipt.ratings
            );
        }

        let response = MoveResponse {
            game_id: game_id.to_string(),
            status: "ok".to_string(),
            message: None,
            new_fen: applied.notation,
            outcome: applied
                .outcome
                .map(|o| o.notation().to_string())
                .unwrap_or_default(),
            turn: applied.turn.as_str().to_string(),
        };

        // Broadcast under the game lock so updates leave in commit order
        let update = SocketMessage::GameStateUpdate {
            game_id: game_id.to_string(),
            payload: response.clone(),
        };
        if let Err(e) = self.room.publish_message(&update) {
            warn!("Move in game {} committed but not broadcast: {}", game_id, e);
        }

        Ok(response)
    }

    #[cfg(test)]
    async fn held_locks(&self) -> usize {
        self.locks.len().await
    }
}
