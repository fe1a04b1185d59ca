//! In-memory storage implementation for development and testing
//!
//! All records live behind a single lock so that a move commit, its state
//! transition and the rating update of a finished game are one write section.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::*;
use crate::core::rating::calculate_new_ratings;
use crate::error::{ArenaError, Result};

#[derive(Default)]
struct MemoryState {
    games: HashMap<String, GameSession>,
    players: HashMap<String, PlayerRecord>,
    // Games whose result has already been applied to ratings
    rated_games: HashSet<String>,
}

/// In-memory game and player storage
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored games
    pub async fn game_count(&self) -> usize {
        self.state.read().await.games.len()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn create_game(&self, session: GameSession) -> Result<()> {
        let mut state = self.state.write().await;
        if state.games.contains_key(&session.id) {
            return Err(ArenaError::Conflict(format!("Game {} already exists", session.id)));
        }
        state.games.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> Result<Option<GameSession>> {
        Ok(self.state.read().await.games.get(game_id).cloned())
    }

    async fn join_game(&self, game_id: &str, user: &str) -> Result<GameSession> {
        let mut state = self.state.write().await;
        let game = state
            .games
            .get_mut(game_id)
            .ok_or_else(|| ArenaError::NotFound("Game not found".to_string()))?;

        if game.state != GameState::Waiting {
            return Err(ArenaError::Conflict("Game is not available to join".to_string()));
        }
        if game.white == user {
            return Err(ArenaError::Forbidden("You cannot join your own game".to_string()));
        }

        game.black = Some(user.to_string());
        game.state = GameState::InProgress;
        game.updated_at = Utc::now();
        Ok(game.clone())
    }

    async fn find_active_game(&self, user: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .games
            .values()
            .filter(|g| g.state == GameState::InProgress && g.color_of(user).is_some())
            .max_by_key(|g| g.created_at)
            .map(|g| g.id.clone()))
    }

    async fn commit_move(&self, commit: MoveCommit) -> Result<CommitReceipt> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        // Validate everything before the first mutation
        let game = state
            .games
            .get(&commit.game_id)
            .ok_or_else(|| ArenaError::NotFound("Game not found".to_string()))?;
        if game.state != GameState::InProgress {
            return Err(ArenaError::InvalidState("Game is not in progress".to_string()));
        }
        if game.position != commit.expected_position {
            return Err(ArenaError::Conflict(
                "Game position changed while the move was being validated".to_string(),
            ));
        }

        let mut ratings = None;
        if let Some(outcome) = commit.outcome {
            let black = game.black.clone().ok_or_else(|| {
                ArenaError::InternalInconsistency(format!(
                    "In-progress game {} has no black player",
                    commit.game_id
                ))
            })?;
            let white = game.white.clone();

            if !state.rated_games.contains(&commit.game_id) {
                let white_rating = state
                    .players
                    .get(&white)
                    .map(|p| p.rating)
                    .ok_or_else(|| ArenaError::NotFound(format!("Player {} not found", white)))?;
                let black_rating = state
                    .players
                    .get(&black)
                    .map(|p| p.rating)
                    .ok_or_else(|| ArenaError::NotFound(format!("Player {} not found", black)))?;

                let (new_white, new_black) =
                    calculate_new_ratings(white_rating, black_rating, outcome);
                if let Some(p) = state.players.get_mut(&white) {
                    p.rating = new_white;
                }
                if let Some(p) = state.players.get_mut(&black) {
                    p.rating = new_black;
                }
                state.rated_games.insert(commit.game_id.clone());
                ratings = Some((new_white, new_black));
            }
        }

        let game = state
            .games
            .get_mut(&commit.game_id)
            .ok_or_else(|| ArenaError::NotFound("Game not found".to_string()))?;
        game.position = commit.new_position;
        if let Some(outcome) = commit.outcome {
            game.state = GameState::Finished;
            game.winner = Some(outcome.into());
        }
        game.updated_at = Utc::now();

        Ok(CommitReceipt {
            session: game.clone(),
            ratings,
        })
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn create_player(&self, player: PlayerRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.players.contains_key(&player.username) {
            return Err(ArenaError::Conflict("User already exists".to_string()));
        }
        state.players.insert(player.username.clone(), player);
        Ok(())
    }

    async fn get_player(&self, username: &str) -> Result<Option<PlayerRecord>> {
        Ok(self.state.read().await.players.get(username).cloned())
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<LeaderboardEntry> = state
            .players
            .values()
            .map(|p| LeaderboardEntry {
                username: p.username.clone(),
                rating: p.rating,
            })
            .collect();

        entries.sort_by(|a, b| b.rating.cmp(&a.rating).then_with(|| a.username.cmp(&b.username)));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Outcome;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn player(name: &str, rating: i32) -> PlayerRecord {
        PlayerRecord {
            username: name.to_string(),
            password_hash: String::new(),
            rating,
            created_at: Utc::now(),
        }
    }

    async fn store_with_game() -> (MemoryStore, String) {
        let store = MemoryStore::new();
        store.create_player(player("alice", 1000)).await.unwrap();
        store.create_player(player("bobby", 1000)).await.unwrap();
        let game = GameSession::matched("alice".into(), "bobby".into(), START.into());
        let id = game.id.clone();
        store.create_game(game).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn test_duplicate_player_is_conflict() {
        let store = MemoryStore::new();
        store.create_player(player("alice", 500)).await.unwrap();
        let err = store.create_player(player("alice", 700)).await.unwrap_err();
        assert!(matches!(err, ArenaError::Conflict(_)));
        assert_eq!(store.get_player("alice").await.unwrap().unwrap().rating, 500);
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_position() {
        let (store, id) = store_with_game().await;
        let err = store
            .commit_move(MoveCommit {
                game_id: id.clone(),
                expected_position: "something else".into(),
                new_position: "next".into(),
                outcome: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ArenaError::Conflict(_)));
        assert_eq!(store.get_game(&id).await.unwrap().unwrap().position, START);
    }

    #[tokio::test]
    async fn test_finishing_commit_updates_ratings_once() {
        let (store, id) = store_with_game().await;
        let receipt = store
            .commit_move(MoveCommit {
                game_id: id.clone(),
                expected_position: START.into(),
                new_position: "final".into(),
                outcome: Some(Outcome::WhiteWin),
            })
            .await
            .unwrap();

        assert_eq!(receipt.ratings, Some((1016, 984)));
        assert_eq!(receipt.session.state, GameState::Finished);
        assert_eq!(receipt.session.winner, Some(Winner::White));

        // A replay against the finished game changes nothing
        let replay = store
            .commit_move(MoveCommit {
                game_id: id.clone(),
                expected_position: "final".into(),
                new_position: "final".into(),
                outcome: Some(Outcome::WhiteWin),
            })
            .await;
        assert!(matches!(replay, Err(ArenaError::InvalidState(_))));
        assert_eq!(store.get_player("alice").await.unwrap().unwrap().rating, 1016);
        assert_eq!(store.get_player("bobby").await.unwrap().unwrap().rating, 984);
    }

    #[tokio::test]
    async fn test_missing_player_leaves_game_untouched() {
        let store = MemoryStore::new();
        store.create_player(player("alice", 1000)).await.unwrap();
        let game = GameSession::matched("alice".into(), "ghost".into(), START.into());
        let id = game.id.clone();
        store.create_game(game).await.unwrap();

        let result = store
            .commit_move(MoveCommit {
                game_id: id.clone(),
                expected_position: START.into(),
                new_position: "final".into(),
                outcome: Some(Outcome::Draw),
            })
            .await;

        assert!(matches!(result, Err(ArenaError::NotFound(_))));
        let game = store.get_game(&id).await.unwrap().unwrap();
        assert_eq!(game.position, START);
        assert_eq!(game.state, GameState::InProgress);
        assert_eq!(store.get_player("alice").await.unwrap().unwrap().rating, 1000);
    }

    #[tokio::test]
    async fn test_join_rules() {
        let store = MemoryStore::new();
        let game = GameSession::open("alice".into(), START.into());
        let id = game.id.clone();
        store.create_game(game).await.unwrap();

        let own = store.join_game(&id, "alice").await.unwrap_err();
        assert!(matches!(own, ArenaError::Forbidden(_)));

        let joined = store.join_game(&id, "bobby").await.unwrap();
        assert_eq!(joined.black.as_deref(), Some("bobby"));
        assert_eq!(joined.state, GameState::InProgress);

        let again = store.join_game(&id, "carol").await.unwrap_err();
        assert!(matches!(again, ArenaError::Conflict(_)));

        let missing = store.join_game("nope", "carol").await.unwrap_err();
        assert!(matches!(missing, ArenaError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_leaderboard_order_and_limit() {
        let store = MemoryStore::new();
        for (name, rating) in [("carol", 900), ("alice", 1200), ("bobby", 1200), ("dave", 300)] {
            store.create_player(player(name, rating)).await.unwrap();
        }

        let board = store.leaderboard(3).await.unwrap();
        let names: Vec<&str> = board.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bobby", "carol"]);
    }
}
