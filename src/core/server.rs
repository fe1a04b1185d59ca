//! Integrated service that wires storage, rules, rooms, matchmaking and moves
//!
//! `GameServer` is built explicitly and shared by reference with every
//! handler; there is no process-wide state.

use chrono::Utc;
use log::info;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::auth::{hash_password, verify_password, Authenticator, TokenManager};
use crate::config::ServerConfig;
use crate::constants::{MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH};
use crate::core::matchmaker::{MatchPolicy, MatchStatus, Matchmaker};
use crate::core::message::MoveResponse;
use crate::core::pipeline::MovePipeline;
use crate::core::room::{spawn_broadcast_room, RoomHandle};
use crate::error::{ArenaError, Result};
use crate::rules::{ChessOracle, RulesOracle};
use crate::storage::{
    GameSession, GameStore, LeaderboardEntry, MemoryStore, PlayerRecord, PlayerStore,
};

/// Game as shown to one viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameView {
    #[serde(rename = "gameID")]
    pub game_id: String,
    pub fen: String,
    #[serde(rename = "playerWhite")]
    pub player_white: String,
    #[serde(rename = "playerBlack")]
    pub player_black: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<crate::storage::Winner>,
    #[serde(rename = "playerColor")]
    pub player_color: String,
}

impl GameView {
    fn of(game: &GameSession, viewer: &str) -> Self {
        Self {
            game_id: game.id.clone(),
            fen: game.position.clone(),
            player_white: game.white.clone(),
            player_black: game.black.clone().unwrap_or_default(),
            state: game.state.as_str().to_string(),
            winner: game.winner,
            player_color: game
                .color_of(viewer)
                .map(|c| c.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Reply to a successful join
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedGame {
    #[serde(rename = "gameID")]
    pub game_id: String,
    pub fen: String,
    pub color: String,
}

/// Settings `GameServer` needs beyond its collaborators
#[derive(Debug, Clone)]
pub struct GameServerSettings {
    pub message_buffer_size: usize,
    pub default_rating: i32,
    pub leaderboard_size: usize,
    pub match_policy: MatchPolicy,
}

impl From<&ServerConfig> for GameServerSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            message_buffer_size: config.message_buffer_size,
            default_rating: config.default_rating,
            leaderboard_size: config.leaderboard_size,
            match_policy: config.match_policy(),
        }
    }
}

pub struct GameServer {
    games: Arc<dyn GameStore>,
    players: Arc<dyn PlayerStore>,
    oracle: Arc<dyn RulesOracle>,
    tokens: Arc<TokenManager>,
    room: RoomHandle,
    matchmaker: Arc<Matchmaker>,
    pipeline: MovePipeline,
    settings: GameServerSettings,
}

impl GameServer {
    /// Assemble a server from its collaborators. Must run inside a Tokio
    /// runtime: the broadcast room worker is spawned here.
    pub fn new(
        games: Arc<dyn GameStore>,
        players: Arc<dyn PlayerStore>,
        oracle: Arc<dyn RulesOracle>,
        tokens: Arc<TokenManager>,
        settings: GameServerSettings,
    ) -> Self {
        let (room, _worker) = spawn_broadcast_room();
        let matchmaker = Arc::new(Matchmaker::new(
            games.clone(),
            players.clone(),
            oracle.clone(),
            settings.match_policy,
        ));
        let pipeline = MovePipeline::new(games.clone(), oracle.clone(), room.clone());

        Self {
            games,
            players,
            oracle,
            tokens,
            room,
            matchmaker,
            pipeline,
            settings,
        }
    }

    /// In-memory storage and the chess rules oracle
    pub fn in_memory(config: &ServerConfig) -> Self {
        let store = MemoryStore::new();
        Self::new(
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(ChessOracle::new()),
            Arc::new(TokenManager::with_ttl(&config.jwt_secret, config.token_ttl_hours)),
            GameServerSettings::from(config),
        )
    }

    /// Start the periodic matchmaking task
    pub fn start_matchmaking(&self) -> JoinHandle<()> {
        self.matchmaker.clone().start_matchmaking_task()
    }

    pub fn room(&self) -> &RoomHandle {
        &self.room
    }

    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    pub fn message_buffer_size(&self) -> usize {
        self.settings.message_buffer_size
    }

    /// Resolve an Authorization header to a username
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<String> {
        self.tokens.authenticate(authorization)
    }

    /// Like `authenticate`, but a missing header yields an anonymous caller
    pub fn identify(&self, authorization: Option<&str>) -> Result<Option<String>> {
        match authorization {
            None => Ok(None),
            Some(header) => self.tokens.authenticate(Some(header)).map(Some),
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        if username.chars().count() < MIN_USERNAME_LENGTH
            || password.chars().count() < MIN_PASSWORD_LENGTH
        {
            return Err(ArenaError::Validation(format!(
                "Username and password must be at least {} characters",
                MIN_USERNAME_LENGTH.min(MIN_PASSWORD_LENGTH)
            )));
        }

        let record = PlayerRecord {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            rating: self.settings.default_rating,
            created_at: Utc::now(),
        };
        self.players.create_player(record).await?;
        info!("Registered player {}", username);
        Ok(())
    }

    /// Check credentials and issue an identity token
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let player = self.players.get_player(username).await?;
        match player {
            Some(p) if verify_password(password, &p.password_hash) => self.tokens.issue(username),
            _ => Err(ArenaError::Unauthorized),
        }
    }

    /// Open a game with `caller` as white, waiting for an opponent
    pub async fn create_game(&self, caller: &str) -> Result<GameView> {
        let game = GameSession::open(caller.to_string(), self.oracle.starting_position());
        self.games.create_game(game.clone()).await?;
        info!("{} opened game {}", caller, game.id);
        Ok(GameView::of(&game, caller))
    }

    pub async fn join_game(&self, game_id: &str, caller: &str) -> Result<JoinedGame> {
        let game = self.games.join_game(game_id, caller).await?;
        info!("{} joined game {} as black", caller, game_id);
        Ok(JoinedGame {
            game_id: game.id,
            fen: game.position,
            color: "black".to_string(),
        })
    }

    pub async fn get_game(&self, game_id: &str, caller: &str) -> Result<GameView> {
        let game = self
            .games
            .get_game(game_id)
            .await?
            .ok_or_else(|| ArenaError::NotFound("Game not found".to_string()))?;
        Ok(GameView::of(&game, caller))
    }

    pub async fn submit_move(&self, game_id: &str, caller: &str, token: &str) -> Result<MoveResponse> {
        self.pipeline.submit_move(game_id, caller, token).await
    }

    pub async fn find_match(&self, caller: &str) -> Result<MatchStatus> {
        self.matchmaker.find_match(caller).await
    }

    pub async fn match_status(&self, caller: &str) -> Result<MatchStatus> {
        self.matchmaker.status(caller).await
    }

    pub async fn cancel_match(&self, caller: &str) -> bool {
        self.matchmaker.cancel(caller).await
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        self.players.leaderboard(self.settings.leaderboard_size).await
    }
}

// Shared reference to the game server
pub type SharedGameServer = Arc<GameServer>;
