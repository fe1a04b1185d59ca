use async_trait::async_trait;
use chess_arena::core::{MatchPolicy, MatchStatus, Matchmaker};
use chess_arena::error::{ArenaError, Result};
use chess_arena::rules::{ChessOracle, RulesOracle};
use chess_arena::storage::{
    CommitReceipt, GameSession, GameState, GameStore, MemoryStore, MoveCommit, PlayerRecord,
    PlayerStore,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Game store whose writes can be switched off
struct FlakyGames {
    inner: MemoryStore,
    failing: AtomicBool,
}

#[async_trait]
impl GameStore for FlakyGames {
    async fn create_game(&self, session: GameSession) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ArenaError::Storage("database unavailable".to_string()));
        }
        self.inner.create_game(session).await
    }

    async fn get_game(&self, game_id: &str) -> Result<Option<GameSession>> {
        self.inner.get_game(game_id).await
    }

    async fn join_game(&self, game_id: &str, user: &str) -> Result<GameSession> {
        self.inner.join_game(game_id, user).await
    }

    async fn find_active_game(&self, user: &str) -> Result<Option<String>> {
        self.inner.find_active_game(user).await
    }

    async fn commit_move(&self, commit: MoveCommit) -> Result<CommitReceipt> {
        self.inner.commit_move(commit).await
    }
}

async fn store_with(players: &[(&str, i32)]) -> MemoryStore {
    let store = MemoryStore::new();
    for (name, rating) in players {
        store
            .create_player(PlayerRecord {
                username: name.to_string(),
                password_hash: String::new(),
                rating: *rating,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }
    store
}

fn policy() -> MatchPolicy {
    MatchPolicy {
        base_range: 50,
        widen_rate: 5.0,
        interval: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn test_storage_failure_keeps_both_tickets_queued() {
    let store = store_with(&[("alice", 500), ("bobby", 500)]).await;
    let games = Arc::new(FlakyGames {
        inner: store.clone(),
        failing: AtomicBool::new(true),
    });
    let mm = Matchmaker::new(
        games.clone(),
        Arc::new(store.clone()),
        Arc::new(ChessOracle::new()),
        policy(),
    );

    mm.find_match("alice").await.unwrap();
    mm.find_match("bobby").await.unwrap();

    assert!(mm.run_pass().await.is_empty());
    assert_eq!(mm.queue().waiting_users().await, vec!["alice", "bobby"]);
    assert_eq!(store.game_count().await, 0);

    games.failing.store(false, Ordering::SeqCst);
    let created = mm.run_pass().await;
    assert_eq!(created.len(), 1);
    assert!(mm.queue().is_empty().await);
    assert_eq!(store.game_count().await, 1);
}

#[tokio::test]
async fn test_outlier_is_paired_once_range_covers_gap() {
    let store = store_with(&[("alice", 500), ("bobby", 800)]).await;
    let mm = Matchmaker::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(ChessOracle::new()),
        policy(),
    );
    mm.find_match("alice").await.unwrap();
    mm.find_match("bobby").await.unwrap();

    let start = Instant::now();
    // 50 + 5 * 49 = 295 < 300
    assert!(mm.run_pass_at(start + Duration::from_secs(49)).await.is_empty());
    // 50 + 5 * 51 = 305 >= 300
    let created = mm.run_pass_at(start + Duration::from_secs(51)).await;
    assert_eq!(created.len(), 1);
}

#[tokio::test]
async fn test_unmatched_tickets_keep_their_order() {
    let store = store_with(&[
        ("alice", 500),
        ("bobby", 1500),
        ("carol", 520),
        ("dave", 2500),
        ("erin", 1510),
    ])
    .await;
    let mm = Matchmaker::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(ChessOracle::new()),
        policy(),
    );
    for user in ["alice", "bobby", "carol", "dave", "erin"] {
        assert_eq!(mm.find_match(user).await.unwrap(), MatchStatus::Searching);
    }

    let created = mm.run_pass().await;
    let pairs: Vec<(String, String)> = created
        .iter()
        .map(|g| (g.white.clone(), g.black.clone().unwrap()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("alice".to_string(), "carol".to_string()),
            ("bobby".to_string(), "erin".to_string()),
        ]
    );
    assert_eq!(mm.queue().waiting_users().await, vec!["dave"]);
}

#[tokio::test]
async fn test_periodic_task_creates_game_in_progress() {
    let store = store_with(&[("alice", 500), ("bobby", 500)]).await;
    let oracle = ChessOracle::new();
    let mm = Arc::new(Matchmaker::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(ChessOracle::new()),
        policy(),
    ));
    mm.find_match("alice").await.unwrap();
    mm.find_match("bobby").await.unwrap();

    let task = mm.clone().start_matchmaking_task();

    let mut game_id = None;
    for _ in 0..40 {
        if let MatchStatus::Found { game_id: id } = mm.status("alice").await.unwrap() {
            game_id = Some(id);
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    task.abort();

    let game = store
        .get_game(&game_id.expect("no game created"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(game.white, "alice");
    assert_eq!(game.black.as_deref(), Some("bobby"));
    assert_eq!(game.state, GameState::InProgress);
    assert_eq!(game.position, oracle.starting_position());
}
