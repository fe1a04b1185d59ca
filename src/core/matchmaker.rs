//! Matchmaking queue and the periodic pairing pass
//!
//! Tickets wait in one queue guarded by a single lock. Every interval a pass
//! walks the queue in order and pairs each ticket with the first later ticket
//! whose rating lies within its range; the range widens the longer the ticket
//! has been waiting, so every ticket is eventually paired.

use log::{debug, error, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};

use crate::constants::{DEFAULT_MATCH_BASE_RANGE, DEFAULT_MATCH_INTERVAL_SECS, DEFAULT_MATCH_WIDEN_RATE};
use crate::error::{ArenaError, Result};
use crate::rules::RulesOracle;
use crate::storage::{GameSession, GameStore, PlayerStore};

/// Pairing tolerance and pass frequency
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// Rating gap accepted at zero wait
    pub base_range: i32,
    /// Additional rating gap accepted per second waited
    pub widen_rate: f64,
    /// Pause between passes
    pub interval: Duration,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            base_range: DEFAULT_MATCH_BASE_RANGE,
            widen_rate: DEFAULT_MATCH_WIDEN_RATE,
            interval: Duration::from_secs(DEFAULT_MATCH_INTERVAL_SECS),
        }
    }
}

impl MatchPolicy {
    /// Largest rating gap a ticket accepts after waiting `waited`
    pub fn range_after(&self, waited: Duration) -> i32 {
        // Float to int casts saturate, so only the sum can overflow
        let widened = (waited.as_secs_f64() * self.widen_rate) as i32;
        self.base_range.saturating_add(widened)
    }
}

/// A player waiting to be matched
#[derive(Debug, Clone, PartialEq)]
pub struct MatchTicket {
    pub user: String,
    pub rating: i32,
    pub enqueued_at: Instant,
}

impl MatchTicket {
    pub fn new(user: String, rating: i32) -> Self {
        Self {
            user,
            rating,
            enqueued_at: Instant::now(),
        }
    }
}

/// Answer to a matchmaking request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchStatus {
    /// Ticket queued; waiting for a pass to pair it
    Searching,
    /// The user already holds a ticket
    AlreadyQueued,
    /// The user is already playing this game
    Found {
        #[serde(rename = "gameID")]
        game_id: String,
    },
    /// No ticket and no running game
    Idle,
}

/// The waiting queue. Only atomic operations are exposed.
#[derive(Debug, Default)]
pub struct MatchQueue {
    tickets: Mutex<Vec<MatchTicket>>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a ticket unless the user already has one
    pub async fn enqueue(&self, ticket: MatchTicket) -> bool {
        let mut tickets = self.tickets.lock().await;
        if tickets.iter().any(|t| t.user == ticket.user) {
            return false;
        }
        tickets.push(ticket);
        true
    }

    /// Remove the user's ticket, if any
    pub async fn cancel(&self, user: &str) -> bool {
        let mut tickets = self.tickets.lock().await;
        let before = tickets.len();
        tickets.retain(|t| t.user != user);
        tickets.len() != before
    }

    pub async fn contains(&self, user: &str) -> bool {
        self.tickets.lock().await.iter().any(|t| t.user == user)
    }

    pub async fn len(&self) -> usize {
        self.tickets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Users in queue order
    pub async fn waiting_users(&self) -> Vec<String> {
        self.tickets.lock().await.iter().map(|t| t.user.clone()).collect()
    }
}

/// Pairs queued players into new games
pub struct Matchmaker {
    queue: MatchQueue,
    games: Arc<dyn GameStore>,
    players: Arc<dyn PlayerStore>,
    oracle: Arc<dyn RulesOracle>,
    policy: MatchPolicy,
}

impl Matchmaker {
    pub fn new(
        games: Arc<dyn GameStore>,
        players: Arc<dyn PlayerStore>,
        oracle: Arc<dyn RulesOracle>,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            queue: MatchQueue::new(),
            games,
            players,
            oracle,
            policy,
        }
    }

    pub fn queue(&self) -> &MatchQueue {
        &self.queue
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Put `user` in the queue, or report why that is unnecessary
    pub async fn find_match(&self, user: &str) -> Result<MatchStatus> {
        let player = self
            .players
            .get_player(user)
            .await?
            .ok_or_else(|| ArenaError::NotFound("User not found".to_string()))?;

        if self.queue.contains(user).await {
            return Ok(MatchStatus::AlreadyQueued);
        }

        if let Some(game_id) = self.games.find_active_game(user).await? {
            return Ok(MatchStatus::Found { game_id });
        }

        if self
            .queue
            .enqueue(MatchTicket::new(user.to_string(), player.rating))
            .await
        {
            debug!("{} queued for matchmaking at rating {}", user, player.rating);
            Ok(MatchStatus::Searching)
        } else {
            Ok(MatchStatus::AlreadyQueued)
        }
    }

    /// Where `user` stands: matched into a game, still searching, or neither
    pub async fn status(&self, user: &str) -> Result<MatchStatus> {
        if let Some(game_id) = self.games.find_active_game(user).await? {
            return Ok(MatchStatus::Found { game_id });
        }
        if self.queue.contains(user).await {
            Ok(MatchStatus::Searching)
        } else {
            Ok(MatchStatus::Idle)
        }
    }

    pub async fn cancel(&self, user: &str) -> bool {
        let removed = self.queue.cancel(user).await;
        if removed {
            debug!("{} left the matchmaking queue", user);
        }
        removed
    }

    /// Run one pairing pass now
    pub async fn run_pass(&self) -> Vec<GameSession> {
        self.run_pass_at(Instant::now()).await
    }

    /// Run one pairing pass, measuring wait times against `now`.
    ///
    /// Holds the queue lock for the whole pass. A pair whose game cannot be
    /// stored stays queued for the next pass.
    pub async fn run_pass_at(&self, now: Instant) -> Vec<GameSession> {
        let mut tickets = self.queue.tickets.lock().await;
        let mut created = Vec::new();
        if tickets.len() < 2 {
            return created;
        }

        let mut matched = vec![false; tickets.len()];
        for i in 0..tickets.len() {
            if matched[i] {
                continue;
            }
            let range = self
                .policy
                .range_after(now.saturating_duration_since(tickets[i].enqueued_at));

            for j in (i + 1)..tickets.len() {
                if matched[j] {
                    continue;
                }
                if (tickets[i].rating - tickets[j].rating).abs() > range {
                    continue;
                }

                let session = GameSession::matched(
                    tickets[i].user.clone(),
                    tickets[j].user.clone(),
                    self.oracle.starting_position(),
                );
                match self.games.create_game(session.clone()).await {
                    Ok(()) => {
                        info!(
                            "Match: {} vs {} in game {}",
                            session.white,
                            session.black.as_deref().unwrap_or_default(),
                            session.id
                        );
                        matched[i] = true;
                        matched[j] = true;
                        created.push(session);
                        break;
                    }
                    Err(e) => {
                        error!(
                            "Matchmaker failed to store game for {} vs {}: {}",
                            tickets[i].user, tickets[j].user, e
                        );
                    }
                }
            }
        }

        let mut index = 0;
        tickets.retain(|_| {
            let keep = !matched[index];
            index += 1;
            keep
        });

        created
    }

    /// Start the periodic pairing task
    pub fn start_matchmaking_task(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.policy.interval;
        tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let created = self.run_pass().await;
                if !created.is_empty() {
                    info!("Matchmaking pass created {} games", created.len());
                }
            }
        })
    }
}
