//! Room aggregate and round state machine
//!
//! A `Room` is owned by exactly one actor task (see [`crate::lobby::task`]),
//! which feeds it one event at a time. Methods never block; outbound messages
//! are queued on each player's connection channel as they are produced.
//!
//! ```text
//! Lobby ──start_game──▶ InRound ──all guessed / timer──▶ RoundResults
//!   ▲                     ▲                                 │
//!   │                     └──────────next_round─────────────┤
//!   │                                                       │ last round
//!   └─────────(rematch) start_game ◀── GameEnd ◀──delay─────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::RoomSettings;
use crate::game::location::{Location, LocationCatalog};
use crate::game::scoring::{is_valid_coordinate, Guess};
use crate::game::standings::{final_standings, rank_round, FinalScore, RoundResultEntry};
use crate::game::PlayerId;
use crate::lobby::player::{Player, PlayerSender};
use crate::lobby::room_code::RoomCode;
use crate::lobby::timer::RoundTimer;
use crate::metrics::Metrics;
use crate::net::protocol::{RoomSnapshot, RoundStart, ServerMessage};

/// Where a room is in its game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Accepting joins, waiting for the host to start
    Lobby,
    /// Collecting guesses for the current round
    InRound,
    /// Current round finalized, waiting for the host
    RoundResults,
    /// Final standings sent
    GameEnd,
}

/// Game room containing players and game state
pub struct Room {
    code: RoomCode,
    settings: RoomSettings,
    catalog: Arc<LocationCatalog>,
    metrics: Arc<Metrics>,
    host_id: Option<PlayerId>,
    /// Join order
    players: Vec<Player>,
    phase: RoomPhase,
    game_started: bool,
    locations: Vec<Location>,
    current_round: usize,
    /// Indexed by round
    guesses: Vec<HashMap<PlayerId, Guess>>,
    time_limit: u32,
    timer: RoundTimer,
    finalized_rounds: HashSet<usize>,
    game_end_at: Option<Instant>,
    abandoned_since: Option<Instant>,
}

impl Room {
    pub fn new(
        code: RoomCode,
        time_limit: u32,
        settings: RoomSettings,
        catalog: Arc<LocationCatalog>,
        metrics: Arc<Metrics>,
        now: Instant,
    ) -> Self {
        let time_limit = settings.clamp_time_limit(time_limit);
        Self {
            code,
            settings,
            catalog,
            metrics,
            host_id: None,
            players: Vec::new(),
            phase: RoomPhase::Lobby,
            game_started: false,
            locations: Vec::new(),
            current_round: 0,
            guesses: Vec::new(),
            time_limit,
            timer: RoundTimer::new(),
            finalized_rounds: HashSet::new(),
            game_end_at: None,
            // Nobody has joined yet
            abandoned_since: Some(now),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.host_id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn is_game_started(&self) -> bool {
        self.game_started
    }

    pub fn current_round(&self) -> usize {
        self.current_round
    }

    pub fn time_limit(&self) -> u32 {
        self.time_limit
    }

    pub fn total_rounds(&self) -> usize {
        self.locations.len()
    }

    pub fn current_location(&self) -> Option<&Location> {
        self.locations.get(self.current_round)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_connected()).count()
    }

    pub fn guess(&self, round: usize, player_id: PlayerId) -> Option<&Guess> {
        self.guesses.get(round)?.get(&player_id)
    }

    pub fn is_round_finalized(&self, round: usize) -> bool {
        self.finalized_rounds.contains(&round)
    }

    /// True when nobody holds a connection (vacuously true before any join)
    pub fn is_abandoned(&self) -> bool {
        self.players.iter().all(|p| !p.is_connected())
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.code.to_string(),
            host_id: self.host_id,
            players: self.players.iter().map(Player::summary).collect(),
            game_started: self.game_started,
            time_limit: self.time_limit,
        }
    }

    /// Earliest pending deadline (round timer or delayed game end)
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.timer.deadline(), self.game_end_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Add a player in the lobby
    ///
    /// The new player is told their id privately, then everyone gets the
    /// updated membership.
    pub fn join(&mut self, name: String, connection: PlayerSender) -> Result<PlayerId, RoomError> {
        if self.game_started {
            return Err(RoomError::GameInProgress);
        }
        if self.players.len() >= self.settings.capacity {
            return Err(RoomError::RoomFull);
        }

        let player_id = Uuid::new_v4();
        let player = Player::new(player_id, name, connection);
        player.send(&ServerMessage::Joined {
            player_id,
            room_id: self.code.to_string(),
        });

        info!("Player {} ({}) joined room {}", player.name, player_id, self.code);
        self.players.push(player);
        self.abandoned_since = None;

        let host_present = self
            .host_id
            .and_then(|id| self.player(id))
            .is_some_and(Player::is_connected);
        if !host_present {
            self.host_id = Some(player_id);
            debug!("Player {} is now host of room {}", player_id, self.code);
        }

        Metrics::incr(&self.metrics.players_joined);
        self.broadcast(&ServerMessage::RoomState(self.snapshot()));

        Ok(player_id)
    }

    /// Host starts a game (or a rematch after the previous one ended)
    pub fn start_game(
        &mut self,
        player_id: PlayerId,
        time_limit: Option<u32>,
        now: Instant,
    ) -> Result<(), RoomError> {
        self.require_host(player_id)?;

        if !matches!(self.phase, RoomPhase::Lobby | RoomPhase::GameEnd) {
            return Err(RoomError::GameInProgress);
        }
        if self.players.is_empty() {
            return Err(RoomError::NotEnoughPlayers);
        }

        if let Some(limit) = time_limit {
            self.time_limit = self.settings.clamp_time_limit(limit);
        }

        self.locations = self
            .catalog
            .sample(self.settings.total_rounds, &mut rand::thread_rng());
        self.game_started = true;
        self.current_round = 0;
        self.guesses = (0..self.locations.len()).map(|_| HashMap::new()).collect();
        self.finalized_rounds.clear();
        self.game_end_at = None;
        for player in &mut self.players {
            player.total_score = 0;
        }

        info!(
            "Room {} started a game: {} rounds, time limit {}s, {} players",
            self.code,
            self.locations.len(),
            self.time_limit,
            self.players.len()
        );
        Metrics::incr(&self.metrics.games_started);

        self.broadcast(&ServerMessage::RoomState(self.snapshot()));
        self.begin_round(now);
        Ok(())
    }

    /// Record a player's guess for the current round
    pub fn submit_guess(
        &mut self,
        player_id: PlayerId,
        lat: f64,
        lng: f64,
        now: Instant,
    ) -> Result<(), RoomError> {
        if self.player(player_id).is_none() {
            return Err(RoomError::PlayerNotFound);
        }
        if !self.game_started {
            return Err(RoomError::GameNotStarted);
        }
        if self.phase != RoomPhase::InRound {
            return Err(RoomError::RoundClosed);
        }
        if !is_valid_coordinate(lat, lng) {
            return Err(RoomError::InvalidCoordinates);
        }

        let round = self.current_round;
        let location = self.locations.get(round).ok_or(RoomError::RoundClosed)?;
        let guesses = self.guesses.get_mut(round).ok_or(RoomError::RoundClosed)?;
        if guesses.contains_key(&player_id) {
            return Err(RoomError::AlreadyGuessed);
        }

        let guess = Guess::evaluate(lat, lng, location);
        debug!(
            "Room {} round {}: player {} guessed {:.1} km away ({} points)",
            self.code,
            round,
            player_id,
            guess.distance_km.unwrap_or_default(),
            guess.score
        );
        guesses.insert(player_id, guess);
        let guessed_count = guesses.len();

        Metrics::incr(&self.metrics.guesses_submitted);
        self.broadcast(&ServerMessage::PlayerGuessed {
            player_id,
            guessed_count,
            total_players: self.connected_count(),
        });

        if self.is_round_complete() {
            self.finalize_round(now);
        }
        Ok(())
    }

    /// Host advances from round results to the next round
    pub fn next_round(&mut self, player_id: PlayerId, now: Instant) -> Result<(), RoomError> {
        self.require_host(player_id)?;

        if self.phase != RoomPhase::RoundResults {
            return Err(RoomError::NotInResults);
        }
        if self.current_round + 1 >= self.locations.len() {
            return Err(RoomError::NoRoundsRemaining);
        }

        self.current_round += 1;
        self.begin_round(now);
        Ok(())
    }

    /// A player's connection went away
    ///
    /// Returns true when nobody in the room is connected any more.
    pub fn disconnect(&mut self, player_id: PlayerId, now: Instant) -> bool {
        let Some(player) = self.player_mut(player_id) else {
            return self.is_abandoned();
        };
        if !player.is_connected() {
            return self.is_abandoned();
        }

        player.disconnect();
        info!("Player {} disconnected from room {}", player_id, self.code);

        if self.host_id == Some(player_id) {
            self.migrate_host();
        }

        if self.is_abandoned() {
            // Nobody left to hear a timeout or the final standings
            self.timer.disarm();
            self.game_end_at = None;
            self.abandoned_since = Some(now);
            info!("Room {} has no connected players", self.code);
            return true;
        }

        self.broadcast(&ServerMessage::RoomState(self.snapshot()));

        if self.phase == RoomPhase::InRound && self.is_round_complete() {
            self.finalize_round(now);
        }
        false
    }

    /// Handle whichever deadlines have passed
    pub fn on_deadline(&mut self, now: Instant) {
        if let Some(round) = self.timer.take_expired(now) {
            self.handle_timeout(round, now);
        }

        if self.game_end_at.is_some_and(|at| at <= now) {
            self.game_end_at = None;
            self.finish_game();
        }
    }

    /// Stop all deadlines if the room has been empty for at least `idle`
    pub fn close_if_abandoned(&mut self, idle: Duration, now: Instant) -> bool {
        match self.abandoned_since {
            Some(since) if self.is_abandoned() && now.duration_since(since) >= idle => {
                self.close();
                true
            }
            _ => false,
        }
    }

    /// Cancel every pending deadline
    pub fn close(&mut self) {
        self.timer.disarm();
        self.game_end_at = None;
    }

    /// Tell a player their request was rejected, unless it is a silent no-op
    pub fn report(&self, player_id: PlayerId, error: &RoomError) {
        if error.is_silent() {
            debug!("Room {}: ignored request from {}: {}", self.code, player_id, error);
            return;
        }
        if let Some(player) = self.player(player_id) {
            player.send(&ServerMessage::error(error.to_string()));
        }
    }

    fn require_host(&self, player_id: PlayerId) -> Result<(), RoomError> {
        if self.player(player_id).is_none() {
            return Err(RoomError::PlayerNotFound);
        }
        if self.host_id != Some(player_id) {
            return Err(RoomError::NotHost);
        }
        Ok(())
    }

    fn migrate_host(&mut self) {
        if let Some(next) = self.players.iter().find(|p| p.is_connected()) {
            info!("Host of room {} moved to {} ({})", self.code, next.name, next.id);
            self.host_id = Some(next.id);
        }
    }

    fn broadcast(&self, message: &ServerMessage) {
        for player in &self.players {
            player.send(message);
        }
    }

    fn begin_round(&mut self, now: Instant) {
        let round = self.current_round;
        let Some(location) = self.locations.get(round) else {
            return;
        };

        let start = RoundStart {
            round,
            total_rounds: self.locations.len(),
            time_limit: self.time_limit,
            location: location.public_view(),
        };

        self.phase = RoomPhase::InRound;
        self.timer
            .arm(round, self.time_limit, self.settings.timer_grace, now);
        Metrics::incr(&self.metrics.rounds_started);
        debug!("Room {} round {} begins", self.code, round);

        let message = if round == 0 {
            ServerMessage::GameStart(start)
        } else {
            ServerMessage::NextRound(start)
        };
        self.broadcast(&message);
    }

    /// Every connected player has a guess for the current round
    fn is_round_complete(&self) -> bool {
        let Some(guesses) = self.guesses.get(self.current_round) else {
            return false;
        };

        let mut connected = self.players.iter().filter(|p| p.is_connected()).peekable();
        if connected.peek().is_none() {
            return false;
        }
        connected.all(|p| guesses.contains_key(&p.id))
    }

    fn handle_timeout(&mut self, round: usize, now: Instant) {
        if round != self.current_round
            || self.phase != RoomPhase::InRound
            || self.finalized_rounds.contains(&round)
        {
            debug!("Room {}: stale timer for round {} ignored", self.code, round);
            return;
        }

        if let Some(guesses) = self.guesses.get_mut(round) {
            for player in self.players.iter().filter(|p| p.is_connected()) {
                guesses.entry(player.id).or_insert_with(Guess::timed_out);
            }
        }

        info!("Room {} round {} timed out", self.code, round);
        Metrics::incr(&self.metrics.rounds_timed_out);
        self.broadcast(&ServerMessage::TimeUp);
        self.finalize_round(now);
    }

    /// Score, rank and broadcast the current round, at most once per round
    fn finalize_round(&mut self, now: Instant) {
        let round = self.current_round;
        if !self.finalized_rounds.insert(round) {
            debug!("Room {} round {} already finalized", self.code, round);
            return;
        }
        self.timer.disarm();

        let Some(location) = self.locations.get(round) else {
            return;
        };
        let revealed = location.reveal();

        let mut entries = Vec::new();
        if let Some(guesses) = self.guesses.get(round) {
            for player in &mut self.players {
                if let Some(guess) = guesses.get(&player.id) {
                    player.total_score += guess.score;
                    entries.push(RoundResultEntry::from_guess(player.id, player.name.clone(), guess));
                }
            }
        }
        let results = rank_round(entries);

        self.phase = RoomPhase::RoundResults;
        Metrics::incr(&self.metrics.rounds_finalized);
        info!(
            "Room {} round {} finalized with {} results",
            self.code,
            round,
            results.len()
        );

        self.broadcast(&ServerMessage::RoundResult {
            round,
            location: revealed,
            results,
        });

        if round + 1 >= self.locations.len() {
            self.game_end_at = Some(now + self.settings.game_end_delay);
        }
    }

    fn finish_game(&mut self) {
        let scores = self
            .players
            .iter()
            .map(|p| FinalScore {
                player_id: p.id,
                player_name: p.name.clone(),
                total_score: p.total_score,
            })
            .collect();
        let final_scores = final_standings(scores);

        self.phase = RoomPhase::GameEnd;
        Metrics::incr(&self.metrics.games_completed);
        info!("Room {} game ended", self.code);
        self.broadcast(&ServerMessage::GameEnd { final_scores });
    }
}

/// Room errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,
    #[error("Game already started")]
    GameInProgress,
    #[error("Only the host can do that")]
    NotHost,
    #[error("Not enough players")]
    NotEnoughPlayers,
    #[error("Player not found")]
    PlayerNotFound,
    #[error("Game has not started")]
    GameNotStarted,
    #[error("Invalid coordinates")]
    InvalidCoordinates,
    #[error("Already guessed this round")]
    AlreadyGuessed,
    #[error("Round is not accepting guesses")]
    RoundClosed,
    #[error("Round results are not showing")]
    NotInResults,
    #[error("No rounds remaining")]
    NoRoundsRemaining,
}

impl RoomError {
    /// Rejections that are dropped instead of reported to the sender
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            RoomError::AlreadyGuessed
                | RoomError::RoundClosed
                | RoomError::NotInResults
                | RoomError::NoRoundsRemaining
        )
    }
}
