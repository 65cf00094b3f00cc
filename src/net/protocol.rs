//! Wire protocol
//!
//! Every message is a JSON object tagged by `type`. Field names are
//! camelCase, tags are snake_case.

use serde::{Deserialize, Serialize};

use crate::game::location::{PublicLocation, RevealedLocation};
use crate::game::standings::{FinalScore, RoundResultEntry};
use crate::game::PlayerId;

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Join a room in its lobby
    Join {
        room_id: String,
        #[serde(default)]
        player_name: Option<String>,
    },
    /// Host starts the game, optionally overriding the round time limit
    StartGame {
        #[serde(default)]
        time_limit: Option<u32>,
    },
    /// Guess for the current round
    SubmitGuess { lat: f64, lng: f64 },
    /// Host advances to the next round
    NextRound,
    /// Latency probe
    Ping { timestamp: u64 },
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Private acknowledgement of a join
    Joined { player_id: PlayerId, room_id: String },
    /// Membership, host or start state changed
    RoomState(RoomSnapshot),
    /// First round of a game begins
    GameStart(RoundStart),
    /// A later round begins
    NextRound(RoundStart),
    /// Someone guessed
    PlayerGuessed {
        player_id: PlayerId,
        guessed_count: usize,
        total_players: usize,
    },
    /// Round timer expired, results follow
    TimeUp,
    /// Round finalized
    RoundResult {
        round: usize,
        location: RevealedLocation,
        results: Vec<RoundResultEntry>,
    },
    /// Last round finalized
    GameEnd { final_scores: Vec<FinalScore> },
    /// A request was rejected
    Error { message: String },
    /// Answer to a ping
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Public view of a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub host_id: Option<PlayerId>,
    pub players: Vec<PlayerSummary>,
    pub game_started: bool,
    pub time_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
}

/// Round announcement, without the answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStart {
    pub round: usize,
    pub total_rounds: usize,
    pub time_limit: u32,
    pub location: PublicLocation,
}

/// Encode a message as JSON
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    serde_json::to_vec(message).map_err(|e| EncodeError(e.to_string()))
}

/// Decode a JSON message
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(data).map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
