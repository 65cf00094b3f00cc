//! Geo Rooms Server Library
//!
//! Multiplayer room and round orchestration for a location-guessing game.
//! Players join rooms over WebTransport, guess where a photo was taken, and
//! are scored by great-circle distance over a fixed number of rounds.

pub mod config;
pub mod game;
pub mod lobby;
pub mod metrics;
pub mod net;
