use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::game::constants::{room, rounds};

/// Per-room game parameters
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Rounds (locations) per game
    pub total_rounds: usize,
    /// Maximum players in a room, connected or not
    pub capacity: usize,
    /// Added to the configured round limit before the timer fires
    pub timer_grace: Duration,
    /// Delay between the last round result and the final standings
    pub game_end_delay: Duration,
    /// How long a room with nobody connected is kept
    pub disconnect_grace: Duration,
    /// Upper bound for any requested round time limit (seconds)
    pub max_time_limit: u32,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            total_rounds: rounds::TOTAL_ROUNDS,
            capacity: room::CAPACITY,
            timer_grace: rounds::TIMER_GRACE,
            game_end_delay: rounds::GAME_END_DELAY,
            disconnect_grace: room::DISCONNECT_GRACE,
            max_time_limit: rounds::MAX_TIME_LIMIT_SECS,
        }
    }
}

impl RoomSettings {
    /// Clamp a requested round time limit to the allowed range
    pub fn clamp_time_limit(&self, requested: u32) -> u32 {
        requested.min(self.max_time_limit)
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind both listeners to
    pub bind_address: IpAddr,
    /// WebTransport port for game connections
    pub port: u16,
    /// HTTP port for the control API and metrics
    pub http_port: u16,
    /// Maximum number of concurrent rooms
    pub max_rooms: usize,
    /// JSON file with the location catalog
    pub locations_path: PathBuf,
    /// Path to TLS certificate file (if not using the dev certificate)
    pub tls_cert_path: Option<String>,
    /// Path to TLS key file (if not using the dev certificate)
    pub tls_key_path: Option<String>,
    /// Game parameters applied to every room
    pub room: RoomSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4433,
            http_port: 3001,
            max_rooms: 1000,
            locations_path: PathBuf::from("data/locations.json"),
            tls_cert_path: None,
            tls_key_path: None,
            room: RoomSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.bind_address = parsed;
            } else {
                tracing::warn!("Invalid BIND_ADDRESS '{}', using default", addr);
            }
        }

        if let Some(port) = parse_port("PORT") {
            config.port = port;
        }

        if let Some(port) = parse_port("HTTP_PORT") {
            config.http_port = port;
        }

        if let Ok(max_rooms) = std::env::var("MAX_ROOMS") {
            match max_rooms.parse::<usize>() {
                Ok(parsed) if parsed > 0 && parsed <= 100_000 => config.max_rooms = parsed,
                Ok(_) => tracing::warn!("MAX_ROOMS must be 1-100000, using default"),
                Err(_) => tracing::warn!("Invalid MAX_ROOMS '{}', using default", max_rooms),
            }
        }

        if let Ok(max_time_limit) = std::env::var("MAX_TIME_LIMIT") {
            match max_time_limit.parse::<u32>() {
                Ok(parsed) if parsed > 0 => config.room.max_time_limit = parsed,
                Ok(_) => tracing::warn!("MAX_TIME_LIMIT must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid MAX_TIME_LIMIT '{}', using default", max_time_limit),
            }
        }

        if let Ok(path) = std::env::var("LOCATIONS_PATH") {
            config.locations_path = PathBuf::from(path);
        }

        if let Ok(cert_path) = std::env::var("TLS_CERT_PATH") {
            config.tls_cert_path = Some(cert_path);
        }

        if let Ok(key_path) = std::env::var("TLS_KEY_PATH") {
            config.tls_key_path = Some(key_path);
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 || self.http_port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.port == self.http_port {
            return Err(ConfigError::PortClash(self.port));
        }
        if self.max_rooms == 0 {
            return Err(ConfigError::NoRooms);
        }
        if self.room.total_rounds == 0 {
            return Err(ConfigError::NoRounds);
        }
        if self.room.capacity == 0 {
            return Err(ConfigError::NoCapacity);
        }
        if self.tls_cert_path.is_some() != self.tls_key_path.is_some() {
            return Err(ConfigError::PartialTls);
        }
        Ok(())
    }
}

fn parse_port(var: &str) -> Option<u16> {
    let value = std::env::var(var).ok()?;
    match value.parse::<u16>() {
        Ok(parsed) if parsed > 0 => Some(parsed),
        Ok(_) => {
            tracing::warn!("{} must be > 0, using default", var);
            None
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", var, value);
            None
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Ports cannot be 0")]
    ZeroPort,
    #[error("WebTransport and HTTP ports must differ (both {0})")]
    PortClash(u16),
    #[error("max_rooms must be at least 1")]
    NoRooms,
    #[error("total_rounds must be at least 1")]
    NoRounds,
    #[error("room capacity must be at least 1")]
    NoCapacity,
    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    PartialTls,
}
