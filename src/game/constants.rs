/// Round and game progression constants
pub mod rounds {
    use std::time::Duration;

    /// Locations (and therefore rounds) per game
    pub const TOTAL_ROUNDS: usize = 5;
    /// Extra time past the configured limit before a round is forced closed
    /// Absorbs network latency on the last guesses
    pub const TIMER_GRACE: Duration = Duration::from_secs(1);
    /// Delay between the last round result and the final standings
    pub const GAME_END_DELAY: Duration = Duration::from_millis(500);
    /// Upper bound for a configured round time limit in seconds
    pub const MAX_TIME_LIMIT_SECS: u32 = 3600;
}

/// Room membership and lifetime constants
pub mod room {
    use std::time::Duration;

    /// Maximum players per room, connected or not
    pub const CAPACITY: usize = 100;
    /// How long a room with nobody connected survives before deletion
    pub const DISCONNECT_GRACE: Duration = Duration::from_secs(60);
    /// Room code length
    pub const CODE_LENGTH: usize = 6;
    /// Room code alphabet (no 0/O or 1/I, codes are read aloud and typed)
    pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    /// Attempts at generating an unused code before giving up
    pub const CODE_ATTEMPTS: usize = 32;
    /// Maximum display name length in characters
    pub const MAX_NAME_LENGTH: usize = 24;
    /// Name used when a player sends an empty one
    pub const DEFAULT_PLAYER_NAME: &str = "Guest";
}

/// Scoring constants
pub mod scoring {
    /// Mean Earth radius in kilometers
    pub const EARTH_RADIUS_KM: f64 = 6371.0;
    /// Score for a perfect guess
    pub const MAX_SCORE: u32 = 5000;
    /// Distance scale of the exponential decay in kilometers
    pub const DECAY_KM: f64 = 2000.0;
}

/// Network constants
pub mod net {
    use std::time::Duration;

    /// Maximum size of a frame read from a client
    pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;
    /// Maximum size of a frame written to a client
    /// A full room's round results or standings must fit
    pub const MAX_OUTBOUND_MESSAGE_SIZE: usize = 64 * 1024;
    /// Maximum HTTP request size accepted by the control server
    pub const MAX_HTTP_REQUEST_SIZE: usize = 16 * 1024;
    /// Time a control client gets to send a complete request
    pub const HTTP_READ_TIMEOUT: Duration = Duration::from_secs(10);
}
