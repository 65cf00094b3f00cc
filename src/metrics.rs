//! Prometheus-compatible metrics
//!
//! Counters are plain atomics updated from room actors and connection tasks.
//! They are exposed by the control HTTP server on `/metrics` and
//! `/metrics/json`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics registry for the game server
#[derive(Debug)]
pub struct Metrics {
    // Rooms
    pub rooms_active: AtomicU64,
    pub rooms_created: AtomicU64,
    pub rooms_deleted: AtomicU64,

    // Players and connections
    pub connections_active: AtomicU64,
    pub players_joined: AtomicU64,

    // Gameplay
    pub games_started: AtomicU64,
    pub games_completed: AtomicU64,
    pub rounds_started: AtomicU64,
    pub rounds_finalized: AtomicU64,
    pub rounds_timed_out: AtomicU64,
    pub guesses_submitted: AtomicU64,

    // Network
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            rooms_active: AtomicU64::new(0),
            rooms_created: AtomicU64::new(0),
            rooms_deleted: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            players_joined: AtomicU64::new(0),
            games_started: AtomicU64::new(0),
            games_completed: AtomicU64::new(0),
            rounds_started: AtomicU64::new(0),
            rounds_finalized: AtomicU64::new(0),
            rounds_timed_out: AtomicU64::new(0),
            guesses_submitted: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Bump a counter by one
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop a gauge by one, saturating at zero
    pub fn decr(gauge: &AtomicU64) {
        let _ = gauge.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn record_sent(&self, bytes: usize) {
        Self::incr(&self.messages_sent);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        Self::incr(&self.messages_received);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("geo_rooms_active", "Live rooms", "gauge",
            self.rooms_active.load(Ordering::Relaxed));
        metric!("geo_rooms_created_total", "Rooms created", "counter",
            self.rooms_created.load(Ordering::Relaxed));
        metric!("geo_rooms_deleted_total", "Rooms removed from the registry", "counter",
            self.rooms_deleted.load(Ordering::Relaxed));

        metric!("geo_connections_active", "Active WebTransport connections", "gauge",
            self.connections_active.load(Ordering::Relaxed));
        metric!("geo_players_joined_total", "Successful joins", "counter",
            self.players_joined.load(Ordering::Relaxed));

        metric!("geo_games_started_total", "Games started", "counter",
            self.games_started.load(Ordering::Relaxed));
        metric!("geo_games_completed_total", "Games that reached final standings", "counter",
            self.games_completed.load(Ordering::Relaxed));
        metric!("geo_rounds_started_total", "Rounds started", "counter",
            self.rounds_started.load(Ordering::Relaxed));
        metric!("geo_rounds_finalized_total", "Rounds finalized", "counter",
            self.rounds_finalized.load(Ordering::Relaxed));
        metric!("geo_rounds_timed_out_total", "Rounds closed by the round timer", "counter",
            self.rounds_timed_out.load(Ordering::Relaxed));
        metric!("geo_guesses_submitted_total", "Accepted guesses", "counter",
            self.guesses_submitted.load(Ordering::Relaxed));

        metric!("geo_messages_sent_total", "Total messages sent", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("geo_messages_received_total", "Total messages received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("geo_bytes_sent_total", "Total bytes sent", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("geo_bytes_received_total", "Total bytes received", "counter",
            self.bytes_received.load(Ordering::Relaxed));
        metric!("geo_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        serde_json::json!({
            "rooms": {
                "active": load(&self.rooms_active),
                "created": load(&self.rooms_created),
                "deleted": load(&self.rooms_deleted),
            },
            "players": {
                "connections": load(&self.connections_active),
                "joined": load(&self.players_joined),
            },
            "gameplay": {
                "games_started": load(&self.games_started),
                "games_completed": load(&self.games_completed),
                "rounds_started": load(&self.rounds_started),
                "rounds_finalized": load(&self.rounds_finalized),
                "rounds_timed_out": load(&self.rounds_timed_out),
                "guesses_submitted": load(&self.guesses_submitted),
            },
            "network": {
                "messages_sent": load(&self.messages_sent),
                "messages_received": load(&self.messages_received),
                "bytes_sent": load(&self.bytes_sent),
                "bytes_received": load(&self.bytes_received),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
