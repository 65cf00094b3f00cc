//! Per-room round countdown
//!
//! The timer is plain state owned by the room. The room's actor sleeps until
//! [`RoundTimer::deadline`] and then asks for the expired round, so re-arming
//! simply replaces the deadline and a stale timer can never fire.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Armed {
    round: usize,
    deadline: Instant,
}

#[derive(Debug, Default)]
pub struct RoundTimer {
    armed: Option<Armed>,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the countdown for `round`, replacing any running one
    ///
    /// A limit of 0 means the round is untimed: nothing is armed.
    pub fn arm(&mut self, round: usize, limit_secs: u32, grace: Duration, now: Instant) -> Option<Instant> {
        if limit_secs == 0 {
            self.armed = None;
            return None;
        }

        let deadline = now + Duration::from_secs(u64::from(limit_secs)) + grace;
        self.armed = Some(Armed { round, deadline });
        Some(deadline)
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|a| a.deadline)
    }

    /// Round the timer is counting down for
    pub fn round(&self) -> Option<usize> {
        self.armed.map(|a| a.round)
    }

    /// Disarm and return the round if its deadline has passed
    pub fn take_expired(&mut self, now: Instant) -> Option<usize> {
        match self.armed {
            Some(armed) if armed.deadline <= now => {
                self.armed = None;
                Some(armed.round)
            }
            _ => None,
        }
    }
}
