use tokio::sync::mpsc;

use crate::game::constants::room::{DEFAULT_PLAYER_NAME, MAX_NAME_LENGTH};
use crate::game::PlayerId;
use crate::net::protocol::{PlayerSummary, ServerMessage};

/// Outbound message channel of one connection
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

/// Room member
///
/// A player whose connection is gone stays in the room so their guesses
/// still count in round results and final standings.
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub total_score: u32,
    connection: Option<PlayerSender>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, connection: PlayerSender) -> Self {
        Self {
            id,
            name,
            total_score: 0,
            connection: Some(connection),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Drop the connection handle, keeping membership
    pub fn disconnect(&mut self) {
        self.connection = None;
    }

    /// Queue a message for this player; false if nothing can receive it
    pub fn send(&self, message: &ServerMessage) -> bool {
        match &self.connection {
            Some(tx) => tx.send(message.clone()).is_ok(),
            None => false,
        }
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            name: self.name.clone(),
            connected: self.is_connected(),
        }
    }
}

/// Clean up a client-supplied display name
///
/// Trims, strips control characters, collapses whitespace and caps the
/// length. An empty result falls back to the default name.
pub fn sanitize_name(raw: Option<&str>) -> String {
    let cleaned: String = raw
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();

    let collapsed = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let name: String = collapsed.chars().take(MAX_NAME_LENGTH).collect();
    let name = name.trim_end().to_string();

    if name.is_empty() {
        DEFAULT_PLAYER_NAME.to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_player_new() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let player = Player::new(id, "Test".to_string(), tx);

        assert_eq!(player.id, id);
        assert!(player.is_connected());
        assert_eq!(player.total_score, 0);
    }

    #[test]
    fn test_player_disconnect() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut player = Player::new(Uuid::new_v4(), "Test".to_string(), tx);

        player.disconnect();
        assert!(!player.is_connected());
        assert!(!player.summary().connected);
        assert!(!player.send(&ServerMessage::TimeUp));
    }

    #[test]
    fn test_player_send() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let player = Player::new(Uuid::new_v4(), "Test".to_string(), tx);

        assert!(player.send(&ServerMessage::TimeUp));
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::TimeUp);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name(Some("  Kei  ")), "Kei");
        assert_eq!(sanitize_name(Some("a\u{0}b\tc")), "ab c");
        assert_eq!(sanitize_name(Some("two   words")), "two words");
        assert_eq!(sanitize_name(Some("")), "Guest");
        assert_eq!(sanitize_name(Some("\n\r")), "Guest");
        assert_eq!(sanitize_name(None), "Guest");
        assert_eq!(sanitize_name(Some("東京太郎")), "東京太郎");
    }

    #[test]
    fn test_sanitize_name_length() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_name(Some(&long)).chars().count(), 24);
    }
}
