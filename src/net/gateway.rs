//! Per-connection session
//!
//! Turns decoded client messages into room commands. The transport owns
//! the socket; this type only knows the registry, the connection's outbound
//! queue and which room (if any) the connection has joined.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::game::PlayerId;
use crate::lobby::player::{sanitize_name, PlayerSender};
use crate::lobby::{HandleError, RoomHandle, RoomRegistry};
use crate::net::protocol::{decode, ClientMessage, ServerMessage};

const ROOM_NOT_FOUND: &str = "Room not found";
const ALREADY_IN_ROOM: &str = "Already in a room";
const NOT_IN_ROOM: &str = "Not in a room";

struct Membership {
    room: RoomHandle,
    player_id: PlayerId,
}

pub struct ConnectionSession {
    registry: RoomRegistry,
    outbound: PlayerSender,
    membership: Option<Membership>,
}

impl ConnectionSession {
    pub fn new(registry: RoomRegistry, outbound: PlayerSender) -> Self {
        Self {
            registry,
            outbound,
            membership: None,
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.membership.as_ref().map(|m| m.player_id)
    }

    pub fn room(&self) -> Option<&RoomHandle> {
        self.membership.as_ref().map(|m| &m.room)
    }

    fn send(&self, message: ServerMessage) {
        let _ = self.outbound.send(message);
    }

    /// Decode and handle one inbound frame; undecodable frames are dropped
    pub async fn handle_frame(&mut self, data: &[u8]) {
        match decode::<ClientMessage>(data) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => debug!("Dropping malformed message: {}", e),
        }
    }

    pub async fn handle_message(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Join { room_id, player_name } => {
                self.join(&room_id, player_name.as_deref()).await;
            }
            ClientMessage::Ping { timestamp } => {
                self.send(ServerMessage::Pong {
                    client_timestamp: timestamp,
                    server_timestamp: unix_millis(),
                });
            }
            ClientMessage::StartGame { time_limit } => {
                self.forward(|room, player_id| room.start_game(player_id, time_limit));
            }
            ClientMessage::SubmitGuess { lat, lng } => {
                self.forward(|room, player_id| room.submit_guess(player_id, lat, lng));
            }
            ClientMessage::NextRound => {
                self.forward(|room, player_id| room.next_round(player_id));
            }
        }
    }

    async fn join(&mut self, room_id: &str, player_name: Option<&str>) {
        if self.membership.is_some() {
            self.send(ServerMessage::error(ALREADY_IN_ROOM));
            return;
        }

        let Some(room) = self.registry.get_room(room_id) else {
            self.send(ServerMessage::error(ROOM_NOT_FOUND));
            return;
        };

        let name = sanitize_name(player_name);
        match room.join(name, self.outbound.clone()).await {
            Ok(player_id) => {
                self.membership = Some(Membership { room, player_id });
            }
            Err(HandleError::Closed) => self.send(ServerMessage::error(ROOM_NOT_FOUND)),
            Err(HandleError::Room(e)) => self.send(ServerMessage::error(e.to_string())),
        }
    }

    /// Hand a request to the joined room; the room reports its own rejections
    fn forward<F>(&mut self, request: F)
    where
        F: FnOnce(&RoomHandle, PlayerId) -> Result<(), HandleError>,
    {
        let Some(membership) = &self.membership else {
            self.send(ServerMessage::error(NOT_IN_ROOM));
            return;
        };

        if request(&membership.room, membership.player_id).is_err() {
            // Room was deleted under us
            self.membership = None;
            self.send(ServerMessage::error(ROOM_NOT_FOUND));
        }
    }

    /// Connection ended: leave the room and schedule its deletion if empty
    pub async fn close(&mut self) {
        let Some(Membership { room, player_id }) = self.membership.take() else {
            return;
        };

        match room.disconnect(player_id).await {
            Ok(true) => {
                debug!("Room {} abandoned; scheduling deletion", room.code());
                let grace = self.registry.settings().disconnect_grace;
                self.registry.schedule_deletion(room, grace);
            }
            Ok(false) => {}
            Err(e) => warn!("Disconnect of {} from room {} failed: {}", player_id, room.code(), e),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio::time::sleep;

    use crate::config::RoomSettings;
    use crate::game::location::LocationCatalog;
    use crate::metrics::Metrics;

    fn registry() -> RoomRegistry {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/locations.json");
        RoomRegistry::new(
            Arc::new(LocationCatalog::load(path).unwrap()),
            RoomSettings::default(),
            16,
            Arc::new(Metrics::new()),
        )
    }

    fn connect(registry: &RoomRegistry) -> (ConnectionSession, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionSession::new(registry.clone(), tx), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    async fn settle(session: &ConnectionSession) {
        if let Some(room) = session.room() {
            room.snapshot().await.unwrap();
        }
    }

    async fn join_frame(session: &mut ConnectionSession, room_id: &str, name: &str) {
        let frame = format!(r#"{{"type":"join","roomId":"{}","playerName":"{}"}}"#, room_id, name);
        session.handle_frame(frame.as_bytes()).await;
    }

    #[tokio::test]
    async fn test_join_replies_privately() {
        let registry = registry();
        let code = registry.create_room(0).unwrap().code().to_string();
        let (mut session, mut rx) = connect(&registry);

        join_frame(&mut session, &code.to_lowercase(), "  Kei ").await;

        let player_id = session.player_id().unwrap();
        let messages = drain(&mut rx);
        assert_eq!(
            messages[0],
            ServerMessage::Joined {
                player_id,
                room_id: code.clone()
            }
        );
        match &messages[1] {
            ServerMessage::RoomState(snapshot) => {
                assert_eq!(snapshot.host_id, Some(player_id));
                assert_eq!(snapshot.players[0].name, "Kei");
            }
            other => panic!("expected room_state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        let registry = registry();
        let (mut session, mut rx) = connect(&registry);

        join_frame(&mut session, "ZZZZZZ", "Kei").await;

        assert!(session.player_id().is_none());
        assert_eq!(drain(&mut rx), vec![ServerMessage::error("Room not found")]);
    }

    #[tokio::test]
    async fn test_join_twice() {
        let registry = registry();
        let code = registry.create_room(0).unwrap().code().to_string();
        let (mut session, mut rx) = connect(&registry);

        join_frame(&mut session, &code, "Kei").await;
        let first = session.player_id();
        drain(&mut rx);

        join_frame(&mut session, &code, "Kei").await;
        assert_eq!(session.player_id(), first);
        assert_eq!(drain(&mut rx), vec![ServerMessage::error("Already in a room")]);
    }

    #[tokio::test]
    async fn test_join_started_game() {
        let registry = registry();
        let code = registry.create_room(0).unwrap().code().to_string();
        let (mut host, _rx_host) = connect(&registry);
        join_frame(&mut host, &code, "Host").await;
        host.handle_frame(br#"{"type":"start_game"}"#).await;
        settle(&host).await;

        let (mut late, mut rx_late) = connect(&registry);
        join_frame(&mut late, &code, "Late").await;

        assert!(late.player_id().is_none());
        assert_eq!(drain(&mut rx_late), vec![ServerMessage::error("Game already started")]);
    }

    #[tokio::test]
    async fn test_requests_before_join() {
        let registry = registry();
        let (mut session, mut rx) = connect(&registry);

        session.handle_frame(br#"{"type":"submit_guess","lat":1,"lng":2}"#).await;
        session.handle_frame(br#"{"type":"next_round"}"#).await;

        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::error("Not in a room"), ServerMessage::error("Not in a room")]
        );
    }

    #[tokio::test]
    async fn test_malformed_frames_dropped() {
        let registry = registry();
        let (mut session, mut rx) = connect(&registry);

        session.handle_frame(b"\xff\xfe").await;
        session.handle_frame(b"{}").await;
        session.handle_frame(br#"{"type":"submit_guess","lat":"x","lng":0}"#).await;

        assert!(drain(&mut rx).is_empty());

        // Connection still usable
        session.handle_frame(br#"{"type":"ping","timestamp":42}"#).await;
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [ServerMessage::Pong { client_timestamp: 42, server_timestamp }] if *server_timestamp > 0
        ));
    }

    #[tokio::test]
    async fn test_two_player_round() {
        let registry = registry();
        let code = registry.create_room(0).unwrap().code().to_string();
        let (mut a, mut rx_a) = connect(&registry);
        let (mut b, mut rx_b) = connect(&registry);
        join_frame(&mut a, &code, "A").await;
        join_frame(&mut b, &code, "B").await;

        a.handle_frame(br#"{"type":"start_game"}"#).await;
        a.handle_frame(br#"{"type":"submit_guess","lat":35.0,"lng":139.0}"#).await;
        b.handle_frame(br#"{"type":"submit_guess","lat":34.0,"lng":135.0}"#).await;
        settle(&a).await;

        for rx in [&mut rx_a, &mut rx_b] {
            let messages = drain(rx);
            assert!(messages.iter().any(|m| matches!(m, ServerMessage::GameStart(_))));
            let results = messages
                .iter()
                .find_map(|m| match m {
                    ServerMessage::RoundResult { results, .. } => Some(results.clone()),
                    _ => None,
                })
                .unwrap();
            assert_eq!(results.len(), 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_schedules_deletion() {
        let registry = registry();
        let code = registry.create_room(0).unwrap().code().to_string();

        // Outlive the creation-time check
        let (mut session, _rx) = connect(&registry);
        join_frame(&mut session, &code, "Kei").await;
        sleep(Duration::from_secs(61)).await;
        assert!(registry.get_room(&code).is_some());

        session.close().await;
        assert!(session.player_id().is_none());

        sleep(Duration::from_secs(59)).await;
        assert!(registry.get_room(&code).is_some());
        sleep(Duration::from_secs(2)).await;
        assert!(registry.get_room(&code).is_none());
    }

    #[tokio::test]
    async fn test_close_migrates_host() {
        let registry = registry();
        let code = registry.create_room(0).unwrap().code().to_string();
        let (mut a, _rx_a) = connect(&registry);
        let (mut b, mut rx_b) = connect(&registry);
        join_frame(&mut a, &code, "A").await;
        join_frame(&mut b, &code, "B").await;
        drain(&mut rx_b);

        a.close().await;
        settle(&b).await;

        let snapshot = registry.room_snapshot(&code).await.unwrap();
        assert_eq!(snapshot.host_id, b.player_id());
        assert!(drain(&mut rx_b)
            .iter()
            .any(|m| matches!(m, ServerMessage::RoomState(s) if s.host_id == b.player_id())));
    }
}
