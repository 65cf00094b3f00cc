//! Room actor
//!
//! Each room runs on its own task. Commands from connections and the
//! registry arrive on one queue and the round timer is raced against it in
//! the same `select!`, so a room never handles two events at once.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::game::PlayerId;
use crate::lobby::player::PlayerSender;
use crate::lobby::room::{Room, RoomError};
use crate::lobby::room_code::RoomCode;
use crate::net::protocol::RoomSnapshot;

/// Events a room actor processes in order
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        name: String,
        outbound: PlayerSender,
        reply: oneshot::Sender<Result<PlayerId, RoomError>>,
    },
    StartGame {
        player_id: PlayerId,
        time_limit: Option<u32>,
    },
    SubmitGuess {
        player_id: PlayerId,
        lat: f64,
        lng: f64,
    },
    NextRound {
        player_id: PlayerId,
    },
    Disconnect {
        player_id: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    /// Stop the room if nobody has been connected for `after`
    CloseIfAbandoned {
        after: Duration,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Errors talking to a room actor
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("Room is closed")]
    Closed,
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Cloneable address of a running room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    /// Distinguishes rooms that reuse a code
    instance: Uuid,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: RoomCommand) -> Result<(), HandleError> {
        self.tx.send(command).map_err(|_| HandleError::Closed)
    }

    pub async fn join(&self, name: String, outbound: PlayerSender) -> Result<PlayerId, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Join { name, outbound, reply })?;
        let joined = rx.await.map_err(|_| HandleError::Closed)?;
        Ok(joined?)
    }

    pub fn start_game(&self, player_id: PlayerId, time_limit: Option<u32>) -> Result<(), HandleError> {
        self.send(RoomCommand::StartGame { player_id, time_limit })
    }

    pub fn submit_guess(&self, player_id: PlayerId, lat: f64, lng: f64) -> Result<(), HandleError> {
        self.send(RoomCommand::SubmitGuess { player_id, lat, lng })
    }

    pub fn next_round(&self, player_id: PlayerId) -> Result<(), HandleError> {
        self.send(RoomCommand::NextRound { player_id })
    }

    /// Returns true when the room has nobody connected afterwards
    pub async fn disconnect(&self, player_id: PlayerId) -> Result<bool, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Disconnect { player_id, reply })?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Snapshot { reply })?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    /// Returns true if the room stopped
    pub async fn close_if_abandoned(&self, after: Duration) -> Result<bool, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::CloseIfAbandoned { after, reply })?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    pub fn shutdown(&self) {
        let _ = self.send(RoomCommand::Shutdown);
    }
}

/// Start the actor task for a room
pub fn spawn_room(room: Room) -> RoomHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = RoomHandle {
        code: room.code().clone(),
        instance: Uuid::new_v4(),
        tx,
    };

    tokio::spawn(run_room(room, rx));
    handle
}

async fn run_room(mut room: Room, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
    debug!("Room {} task started", room.code());

    loop {
        let deadline = room.next_deadline();

        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else { break };
                if !handle_command(&mut room, command) {
                    break;
                }
            }
            _ = wait_for(deadline) => {
                room.on_deadline(Instant::now());
            }
        }
    }

    room.close();
    debug!("Room {} task stopped", room.code());
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Apply one command; false stops the actor
fn handle_command(room: &mut Room, command: RoomCommand) -> bool {
    let now = Instant::now();

    match command {
        RoomCommand::Join { name, outbound, reply } => {
            let _ = reply.send(room.join(name, outbound));
        }
        RoomCommand::StartGame { player_id, time_limit } => {
            if let Err(e) = room.start_game(player_id, time_limit, now) {
                room.report(player_id, &e);
            }
        }
        RoomCommand::SubmitGuess { player_id, lat, lng } => {
            if let Err(e) = room.submit_guess(player_id, lat, lng, now) {
                room.report(player_id, &e);
            }
        }
        RoomCommand::NextRound { player_id } => {
            if let Err(e) = room.next_round(player_id, now) {
                room.report(player_id, &e);
            }
        }
        RoomCommand::Disconnect { player_id, reply } => {
            let _ = reply.send(room.disconnect(player_id, now));
        }
        RoomCommand::Snapshot { reply } => {
            let _ = reply.send(room.snapshot());
        }
        RoomCommand::CloseIfAbandoned { after, reply } => {
            let closed = room.close_if_abandoned(after, now);
            let _ = reply.send(closed);
            if closed {
                return false;
            }
        }
        RoomCommand::Shutdown => return false,
    }

    true
}
