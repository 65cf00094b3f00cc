//! Rooms: registry, per-room actors and the round state machine

pub mod manager;
pub mod player;
pub mod room;
pub mod room_code;
pub mod task;
pub mod timer;

pub use manager::{RegistryError, RoomRegistry};
pub use room::{Room, RoomError, RoomPhase};
pub use task::{HandleError, RoomHandle};
