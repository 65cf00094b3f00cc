use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::RoomSettings;
use crate::game::constants::room::CODE_ATTEMPTS;
use crate::game::location::LocationCatalog;
use crate::lobby::room::Room;
use crate::lobby::room_code::RoomCode;
use crate::lobby::task::{spawn_room, RoomHandle};
use crate::metrics::Metrics;
use crate::net::protocol::RoomSnapshot;

/// Registry of live rooms, keyed by room code
///
/// Cheap to clone; every clone sees the same rooms.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    rooms: RwLock<HashMap<RoomCode, RoomHandle>>,
    catalog: Arc<LocationCatalog>,
    settings: RoomSettings,
    max_rooms: usize,
    metrics: Arc<Metrics>,
}

impl RoomRegistry {
    pub fn new(
        catalog: Arc<LocationCatalog>,
        settings: RoomSettings,
        max_rooms: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                rooms: RwLock::new(HashMap::new()),
                catalog,
                settings,
                max_rooms,
                metrics,
            }),
        }
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.inner.settings
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    /// Create a room with a fresh code and start its actor
    ///
    /// A room nobody joins is reclaimed after the disconnect grace period.
    pub fn create_room(&self, time_limit: u32) -> Result<RoomHandle, RegistryError> {
        let handle = {
            let mut rooms = self.inner.rooms.write();
            let metrics = &self.inner.metrics;
            rooms.retain(|_, handle| {
                if !handle.is_closed() {
                    return true;
                }
                Metrics::incr(&metrics.rooms_deleted);
                Metrics::decr(&metrics.rooms_active);
                false
            });

            if rooms.len() >= self.inner.max_rooms {
                return Err(RegistryError::TooManyRooms);
            }

            let mut rng = rand::thread_rng();
            let code = (0..CODE_ATTEMPTS)
                .map(|_| RoomCode::generate(&mut rng))
                .find(|code| !rooms.contains_key(code))
                .ok_or(RegistryError::CodeSpaceExhausted)?;

            let room = Room::new(
                code.clone(),
                time_limit,
                self.inner.settings.clone(),
                Arc::clone(&self.inner.catalog),
                Arc::clone(&self.inner.metrics),
                Instant::now(),
            );
            let handle = spawn_room(room);
            rooms.insert(code, handle.clone());
            handle
        };

        Metrics::incr(&self.inner.metrics.rooms_created);
        Metrics::incr(&self.inner.metrics.rooms_active);
        info!(
            "Created room {} (time limit {}s)",
            handle.code(),
            self.inner.settings.clamp_time_limit(time_limit)
        );

        self.schedule_deletion(handle.clone(), self.inner.settings.disconnect_grace);
        Ok(handle)
    }

    /// Look up a room; codes are case-insensitive
    pub fn get_room(&self, room_id: &str) -> Option<RoomHandle> {
        let code = RoomCode::normalize(room_id);
        self.inner
            .rooms
            .read()
            .get(&code)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    pub async fn room_snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        let handle = self.get_room(room_id)?;
        handle.snapshot().await.ok()
    }

    /// Delete the room after `after` unless someone is connected by then
    ///
    /// The room re-checks its own idle time, so a room that was rejoined and
    /// abandoned again in the meantime is only removed by the later request.
    pub fn schedule_deletion(&self, handle: RoomHandle, after: Duration) {
        let registry = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;

            match handle.close_if_abandoned(after).await {
                Ok(false) => debug!("Room {} is in use; not deleting", handle.code()),
                Ok(true) | Err(_) => registry.remove(&handle),
            }
        });
    }

    /// Drop `handle` from the registry if it is still the room under its code
    fn remove(&self, handle: &RoomHandle) {
        let mut rooms = self.inner.rooms.write();
        let current = rooms
            .get(handle.code())
            .is_some_and(|h| h.instance() == handle.instance());
        if !current {
            return;
        }

        rooms.remove(handle.code());
        Metrics::incr(&self.inner.metrics.rooms_deleted);
        Metrics::decr(&self.inner.metrics.rooms_active);
        info!("Deleted room {}", handle.code());
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.read().len()
    }

    /// Stop every room actor
    pub fn shutdown_all(&self) -> usize {
        let rooms: Vec<RoomHandle> = self.inner.rooms.write().drain().map(|(_, h)| h).collect();
        for handle in &rooms {
            handle.shutdown();
            Metrics::decr(&self.inner.metrics.rooms_active);
        }
        rooms.len()
    }
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Too many rooms")]
    TooManyRooms,
    #[error("Could not allocate a room code")]
    CodeSpaceExhausted,
}
