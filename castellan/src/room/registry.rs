//! Room directory: spawns and tracks room actors.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, oneshot};
use uuid::Uuid;

use crate::bot::BaselineStrategy;
use crate::game::room::SeatIndex;
use crate::net::errors::{ErrorKind, WireError};
use crate::store::EventStore;

use super::actor::{RoomActor, RoomHandle};
use super::config::RoomConfig;
use super::messages::RoomMessage;

/// Process-wide registry of live rooms, keyed by room id. One actor task
/// per room; handles of closed rooms are pruned lazily.
pub struct RoomManager {
    rooms: RwLock<HashMap<String, RoomHandle>>,
    defaults: RoomConfig,
    store: Option<Arc<dyn EventStore>>,
}

impl RoomManager {
    #[must_use]
    pub fn new(defaults: RoomConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            defaults,
            store: None,
        }
    }

    /// Attach an event-store adapter mirrored by every room spawned later.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Create a room with the default configuration and spawn its actor.
    pub async fn create_room(&self) -> Result<RoomHandle, String> {
        self.create_room_with(self.defaults.clone()).await
    }

    /// Create a room with an explicit configuration.
    pub async fn create_room_with(&self, config: RoomConfig) -> Result<RoomHandle, String> {
        config.validate()?;
        let room_id = Self::generate_room_id();

        let (actor, handle) = RoomActor::new(
            room_id.clone(),
            config,
            Box::new(BaselineStrategy::new()),
            self.store.clone(),
        );

        let mut rooms = self.rooms.write().await;
        rooms.insert(room_id.clone(), handle.clone());
        drop(rooms);

        tokio::spawn(async move {
            actor.run().await;
        });

        log::info!("created room {room_id}");
        Ok(handle)
    }

    pub async fn get_room(&self, room_id: &str) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).cloned()
    }

    /// Directory listing. Rooms whose actors have exited are pruned here.
    pub async fn list_rooms(&self) -> Vec<Value> {
        let handles: Vec<RoomHandle> = {
            let rooms = self.rooms.read().await;
            rooms.values().cloned().collect()
        };

        let mut infos = Vec::with_capacity(handles.len());
        let mut dead = Vec::new();
        for handle in handles {
            let (tx, rx) = oneshot::channel();
            let sent = handle.send(RoomMessage::GetInfo { response: tx }).await;
            match sent {
                Ok(()) => {
                    if let Ok(info) = rx.await {
                        infos.push(info);
                    } else {
                        dead.push(handle.room_id().to_string());
                    }
                }
                Err(_) => dead.push(handle.room_id().to_string()),
            }
        }

        if !dead.is_empty() {
            let mut rooms = self.rooms.write().await;
            for room_id in dead {
                rooms.remove(&room_id);
                log::debug!("pruned closed room {room_id}");
            }
        }
        infos
    }

    /// Vacate a seat on behalf of the lobby (the directory's `leave_room`
    /// verb). The phase engine is never consulted here; the room actor
    /// vacates the seat as a room-level operation, and a room that empties
    /// out is closed on the spot rather than waiting for idle eviction.
    pub async fn leave_room(&self, room_id: &str, seat: SeatIndex) -> Result<(), WireError> {
        let handle = self.get_room(room_id).await.ok_or_else(|| {
            WireError::new(ErrorKind::NotFound, format!("room {room_id} not found"))
        })?;

        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::Leave { seat, response: tx })
            .await
            .map_err(|_| WireError::new(ErrorKind::NotFound, "room is closed"))?;
        let occupied = rx
            .await
            .map_err(|_| WireError::new(ErrorKind::Internal, "room did not answer"))??;

        if occupied == 0 {
            self.close_room(room_id).await;
        }
        Ok(())
    }

    /// Ask a room to shut down and drop its handle.
    pub async fn close_room(&self, room_id: &str) -> bool {
        let handle = {
            let rooms = self.rooms.read().await;
            rooms.get(room_id).cloned()
        };
        let Some(handle) = handle else {
            return false;
        };

        let (tx, rx) = oneshot::channel();
        if handle.send(RoomMessage::Close { response: tx }).await.is_ok() {
            let _ = rx.await;
        }

        let mut rooms = self.rooms.write().await;
        rooms.remove(room_id);
        log::info!("closed room {room_id}");
        true
    }

    pub async fn active_room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }

    fn generate_room_id() -> String {
        Uuid::new_v4().simple().to_string()[..6].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_list_rooms() {
        let manager = RoomManager::new(RoomConfig::default());
        let handle = manager.create_room().await.unwrap();
        assert_eq!(manager.active_room_count().await, 1);

        let infos = manager.list_rooms().await;
        assert_eq!(infos.len(), 1);
        assert_eq!(
            infos[0]["room_id"],
            serde_json::json!(handle.room_id())
        );
        assert_eq!(infos[0]["players"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn close_room_removes_the_handle() {
        let manager = RoomManager::new(RoomConfig::default());
        let handle = manager.create_room().await.unwrap();
        assert!(manager.close_room(handle.room_id()).await);
        assert_eq!(manager.active_room_count().await, 0);
        assert!(manager.get_room(handle.room_id()).await.is_none());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let manager = RoomManager::new(RoomConfig::default());
        let bad = RoomConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(manager.create_room_with(bad).await.is_err());
    }
}
