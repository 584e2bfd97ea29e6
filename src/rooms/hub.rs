use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use sqlx::SqlitePool;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex as AsyncMutex, OwnedMutexGuard,
};

use super::{
    event::ServerEvent,
    registry::{ConnectionId, ConnectionRegistry, Outbox},
    relay::{LocalRelay, Relay},
    room::{RoomId, UserId},
    upload::UploadStore,
};

/// Queue depth per connection; a client further behind than this loses events.
pub const OUTBOX_CAPACITY: usize = 256;

/// Shared by every connection task; clones share one registry.
#[derive(Clone)]
pub struct ChatHub {
    registry: Arc<Mutex<ConnectionRegistry>>,
    relay: Arc<dyn Relay>,
    /// Held from insert until broadcast, so a room's messages go out in `seq` order.
    room_locks: Arc<Mutex<HashMap<RoomId, Arc<AsyncMutex<()>>>>>,
    pub(super) db_pool: SqlitePool,
    pub(super) uploads: UploadStore,
}

pub(super) fn lock(registry: &Mutex<ConnectionRegistry>) -> MutexGuard<'_, ConnectionRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChatHub {
    pub fn new(db_pool: SqlitePool, uploads: UploadStore) -> Self {
        Self::with_relay(db_pool, uploads, |registry| -> Arc<dyn Relay> { Arc::new(LocalRelay::new(registry)) })
    }

    /// `make_relay` gets this process's registry for local delivery.
    pub fn with_relay<F>(db_pool: SqlitePool, uploads: UploadStore, make_relay: F) -> Self
    where
        F: FnOnce(Arc<Mutex<ConnectionRegistry>>) -> Arc<dyn Relay>,
    {
        let registry = Arc::new(Mutex::new(ConnectionRegistry::new()));
        let relay = make_relay(registry.clone());
        Self {
            registry,
            relay,
            room_locks: Arc::default(),
            db_pool,
            uploads,
        }
    }

    pub(super) fn registry(&self) -> MutexGuard<'_, ConnectionRegistry> {
        lock(&self.registry)
    }

    pub(super) fn relay(&self) -> &dyn Relay {
        self.relay.as_ref()
    }

    pub(super) async fn lock_room(&self, room: &RoomId) -> RoomGuard {
        let lock = self.room_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(room.clone())
            .or_default()
            .clone();

        RoomGuard {
            guard: Some(lock.lock_owned().await),
            room: room.clone(),
            locks: self.room_locks.clone(),
        }
    }

    #[cfg(test)]
    pub(super) fn locked_room_count(&self) -> usize {
        self.room_locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn connect(&self, user: UserId) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let conn = ConnectionId::new();
        self.registry().register(conn, user.clone(), tx);
        tracing::info!(%conn, %user, "connected");
        (conn, rx)
    }

    pub(super) fn deliver(&self, conn: ConnectionId, outbox: &Outbox, event: ServerEvent) {
        match outbox.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::warn!(%conn, "dropping event for slow consumer"),
            Err(TrySendError::Closed(_)) => tracing::debug!(%conn, "connection already closed"),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.registry().len()
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.registry().is_online(user)
    }

    pub fn is_registered(&self, conn: ConnectionId) -> bool {
        self.registry().contains(conn)
    }
}

pub(super) struct RoomGuard {
    guard: Option<OwnedMutexGuard<()>>,
    room: RoomId,
    locks: Arc<Mutex<HashMap<RoomId, Arc<AsyncMutex<()>>>>>,
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map's own handle left: nobody holds or waits on this room.
        if locks.get(&self.room).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.room);
        }
    }
}
