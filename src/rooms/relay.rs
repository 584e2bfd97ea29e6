//! Room fan-out.
//!
//! Broadcasts go through [`Relay`] so a multi-instance deployment can publish
//! to a shared pub/sub bus and let each process deliver to its own members.
//! [`LocalRelay`] is the single-process case.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;

use super::{
    error::ChatError,
    event::ServerEvent,
    hub::lock,
    registry::ConnectionRegistry,
    room::RoomId,
};

#[async_trait]
pub trait Relay: Send + Sync {
    /// Queues `event` for every member of `room` and returns how many
    /// connections accepted it. An empty room is not an error.
    async fn publish(&self, room: &RoomId, event: ServerEvent) -> Result<usize, ChatError>;
}

pub struct LocalRelay {
    registry: Arc<Mutex<ConnectionRegistry>>,
}

impl LocalRelay {
    pub fn new(registry: Arc<Mutex<ConnectionRegistry>>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Relay for LocalRelay {
    async fn publish(&self, room: &RoomId, event: ServerEvent) -> Result<usize, ChatError> {
        let members = lock(&self.registry).members(room);

        let mut delivered = 0;
        for (conn, outbox) in members {
            match outbox.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => tracing::warn!(%conn, %room, "dropping broadcast for slow consumer"),
                Err(TrySendError::Closed(_)) => tracing::debug!(%conn, %room, "skipping closed connection"),
            }
        }
        Ok(delivered)
    }
}
