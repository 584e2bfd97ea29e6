//! Live connections, their room state, and per-user presence.
//!
//! The registry keeps three indexes consistent with each other:
//! - `connection → entry`: owner, room state and outbound queue
//! - `room → connections`: live membership, used for fan-out
//! - `user → connections`: presence, one entry per device or tab
//!
//! Every mutation is a synchronous method so callers can hold the lock for a
//! single step and never across an `.await`.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    event::ServerEvent,
    room::{RoomId, UserId},
};

pub type Outbox = mpsc::Sender<ServerEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomState {
    NoRoom,
    InRoom { room: RoomId, counterpart: UserId },
}

#[derive(Debug)]
pub struct Connection {
    pub user: UserId,
    pub state: RoomState,
    outbox: Outbox,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
    presence: HashMap<UserId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` without touching anything if the id is already registered.
    pub fn register(&mut self, conn: ConnectionId, user: UserId, outbox: Outbox) -> bool {
        if self.connections.contains_key(&conn) {
            return false;
        }

        self.presence.entry(user.clone()).or_default().insert(conn);
        self.connections.insert(conn, Connection {
            user,
            state: RoomState::NoRoom,
            outbox,
        });
        true
    }

    pub fn deregister(&mut self, conn: ConnectionId) -> Option<Connection> {
        self.clear_room(conn);
        let entry = self.connections.remove(&conn)?;

        if let Some(conns) = self.presence.get_mut(&entry.user) {
            conns.remove(&conn);
            if conns.is_empty() {
                self.presence.remove(&entry.user);
            }
        }

        Some(entry)
    }

    pub fn user(&self, conn: ConnectionId) -> Option<&UserId> {
        self.connections.get(&conn).map(|c| &c.user)
    }

    pub fn state(&self, conn: ConnectionId) -> Option<&RoomState> {
        self.connections.get(&conn).map(|c| &c.state)
    }

    pub fn outbox(&self, conn: ConnectionId) -> Option<Outbox> {
        self.connections.get(&conn).map(|c| c.outbox.clone())
    }

    /// Puts the connection in `room`, leaving whatever room it was in.
    /// Returns the previous state, or `None` if the connection is unknown.
    pub fn set_room(&mut self, conn: ConnectionId, room: RoomId, counterpart: UserId) -> Option<RoomState> {
        let previous = self.connections.get(&conn)?.state.clone();
        self.clear_room(conn);

        self.rooms.entry(room.clone()).or_default().insert(conn);
        if let Some(entry) = self.connections.get_mut(&conn) {
            entry.state = RoomState::InRoom { room, counterpart };
        }

        Some(previous)
    }

    pub fn clear_room(&mut self, conn: ConnectionId) -> Option<RoomId> {
        let entry = self.connections.get_mut(&conn)?;
        let RoomState::InRoom { room, .. } = std::mem::replace(&mut entry.state, RoomState::NoRoom) else {
            return None;
        };

        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&conn);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }

        Some(room)
    }

    pub fn members(&self, room: &RoomId) -> Vec<(ConnectionId, Outbox)> {
        self.rooms
            .get(room)
            .into_iter()
            .flatten()
            .filter_map(|conn| self.connections.get(conn).map(|c| (*conn, c.outbox.clone())))
            .collect()
    }

    pub fn connections_of(&self, user: &UserId) -> Vec<ConnectionId> {
        self.presence
            .get(user)
            .map(|conns| conns.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.presence.contains_key(user)
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.connections.contains_key(&conn)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
