use std::fmt;

use serde::{Deserialize, Serialize};

use super::{event::ServerEvent, hub::ChatHub, registry::{ConnectionId, RoomState}};

pub const JOIN_ACK: &str = "successfully Joined room";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Sorted pair joined with `-`. `-` and `\` inside an id are backslash-escaped.
    pub fn for_pair(a: &UserId, b: &UserId) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}-{}", escape(low.as_str()), escape(high.as_str())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn escape(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        if c == '-' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl ChatHub {
    /// Moves the connection into the room it shares with `counterpart` and
    /// acknowledges to the caller alone. A connection already in another room
    /// leaves it first.
    pub fn join(&self, conn: ConnectionId, counterpart: UserId) -> Option<RoomId> {
        let (room, outbox) = {
            let mut registry = self.registry();
            let user = registry.user(conn)?.clone();
            let room = RoomId::for_pair(&user, &counterpart);

            match registry.set_room(conn, room.clone(), counterpart.clone()) {
                Some(RoomState::InRoom { room: previous, .. }) if previous != room => {
                    tracing::info!(%conn, %user, from = %previous, to = %room, "switched rooms");
                }
                _ => tracing::info!(%conn, %user, %room, "joined room"),
            }

            (room, registry.outbox(conn)?)
        };

        self.deliver(conn, &outbox, ServerEvent::JoinedRoom(JOIN_ACK.to_owned()));
        Some(room)
    }

    pub fn leave(&self, conn: ConnectionId) -> Option<RoomId> {
        let left = self.registry().clear_room(conn);
        if let Some(room) = &left {
            tracing::info!(%conn, %room, "left room");
        }
        left
    }
}
