use super::{event::ServerEvent, hub::ChatHub, registry::ConnectionId};

impl ChatHub {
    /// Sends `leave room` to the closing connection and forgets it. The
    /// counterpart is not notified. `false` if it was already gone.
    pub fn disconnect(&self, conn: ConnectionId) -> bool {
        let Some(outbox) = self.registry().outbox(conn) else {
            tracing::debug!(%conn, "disconnect for unknown connection");
            return false;
        };

        self.deliver(conn, &outbox, ServerEvent::LeaveRoom);
        self.leave(conn);

        match self.registry().deregister(conn) {
            Some(entry) => {
                tracing::info!(%conn, user = %entry.user, "disconnected");
                true
            }
            None => false,
        }
    }
}
