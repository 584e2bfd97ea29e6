use super::{
    error::ChatError,
    event::{ClientEvent, ServerEvent},
    hub::ChatHub,
    msg::{self, Message, NewMessage, FILE_PLACEHOLDER},
    registry::{ConnectionId, RoomState},
    room::{RoomId, UserId},
};

struct Conversation {
    user: UserId,
    room: RoomId,
    counterpart: UserId,
}

impl ChatHub {
    /// Like [`handle`](Self::handle), but failures are only logged.
    pub async fn dispatch(&self, conn: ConnectionId, event: ClientEvent) {
        let name = event.name();
        if let Err(e) = self.handle(conn, event).await {
            tracing::error!(%conn, event = name, "event dropped: {e}");
        }
    }

    pub async fn handle(&self, conn: ConnectionId, event: ClientEvent) -> Result<(), ChatError> {
        match event {
            ClientEvent::JoinRoom(counterpart) => {
                self.join(conn, counterpart).ok_or(ChatError::UnknownConnection(conn))?;
            }
            ClientEvent::LeaveRoom => {
                self.leave(conn);
            }
            ClientEvent::ChatMessage(text) => {
                self.send_text(conn, &text).await?;
            }
            ClientEvent::UploadFile(payload) => {
                self.send_file(conn, &payload).await?;
            }
            ClientEvent::ChatHistory => {
                self.history(conn).await?;
            }
            ClientEvent::GetMessages => {
                self.inbox(conn).await?;
            }
        }
        Ok(())
    }

    /// Persists `text` and broadcasts it to the room. Outside a room, or for
    /// blank text, nothing happens and `None` comes back.
    pub async fn send_text(&self, conn: ConnectionId, text: &str) -> Result<Option<Message>, ChatError> {
        let Some(conversation) = self.conversation(conn, "chat message")? else {
            return Ok(None);
        };
        if text.trim().is_empty() {
            tracing::warn!(%conn, user = %conversation.user, "ignoring empty chat message");
            return Ok(None);
        }

        self.publish(conn, conversation, text, None).await.map(Some)
    }

    /// Stores the attachment, then sends it like a text message with a
    /// placeholder body. A persistence failure after the write leaves the file
    /// on disk.
    pub async fn send_file(&self, conn: ConnectionId, payload: &str) -> Result<Option<Message>, ChatError> {
        let Some(conversation) = self.conversation(conn, "upload file")? else {
            return Ok(None);
        };

        let file_name = self.uploads.save(payload).await?;
        tracing::info!(%conn, user = %conversation.user, file = %file_name, "stored upload");

        self.publish(conn, conversation, FILE_PLACEHOLDER, Some(&file_name)).await.map(Some)
    }

    /// Marks the counterpart's unread messages as read, then sends the whole
    /// conversation, newest first, to this connection only.
    pub async fn history(&self, conn: ConnectionId) -> Result<Option<Vec<Message>>, ChatError> {
        let Some(Conversation { user, counterpart, .. }) = self.conversation(conn, "chat history")? else {
            return Ok(None);
        };

        let marked = msg::mark_read(&self.db_pool, &counterpart, &user).await?;
        let messages: Vec<Message> = msg::transcript(&self.db_pool, &user, &counterpart)
            .await?
            .into_iter()
            .map(|m| self.resolve_file_url(m))
            .collect();

        tracing::info!(%conn, %user, %counterpart, marked, count = messages.len(), "sent chat history");
        self.reply(conn, ServerEvent::Messages(messages.clone()))?;
        Ok(Some(messages))
    }

    /// Sends every message addressed to this connection's user. Read flags are
    /// left alone and no room is needed.
    pub async fn inbox(&self, conn: ConnectionId) -> Result<Vec<Message>, ChatError> {
        let user = self.registry().user(conn).cloned().ok_or(ChatError::UnknownConnection(conn))?;

        let messages: Vec<Message> = msg::inbox(&self.db_pool, &user)
            .await?
            .into_iter()
            .map(|m| self.resolve_file_url(m))
            .collect();

        tracing::info!(%conn, %user, count = messages.len(), "sent inbox");
        self.reply(conn, ServerEvent::Messages(messages.clone()))?;
        Ok(messages)
    }

    fn conversation(&self, conn: ConnectionId, event: &'static str) -> Result<Option<Conversation>, ChatError> {
        let registry = self.registry();
        let user = registry.user(conn).cloned().ok_or(ChatError::UnknownConnection(conn))?;

        match registry.state(conn) {
            Some(RoomState::InRoom { room, counterpart }) => Ok(Some(Conversation {
                user,
                room: room.clone(),
                counterpart: counterpart.clone(),
            })),
            _ => {
                tracing::warn!(%conn, %user, event, "ignoring event outside of a room");
                Ok(None)
            }
        }
    }

    async fn publish(
        &self,
        conn: ConnectionId,
        Conversation { user, room, counterpart }: Conversation,
        text: &str,
        file: Option<&str>,
    ) -> Result<Message, ChatError> {
        let _ordered = self.lock_room(&room).await;

        let message = msg::insert_msg(&self.db_pool, NewMessage {
            sender: &user,
            receiver: &counterpart,
            text,
            file,
        })
        .await?;
        let message = self.resolve_file_url(message);

        let delivered = self.relay().publish(&room, ServerEvent::ChatNew(message.clone())).await?;
        tracing::info!(%conn, %user, %room, id = %message.id, delivered, "sent message");
        Ok(message)
    }

    fn reply(&self, conn: ConnectionId, event: ServerEvent) -> Result<(), ChatError> {
        let outbox = self.registry().outbox(conn).ok_or(ChatError::UnknownConnection(conn))?;
        self.deliver(conn, &outbox, event);
        Ok(())
    }

    fn resolve_file_url(&self, mut message: Message) -> Message {
        message.file_url = message.file.as_deref().map(|file| self.uploads.public_url(file));
        message
    }
}
