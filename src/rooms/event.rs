//! Event frames exchanged over the chat websocket.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`; events
//! without a payload omit `data`.

use serde::{Deserialize, Serialize};

use super::{msg::Message, room::UserId};

/// Client → server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join room")]
    JoinRoom(UserId),
    #[serde(rename = "chat history")]
    ChatHistory,
    #[serde(rename = "chat message")]
    ChatMessage(String),
    /// Base64 file contents, optionally as a `data:` URL.
    #[serde(rename = "upload file")]
    UploadFile(String),
    #[serde(rename = "get messages")]
    GetMessages,
    #[serde(rename = "leave room")]
    LeaveRoom,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "join room",
            Self::ChatHistory => "chat history",
            Self::ChatMessage(_) => "chat message",
            Self::UploadFile(_) => "upload file",
            Self::GetMessages => "get messages",
            Self::LeaveRoom => "leave room",
        }
    }
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "joined room")]
    JoinedRoom(String),
    #[serde(rename = "messages")]
    Messages(Vec<Message>),
    #[serde(rename = "chat new")]
    ChatNew(Message),
    #[serde(rename = "leave room")]
    LeaveRoom,
}
