//! Two-party chat rooms over a websocket.

pub mod bridge;
pub mod error;
pub mod event;
pub mod hub;
pub mod msg;
pub mod registry;
pub mod relay;
pub mod room;
pub mod upload;

mod pipeline;
mod presence;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use error::ChatError;
pub use event::{ClientEvent, ServerEvent};
pub use hub::ChatHub;
pub use msg::Message;
pub use registry::{ConnectionId, RoomState};
pub use room::{RoomId, UserId};
pub use upload::UploadStore;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::chat_ws))
}
