use axum::{
    debug_handler,
    extract::{ws::{Message as WsMessage, WebSocket}, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tower_sessions::Session;

use super::{bridge, event::ClientEvent, room::UserId, ChatHub};

#[debug_handler(state = crate::AppState)]
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    session: Session,
    State(db_pool): State<SqlitePool>,
    State(hub): State<ChatHub>,
) -> Response {
    match bridge::authenticate(&session, &db_pool).await {
        Ok(user) => ws.on_upgrade(move |socket| run(socket, hub, user)),
        Err(rejection) => {
            tracing::warn!(reason = %rejection, "rejected websocket handshake");
            rejection.into_response()
        }
    }
}

async fn run(socket: WebSocket, hub: ChatHub, user: UserId) {
    let (conn, mut outbox) = hub.connect(user);
    let (mut sender, mut receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(%conn, "failed to encode event: {e}");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let Some(Ok(frame)) = frame else {
                    break;
                };
                match frame {
                    WsMessage::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                        Ok(event) => hub.dispatch(conn, event).await,
                        Err(e) => tracing::warn!(%conn, "ignoring malformed frame: {e}"),
                    },
                    WsMessage::Close(_) => break,
                    WsMessage::Binary(_) => tracing::warn!(%conn, "ignoring binary frame"),
                    WsMessage::Ping(_) | WsMessage::Pong(_) => {}
                }
            }
            _ = &mut writer => break,
        }
    }

    hub.disconnect(conn);
    if !writer.is_finished() {
        let _ = writer.await;
    }
}
