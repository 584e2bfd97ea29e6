//! Lets the websocket handshake reuse the HTTP login.
//!
//! The upgrade request carries the same session cookie as every other request,
//! so the identity stored by the login flow is read back here. This runs once
//! per connection: the `/ws` handler extracts [`WebSocketUpgrade`] before the
//! session, so plain requests are turned away without touching the session
//! store, and frames on an open socket never pass through it again.
//!
//! [`WebSocketUpgrade`]: axum::extract::WebSocketUpgrade

use axum::{http::StatusCode, response::{IntoResponse, Response}};
use sqlx::SqlitePool;
use thiserror::Error;
use tower_sessions::Session;

use crate::{db, session::USER_ID};

use super::room::UserId;

#[derive(Debug, Error)]
pub enum AuthRejection {
    #[error("no authenticated session")]
    NoSession,
    #[error("session refers to unknown user {0}")]
    UnknownUser(String),
    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NoSession | Self::UnknownUser(_) => StatusCode::UNAUTHORIZED,
            Self::Session(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        status.into_response()
    }
}

/// Resolves the logged-in user behind a handshake's session. Expired sessions
/// come back empty from the store and are rejected like missing ones.
pub async fn authenticate(session: &Session, db_pool: &SqlitePool) -> Result<UserId, AuthRejection> {
    let Some(user_id) = session.get::<String>(USER_ID).await? else {
        return Err(AuthRejection::NoSession);
    };

    if !db::user_exists(db_pool, &user_id).await? {
        return Err(AuthRejection::UnknownUser(user_id));
    }

    Ok(UserId(user_id))
}
