use thiserror::Error;

use super::{registry::ConnectionId, upload::UploadError};

/// Failures while handling one inbound chat event. None of them outlive the event.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),
    #[error("relay error: {0}")]
    Relay(String),
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
}
