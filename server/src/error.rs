//! Recoverable failures of lobby operations.
//!
//! Every variant is reported to the originating session only; the world state
//! is left exactly as it was before the rejected operation.

use shared::{ErrorKind, RoomId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LobbyError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("only the host can do that")]
    NotHost,
    #[error("room {0} does not exist")]
    RoomNotFound(RoomId),
    #[error("room {0} is not accepting players")]
    RoomNotJoinable(RoomId),
    #[error("room {0} is full")]
    RoomFull(RoomId),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl LobbyError {
    pub fn validation(reason: impl Into<String>) -> Self {
        LobbyError::Validation(reason.into())
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        LobbyError::InvalidState(reason.into())
    }

    /// Wire category for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LobbyError::Validation(_) => ErrorKind::ValidationError,
            LobbyError::NotLoggedIn => ErrorKind::NotLoggedIn,
            LobbyError::NotHost => ErrorKind::NotHost,
            LobbyError::RoomNotFound(_) => ErrorKind::RoomNotFound,
            LobbyError::RoomNotJoinable(_) => ErrorKind::RoomNotJoinable,
            LobbyError::RoomFull(_) => ErrorKind::RoomFull,
            LobbyError::InvalidState(_) => ErrorKind::InvalidState,
        }
    }
}
