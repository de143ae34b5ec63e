//! Outbound events and their addressing.

use crate::chat::ChatMessage;
use crate::error::LobbyError;
use crate::game::GameRound;
use crate::room::Room;
use crate::session::Session;
use serde::Serialize;
use shared::{ErrorKind, RoomId, SessionId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub session_id: SessionId,
    pub display_name: String,
    pub score: u32,
}

/// Events sent from the server to clients, encoded like [`shared::ClientEvent`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    LoggedIn {
        session: Session,
    },
    LobbyPlayerJoined {
        session: Session,
    },
    LobbyPlayerLeft {
        session_id: SessionId,
    },
    LobbyNewMessage(ChatMessage),
    LobbyStateUpdate {
        players: Vec<Session>,
        rooms: Vec<Room>,
    },
    LobbySnapshot {
        players: Vec<Session>,
        messages: Vec<ChatMessage>,
        rooms: Vec<Room>,
    },
    RoomCreated {
        room: Room,
    },
    RoomJoined {
        room: Room,
    },
    RoomPlayerJoined {
        session: Session,
        room: Room,
    },
    RoomPlayerLeft {
        session_id: SessionId,
        display_name: String,
        room: Room,
    },
    RoomDeleted {
        room_id: RoomId,
    },
    RoomJoinError {
        kind: ErrorKind,
        reason: String,
    },
    RoomNewMessage(ChatMessage),
    GameStarted {
        room: Room,
        game: GameRound,
    },
    GameStateUpdate {
        room_id: RoomId,
        game: GameRound,
    },
    GameEnded {
        room: Room,
        winner: Winner,
        scores: BTreeMap<SessionId, u32>,
    },
    Error {
        kind: ErrorKind,
        reason: String,
    },
}

impl ServerEvent {
    pub fn error(err: &LobbyError) -> Self {
        ServerEvent::Error {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    pub fn join_error(err: &LobbyError) -> Self {
        ServerEvent::RoomJoinError {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    /// Wire name of the event, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::LoggedIn { .. } => "logged-in",
            ServerEvent::LobbyPlayerJoined { .. } => "lobby-player-joined",
            ServerEvent::LobbyPlayerLeft { .. } => "lobby-player-left",
            ServerEvent::LobbyNewMessage(_) => "lobby-new-message",
            ServerEvent::LobbyStateUpdate { .. } => "lobby-state-update",
            ServerEvent::LobbySnapshot { .. } => "lobby-snapshot",
            ServerEvent::RoomCreated { .. } => "room-created",
            ServerEvent::RoomJoined { .. } => "room-joined",
            ServerEvent::RoomPlayerJoined { .. } => "room-player-joined",
            ServerEvent::RoomPlayerLeft { .. } => "room-player-left",
            ServerEvent::RoomDeleted { .. } => "room-deleted",
            ServerEvent::RoomJoinError { .. } => "room-join-error",
            ServerEvent::RoomNewMessage(_) => "room-new-message",
            ServerEvent::GameStarted { .. } => "game-started",
            ServerEvent::GameStateUpdate { .. } => "game-state-update",
            ServerEvent::GameEnded { .. } => "game-ended",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// One event together with the sessions it must reach
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub recipients: Vec<SessionId>,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn to(recipients: Vec<SessionId>, event: ServerEvent) -> Self {
        Self { recipients, event }
    }

    pub fn to_one(recipient: SessionId, event: ServerEvent) -> Self {
        Self {
            recipients: vec![recipient],
            event,
        }
    }

    pub fn is_for(&self, session_id: SessionId) -> bool {
        self.recipients.contains(&session_id)
    }
}
