//! Lobby-level session tracking
//!
//! A session is created by the `login` event of a connection and lives until
//! that connection disconnects. The registry is the only owner of session
//! records; rooms refer to sessions by id.

use crate::error::LobbyError;
use log::info;
use serde::{Deserialize, Serialize};
use shared::{RoomId, SessionId, SessionStatus, MAX_DISPLAY_NAME_LENGTH};
use std::collections::BTreeMap;

/// A logged-in client and its lobby attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Connection-scoped identifier assigned by the transport
    pub id: SessionId,
    /// Self-asserted name shown to other players
    pub display_name: String,
    pub status: SessionStatus,
    /// Login time in epoch milliseconds
    pub joined_at: u64,
    /// Back-reference to the room this session is a member of
    pub current_room_id: Option<RoomId>,
}

impl Session {
    pub fn new(id: SessionId, display_name: String, joined_at: u64) -> Self {
        Self {
            id,
            display_name,
            status: SessionStatus::Online,
            joined_at,
            current_room_id: None,
        }
    }
}

/// Trims a display name and rejects blank or overlong input.
pub fn validate_display_name(raw: &str) -> Result<String, LobbyError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(LobbyError::validation("display name must not be empty"));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(LobbyError::validation(format!(
            "display name must be at most {} characters",
            MAX_DISPLAY_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

/// All sessions currently in the lobby, ordered by id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
        }
    }

    /// Registers `id` as online under `display_name`
    ///
    /// Logging in again on the same id replaces the previous record. The room
    /// back-reference is carried over so an existing membership stays consistent.
    pub fn login(
        &mut self,
        id: SessionId,
        display_name: &str,
        now: u64,
    ) -> Result<Session, LobbyError> {
        let display_name = validate_display_name(display_name)?;
        let mut session = Session::new(id, display_name, now);

        if let Some(previous) = self.sessions.get(&id) {
            session.current_room_id = previous.current_room_id;
            info!(
                "Session {} re-logged in as {} (was {})",
                id, session.display_name, previous.display_name
            );
        } else {
            info!("Session {} logged in as {}", id, session.display_name);
        }

        self.sessions.insert(id, session.clone());
        Ok(session)
    }

    /// Removes a session, returning its last record. Unknown ids are a no-op.
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let removed = self.sessions.remove(&id);
        if let Some(session) = &removed {
            info!("Session {} ({}) left the lobby", id, session.display_name);
        }
        removed
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn set_current_room(&mut self, id: SessionId, room_id: Option<RoomId>) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.current_room_id = room_id;
        }
    }

    pub fn display_name(&self, id: SessionId) -> Option<&str> {
        self.sessions.get(&id).map(|s| s.display_name.as_str())
    }

    /// Ids of every lobby session, the audience of lobby-wide broadcasts
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
