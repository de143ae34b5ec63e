//! Process-wide lobby state
//!
//! `World` owns the session registry, the lobby chat log and the room manager.
//! It is mutated by exactly one caller at a time (the dispatcher), and every
//! operation returns the broadcasts it produced so the caller can fan them out
//! after the mutation has completed.
//!
//! Lobby and chat operations live here; room lifecycle operations are in
//! [`crate::room`] and round operations in [`crate::game`].

use crate::chat::{normalize_text, ChatLog, ChatMessage};
use crate::error::LobbyError;
use crate::protocol::{Outbound, ServerEvent};
use crate::room::RoomManager;
use crate::session::SessionRegistry;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ChatScope, SessionId, SNAPSHOT_CHAT_LIMIT};

pub struct World {
    pub(crate) sessions: SessionRegistry,
    pub(crate) lobby_chat: ChatLog,
    pub(crate) rooms: RoomManager,
    pub(crate) rng: StdRng,
    next_message_id: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A world with reproducible food placement and colours.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            lobby_chat: ChatLog::new(),
            rooms: RoomManager::new(),
            rng,
            next_message_id: 1,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn lobby_chat(&self) -> &ChatLog {
        &self.lobby_chat
    }

    /// Registers a session and announces it to the lobby.
    pub fn login(
        &mut self,
        session_id: SessionId,
        display_name: &str,
        now: u64,
    ) -> Result<Vec<Outbound>, LobbyError> {
        let session = self.sessions.login(session_id, display_name, now)?;

        Ok(vec![
            Outbound::to_one(
                session_id,
                ServerEvent::LoggedIn {
                    session: session.clone(),
                },
            ),
            Outbound::to(
                self.sessions.ids(),
                ServerEvent::LobbyPlayerJoined { session },
            ),
        ])
    }

    /// Handles a closed connection: leaves any room, then drops the session.
    pub fn disconnect(&mut self, session_id: SessionId) -> Vec<Outbound> {
        let mut outbound = self.leave_room(session_id);

        if self.sessions.remove(session_id).is_some() {
            outbound.push(Outbound::to(
                self.sessions.ids(),
                ServerEvent::LobbyPlayerLeft { session_id },
            ));
            if let Some(update) = self.lobby_state_update() {
                outbound.push(update);
            }
        }

        outbound
    }

    fn next_message(
        &mut self,
        session_id: SessionId,
        text: String,
        now: u64,
        scope: ChatScope,
    ) -> Option<ChatMessage> {
        let session = self.sessions.get(session_id)?;
        let message = ChatMessage {
            id: self.next_message_id,
            session_id,
            display_name: session.display_name.clone(),
            text,
            created_at: now,
            scope,
            room_id: match scope {
                ChatScope::Lobby => None,
                ChatScope::Room => session.current_room_id,
            },
        };
        self.next_message_id += 1;
        Some(message)
    }

    /// Posts to the lobby chat. Unknown sessions and blank text are ignored.
    pub fn post_lobby_message(
        &mut self,
        session_id: SessionId,
        text: &str,
        now: u64,
    ) -> Vec<Outbound> {
        let Some(text) = normalize_text(text) else {
            return Vec::new();
        };
        let Some(message) = self.next_message(session_id, text, now, ChatScope::Lobby) else {
            debug!("Dropping lobby chat from unknown session {}", session_id);
            return Vec::new();
        };

        self.lobby_chat.push(message.clone());
        vec![Outbound::to(
            self.sessions.ids(),
            ServerEvent::LobbyNewMessage(message),
        )]
    }

    /// Posts to the chat of the sender's current room, reaching only its members.
    pub fn post_room_message(
        &mut self,
        session_id: SessionId,
        text: &str,
        now: u64,
    ) -> Vec<Outbound> {
        let Some(text) = normalize_text(text) else {
            return Vec::new();
        };
        let Some(room_id) = self
            .sessions
            .get(session_id)
            .and_then(|s| s.current_room_id)
        else {
            return Vec::new();
        };
        if !self.rooms.contains(room_id) {
            return Vec::new();
        }
        let Some(message) = self.next_message(session_id, text, now, ChatScope::Room) else {
            return Vec::new();
        };

        match self.rooms.get_mut(room_id) {
            Some(room) => {
                room.chat.push(message.clone());
                vec![Outbound::to(
                    room.members.clone(),
                    ServerEvent::RoomNewMessage(message),
                )]
            }
            None => Vec::new(),
        }
    }

    /// Periodic lobby broadcast; `None` when nobody is logged in.
    pub fn lobby_state_update(&self) -> Option<Outbound> {
        if self.sessions.is_empty() {
            return None;
        }
        Some(Outbound::to(
            self.sessions.ids(),
            ServerEvent::LobbyStateUpdate {
                players: self.sessions.snapshot(),
                rooms: self.rooms.snapshot(),
            },
        ))
    }

    /// Read-only lobby view for polling clients.
    pub fn lobby_snapshot(&self) -> ServerEvent {
        ServerEvent::LobbySnapshot {
            players: self.sessions.snapshot(),
            messages: self.lobby_chat.recent(SNAPSHOT_CHAT_LIMIT),
            rooms: self.rooms.snapshot(),
        }
    }
}
