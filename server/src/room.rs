//! Room lifecycle: creation, membership, host delegation and deletion
//!
//! A room always has between one and `max_players` members while it exists
//! and its host is always one of them. The last member leaving deletes the room
//! on the spot; a departing host hands over to the earliest remaining member.

use crate::chat::ChatLog;
use crate::error::LobbyError;
use crate::game::GameRound;
use crate::protocol::{Outbound, ServerEvent};
use crate::world::World;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use shared::{
    RoomId, RoomStatus, SessionId, ALLOWED_GAME_DURATIONS, DEFAULT_GAME_DURATION_SECONDS,
    DEFAULT_GAME_TYPE, DEFAULT_MAX_PLAYERS, MAX_PLAYERS, MAX_ROOM_NAME_LENGTH, MIN_PLAYERS,
};
use std::collections::BTreeMap;

/// Validated parameters of a new room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    pub name: String,
    pub max_players: usize,
    pub game_type: String,
    pub game_duration_seconds: u64,
}

impl RoomSettings {
    /// Applies defaults to the optional fields of a `create-room` request and
    /// checks every value against the allowed ranges.
    pub fn from_request(
        name: &str,
        max_players: Option<usize>,
        game_type: Option<&str>,
        game_duration_seconds: Option<u64>,
    ) -> Result<Self, LobbyError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LobbyError::validation("room name must not be empty"));
        }
        if name.chars().count() > MAX_ROOM_NAME_LENGTH {
            return Err(LobbyError::validation(format!(
                "room name must be at most {} characters",
                MAX_ROOM_NAME_LENGTH
            )));
        }

        let max_players = max_players.unwrap_or(DEFAULT_MAX_PLAYERS);
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
            return Err(LobbyError::validation(format!(
                "maxPlayers must be between {} and {}",
                MIN_PLAYERS, MAX_PLAYERS
            )));
        }

        let game_type = game_type.unwrap_or(DEFAULT_GAME_TYPE);
        if game_type != DEFAULT_GAME_TYPE {
            return Err(LobbyError::validation(format!(
                "unsupported game type {:?}",
                game_type
            )));
        }

        let game_duration_seconds = game_duration_seconds.unwrap_or(DEFAULT_GAME_DURATION_SECONDS);
        if !ALLOWED_GAME_DURATIONS.contains(&game_duration_seconds) {
            return Err(LobbyError::validation(format!(
                "gameDurationSeconds must be one of {:?}",
                ALLOWED_GAME_DURATIONS
            )));
        }

        Ok(Self {
            name: name.to_string(),
            max_players,
            game_type: game_type.to_string(),
            game_duration_seconds,
        })
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            name: "Room".to_string(),
            max_players: DEFAULT_MAX_PLAYERS,
            game_type: DEFAULT_GAME_TYPE.to_string(),
            game_duration_seconds: DEFAULT_GAME_DURATION_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub host_session_id: SessionId,
    /// Members in join order; the first one inherits host rights
    pub members: Vec<SessionId>,
    pub max_players: usize,
    pub status: RoomStatus,
    pub game_type: String,
    pub game_duration_seconds: u64,
    pub created_at: u64,
    /// Room-scoped history. Never serialised: rooms travel to the whole lobby
    /// in snapshots, and room messages reach members only as they are posted.
    #[serde(skip)]
    pub chat: ChatLog,
    pub game: Option<GameRound>,
}

impl Room {
    fn new(id: RoomId, host: SessionId, settings: RoomSettings, now: u64) -> Self {
        Self {
            id,
            name: settings.name,
            host_session_id: host,
            members: vec![host],
            max_players: settings.max_players,
            status: RoomStatus::Waiting,
            game_type: settings.game_type,
            game_duration_seconds: settings.game_duration_seconds,
            created_at: now,
            chat: ChatLog::new(),
            game: None,
        }
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.members.contains(&session_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players
    }

    pub fn is_host(&self, session_id: SessionId) -> bool {
        self.host_session_id == session_id
    }

    /// Members other than `session_id`
    pub fn others(&self, session_id: SessionId) -> Vec<SessionId> {
        self.members
            .iter()
            .copied()
            .filter(|id| *id != session_id)
            .collect()
    }

    /// Removes a member and, if it was the host, promotes the first remaining
    /// member. Returns true when the host changed.
    fn remove_member(&mut self, session_id: SessionId) -> bool {
        self.members.retain(|id| *id != session_id);
        if let Some(game) = self.game.as_mut() {
            game.remove_player(session_id);
        }

        if self.host_session_id == session_id {
            if let Some(&next) = self.members.first() {
                self.host_session_id = next;
                return true;
            }
        }
        false
    }
}

/// Owner of every live room, keyed by creation order
#[derive(Debug)]
pub struct RoomManager {
    rooms: BTreeMap<RoomId, Room>,
    next_room_id: RoomId,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: BTreeMap::new(),
            next_room_id: 1,
        }
    }

    fn create(&mut self, host: SessionId, settings: RoomSettings, now: u64) -> &Room {
        let id = self.next_room_id;
        self.next_room_id += 1;

        info!(
            "Room {} ({}) created by session {}, max {} players",
            id, settings.name, host, settings.max_players
        );
        self.rooms
            .entry(id)
            .or_insert_with(|| Room::new(id, host, settings, now))
    }

    fn remove(&mut self, room_id: RoomId) -> Option<Room> {
        let removed = self.rooms.remove(&room_id);
        if removed.is_some() {
            info!("Room {} deleted", room_id);
        }
        removed
    }

    pub fn get(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub(crate) fn get_mut(&mut self, room_id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&room_id)
    }

    pub fn contains(&self, room_id: RoomId) -> bool {
        self.rooms.contains_key(&room_id)
    }

    /// Ids of rooms with a round in progress
    pub fn playing(&self) -> Vec<RoomId> {
        self.rooms
            .values()
            .filter(|room| room.status == RoomStatus::Playing)
            .map(|room| room.id)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<Room> {
        self.rooms.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

impl World {
    /// Creates a room hosted by `session_id`, who becomes its first member.
    ///
    /// A session that already sits in another room leaves it first.
    pub fn create_room(
        &mut self,
        session_id: SessionId,
        settings: RoomSettings,
        now: u64,
    ) -> Result<Vec<Outbound>, LobbyError> {
        if !self.sessions.contains(session_id) {
            return Err(LobbyError::NotLoggedIn);
        }

        let mut outbound = self.leave_room(session_id);

        let room = self.rooms.create(session_id, settings, now).clone();
        self.sessions.set_current_room(session_id, Some(room.id));

        outbound.push(Outbound::to(
            self.sessions.ids(),
            ServerEvent::RoomCreated { room: room.clone() },
        ));
        outbound.push(Outbound::to_one(
            session_id,
            ServerEvent::RoomJoined { room },
        ));
        Ok(outbound)
    }

    /// Adds `session_id` to a waiting room with a free seat.
    pub fn join_room(
        &mut self,
        session_id: SessionId,
        room_id: RoomId,
    ) -> Result<Vec<Outbound>, LobbyError> {
        let current_room = self
            .sessions
            .get(session_id)
            .ok_or(LobbyError::NotLoggedIn)?
            .current_room_id;

        let room = self
            .rooms
            .get(room_id)
            .ok_or(LobbyError::RoomNotFound(room_id))?;
        if current_room == Some(room_id) {
            return Err(LobbyError::invalid_state("already in this room"));
        }
        if room.status != RoomStatus::Waiting {
            return Err(LobbyError::RoomNotJoinable(room_id));
        }
        if room.is_full() {
            return Err(LobbyError::RoomFull(room_id));
        }

        let mut outbound = self.leave_room(session_id);

        let Some(room) = self.rooms.get_mut(room_id) else {
            return Err(LobbyError::RoomNotFound(room_id));
        };
        room.members.push(session_id);
        let room = room.clone();
        self.sessions.set_current_room(session_id, Some(room_id));

        info!(
            "Session {} joined room {} ({}/{})",
            session_id,
            room_id,
            room.members.len(),
            room.max_players
        );

        outbound.push(Outbound::to_one(
            session_id,
            ServerEvent::RoomJoined { room: room.clone() },
        ));
        if let Some(session) = self.sessions.get(session_id) {
            outbound.push(Outbound::to(
                room.others(session_id),
                ServerEvent::RoomPlayerJoined {
                    session: session.clone(),
                    room,
                },
            ));
        }
        outbound.extend(self.lobby_state_update());
        Ok(outbound)
    }

    /// Removes `session_id` from its current room. No-op outside a room.
    pub fn leave_room(&mut self, session_id: SessionId) -> Vec<Outbound> {
        let Some(room_id) = self
            .sessions
            .get(session_id)
            .and_then(|s| s.current_room_id)
        else {
            return Vec::new();
        };
        self.sessions.set_current_room(session_id, None);

        let mut outbound = Vec::new();
        let Some(room) = self.rooms.get_mut(room_id) else {
            debug!(
                "Session {} referenced missing room {}",
                session_id, room_id
            );
            return outbound;
        };

        let host_changed = room.remove_member(session_id);
        info!("Session {} left room {}", session_id, room_id);

        if room.members.is_empty() {
            self.rooms.remove(room_id);
            outbound.push(Outbound::to(
                self.sessions.ids(),
                ServerEvent::RoomDeleted { room_id },
            ));
        } else {
            if host_changed {
                info!(
                    "Room {} host passed to session {}",
                    room_id, room.host_session_id
                );
            }
            let display_name = self
                .sessions
                .display_name(session_id)
                .unwrap_or_default()
                .to_string();
            outbound.push(Outbound::to(
                room.members.clone(),
                ServerEvent::RoomPlayerLeft {
                    session_id,
                    display_name,
                    room: room.clone(),
                },
            ));
        }

        outbound.extend(self.lobby_state_update());
        outbound
    }
}
