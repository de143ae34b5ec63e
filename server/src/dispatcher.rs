//! Translates inbound client events into world operations
//!
//! The dispatcher owns the [`World`] and is the only thing that mutates it.
//! Every call runs to completion before the next one starts, so no locking is
//! needed around sessions, rooms or rounds. Failed operations produce a single
//! error event addressed to the originating session.

use crate::error::LobbyError;
use crate::protocol::{Outbound, ServerEvent};
use crate::room::RoomSettings;
use crate::world::World;
use log::debug;
use shared::{ClientEvent, SessionId};

/// Parses one text frame into a typed event.
pub fn parse_event(text: &str) -> Result<ClientEvent, LobbyError> {
    serde_json::from_str(text).map_err(|e| LobbyError::validation(format!("malformed event: {}", e)))
}

pub struct Dispatcher {
    world: World,
}

impl Dispatcher {
    pub fn new(world: World) -> Self {
        Self { world }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Handles a raw text frame from `session_id`.
    pub fn handle_text(&mut self, session_id: SessionId, text: &str, now: u64) -> Vec<Outbound> {
        match parse_event(text) {
            Ok(event) => self.handle_event(session_id, event, now),
            Err(err) => {
                debug!("Rejected frame from session {}: {}", session_id, err);
                vec![Outbound::to_one(session_id, ServerEvent::error(&err))]
            }
        }
    }

    pub fn handle_event(
        &mut self,
        session_id: SessionId,
        event: ClientEvent,
        now: u64,
    ) -> Vec<Outbound> {
        let joining = matches!(event, ClientEvent::JoinRoom { .. });

        match self.apply(session_id, event, now) {
            Ok(outbound) => outbound,
            Err(err) => {
                debug!("Session {} operation failed: {}", session_id, err);
                let event = if joining {
                    ServerEvent::join_error(&err)
                } else {
                    ServerEvent::error(&err)
                };
                vec![Outbound::to_one(session_id, event)]
            }
        }
    }

    fn apply(
        &mut self,
        session_id: SessionId,
        event: ClientEvent,
        now: u64,
    ) -> Result<Vec<Outbound>, LobbyError> {
        let world = &mut self.world;

        match event {
            ClientEvent::Login { display_name } => world.login(session_id, &display_name, now),
            ClientEvent::LobbyChat { text } => Ok(world.post_lobby_message(session_id, &text, now)),
            ClientEvent::RoomChat { text } => Ok(world.post_room_message(session_id, &text, now)),
            ClientEvent::CreateRoom {
                name,
                max_players,
                game_type,
                game_duration_seconds,
            } => {
                let settings = RoomSettings::from_request(
                    &name,
                    max_players,
                    game_type.as_deref(),
                    game_duration_seconds,
                )?;
                world.create_room(session_id, settings, now)
            }
            ClientEvent::JoinRoom { room_id } => world.join_room(session_id, room_id),
            ClientEvent::LeaveRoom => Ok(world.leave_room(session_id)),
            ClientEvent::StartGame => world.start_game(session_id, now),
            ClientEvent::GameAction { kind, direction } => {
                if kind != "move" {
                    debug!("Ignoring game action {:?} from {}", kind, session_id);
                    return Ok(Vec::new());
                }
                let direction = direction
                    .ok_or_else(|| LobbyError::validation("move requires a direction"))?;
                Ok(world.apply_move(session_id, direction))
            }
            ClientEvent::EndGame => world.end_game(session_id),
            ClientEvent::RequestLobby => Ok(vec![Outbound::to_one(
                session_id,
                world.lobby_snapshot(),
            )]),
        }
    }

    /// The connection behind `session_id` closed.
    pub fn handle_disconnect(&mut self, session_id: SessionId) -> Vec<Outbound> {
        self.world.disconnect(session_id)
    }

    /// Periodic lobby snapshot broadcast.
    pub fn lobby_tick(&self) -> Vec<Outbound> {
        self.world.lobby_state_update().into_iter().collect()
    }

    /// Periodic sweep ending overdue rounds.
    pub fn expiry_sweep(&mut self, now: u64) -> Vec<Outbound> {
        self.world.expire_rounds(now)
    }
}
