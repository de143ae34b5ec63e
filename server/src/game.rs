//! Fruit-eating arena rounds
//!
//! Each room in the `playing` state owns one [`GameRound`]: a 20x20 grid with
//! a handful of food cells and one avatar per member present at round start.
//! Rounds advance only on player moves; the expiry sweep ends them once their
//! duration has elapsed.

use crate::error::LobbyError;
use crate::protocol::{Outbound, ServerEvent, Winner};
use crate::room::Room;
use crate::world::World;
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::{
    Cell, Direction, RoomId, RoomStatus, SessionId, AVATAR_ORIGIN, FOOD_SCORE, FOOD_TARGET,
    GRID_SIZE,
};
use std::collections::BTreeMap;

/// Per-player state inside a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerGameState {
    pub score: u32,
    /// Head first
    pub avatar_body: Vec<Cell>,
    pub direction: Direction,
    pub color: String,
}

impl PlayerGameState {
    fn new(color: String) -> Self {
        Self {
            score: 0,
            avatar_body: vec![AVATAR_ORIGIN],
            direction: Direction::Right,
            color,
        }
    }

    pub fn head(&self) -> Cell {
        self.avatar_body.first().copied().unwrap_or(AVATAR_ORIGIN)
    }
}

/// Result of applying a single move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The player has no state in this round
    Ignored,
    /// The next head would overlap the avatar's own body
    Blocked,
    Moved,
    /// Moved onto a food cell
    Ate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRound {
    pub started_at: u64,
    pub duration_ms: u64,
    pub food: Vec<Cell>,
    pub per_player: BTreeMap<SessionId, PlayerGameState>,
}

pub fn random_cell<R: Rng>(rng: &mut R) -> Cell {
    Cell::new(rng.gen_range(0..GRID_SIZE), rng.gen_range(0..GRID_SIZE))
}

pub fn random_color<R: Rng>(rng: &mut R) -> String {
    format!("hsl({}, 70%, 50%)", rng.gen_range(0..360))
}

impl GameRound {
    /// Starts a round for `members`. Food placement ignores occupancy.
    pub fn start<R: Rng>(
        members: &[SessionId],
        now: u64,
        duration_seconds: u64,
        rng: &mut R,
    ) -> Self {
        let per_player = members
            .iter()
            .map(|id| (*id, PlayerGameState::new(random_color(rng))))
            .collect();
        let food = (0..FOOD_TARGET).map(|_| random_cell(rng)).collect();

        Self {
            started_at: now,
            duration_ms: duration_seconds * 1000,
            food,
            per_player,
        }
    }

    /// Turns the player towards `direction` and moves the avatar one cell.
    ///
    /// The stored direction changes even when the move is blocked. The avatar
    /// keeps its length; eating scores [`FOOD_SCORE`] and tops the food back up.
    pub fn apply_move<R: Rng>(
        &mut self,
        session_id: SessionId,
        direction: Direction,
        rng: &mut R,
    ) -> MoveOutcome {
        let Some(player) = self.per_player.get_mut(&session_id) else {
            return MoveOutcome::Ignored;
        };

        player.direction = direction;
        let next = player.head().step(direction);
        if player.avatar_body.contains(&next) {
            return MoveOutcome::Blocked;
        }

        player.avatar_body.insert(0, next);
        player.avatar_body.pop();

        let Some(index) = self.food.iter().position(|cell| *cell == next) else {
            return MoveOutcome::Moved;
        };
        player.score += FOOD_SCORE;
        self.food.remove(index);
        if self.food.len() < FOOD_TARGET {
            self.food.push(random_cell(rng));
        }
        MoveOutcome::Ate
    }

    pub fn remove_player(&mut self, session_id: SessionId) {
        self.per_player.remove(&session_id);
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.started_at) >= self.duration_ms
    }

    pub fn scores(&self) -> BTreeMap<SessionId, u32> {
        self.per_player
            .iter()
            .map(|(id, state)| (*id, state.score))
            .collect()
    }

    /// Highest scorer, walking `order` first so ties go to the earliest member.
    pub fn leader(&self, order: &[SessionId]) -> Option<(SessionId, u32)> {
        let ordered = order
            .iter()
            .filter(|id| self.per_player.contains_key(*id))
            .chain(self.per_player.keys().filter(|id| !order.contains(*id)));

        let mut best: Option<(SessionId, u32)> = None;
        for id in ordered {
            let score = self.per_player[id].score;
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((*id, score));
            }
        }
        best
    }
}

impl World {
    fn hosted_room(&self, session_id: SessionId) -> Result<RoomId, LobbyError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(LobbyError::NotLoggedIn)?;
        let room_id = session.current_room_id.ok_or(LobbyError::NotHost)?;
        let room = self
            .rooms
            .get(room_id)
            .ok_or(LobbyError::RoomNotFound(room_id))?;
        if !room.is_host(session_id) {
            return Err(LobbyError::NotHost);
        }
        Ok(room_id)
    }

    /// Host-only: starts a new round from `waiting` or `finished`.
    pub fn start_game(
        &mut self,
        session_id: SessionId,
        now: u64,
    ) -> Result<Vec<Outbound>, LobbyError> {
        let room_id = self.hosted_room(session_id)?;
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Err(LobbyError::RoomNotFound(room_id));
        };
        if room.status == RoomStatus::Playing {
            return Err(LobbyError::invalid_state("a round is already running"));
        }

        let game = GameRound::start(&room.members, now, room.game_duration_seconds, &mut self.rng);
        room.status = RoomStatus::Playing;
        room.game = Some(game.clone());
        let room = room.clone();

        info!(
            "Room {} started a {}s round with {} players",
            room_id,
            room.game_duration_seconds,
            room.members.len()
        );

        let mut outbound = vec![Outbound::to(
            room.members.clone(),
            ServerEvent::GameStarted { room, game },
        )];
        outbound.extend(self.lobby_state_update());
        Ok(outbound)
    }

    /// Applies a move from `session_id` to its room's running round.
    ///
    /// Silently ignored outside a running round or for players who joined
    /// after the round started.
    pub fn apply_move(&mut self, session_id: SessionId, direction: Direction) -> Vec<Outbound> {
        let Some(room_id) = self
            .sessions
            .get(session_id)
            .and_then(|s| s.current_room_id)
        else {
            return Vec::new();
        };
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Vec::new();
        };
        if room.status != RoomStatus::Playing {
            return Vec::new();
        }
        let Some(game) = room.game.as_mut() else {
            return Vec::new();
        };

        let outcome = game.apply_move(session_id, direction, &mut self.rng);
        if outcome == MoveOutcome::Ignored {
            debug!(
                "Session {} has no avatar in room {}, move dropped",
                session_id, room_id
            );
            return Vec::new();
        }

        vec![Outbound::to(
            room.members.clone(),
            ServerEvent::GameStateUpdate {
                room_id,
                game: game.clone(),
            },
        )]
    }

    /// Host-only: ends the running round early.
    pub fn end_game(&mut self, session_id: SessionId) -> Result<Vec<Outbound>, LobbyError> {
        let room_id = self.hosted_room(session_id)?;
        match self.rooms.get(room_id) {
            Some(room) if room.status == RoomStatus::Playing => Ok(self.finish_round(room_id)),
            Some(_) => Err(LobbyError::invalid_state("no round is running")),
            None => Err(LobbyError::RoomNotFound(room_id)),
        }
    }

    /// Ends every round whose duration has elapsed, as if its host had asked.
    pub fn expire_rounds(&mut self, now: u64) -> Vec<Outbound> {
        let expired: Vec<RoomId> = self
            .rooms
            .playing()
            .into_iter()
            .filter(|room_id| {
                self.rooms
                    .get(*room_id)
                    .and_then(|room| room.game.as_ref())
                    .map_or(true, |game| game.is_expired(now))
            })
            .collect();

        let mut outbound = Vec::new();
        for room_id in expired {
            info!("Room {} round time is up", room_id);
            outbound.extend(self.finish_round(room_id));
        }
        outbound
    }

    /// Moves a playing room to `finished`, discarding its round.
    ///
    /// `game-ended` is only sent when at least one player had state. The lobby
    /// always hears about the status change.
    fn finish_round(&mut self, room_id: RoomId) -> Vec<Outbound> {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Vec::new();
        };
        let game = room.game.take();
        room.status = RoomStatus::Finished;
        let room = room.clone();

        let mut outbound: Vec<Outbound> = game
            .and_then(|game| self.game_ended(room, game))
            .into_iter()
            .collect();
        outbound.extend(self.lobby_state_update());
        outbound
    }

    fn game_ended(&self, room: Room, game: GameRound) -> Option<Outbound> {
        let Some((winner_id, score)) = game.leader(&room.members) else {
            info!("Room {} round ended with no players", room.id);
            return None;
        };

        let winner = Winner {
            session_id: winner_id,
            display_name: self
                .sessions
                .display_name(winner_id)
                .unwrap_or_default()
                .to_string(),
            score,
        };
        info!(
            "Room {} round won by {} with {} points",
            room.id, winner.display_name, score
        );

        Some(Outbound::to(
            room.members.clone(),
            ServerEvent::GameEnded {
                room,
                winner,
                scores: game.scores(),
            },
        ))
    }
}
