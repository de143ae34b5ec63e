use serde::{Deserialize, Serialize};

pub type SessionId = u32;
pub type RoomId = u32;

pub const GRID_SIZE: i32 = 20;
pub const FOOD_TARGET: usize = 5;
pub const FOOD_SCORE: u32 = 10;
pub const AVATAR_ORIGIN: Cell = Cell { x: 10, y: 10 };

pub const CHAT_CAPACITY: usize = 100;
pub const SNAPSHOT_CHAT_LIMIT: usize = 50;
pub const MAX_CHAT_LENGTH: usize = 200;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 20;
pub const MAX_ROOM_NAME_LENGTH: usize = 32;

pub const DEFAULT_MAX_PLAYERS: usize = 4;
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 8;
pub const DEFAULT_GAME_TYPE: &str = "fruit-eating";
pub const DEFAULT_GAME_DURATION_SECONDS: u64 = 60;
pub const ALLOWED_GAME_DURATIONS: [u64; 2] = [30, 60];

/// One square of the arena grid.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Moves one step in `direction`, clamping at the grid edge instead of wrapping.
    pub fn step(self, direction: Direction) -> Cell {
        let (dx, dy) = direction.delta();
        Cell {
            x: (self.x + dx).clamp(0, GRID_SIZE - 1),
            y: (self.y + dy).clamp(0, GRID_SIZE - 1),
        }
    }

    pub fn in_bounds(&self) -> bool {
        (0..GRID_SIZE).contains(&self.x) && (0..GRID_SIZE).contains(&self.y)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Screen coordinates: `y` grows downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Online,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatScope {
    Lobby,
    Room,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

/// Category of a rejected operation, reported back to the originating session only.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    ValidationError,
    NotLoggedIn,
    NotHost,
    RoomNotFound,
    RoomNotJoinable,
    RoomFull,
    InvalidState,
}

/// Events sent from a client to the server.
///
/// Encoded as `{"event": "<kebab-case name>", "data": {...}}`; unit events omit `data`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    Login {
        display_name: String,
    },
    LobbyChat {
        text: String,
    },
    RoomChat {
        text: String,
    },
    CreateRoom {
        name: String,
        #[serde(default)]
        max_players: Option<usize>,
        #[serde(default)]
        game_type: Option<String>,
        #[serde(default)]
        game_duration_seconds: Option<u64>,
    },
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom,
    StartGame,
    GameAction {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        direction: Option<Direction>,
    },
    EndGame,
    RequestLobby,
}

impl ClientEvent {
    pub fn move_to(direction: Direction) -> Self {
        ClientEvent::GameAction {
            kind: "move".to_string(),
            direction: Some(direction),
        }
    }
}
