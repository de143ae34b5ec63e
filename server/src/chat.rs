//! Bounded chat history for the lobby and for each room.

use serde::{Deserialize, Serialize};
use shared::{ChatScope, RoomId, SessionId, CHAT_CAPACITY, MAX_CHAT_LENGTH};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    pub session_id: SessionId,
    pub display_name: String,
    pub text: String,
    pub created_at: u64,
    pub scope: ChatScope,
    pub room_id: Option<RoomId>,
}

/// Trims chat text and caps its length. Returns `None` for blank input.
pub fn normalize_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(MAX_CHAT_LENGTH).collect())
}

/// Append-only log holding at most [`CHAT_CAPACITY`] messages in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatLog {
    messages: VecDeque<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self {
            messages: VecDeque::with_capacity(CHAT_CAPACITY),
        }
    }

    /// Appends a message, evicting the oldest ones past the cap.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > CHAT_CAPACITY {
            self.messages.pop_front();
        }
    }

    /// The newest `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ChatMessage> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
