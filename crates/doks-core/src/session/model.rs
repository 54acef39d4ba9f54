//! Session domain model.

use super::message::{Message, MessagePatch, NewMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One conversation thread: an ordered list of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique identifier (UUID v4).
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Conversation id assigned by the remote API, sent back on follow-up questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl Session {
    /// Creates an empty session.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            conversation_id: None,
        }
    }

    /// Appends a message and returns its id.
    ///
    /// The id is the message count before the append. Messages are never
    /// removed, so ids stay equal to their index.
    pub fn push(&mut self, message: NewMessage) -> u64 {
        let now = Utc::now();
        let id = self.messages.len() as u64;
        self.messages.push(message.into_message(id, now));
        self.updated_at = now;
        id
    }

    /// Merges `patch` into the message with `message_id`.
    ///
    /// Returns `false` when there is no such message.
    pub fn patch(&mut self, message_id: u64, patch: MessagePatch) -> bool {
        let Some(message) = self.message_mut(message_id) else {
            return false;
        };
        patch.apply(message);
        self.updated_at = Utc::now();
        true
    }

    pub fn message(&self, message_id: u64) -> Option<&Message> {
        self.messages.get(usize::try_from(message_id).ok()?)
    }

    fn message_mut(&mut self, message_id: u64) -> Option<&mut Message> {
        self.messages.get_mut(usize::try_from(message_id).ok()?)
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
