use super::message::Message;
use serde::{Deserialize, Serialize};

/// Change notifications published by the conversation store.
///
/// Each message event carries a full snapshot of the message after the change,
/// so subscribers never need to read the store back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    SessionCreated {
        session_id: String,
    },
    MessageAppended {
        session_id: String,
        message: Message,
    },
    MessageUpdated {
        session_id: String,
        message: Message,
    },
    SessionCleared {
        session_id: String,
    },
    CurrentSessionChanged {
        session_id: Option<String>,
    },
}

impl ConversationEvent {
    /// The session this event concerns, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::SessionCreated { session_id }
            | Self::MessageAppended { session_id, .. }
            | Self::MessageUpdated { session_id, .. }
            | Self::SessionCleared { session_id } => Some(session_id),
            Self::CurrentSessionChanged { session_id } => session_id.as_deref(),
        }
    }
}
