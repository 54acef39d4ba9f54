//! Session domain module.
//!
//! This module contains the conversation model: sessions, their messages,
//! the citations attached to answers, and the events published when any of
//! them change.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`)
//! - `message`: Message types (`Message`, `NewMessage`, `MessagePatch`, `SourceRef`)
//! - `event`: Change notifications (`ConversationEvent`)

mod event;
mod message;
mod model;

// Re-export public API
pub use event::ConversationEvent;
pub use message::{AnswerMetadata, Message, MessagePatch, NewMessage, SourceRef};
pub use model::Session;
