//! Conversation application services.
//!
//! This module owns in-memory chat sessions and turns answers from the
//! Query API into progressively revealed assistant messages.

mod reveal;
mod store;

pub use reveal::word_prefixes;
pub use store::ConversationStore;
