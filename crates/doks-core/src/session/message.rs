//! Conversation message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A citation pointing to a retrieved document chunk backing an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    /// Identifier of the uploaded document.
    pub document_id: String,
    /// 1-based page number of the excerpt.
    pub page: u32,
    /// Retrieval score reported by the API.
    pub score: f64,
    /// The retrieved text.
    pub excerpt_text: String,
}

/// A single message in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Position within the session, assigned at append time.
    pub id: u64,
    /// Message text (markdown for assistant answers).
    pub content: String,
    pub is_from_user: bool,
    pub timestamp: DateTime<Utc>,
    /// True while an answer is still being revealed.
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// A message before it has been assigned an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub content: String,
    pub is_from_user: bool,
    pub is_streaming: bool,
    pub sources: Vec<SourceRef>,
    pub confidence: Option<f64>,
}

impl NewMessage {
    /// A question typed by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_from_user: true,
            is_streaming: false,
            sources: Vec::new(),
            confidence: None,
        }
    }

    /// An empty assistant message that will be filled by a reveal.
    pub fn assistant_placeholder() -> Self {
        Self {
            content: String::new(),
            is_from_user: false,
            is_streaming: true,
            sources: Vec::new(),
            confidence: None,
        }
    }

    /// A complete assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_from_user: false,
            is_streaming: false,
            sources: Vec::new(),
            confidence: None,
        }
    }

    /// Assigns the id and timestamp, producing a stored message.
    pub fn into_message(self, id: u64, timestamp: DateTime<Utc>) -> Message {
        Message {
            id,
            content: self.content,
            is_from_user: self.is_from_user,
            timestamp,
            is_streaming: self.is_streaming,
            sources: self.sources,
            confidence: self.confidence,
        }
    }
}

/// Partial update merged into an existing message. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub is_streaming: Option<bool>,
    pub sources: Option<Vec<SourceRef>>,
    pub confidence: Option<f64>,
}

impl MessagePatch {
    /// Patch that replaces the content and finishes streaming.
    pub fn finished(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_streaming: Some(false),
            ..Self::default()
        }
    }

    /// Applies the present fields to `message`.
    pub fn apply(self, message: &mut Message) {
        if let Some(content) = self.content {
            message.content = content;
        }
        if let Some(is_streaming) = self.is_streaming {
            message.is_streaming = is_streaming;
        }
        if let Some(sources) = self.sources {
            message.sources = sources;
        }
        if let Some(confidence) = self.confidence {
            message.confidence = Some(confidence.clamp(0.0, 1.0));
        }
    }
}

/// Citation metadata attached while an answer is revealed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerMetadata {
    pub sources: Vec<SourceRef>,
    pub confidence: Option<f64>,
}
