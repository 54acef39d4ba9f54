//! Query domain module.
//!
//! Request/response types for `POST <base>/query` and the trait the
//! conversation store calls to get an answer.

use crate::error::{DoksError, Result};
use crate::session::SourceRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Longest question the API accepts, in characters.
pub const MAX_QUESTION_CHARS: usize = 1000;

/// Body of `POST <base>/query`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    /// Restricts retrieval to one document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(rename = "conversationId", skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
            min_score: None,
            doc_id: None,
            conversation_id: None,
        }
    }

    /// Checks the question length bounds (1..=1000 characters).
    pub fn validate(&self) -> Result<()> {
        let chars = self.question.chars().count();
        if chars == 0 {
            return Err(DoksError::invalid_input("question must not be empty"));
        }
        if chars > MAX_QUESTION_CHARS {
            return Err(DoksError::invalid_input(format!(
                "question is {} characters long, the limit is {}",
                chars, MAX_QUESTION_CHARS
            )));
        }
        Ok(())
    }
}

/// A generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Successful query result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    pub answer: Answer,
    pub conversation_id: Option<String>,
    pub turn_id: Option<String>,
    pub used_memory: bool,
}

/// What the Query API said about a question.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Answered(QueryAnswer),
    /// `success: false` with the API's error text and code.
    Rejected { error: String, code: String },
}

/// Raw response body, covering both the success and the failure shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponseBody {
    pub success: bool,
    #[serde(default)]
    pub answer: Option<Answer>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub turn_id: Option<String>,
    #[serde(default)]
    pub used_memory: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl QueryResponseBody {
    /// Converts the wire body into an outcome.
    ///
    /// A body claiming success without an answer is a decode error.
    pub fn into_outcome(self) -> Result<QueryOutcome> {
        if !self.success {
            return Ok(QueryOutcome::Rejected {
                error: self.error.unwrap_or_else(|| "Unknown error".to_string()),
                code: self.code.unwrap_or_else(|| "UNKNOWN".to_string()),
            });
        }

        let answer = self
            .answer
            .ok_or_else(|| DoksError::Decode("successful query response has no answer".into()))?;

        Ok(QueryOutcome::Answered(QueryAnswer {
            answer,
            conversation_id: self.conversation_id,
            turn_id: self.turn_id,
            used_memory: self.used_memory.unwrap_or(false),
        }))
    }
}

/// Remote question-answering endpoint.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Sends one question. API-reported failures are `Ok(QueryOutcome::Rejected)`;
    /// `Err` is reserved for transport and decoding problems.
    async fn query(&self, request: QueryRequest) -> Result<QueryOutcome>;
}
