use super::reveal::word_prefixes;
use doks_core::config::QueryConfig;
use doks_core::health::{HealthSink, NoOpHealthSink};
use doks_core::query::{QueryApi, QueryOutcome, QueryRequest};
use doks_core::schedule::{Delay, TokioDelay};
use doks_core::session::{
    AnswerMetadata, ConversationEvent, Message, MessagePatch, NewMessage, Session,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast, watch};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

/// In-memory chat sessions and the ask/reveal flow.
///
/// `ConversationStore` is responsible for:
/// - Creating, switching and clearing sessions
/// - Appending and patching messages with sequential ids
/// - Sending questions to the Query API and revealing answers word by word
/// - Publishing every change as a [`ConversationEvent`]
///
/// Unknown session or message ids are silent no-ops reported through return
/// values. Callers must not run overlapping `ask` calls on one session.
pub struct ConversationStore {
    sessions: RwLock<HashMap<String, Session>>,
    current_session_id: RwLock<Option<String>>,
    query_api: Arc<dyn QueryApi>,
    /// Notified when a query fails at the transport level
    health_sink: Arc<dyn HealthSink>,
    delay: Arc<dyn Delay>,
    options: QueryConfig,
    events: broadcast::Sender<ConversationEvent>,
    in_flight: AtomicUsize,
    loading: watch::Sender<bool>,
}

impl ConversationStore {
    /// Creates an empty store.
    ///
    /// # Arguments
    ///
    /// * `query_api` - The question-answering endpoint
    /// * `options` - Retrieval parameters and reveal pacing
    pub fn new(query_api: Arc<dyn QueryApi>, options: QueryConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (loading, _) = watch::channel(false);
        Self {
            sessions: RwLock::new(HashMap::new()),
            current_session_id: RwLock::new(None),
            query_api,
            health_sink: Arc::new(NoOpHealthSink),
            delay: Arc::new(TokioDelay),
            options,
            events,
            in_flight: AtomicUsize::new(0),
            loading,
        }
    }

    /// Routes transport failures of queries to `health_sink`.
    pub fn with_health_sink(mut self, health_sink: Arc<dyn HealthSink>) -> Self {
        self.health_sink = health_sink;
        self
    }

    /// Replaces the pause used between revealed words.
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Receiver for every subsequent change.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    /// True while at least one `ask` is in progress.
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    fn publish(&self, event: ConversationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // ============================================================================
    // Sessions
    // ============================================================================

    /// Creates a session and makes it current.
    ///
    /// A non-blank `initial_question` becomes message 0. No answer is
    /// requested; call [`ConversationStore::ask`] for that.
    pub async fn create_session(&self, initial_question: Option<&str>) -> String {
        let session_id = Uuid::new_v4().to_string();
        let mut session = Session::new(session_id.clone());

        let seeded = initial_question
            .map(str::trim)
            .filter(|question| !question.is_empty())
            .map(|question| {
                session.push(NewMessage::user(question));
                session.messages[0].clone()
            });

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), session);
        tracing::debug!("[ConversationStore] Created session {}", session_id);

        self.publish(ConversationEvent::SessionCreated {
            session_id: session_id.clone(),
        });
        if let Some(message) = seeded {
            self.publish(ConversationEvent::MessageAppended {
                session_id: session_id.clone(),
                message,
            });
        }

        *self.current_session_id.write().await = Some(session_id.clone());
        self.publish(ConversationEvent::CurrentSessionChanged {
            session_id: Some(session_id.clone()),
        });

        session_id
    }

    /// Makes `session_id` current. Returns `false` for unknown sessions.
    pub async fn set_current_session(&self, session_id: &str) -> bool {
        if !self.sessions.read().await.contains_key(session_id) {
            return false;
        }
        *self.current_session_id.write().await = Some(session_id.to_string());
        self.publish(ConversationEvent::CurrentSessionChanged {
            session_id: Some(session_id.to_string()),
        });
        true
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.current_session_id.read().await.clone()
    }

    /// Snapshot of the current session.
    pub async fn current_session(&self) -> Option<Session> {
        let id = self.current_session_id().await?;
        self.session(&id).await
    }

    /// Snapshot of one session.
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Snapshot of one message.
    pub async fn message(&self, session_id: &str, message_id: u64) -> Option<Message> {
        self.sessions
            .read()
            .await
            .get(session_id)?
            .message(message_id)
            .cloned()
    }

    /// Removes a session. Clears the current pointer if it pointed there.
    ///
    /// Returns `false` when the session did not exist.
    pub async fn clear_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if !removed {
            return false;
        }
        self.publish(ConversationEvent::SessionCleared {
            session_id: session_id.to_string(),
        });

        let mut current = self.current_session_id.write().await;
        if current.as_deref() == Some(session_id) {
            *current = None;
            drop(current);
            self.publish(ConversationEvent::CurrentSessionChanged { session_id: None });
        }

        tracing::debug!("[ConversationStore] Cleared session {}", session_id);
        true
    }

    // ============================================================================
    // Messages
    // ============================================================================

    /// Appends a message and returns its id, or `None` for unknown sessions.
    pub async fn append(&self, session_id: &str, message: NewMessage) -> Option<u64> {
        let appended = {
            let mut sessions = self.sessions.write().await;
            let session = sessions.get_mut(session_id)?;
            let id = session.push(message);
            session.message(id).cloned()
        }?;

        let id = appended.id;
        self.publish(ConversationEvent::MessageAppended {
            session_id: session_id.to_string(),
            message: appended,
        });
        Some(id)
    }

    /// Merges `patch` into a message. Returns `false` when either id is unknown.
    pub async fn update(&self, session_id: &str, message_id: u64, patch: MessagePatch) -> bool {
        let updated = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(session_id) else {
                return false;
            };
            if !session.patch(message_id, patch) {
                return false;
            }
            session.message(message_id).cloned()
        };

        match updated {
            Some(message) => {
                self.publish(ConversationEvent::MessageUpdated {
                    session_id: session_id.to_string(),
                    message,
                });
                true
            }
            None => false,
        }
    }

    // ============================================================================
    // Ask / reveal
    // ============================================================================

    /// Asks a question in a session and fills in the answer.
    ///
    /// Appends the user message and an empty streaming assistant message,
    /// queries the API and reveals the answer into the placeholder. Failures
    /// are written into the placeholder as an apology; nothing is returned
    /// to the caller. A blank question or an unknown session is a no-op.
    pub async fn ask(&self, session_id: &str, question: &str, doc_id: Option<&str>) {
        let question = question.trim();
        if question.is_empty() {
            tracing::debug!("[ConversationStore] Ignoring blank question");
            return;
        }

        let Some(conversation_id) = self
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|session| session.conversation_id.clone())
        else {
            tracing::debug!(
                "[ConversationStore] ask() on unknown session {}",
                session_id
            );
            return;
        };

        let _loading = LoadingGuard::enter(self);

        if self
            .append(session_id, NewMessage::user(question))
            .await
            .is_none()
        {
            return;
        }
        let Some(reply_id) = self
            .append(session_id, NewMessage::assistant_placeholder())
            .await
        else {
            return;
        };

        let request = QueryRequest {
            question: question.to_string(),
            top_k: self.options.top_k,
            min_score: self.options.min_score,
            doc_id: doc_id.map(str::to_string),
            conversation_id,
        };

        if let Err(err) = request.validate() {
            self.update(
                session_id,
                reply_id,
                MessagePatch::finished(format!("Sorry, I can't send that question: {}", err)),
            )
            .await;
            return;
        }

        tracing::debug!(
            "[ConversationStore] Querying for session {} (doc_id: {:?})",
            session_id,
            request.doc_id
        );

        match self.query_api.query(request).await {
            Ok(QueryOutcome::Answered(answered)) => {
                if let Some(conversation_id) = answered.conversation_id {
                    if let Some(session) = self.sessions.write().await.get_mut(session_id) {
                        session.conversation_id = Some(conversation_id);
                    }
                }
                if answered.used_memory {
                    tracing::debug!("[ConversationStore] Answer used conversation memory");
                }

                let metadata = AnswerMetadata {
                    sources: answered.answer.sources,
                    confidence: answered.answer.confidence,
                };
                self.reveal(
                    session_id,
                    reply_id,
                    &answered.answer.text,
                    metadata,
                    self.options.word_delay(),
                )
                .await;
            }
            Ok(QueryOutcome::Rejected { error, code }) => {
                tracing::warn!("[ConversationStore] Query rejected: {} ({})", error, code);
                self.update(
                    session_id,
                    reply_id,
                    MessagePatch::finished(format!(
                        "Sorry, I couldn't answer that: {} ({})",
                        error, code
                    )),
                )
                .await;
            }
            Err(err) => {
                tracing::error!("[ConversationStore] Query failed: {}", err);
                if err.is_transport() {
                    self.health_sink.mark_external_failure();
                }
                self.update(
                    session_id,
                    reply_id,
                    MessagePatch::finished(format!(
                        "Sorry, something went wrong while contacting the server: {}",
                        err
                    )),
                )
                .await;
            }
        }
    }

    /// Progressively writes `final_text` into a message, one word at a time.
    ///
    /// Each step sets the content to the prefix ending at the next word end,
    /// attaches `metadata`, and pauses `word_delay`. Only the last step clears
    /// `is_streaming`. Stops early if the session or message disappears.
    pub async fn reveal(
        &self,
        session_id: &str,
        message_id: u64,
        final_text: &str,
        metadata: AnswerMetadata,
        word_delay: Duration,
    ) {
        let prefixes = word_prefixes(final_text);
        let last = prefixes.len().saturating_sub(1);

        for (step, prefix) in prefixes.into_iter().enumerate() {
            let is_last = step == last;
            let patch = MessagePatch {
                content: Some(prefix.to_string()),
                is_streaming: Some(!is_last),
                sources: Some(metadata.sources.clone()),
                confidence: metadata.confidence,
            };

            if !self.update(session_id, message_id, patch).await {
                tracing::debug!(
                    "[ConversationStore] Reveal target {}#{} vanished",
                    session_id,
                    message_id
                );
                return;
            }
            if !is_last {
                self.delay.pause(word_delay).await;
            }
        }
    }
}

/// Keeps the loading flag raised while an `ask` runs.
struct LoadingGuard<'a> {
    store: &'a ConversationStore,
}

impl<'a> LoadingGuard<'a> {
    fn enter(store: &'a ConversationStore) -> Self {
        store.in_flight.fetch_add(1, Ordering::SeqCst);
        store.loading.send_if_modified(|loading| !std::mem::replace(loading, true));
        Self { store }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let remaining = self.store.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            self.store
                .loading
                .send_if_modified(|loading| std::mem::replace(loading, false));
        }
    }
}
