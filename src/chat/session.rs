use chrono::{DateTime, Utc};
use tracing::debug;

use super::lifecycle::RequestLifecycle;
use super::types::{ChatMode, ChatRequest, ChatResponse, HealthFocus, Message};
use crate::error::ChatResult;

/// One completed exchange.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub question: String,
    /// Text appended to history as the assistant's reply.
    pub reply: String,
    pub outcome: ChatResult<ChatResponse>,
}

impl ChatTurn {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A conversation driven through a [`RequestLifecycle`].
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: String,
    mode: ChatMode,
    source: String,
    health_focus: HealthFocus,
    scribe_result: Option<serde_json::Value>,
    messages: Vec<Message>,
}

impl ChatSession {
    /// Start an empty session with a fresh `chat_<millis>` id.
    pub fn new(mode: ChatMode) -> Self {
        Self::with_id(new_chat_id(Utc::now()), mode)
    }

    pub fn with_id(id: impl Into<String>, mode: ChatMode) -> Self {
        Self {
            id: id.into(),
            mode,
            source: "web_chat".to_string(),
            health_focus: HealthFocus::default(),
            scribe_result: None,
            messages: Vec::new(),
        }
    }

    /// Resume a session from stored history.
    pub fn restore(id: impl Into<String>, mode: ChatMode, messages: Vec<Message>) -> Self {
        let mut session = Self::with_id(id, mode);
        session.messages = messages;
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn health_focus(&self) -> HealthFocus {
        self.health_focus
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn set_health_focus(&mut self, focus: HealthFocus) {
        self.health_focus = focus;
    }

    /// Attach a transcription result to the next successful exchange.
    pub fn set_scribe_result(&mut self, scribe_result: serde_json::Value) {
        self.scribe_result = Some(scribe_result);
    }

    pub fn pending_scribe_result(&self) -> Option<&serde_json::Value> {
        self.scribe_result.as_ref()
    }

    /// Forget the history, keeping mode and settings.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Build the request for `question` against the current history.
    pub fn build_request(&self, question: &str) -> ChatRequest {
        let mut request = ChatRequest::new(question, self.mode)
            .with_source(self.source.clone())
            .with_history(self.messages.clone());

        if let Some(scribe) = &self.scribe_result {
            request = request.with_scribe_result(scribe.clone());
        }
        if self.mode == ChatMode::Health {
            request = request.with_health_focus(self.health_focus);
        }
        request
    }

    /// Send one user message. Blank input is ignored and returns `None`.
    ///
    /// History is only appended once the lifecycle reaches a terminal outcome,
    /// so the in-flight question is never part of its own context.
    pub async fn send(&mut self, input: &str, lifecycle: &RequestLifecycle) -> Option<ChatTurn> {
        let question = input.trim();
        if question.is_empty() {
            debug!(session = %self.id, "Ignoring empty message");
            return None;
        }

        let request = self.build_request(question);
        let outcome = lifecycle.submit(&request).await;

        let reply = match &outcome {
            Ok(response) => {
                self.scribe_result = None;
                response.answer_text().to_string()
            }
            Err(err) => err.user_message(),
        };

        self.messages.push(Message::user(question));
        self.messages.push(Message::assistant(reply.clone()));

        Some(ChatTurn {
            question: question.to_string(),
            reply,
            outcome,
        })
    }
}

/// `chat_<unix millis>`.
pub fn new_chat_id(now: DateTime<Utc>) -> String {
    format!("chat_{}", now.timestamp_millis())
}
