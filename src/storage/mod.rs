//! Local persistence for chat conversations.
//!
//! Conversations are saved after every exchange and listed newest first.
//! Only the most recent [`MAX_STORED_CHATS`] are kept.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMode, ChatSession, Message};
use crate::error::StorageResult;

/// Retention cap for stored conversations.
pub const MAX_STORED_CHATS: usize = 50;
/// Characters of the first message used as a chat title.
pub const TITLE_MAX_CHARS: usize = 50;
/// Title of a conversation with no messages.
pub const UNTITLED_CHAT: &str = "New Chat";

/// A stored conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Chat identifier (e.g. `chat_1700000000000`).
    pub id: String,
    /// Mode the conversation was held in.
    pub mode: ChatMode,
    /// Ordered messages.
    pub messages: Vec<Message>,
    /// When the conversation was first saved.
    pub created_at: DateTime<Utc>,
    /// When the conversation was last saved.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation stamped now.
    pub fn new(id: impl Into<String>, mode: ChatMode) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            mode,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot a live session.
    pub fn from_session(session: &ChatSession) -> Self {
        Self::new(session.id(), session.mode()).with_messages(session.messages().to_vec())
    }

    /// Set the messages
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Override the update timestamp
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// First [`TITLE_MAX_CHARS`] characters of the first message.
    pub fn title(&self) -> String {
        self.messages
            .first()
            .map(|m| m.content.chars().take(TITLE_MAX_CHARS).collect::<String>())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED_CHAT.to_string())
    }

    /// Turn back into a session that can keep chatting.
    pub fn into_session(self) -> ChatSession {
        ChatSession::restore(self.id, self.mode, self.messages)
    }
}

/// Sidebar entry for a stored conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub mode: ChatMode,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Storage trait for conversation persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Insert or replace a conversation, then prune beyond the retention cap.
    async fn save_conversation(&self, conversation: &Conversation) -> StorageResult<()>;

    /// Load a conversation by id.
    async fn load_conversation(&self, id: &str) -> StorageResult<Option<Conversation>>;

    /// List conversations, most recently updated first.
    async fn list_chats(&self, limit: usize) -> StorageResult<Vec<ChatSummary>>;

    /// Delete a conversation; errors if it does not exist.
    async fn delete_conversation(&self, id: &str) -> StorageResult<()>;
}
