use serde::{Deserialize, Serialize};

use crate::chat::{Message, MessageRole};

/// Messages of context sent with each widget request.
pub const HISTORY_WINDOW: usize = 10;
/// Characters of the widget key sent when fetching remote config.
pub const CONFIG_KEY_PREFIX_LEN: usize = 12;
/// Reply shown when the backend answers without a `response`.
pub const NO_CONTENT_REPLY: &str = "I'm sorry, I couldn't process that. Please try again.";
/// Reply shown when the request fails.
pub const ERROR_REPLY: &str = "Sorry, something went wrong. Please try again.";

/// Remote widget settings from `/api/v1/widget-config`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WidgetConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub welcome: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub hide_branding: bool,
}

/// Body of `POST /api/v1/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetChatRequest {
    pub message: String,
    pub conversation_history: Vec<Message>,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetChatResponse {
    #[serde(default)]
    pub response: Option<String>,
}

/// A message in the widget transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetMessage {
    pub role: MessageRole,
    pub content: String,
    /// Index used when rating this message; only assistant replies get one.
    pub feedback_index: Option<usize>,
}

impl WidgetMessage {
    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Assistant reply to one widget send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetReply {
    pub text: String,
    pub feedback_index: Option<usize>,
    /// The request failed and `text` is the generic apology.
    pub failed: bool,
}
