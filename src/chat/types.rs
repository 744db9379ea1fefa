use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Path used when a mode has no dedicated pipeline.
pub const DEFAULT_ANALYZE_PATH: &str = "customer-service";

/// Assistant mode; selects the backend analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// General assistant.
    #[default]
    Cami,
    /// Research with web sources.
    Research,
    /// Customer service agent.
    CustomerService,
    /// Health (mental health or medicine focus).
    #[serde(alias = "clinical_assistant")]
    Health,
    /// Legal analysis.
    LegalIntelligence,
    /// Tutoring.
    Tutor,
    /// Financial rail console.
    CamiMoney,
}

impl ChatMode {
    /// All modes in display order.
    pub const ALL: [ChatMode; 7] = [
        ChatMode::Cami,
        ChatMode::Research,
        ChatMode::CustomerService,
        ChatMode::Health,
        ChatMode::LegalIntelligence,
        ChatMode::Tutor,
        ChatMode::CamiMoney,
    ];

    /// Get the mode name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Cami => "cami",
            ChatMode::Research => "research",
            ChatMode::CustomerService => "customer_service",
            ChatMode::Health => "health",
            ChatMode::LegalIntelligence => "legal_intelligence",
            ChatMode::Tutor => "tutor",
            ChatMode::CamiMoney => "cami_money",
        }
    }

    /// URL path segment of this mode's analyze endpoint.
    pub fn analyze_path(&self) -> &'static str {
        match self {
            ChatMode::Cami => DEFAULT_ANALYZE_PATH,
            ChatMode::Research => "research",
            ChatMode::CustomerService => DEFAULT_ANALYZE_PATH,
            ChatMode::Health => "health",
            ChatMode::LegalIntelligence => "legal-intelligence",
            ChatMode::Tutor => "tutor",
            ChatMode::CamiMoney => "cami-money",
        }
    }

    /// Parse a mode, falling back to [`ChatMode::Cami`] for anything unknown.
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Resolve a mode from a `/try/<slug>` page path.
    pub fn from_try_path(path: &str) -> Option<Self> {
        if !path.contains("/try/") {
            return None;
        }
        if path.contains("/try/legal") {
            Some(ChatMode::LegalIntelligence)
        } else if path.contains("/try/health") || path.contains("/try/clinical") {
            Some(ChatMode::Health)
        } else if path.contains("/try/customer-service") {
            Some(ChatMode::CustomerService)
        } else if path.contains("/try/research") {
            Some(ChatMode::Research)
        } else if path.contains("/try/tutor") {
            Some(ChatMode::Tutor)
        } else if path.contains("/try/money") {
            Some(ChatMode::CamiMoney)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cami" => Ok(ChatMode::Cami),
            "research" => Ok(ChatMode::Research),
            "customer_service" => Ok(ChatMode::CustomerService),
            "health" | "clinical_assistant" => Ok(ChatMode::Health),
            "legal_intelligence" => Ok(ChatMode::LegalIntelligence),
            "tutor" => Ok(ChatMode::Tutor),
            "cami_money" => Ok(ChatMode::CamiMoney),
            _ => Err(format!("Unknown chat mode: {}", s)),
        }
    }
}

/// Sub-mode of [`ChatMode::Health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthFocus {
    #[default]
    MentalHealth,
    Medicine,
}

impl HealthFocus {
    /// Get the focus name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthFocus::MentalHealth => "mental_health",
            HealthFocus::Medicine => "medicine",
        }
    }
}

impl std::str::FromStr for HealthFocus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mental_health" => Ok(HealthFocus::MentalHealth),
            "medicine" => Ok(HealthFocus::Medicine),
            _ => Err(format!("Unknown health focus: {}", s)),
        }
    }
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Get the role name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// `context` object of an analyze request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatContext {
    pub mode: ChatMode,
    pub source: String,
    pub conversation_history: Vec<Message>,
}

/// Body of `POST /{mode-path}/analyze`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub question: String,
    pub context: ChatContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scribe_result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_focus: Option<HealthFocus>,
}

impl ChatRequest {
    /// Create a request with an empty history and the `web_chat` source.
    pub fn new(question: impl Into<String>, mode: ChatMode) -> Self {
        Self {
            question: question.into(),
            context: ChatContext {
                mode,
                source: "web_chat".to_string(),
                conversation_history: Vec::new(),
            },
            scribe_result: None,
            health_focus: None,
        }
    }

    /// Set the source tag
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.context.source = source.into();
        self
    }

    /// Set prior turns (must not include the question being asked)
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.context.conversation_history = history;
        self
    }

    /// Attach a transcription summary
    pub fn with_scribe_result(mut self, scribe_result: serde_json::Value) -> Self {
        self.scribe_result = Some(scribe_result);
        self
    }

    /// Set the health sub-mode
    pub fn with_health_focus(mut self, focus: HealthFocus) -> Self {
        self.health_focus = Some(focus);
        self
    }

    /// The mode this request targets.
    pub fn mode(&self) -> ChatMode {
        self.context.mode
    }
}

/// Successful analyze response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers_used: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_achieved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspectives: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biases_acknowledged: Option<Vec<String>>,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ChatResponse {
    /// Answer text, empty when the backend sent none.
    pub fn answer_text(&self) -> &str {
        self.answer.as_deref().unwrap_or("")
    }

    /// Whether the answer drew on live web results.
    pub fn used_web_search(&self) -> bool {
        self.providers_used
            .as_ref()
            .is_some_and(|p| p.iter().any(|name| name == "web_search"))
    }
}
