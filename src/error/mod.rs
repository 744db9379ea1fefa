use thiserror::Error;

/// Default upgrade text when the backend omits a `message` on `limit_reached`.
pub const DEFAULT_LIMIT_MESSAGE: &str = "Usage limit reached. Sign up for more access.";

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Conversation not found: {conversation_id}")]
    ConversationNotFound { conversation_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Terminal outcome of a chat submission that did not produce an answer.
///
/// Every variant is a value the caller branches on; none of them is a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The backend kept answering `503` until the attempt budget ran out.
    #[error("Service still warming up after {attempts} attempts")]
    ServiceWarmingUp { attempts: u32 },

    /// `403` with `error: "limit_reached"`. Never retried.
    #[error("Access limit reached: {message}")]
    AccessLimitReached { message: String },

    /// Any other non-success status, or a logical error inside a 2xx body.
    #[error("Request rejected: {status} - {message}")]
    RequestRejected { status: u16, message: String },

    /// 2xx whose body is not JSON or not shaped like a chat response.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    /// Transport failed without any HTTP response, on every attempt.
    #[error("Network unavailable: {message} (attempts: {attempts})")]
    NetworkUnavailable { message: String, attempts: u32 },
}

/// Discriminant of [`ChatError`], convenient for matching and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatErrorKind {
    ServiceWarmingUp,
    AccessLimitReached,
    RequestRejected,
    MalformedResponse,
    NetworkUnavailable,
}

impl ChatErrorKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatErrorKind::ServiceWarmingUp => "service_warming_up",
            ChatErrorKind::AccessLimitReached => "access_limit_reached",
            ChatErrorKind::RequestRejected => "request_rejected",
            ChatErrorKind::MalformedResponse => "malformed_response",
            ChatErrorKind::NetworkUnavailable => "network_unavailable",
        }
    }
}

impl std::fmt::Display for ChatErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ChatError {
    /// The variant without its payload.
    pub fn kind(&self) -> ChatErrorKind {
        match self {
            ChatError::ServiceWarmingUp { .. } => ChatErrorKind::ServiceWarmingUp,
            ChatError::AccessLimitReached { .. } => ChatErrorKind::AccessLimitReached,
            ChatError::RequestRejected { .. } => ChatErrorKind::RequestRejected,
            ChatError::MalformedResponse { .. } => ChatErrorKind::MalformedResponse,
            ChatError::NetworkUnavailable { .. } => ChatErrorKind::NetworkUnavailable,
        }
    }

    /// Server-provided or synthesized detail text carried by the error.
    pub fn message(&self) -> String {
        match self {
            ChatError::ServiceWarmingUp { .. } => "Cami is still waking up".to_string(),
            ChatError::AccessLimitReached { message }
            | ChatError::RequestRejected { message, .. }
            | ChatError::MalformedResponse { message }
            | ChatError::NetworkUnavailable { message, .. } => message.clone(),
        }
    }

    /// Text shown to the user in place of an assistant answer.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::ServiceWarmingUp { .. } => {
                "Cami is still waking up. Try again in a few seconds, your message wasn't lost."
                    .to_string()
            }
            ChatError::AccessLimitReached { .. } => {
                "Usage limit reached. [Sign up](/login) to continue using Cami.".to_string()
            }
            ChatError::RequestRejected { message, .. } => format!("Error: {}", message),
            ChatError::MalformedResponse { .. } => {
                "Error: the server sent a response Cami could not read.".to_string()
            }
            ChatError::NetworkUnavailable { .. } => {
                "Error: could not reach Cami. Check your connection and try again.".to_string()
            }
        }
    }
}

/// Errors from the auxiliary and widget endpoints (no retry, no taxonomy).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for chat submissions
pub type ChatResult<T> = Result<T, ChatError>;

/// Result type alias for widget and auxiliary API calls
pub type ApiResult<T> = Result<T, ApiError>;
