use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{
    WidgetChatRequest, WidgetChatResponse, WidgetConfig, WidgetMessage, WidgetReply,
    CONFIG_KEY_PREFIX_LEN, ERROR_REPLY, HISTORY_WINDOW, NO_CONTENT_REPLY,
};
use crate::backend::{ensure_success, post_feedback, FeedbackRating, FeedbackRequest};
use crate::chat::MessageRole;
use crate::config::{RequestConfig, WidgetSettings};
use crate::error::{ApiError, ApiResult, AppError, AppResult};

/// Self-contained chat session of the embeddable widget.
///
/// One request per message, no retry; failures become an apology reply.
pub struct WidgetClient {
    client: Client,
    base_url: String,
    api_key: String,
    business_id: Option<String>,
    session_id: String,
    messages: Vec<WidgetMessage>,
    next_feedback_index: usize,
    config: Option<WidgetConfig>,
}

impl WidgetClient {
    /// Create a widget session against `base_url`
    pub fn new(
        base_url: &str,
        settings: &WidgetSettings,
        request_config: &RequestConfig,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(AppError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            business_id: settings.business_id.clone(),
            session_id: new_session_id(),
            messages: Vec::new(),
            next_feedback_index: 0,
            config: None,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[WidgetMessage] {
        &self.messages
    }

    pub fn config(&self) -> Option<&WidgetConfig> {
        self.config.as_ref()
    }

    /// Fetch and apply remote config. Without a key, or on any failure, the
    /// widget keeps its local defaults.
    pub async fn load_config(&mut self) -> Option<&WidgetConfig> {
        if self.api_key.is_empty() {
            return None;
        }

        match self.fetch_config().await {
            Ok(config) => {
                self.apply_config(config);
                self.config.as_ref()
            }
            Err(e) => {
                debug!(error = %e, "Widget config unavailable");
                None
            }
        }
    }

    async fn fetch_config(&self) -> ApiResult<WidgetConfig> {
        let key_prefix: String = self.api_key.chars().take(CONFIG_KEY_PREFIX_LEN).collect();
        let url = format!("{}/api/v1/widget-config", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("key", key_prefix.as_str())])
            .send()
            .await?;

        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                message: format!("Failed to parse widget config: {}", e),
            })
    }

    /// Store the config and greet with its welcome text if nothing was said yet.
    pub fn apply_config(&mut self, config: WidgetConfig) {
        if self.messages.is_empty() {
            if let Some(welcome) = config.welcome.as_deref().filter(|w| !w.is_empty()) {
                self.push(MessageRole::Assistant, welcome);
            }
        }
        self.config = Some(config);
    }

    /// Send a visitor message. Blank input is ignored.
    pub async fn send(&mut self, input: &str) -> Option<WidgetReply> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        self.push(MessageRole::User, text);

        let request = WidgetChatRequest {
            message: text.to_string(),
            conversation_history: self.history_window(),
            session_id: self.session_id.clone(),
        };

        let (reply, failed) = match self.post_chat(&request).await {
            Ok(response) => (
                response
                    .response
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| NO_CONTENT_REPLY.to_string()),
                false,
            ),
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "Widget chat failed");
                (ERROR_REPLY.to_string(), true)
            }
        };

        let feedback_index = self.push(MessageRole::Assistant, &reply);
        Some(WidgetReply {
            text: reply,
            feedback_index,
            failed,
        })
    }

    async fn post_chat(&self, request: &WidgetChatRequest) -> ApiResult<WidgetChatResponse> {
        let url = format!("{}/api/v1/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                message: format!("Failed to parse widget reply: {}", e),
            })
    }

    /// Rate an assistant reply. Returns `false` without a business id.
    pub async fn submit_feedback(
        &self,
        message_index: usize,
        rating: FeedbackRating,
    ) -> ApiResult<bool> {
        let Some(business_id) = self.business_id.as_deref().filter(|b| !b.is_empty()) else {
            debug!("No business id configured, skipping widget feedback");
            return Ok(false);
        };

        let feedback = FeedbackRequest {
            business_id: business_id.to_string(),
            session_id: self.session_id.clone(),
            message_index,
            rating,
        };
        post_feedback(&self.client, &self.base_url, Some(&self.api_key), &feedback).await?;
        Ok(true)
    }

    /// Last [`HISTORY_WINDOW`] messages, including the one being sent.
    fn history_window(&self) -> Vec<crate::chat::Message> {
        let start = self.messages.len().saturating_sub(HISTORY_WINDOW);
        self.messages[start..]
            .iter()
            .map(WidgetMessage::to_message)
            .collect()
    }

    fn push(&mut self, role: MessageRole, content: &str) -> Option<usize> {
        // The opening greeting is not rateable.
        let feedback_index = if role == MessageRole::Assistant && !self.messages.is_empty() {
            let index = self.next_feedback_index;
            self.next_feedback_index += 1;
            Some(index)
        } else {
            None
        };

        self.messages.push(WidgetMessage {
            role,
            content: content.to_string(),
            feedback_index,
        });
        feedback_index
    }
}

/// `cw_` + 8 random characters + base-36 millisecond timestamp.
pub fn new_session_id() -> String {
    let random: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    format!("cw_{}{}", random, to_base36(millis))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> WidgetClient {
        let settings = WidgetSettings {
            api_key: "cami_live_abcdef123456".to_string(),
            business_id: None,
        };
        WidgetClient::new("http://localhost:9", &settings, &RequestConfig::default()).unwrap()
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id();
        assert!(id.starts_with("cw_"));
        assert!(id.len() > 3 + 8);
        assert!(id[3..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(new_session_id(), id);
    }

    #[test]
    fn test_welcome_is_added_once_and_not_rateable() {
        let mut client = widget();
        client.apply_config(WidgetConfig {
            welcome: Some("Hi! How can we help?".to_string()),
            ..WidgetConfig::default()
        });
        client.apply_config(WidgetConfig {
            welcome: Some("Second welcome".to_string()),
            ..WidgetConfig::default()
        });

        assert_eq!(client.messages().len(), 1);
        assert_eq!(client.messages()[0].feedback_index, None);
    }

    #[test]
    fn test_history_window_caps_at_ten() {
        let mut client = widget();
        for i in 0..7 {
            client.push(MessageRole::User, &format!("q{}", i));
            client.push(MessageRole::Assistant, &format!("a{}", i));
        }
        let history = client.history_window();
        assert_eq!(history.len(), HISTORY_WINDOW);
        assert_eq!(history.last().unwrap().content, "a6");
    }

    #[test]
    fn test_feedback_indices_count_assistant_replies() {
        let mut client = widget();
        client.push(MessageRole::User, "q0");
        assert_eq!(client.push(MessageRole::Assistant, "a0"), Some(0));
        client.push(MessageRole::User, "q1");
        assert_eq!(client.push(MessageRole::Assistant, "a1"), Some(1));
    }
}
