//! Auxiliary backend calls made alongside chat: warmup, stats, feedback.

use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::chat::DEFAULT_ANALYZE_PATH;
use crate::config::{ApiConfig, RequestConfig};
use crate::error::{ApiError, ApiResult, AppError, AppResult};

/// Business id used for feedback from the first-party chat.
pub const FIRST_PARTY_BUSINESS_ID: &str = "user_session";

/// Thumbs up or down on an assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackRating {
    Positive,
    Negative,
}

impl std::str::FromStr for FeedbackRating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" | "up" | "+" => Ok(FeedbackRating::Positive),
            "negative" | "down" | "-" => Ok(FeedbackRating::Negative),
            _ => Err(format!("Unknown feedback rating: {}", s)),
        }
    }
}

/// Body of `POST /customer-service/feedback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub business_id: String,
    pub session_id: String,
    pub message_index: usize,
    pub rating: FeedbackRating,
}

/// What the warmup pings reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    pub status_reachable: bool,
    pub preflight_reachable: bool,
}

/// Fail on non-success statuses, keeping the body as the message.
pub(crate) async fn ensure_success(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Api {
        status: status.as_u16(),
        message: body,
    })
}

/// Client for the non-chat endpoints.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    demo_api_key: String,
}

impl BackendClient {
    /// Create a new backend client
    pub fn new(config: &ApiConfig, request_config: &RequestConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(AppError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            demo_api_key: config.demo_api_key.clone(),
        })
    }

    /// Ping the status endpoint and preflight the default analyze path so a
    /// cold container starts booting before the first question arrives.
    pub async fn warmup(&self) -> WarmupReport {
        let status_url = format!("{}/api/status", self.base_url);
        let analyze_url = format!("{}/{}/analyze", self.base_url, DEFAULT_ANALYZE_PATH);

        let (status, preflight) = tokio::join!(
            self.client.get(&status_url).send(),
            self.client.request(Method::OPTIONS, &analyze_url).send(),
        );

        let report = WarmupReport {
            status_reachable: status.is_ok(),
            preflight_reachable: preflight.is_ok(),
        };
        if let Err(e) = status {
            debug!(error = %e, "Warmup status ping failed");
        }
        if let Err(e) = preflight {
            debug!(error = %e, "Warmup preflight failed");
        }
        info!(
            status = report.status_reachable,
            preflight = report.preflight_reachable,
            "Backend warmup sent"
        );
        report
    }

    /// Fetch usage statistics.
    pub async fn stats(&self) -> ApiResult<serde_json::Value> {
        let url = format!("{}/api/stats", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("api-key", &self.demo_api_key)
            .header("X-API-Key", &self.demo_api_key)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                message: format!("Failed to parse stats: {}", e),
            })
    }

    /// Rate an assistant message from the first-party chat.
    pub async fn submit_feedback(
        &self,
        session_id: &str,
        message_index: usize,
        rating: FeedbackRating,
    ) -> ApiResult<()> {
        let feedback = FeedbackRequest {
            business_id: FIRST_PARTY_BUSINESS_ID.to_string(),
            session_id: session_id.to_string(),
            message_index,
            rating,
        };
        post_feedback(&self.client, &self.base_url, None, &feedback).await
    }
}

/// Shared by the chat and the widget; the widget authenticates with its key.
pub(crate) async fn post_feedback(
    client: &Client,
    base_url: &str,
    bearer: Option<&str>,
    feedback: &FeedbackRequest,
) -> ApiResult<()> {
    let url = format!("{}/customer-service/feedback", base_url);
    let mut builder = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(feedback);
    if let Some(token) = bearer {
        builder = builder.bearer_auth(token);
    }

    let response = builder.send().await?;
    ensure_success(response).await?;
    debug!(
        session = %feedback.session_id,
        index = feedback.message_index,
        "Feedback submitted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feedback_rating_parse() {
        assert_eq!(
            "positive".parse::<FeedbackRating>().unwrap(),
            FeedbackRating::Positive
        );
        assert_eq!("DOWN".parse::<FeedbackRating>().unwrap(), FeedbackRating::Negative);
        assert!("meh".parse::<FeedbackRating>().is_err());
    }

    #[test]
    fn test_feedback_request_shape() {
        let feedback = FeedbackRequest {
            business_id: FIRST_PARTY_BUSINESS_ID.to_string(),
            session_id: "chat_1".to_string(),
            message_index: 2,
            rating: FeedbackRating::Negative,
        };
        assert_eq!(
            serde_json::to_value(&feedback).unwrap(),
            json!({
                "business_id": "user_session",
                "session_id": "chat_1",
                "message_index": 2,
                "rating": "negative"
            })
        );
    }
}
