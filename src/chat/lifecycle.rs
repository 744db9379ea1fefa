use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::classify::{classify_response, classify_transport_error, AttemptOutcome, RetryReason};
use super::clock::{Sleeper, TokioSleeper};
use super::credentials::{is_well_formed_token, CredentialProvider, NoCredentials, StaticToken};
use super::types::{ChatMode, ChatRequest, ChatResponse};
use crate::config::{ApiConfig, RequestConfig};
use crate::error::{AppError, AppResult, ChatResult};

/// Progress of one submission. `Succeeded` and `Failed` are the return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Idle,
    Attempting,
    Retrying,
}

/// Attempt bookkeeping, owned by a single `submit` call.
#[derive(Debug)]
struct RetryState {
    attempt: u32,
    max_attempts: u32,
    last_error: Option<RetryReason>,
}

impl RetryState {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            last_error: None,
        }
    }

    fn has_remaining(&self) -> bool {
        self.attempt < self.max_attempts
    }

    fn into_error(self) -> crate::error::ChatError {
        self.last_error
            .unwrap_or(RetryReason::Network {
                message: "no attempt was made".to_string(),
            })
            .into_exhausted(self.attempt)
    }
}

/// Submits chat requests to the analyze endpoint, retrying cold starts.
#[derive(Clone)]
pub struct RequestLifecycle {
    client: Client,
    base_url: String,
    demo_api_key: String,
    request_config: RequestConfig,
    credentials: Arc<dyn CredentialProvider>,
    sleeper: Arc<dyn Sleeper>,
}

impl RequestLifecycle {
    /// Create a lifecycle with real sleeps and the configured static token, if any.
    pub fn new(config: &ApiConfig, request_config: RequestConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(AppError::Http)?;

        let credentials: Arc<dyn CredentialProvider> = match &config.auth_token {
            Some(token) => Arc::new(StaticToken::new(token.clone())),
            None => Arc::new(NoCredentials),
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            demo_api_key: config.demo_api_key.clone(),
            request_config,
            credentials,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the bearer-token source
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Replace the inter-attempt sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full analyze URL for a mode.
    pub fn analyze_url(&self, mode: ChatMode) -> String {
        format!("{}/{}/analyze", self.base_url, mode.analyze_path())
    }

    /// Submit with the configured attempt budget and delay.
    pub async fn submit(&self, request: &ChatRequest) -> ChatResult<ChatResponse> {
        self.submit_with(
            request,
            self.request_config.max_attempts,
            Duration::from_millis(self.request_config.retry_delay_ms),
        )
        .await
    }

    /// Submit, making at most `max_attempts` HTTP calls spaced by `retry_delay`.
    ///
    /// Only `503` and transport failures are retried. Every other outcome
    /// returns immediately, so an access-limit denial costs exactly one call.
    pub async fn submit_with(
        &self,
        request: &ChatRequest,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> ChatResult<ChatResponse> {
        let mode = request.mode();
        let url = self.analyze_url(mode);
        let mut retry = RetryState::new(max_attempts);
        let mut state = LifecycleState::Idle;

        loop {
            state = match state {
                LifecycleState::Idle | LifecycleState::Retrying => {
                    retry.attempt += 1;
                    LifecycleState::Attempting
                }
                LifecycleState::Attempting => {
                    let start = Instant::now();
                    let outcome = self.attempt(&url, request).await;
                    let latency_ms = start.elapsed().as_millis();

                    match outcome {
                        AttemptOutcome::Success(response) => {
                            info!(
                                mode = %mode,
                                attempt = retry.attempt,
                                latency_ms,
                                "Chat request succeeded"
                            );
                            return Ok(response);
                        }
                        AttemptOutcome::Terminal(err) => {
                            warn!(
                                mode = %mode,
                                attempt = retry.attempt,
                                kind = %err.kind(),
                                error = %err,
                                latency_ms,
                                "Chat request failed"
                            );
                            return Err(err);
                        }
                        AttemptOutcome::Retryable(reason) => {
                            warn!(
                                mode = %mode,
                                attempt = retry.attempt,
                                max_attempts = retry.max_attempts,
                                reason = %reason,
                                latency_ms,
                                "Chat request attempt failed"
                            );
                            retry.last_error = Some(reason);

                            if !retry.has_remaining() {
                                let err = retry.into_error();
                                warn!(mode = %mode, error = %err, "Retry budget exhausted");
                                return Err(err);
                            }

                            debug!(
                                mode = %mode,
                                delay_ms = retry_delay.as_millis(),
                                "Waiting before retry"
                            );
                            self.sleeper.sleep(retry_delay).await;
                            LifecycleState::Retrying
                        }
                    }
                }
            };
        }
    }

    /// Execute a single request (internal)
    async fn attempt(&self, url: &str, request: &ChatRequest) -> AttemptOutcome {
        debug!(
            url = %url,
            history = request.context.conversation_history.len(),
            "Calling analyze endpoint"
        );

        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("api-key", &self.demo_api_key)
            .header("X-API-Key", &self.demo_api_key)
            .json(request);

        if let Some(token) = self
            .credentials
            .bearer_token()
            .filter(|t| is_well_formed_token(t))
        {
            builder = builder.bearer_auth(token);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => return classify_transport_error(self.describe_transport_error(&e)),
        };

        let status = response.status().as_u16();
        debug!(status, "Analyze endpoint responded");
        match response.text().await {
            Ok(body) => classify_response(status, &body),
            Err(e) => classify_transport_error(self.describe_transport_error(&e)),
        }
    }

    fn describe_transport_error(&self, e: &reqwest::Error) -> String {
        if e.is_timeout() {
            format!("Request timeout after {}ms", self.request_config.timeout_ms)
        } else if e.is_connect() {
            format!("Connection failed: {}", e)
        } else {
            e.to_string()
        }
    }
}
