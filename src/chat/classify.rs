//! Classification of a single analyze attempt.
//!
//! Everything here is a pure function of the HTTP status and body text, so the
//! same response always yields the same outcome.

use reqwest::StatusCode;
use serde_json::{Map, Value};

use super::types::ChatResponse;
use crate::error::{ChatError, DEFAULT_LIMIT_MESSAGE};

/// Why an attempt may be repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    /// `503` while the backend container cold-starts.
    WarmingUp,
    /// No HTTP response at all.
    Network { message: String },
}

impl RetryReason {
    /// Final error once no attempts remain.
    pub fn into_exhausted(self, attempts: u32) -> ChatError {
        match self {
            RetryReason::WarmingUp => ChatError::ServiceWarmingUp { attempts },
            RetryReason::Network { message } => ChatError::NetworkUnavailable { message, attempts },
        }
    }
}

impl std::fmt::Display for RetryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryReason::WarmingUp => write!(f, "service warming up (503)"),
            RetryReason::Network { message } => write!(f, "network failure: {}", message),
        }
    }
}

/// Result of one HTTP attempt, consumed immediately by the retry loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(ChatResponse),
    Retryable(RetryReason),
    Terminal(ChatError),
}

impl AttemptOutcome {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AttemptOutcome::Retryable(_))
    }
}

/// Classify a transport failure (no status received).
pub fn classify_transport_error(message: impl Into<String>) -> AttemptOutcome {
    AttemptOutcome::Retryable(RetryReason::Network {
        message: message.into(),
    })
}

/// Classify an HTTP response by status code and raw body.
pub fn classify_response(status: u16, body: &str) -> AttemptOutcome {
    if status == 503 {
        return AttemptOutcome::Retryable(RetryReason::WarmingUp);
    }

    if (200..300).contains(&status) {
        return classify_success_body(status, body);
    }

    let parsed = serde_json::from_str::<Value>(body).ok();
    let object = parsed.as_ref().and_then(Value::as_object);

    if status == 403 {
        if let Some(map) = object {
            if map.get("error").and_then(Value::as_str) == Some("limit_reached") {
                let message = field_text(map, "message")
                    .unwrap_or_else(|| DEFAULT_LIMIT_MESSAGE.to_string());
                return AttemptOutcome::Terminal(ChatError::AccessLimitReached { message });
            }
        }
    }

    let message = match object {
        Some(map) => field_text(map, "detail")
            .or_else(|| field_text(map, "error"))
            .or_else(|| field_text(map, "message"))
            .unwrap_or_else(|| format!("API error: {}", status)),
        None => raw_or_status_line(status, body),
    };

    AttemptOutcome::Terminal(ChatError::RequestRejected { status, message })
}

fn classify_success_body(status: u16, body: &str) -> AttemptOutcome {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            return AttemptOutcome::Terminal(ChatError::MalformedResponse {
                message: format!("Failed to parse response: {}", e),
            })
        }
    };

    // The backend reports some logical failures inside a 2xx body.
    if let Some(message) = body_error(&value) {
        let message = value
            .as_object()
            .and_then(|map| field_text(map, "message"))
            .unwrap_or(message);
        return AttemptOutcome::Terminal(ChatError::RequestRejected { status, message });
    }

    match serde_json::from_value::<ChatResponse>(value) {
        Ok(response) => AttemptOutcome::Success(response),
        Err(e) => AttemptOutcome::Terminal(ChatError::MalformedResponse {
            message: format!("Unexpected response shape: {}", e),
        }),
    }
}

/// Text of a body-level `error` field. `null`, `false` and blank strings mean
/// no error.
pub(crate) fn body_error(value: &Value) -> Option<String> {
    value.as_object().and_then(|map| field_text(map, "error"))
}

/// Non-empty text of a field; non-string values are rendered as JSON.
pub(crate) fn field_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn raw_or_status_line(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    match StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("HTTP {} {}", status, reason),
        None => format!("HTTP {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn terminal(outcome: AttemptOutcome) -> ChatError {
        match outcome {
            AttemptOutcome::Terminal(e) => e,
            other => panic!("expected terminal outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_success_body() {
        let outcome = classify_response(200, r#"{"answer":"Hi there"}"#);
        match outcome {
            AttemptOutcome::Success(response) => assert_eq!(response.answer_text(), "Hi there"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_503_is_retryable() {
        assert_eq!(
            classify_response(503, "Service Unavailable"),
            AttemptOutcome::Retryable(RetryReason::WarmingUp)
        );
        assert!(classify_response(503, "").is_retryable());
    }

    #[test]
    fn test_limit_reached_is_terminal_with_message() {
        let err = terminal(classify_response(
            403,
            r#"{"error":"limit_reached","message":"Sign up"}"#,
        ));
        assert_eq!(
            err,
            ChatError::AccessLimitReached {
                message: "Sign up".to_string()
            }
        );
    }

    #[test]
    fn test_limit_reached_default_message() {
        let err = terminal(classify_response(403, r#"{"error":"limit_reached"}"#));
        assert_eq!(err.message(), DEFAULT_LIMIT_MESSAGE);
    }

    #[test]
    fn test_other_403_is_rejected() {
        let err = terminal(classify_response(403, r#"{"detail":"Forbidden origin"}"#));
        assert_eq!(
            err,
            ChatError::RequestRejected {
                status: 403,
                message: "Forbidden origin".to_string()
            }
        );
    }

    #[test]
    fn test_500_uses_detail() {
        let err = terminal(classify_response(500, r#"{"detail":"internal error"}"#));
        assert_eq!(
            err,
            ChatError::RequestRejected {
                status: 500,
                message: "internal error".to_string()
            }
        );
    }

    #[test]
    fn test_rejection_falls_back_to_error_then_message() {
        let err = terminal(classify_response(400, r#"{"error":"bad_mode"}"#));
        assert_eq!(err.message(), "bad_mode");

        let err = terminal(classify_response(422, r#"{"message":"too long"}"#));
        assert_eq!(err.message(), "too long");

        let err = terminal(classify_response(418, r#"{"other":1}"#));
        assert_eq!(err.message(), "API error: 418");
    }

    #[test]
    fn test_structured_detail_is_rendered_as_json() {
        let body = json!({"detail": [{"loc": ["body", "question"], "msg": "field required"}]});
        let err = terminal(classify_response(422, &body.to_string()));
        assert!(err.message().contains("field required"));
    }

    #[test]
    fn test_rejection_non_json_uses_raw_text() {
        let err = terminal(classify_response(502, "  upstream connect error  "));
        assert_eq!(err.message(), "upstream connect error");
    }

    #[test]
    fn test_rejection_empty_body_uses_status_line() {
        let err = terminal(classify_response(502, ""));
        assert_eq!(err.message(), "HTTP 502 Bad Gateway");

        let err = terminal(classify_response(599, ""));
        assert_eq!(err.message(), "HTTP 599");
    }

    #[test]
    fn test_success_status_with_non_json_body_is_malformed() {
        let err = terminal(classify_response(200, "<html>oops</html>"));
        assert_eq!(err.kind(), ChatErrorKind::MalformedResponse);
    }

    #[test]
    fn test_success_status_with_wrong_shape_is_malformed() {
        let err = terminal(classify_response(200, r#"["not", "an", "object"]"#));
        assert_eq!(err.kind(), ChatErrorKind::MalformedResponse);

        let err = terminal(classify_response(200, r#"{"answer": 42}"#));
        assert_eq!(err.kind(), ChatErrorKind::MalformedResponse);
    }

    #[test]
    fn test_error_inside_success_body_is_terminal() {
        let err = terminal(classify_response(
            200,
            r#"{"error":"synthesis_failed","message":"All providers timed out"}"#,
        ));
        assert_eq!(
            err,
            ChatError::RequestRejected {
                status: 200,
                message: "All providers timed out".to_string()
            }
        );
    }

    #[test]
    fn test_null_error_inside_success_body_is_ignored() {
        let outcome = classify_response(200, r#"{"answer":"ok","error":null}"#);
        assert!(matches!(outcome, AttemptOutcome::Success(_)));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let cases = [
            (200, r#"{"answer":"a"}"#),
            (503, ""),
            (403, r#"{"error":"limit_reached"}"#),
            (500, "boom"),
            (200, "nope"),
        ];
        for (status, body) in cases {
            assert_eq!(
                classify_response(status, body),
                classify_response(status, body)
            );
        }
    }

    #[test]
    fn test_false_error_field_is_not_a_failure() {
        let outcome = classify_response(200, r#"{"answer":"ok","error":false}"#);
        match outcome {
            AttemptOutcome::Success(response) => assert_eq!(response.answer_text(), "ok"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_true_error_field_is_a_failure() {
        assert_eq!(
            classify_response(200, r#"{"answer":"ok","error":true}"#),
            AttemptOutcome::Terminal(ChatError::RequestRejected {
                status: 200,
                message: "true".to_string()
            })
        );
    }

    #[test]
    fn test_body_error() {
        assert_eq!(body_error(&json!({"error": null})), None);
        assert_eq!(body_error(&json!({"error": false})), None);
        assert_eq!(body_error(&json!({"error": "  "})), None);
        assert_eq!(body_error(&json!({"error": "hold expired"})).as_deref(), Some("hold expired"));
        assert_eq!(body_error(&json!(["error"])), None);
    }

    #[test]
    fn test_transport_error_is_retryable() {
        let outcome = classify_transport_error("connection refused");
        assert_eq!(
            outcome,
            AttemptOutcome::Retryable(RetryReason::Network {
                message: "connection refused".to_string()
            })
        );
    }

    #[test]
    fn test_exhausted_reasons() {
        assert_eq!(
            RetryReason::WarmingUp.into_exhausted(3),
            ChatError::ServiceWarmingUp { attempts: 3 }
        );
        let err = RetryReason::Network {
            message: "dns".to_string(),
        }
        .into_exhausted(2);
        assert_eq!(err.kind(), ChatErrorKind::NetworkUnavailable);
    }
}
