//! Integration tests for chat sessions
//!
//! Verifies what history and attachments each request carries across
//! multiple exchanges.

use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

use cami_client::chat::{
    ChatMode, ChatSession, HealthFocus, MessageRole, RecordingSleeper, RequestLifecycle,
};
use cami_client::config::{ApiConfig, RequestConfig};

fn create_test_lifecycle(base_url: &str) -> RequestLifecycle {
    let config = ApiConfig {
        base_url: base_url.to_string(),
        ..ApiConfig::default()
    };
    RequestLifecycle::new(&config, RequestConfig::default())
        .expect("Failed to create lifecycle")
        .with_sleeper(Arc::new(RecordingSleeper::new()))
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r: &Request| serde_json::from_slice(&r.body).expect("json body"))
        .collect()
}

#[tokio::test]
async fn test_history_excludes_in_flight_question() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/research/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "Answer"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let lifecycle = create_test_lifecycle(&mock_server.uri());
    let mut session = ChatSession::new(ChatMode::Research);

    session.send("First question", &lifecycle).await.unwrap();
    session.send("Second question", &lifecycle).await.unwrap();

    let bodies = request_bodies(&mock_server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["context"]["conversation_history"], json!([]));
    assert_eq!(
        bodies[1]["context"]["conversation_history"],
        json!([
            {"role": "user", "content": "First question"},
            {"role": "assistant", "content": "Answer"}
        ])
    );
    assert_eq!(bodies[1]["question"], "Second question");
    assert_eq!(session.messages().len(), 4);
}

#[tokio::test]
async fn test_blank_input_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "x"})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let lifecycle = create_test_lifecycle(&mock_server.uri());
    let mut session = ChatSession::new(ChatMode::Cami);

    assert!(session.send("   \n\t", &lifecycle).await.is_none());
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn test_failure_reply_is_recorded_in_history() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "limit_reached"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let lifecycle = create_test_lifecycle(&mock_server.uri());
    let mut session = ChatSession::new(ChatMode::Cami);

    let turn = session.send("Hello", &lifecycle).await.unwrap();
    assert!(!turn.is_success());
    assert!(turn.reply.contains("Sign up"), "{}", turn.reply);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].content, turn.reply);
}

#[tokio::test]
async fn test_scribe_result_sent_once_on_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/health/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "Noted"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let lifecycle = create_test_lifecycle(&mock_server.uri());
    let mut session = ChatSession::new(ChatMode::Health);
    session.set_health_focus(HealthFocus::Medicine);
    session.set_scribe_result(json!({"transcript": "patient reports headache"}));

    session.send("Summarize the visit", &lifecycle).await.unwrap();
    assert!(session.pending_scribe_result().is_none());
    session.send("Any red flags?", &lifecycle).await.unwrap();

    let bodies = request_bodies(&mock_server).await;
    assert_eq!(
        bodies[0]["scribe_result"],
        json!({"transcript": "patient reports headache"})
    );
    assert_eq!(bodies[0]["health_focus"], "medicine");
    assert!(bodies[1].get("scribe_result").map_or(true, Value::is_null));
    assert_eq!(bodies[1]["health_focus"], "medicine");
}

#[tokio::test]
async fn test_scribe_result_kept_after_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "boom"})))
        .mount(&mock_server)
        .await;

    let lifecycle = create_test_lifecycle(&mock_server.uri());
    let mut session = ChatSession::new(ChatMode::Health);
    session.set_scribe_result(json!({"transcript": "t"}));

    let turn = session.send("Summarize", &lifecycle).await.unwrap();
    assert!(!turn.is_success());
    assert!(session.pending_scribe_result().is_some());
}

#[tokio::test]
async fn test_health_focus_only_sent_in_health_mode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "ok"})))
        .mount(&mock_server)
        .await;

    let lifecycle = create_test_lifecycle(&mock_server.uri());
    let mut session = ChatSession::new(ChatMode::Tutor);
    session.set_health_focus(HealthFocus::Medicine);
    session.send("Explain limits", &lifecycle).await.unwrap();

    let bodies = request_bodies(&mock_server).await;
    assert!(bodies[0].get("health_focus").map_or(true, Value::is_null));
}
