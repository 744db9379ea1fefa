//! Integration tests for audio transcription uploads
//!
//! Uses wiremock for the transcription endpoint and feeds the result into a
//! chat session.

use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::{
    matchers::{header_regex, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use cami_client::chat::{ChatMode, ChatSession, RecordingSleeper, RequestLifecycle};
use cami_client::config::{ApiConfig, RequestConfig};
use cami_client::error::{ApiError, AppError};
use cami_client::scribe::{ScribeClient, AUDIO_FORMAT_UNSUPPORTED};

fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        ..ApiConfig::default()
    }
}

/// Create a scribe client pointing to mock server
fn create_test_scribe(base_url: &str) -> ScribeClient {
    ScribeClient::new(&api_config(base_url), &RequestConfig::default())
        .expect("Failed to create scribe client")
}

#[tokio::test]
async fn test_upload_sends_audio_part_with_mode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/scribe/transcribe"))
        .and(query_param("mode", "health"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "soap_notes": "S: patient reports headache",
            "utterances": [{"speaker": "A", "text": "My head hurts", "emotion": "distress"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scribe = create_test_scribe(&mock_server.uri());
    let transcription = scribe
        .transcribe(ChatMode::Health, b"RIFF....WAVEfmt ".to_vec(), "visit.wav")
        .await
        .unwrap();

    assert_eq!(transcription["soap_notes"], "S: patient reports headache");

    let requests = mock_server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="audio""#), "{}", body);
    assert!(body.contains(r#"filename="visit.wav""#), "{}", body);
    assert!(body.to_lowercase().contains("content-type: audio/wav"), "{}", body);
}

#[tokio::test]
async fn test_format_rejection_is_explained() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/scribe/transcribe"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Invalid file format: audio/x-caf is not supported"
        })))
        .mount(&mock_server)
        .await;

    let scribe = create_test_scribe(&mock_server.uri());
    let err = scribe
        .transcribe(ChatMode::Cami, vec![0u8; 16], "memo.caf")
        .await
        .unwrap_err();

    match err {
        ApiError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, AUDIO_FORMAT_UNSUPPORTED);
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_detail_used_when_error_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(413).set_body_json(json!({
            "detail": "Recording longer than 60 minutes"
        })))
        .mount(&mock_server)
        .await;

    let scribe = create_test_scribe(&mock_server.uri());
    let err = scribe
        .transcribe(ChatMode::Cami, vec![0u8; 16], "long.mp3")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApiError::Api { status: 413, ref message } if message == "Recording longer than 60 minutes"
    ));
}

#[tokio::test]
async fn test_error_in_success_body_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "No speech detected"
        })))
        .mount(&mock_server)
        .await;

    let scribe = create_test_scribe(&mock_server.uri());
    let err = scribe
        .transcribe(ChatMode::Research, vec![0u8; 16], "silence.webm")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApiError::Api { status: 200, ref message } if message == "No speech detected"
    ));
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let scribe = create_test_scribe("http://127.0.0.1:9");
    let dir = tempfile::tempdir().unwrap();
    let err = scribe
        .transcribe_file(ChatMode::Health, &dir.path().join("absent.wav"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Io(_)));
}

#[tokio::test]
async fn test_transcription_feeds_next_question() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/scribe/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_summary": "Client discussed sleep problems"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/health/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "Noted"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let audio_path = dir.path().join("session.webm");
    std::fs::write(&audio_path, b"\x1a\x45\xdf\xa3webm").unwrap();

    let scribe = create_test_scribe(&mock_server.uri());
    let transcription = scribe
        .transcribe_file(ChatMode::Health, &audio_path)
        .await
        .unwrap();

    let lifecycle = RequestLifecycle::new(&api_config(&mock_server.uri()), RequestConfig::default())
        .unwrap()
        .with_sleeper(Arc::new(RecordingSleeper::new()));
    let mut session = ChatSession::new(ChatMode::Health);
    session.set_scribe_result(transcription);
    session
        .send("Summarize this session", &lifecycle)
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let analyze = requests
        .iter()
        .find(|r| r.url.path() == "/health/analyze")
        .unwrap();
    let body: Value = serde_json::from_slice(&analyze.body).unwrap();
    assert_eq!(
        body["scribe_result"]["session_summary"],
        "Client discussed sleep problems"
    );
}
