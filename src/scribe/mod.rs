//! Audio transcription upload.
//!
//! The transcript comes back as an opaque JSON object that a [`ChatSession`]
//! attaches to its next question as `scribe_result`.
//!
//! [`ChatSession`]: crate::chat::ChatSession

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::chat::{body_error, field_text, ChatMode};
use crate::config::{ApiConfig, RequestConfig};
use crate::error::{ApiError, ApiResult, AppError, AppResult};

/// Shown instead of the backend's text when it cannot decode the upload.
pub const AUDIO_FORMAT_UNSUPPORTED: &str =
    "Audio format not supported. Try uploading a .mp3, .wav, or .m4a file instead.";

/// File name used when the audio has none.
pub const DEFAULT_RECORDING_NAME: &str = "recording.webm";

/// Client for `POST /scribe/transcribe`.
#[derive(Clone)]
pub struct ScribeClient {
    client: Client,
    base_url: String,
}

impl ScribeClient {
    pub fn new(config: &ApiConfig, request_config: &RequestConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(AppError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Read an audio file and transcribe it.
    pub async fn transcribe_file(&self, mode: ChatMode, path: &Path) -> AppResult<Value> {
        let audio = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_RECORDING_NAME);
        Ok(self.transcribe(mode, audio, filename).await?)
    }

    /// Upload audio as the `audio` multipart field and return the transcription.
    pub async fn transcribe(
        &self,
        mode: ChatMode,
        audio: Vec<u8>,
        filename: &str,
    ) -> ApiResult<Value> {
        let url = format!("{}/scribe/transcribe", self.base_url);
        let size = audio.len();
        let part = Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str(audio_mime(filename))?;
        let form = Form::new().part("audio", part);

        debug!(mode = %mode, file = %filename, bytes = size, "Uploading audio");
        let response = self
            .client
            .post(&url)
            .query(&[("mode", mode.as_str())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let transcription = interpret_transcription(status, &body)?;
        info!(mode = %mode, status = status.as_u16(), "Audio transcribed");
        Ok(transcription)
    }
}

/// Decide whether a transcription response is usable.
///
/// Failures carry `error`, else `detail`, else the status reason. A `400`
/// about the audio encoding is reported as [`AUDIO_FORMAT_UNSUPPORTED`].
pub fn interpret_transcription(status: StatusCode, body: &str) -> ApiResult<Value> {
    let data: Value = serde_json::from_str(body).unwrap_or_else(|_| Value::Object(Default::default()));

    if !status.is_success() {
        let message = data
            .as_object()
            .and_then(|map| field_text(map, "error").or_else(|| field_text(map, "detail")))
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "Transcription failed".to_string());

        let message = if status == StatusCode::BAD_REQUEST && is_format_error(&message) {
            AUDIO_FORMAT_UNSUPPORTED.to_string()
        } else {
            message
        };
        return Err(ApiError::Api {
            status: status.as_u16(),
            message,
        });
    }

    if let Some(message) = body_error(&data) {
        return Err(ApiError::Api {
            status: status.as_u16(),
            message,
        });
    }

    if !data.is_object() {
        return Err(ApiError::InvalidResponse {
            message: "Transcription is not a JSON object".to_string(),
        });
    }
    Ok(data)
}

/// Mode-specific summary of a transcription, if the pipeline produced one.
pub fn transcription_summary(transcription: &Value) -> Option<&str> {
    ["irac_analysis", "soap_notes", "session_summary"]
        .iter()
        .filter_map(|key| transcription.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

fn is_format_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["mime", "format", "unsupported", "codec"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn audio_mime(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("webm") => "audio/webm",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}
