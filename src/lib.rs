//! # Cami Client
//!
//! Typed client for the Cami multi-mode assistant API. All reasoning happens
//! on the backend; this crate builds requests, absorbs cold starts, and
//! classifies every failure into a value the caller can render.
//!
//! ## Features
//!
//! - **Request lifecycle**: fixed-delay retry on `503` and transport failures,
//!   no retry on access-limit or other rejections
//! - **Chat sessions**: conversation history, health focus, scribe attachments
//! - **Widget session**: the embeddable widget's request/response loop
//! - **Conversation history**: local SQLite persistence of recent chats
//! - **Scribe**: audio transcription attached to the next question
//! - **Cami Money**: hold, exchange and settle through the demo rail
//!
//! ## Architecture
//!
//! ```text
//! CLI → ChatSession → RequestLifecycle → Analyze Endpoint (HTTP)
//!            ↓
//!      SQLite (history)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use cami_client::chat::{ChatMode, ChatSession, RequestLifecycle};
//! use cami_client::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let lifecycle = RequestLifecycle::new(&config.api, config.request.clone())?;
//!     let mut session = ChatSession::new(ChatMode::Research);
//!     if let Some(turn) = session.send("What changed in the 2024 tax code?", &lifecycle).await {
//!         println!("{}", turn.reply);
//!     }
//!     Ok(())
//! }
//! ```

/// Warmup, stats, and feedback endpoints.
pub mod backend;
/// Chat request lifecycle, classification, and sessions.
pub mod chat;
/// Command-line interface.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Cami Money financial-rail demo console client.
pub mod rail;
/// Audio transcription upload.
pub mod scribe;
/// SQLite storage for conversation history.
pub mod storage;
/// Embeddable widget session.
pub mod widget;

pub use chat::{ChatMode, ChatRequest, ChatResponse, ChatSession, RequestLifecycle};
pub use config::Config;
pub use error::{AppError, AppResult, ChatError, ChatResult};
