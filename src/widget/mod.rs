//! Embeddable third-party widget session.
//!
//! Mirrors what the widget script does on a host page: optional remote config,
//! a short rolling history per request, and per-reply feedback.

mod client;
mod types;

pub use client::*;
pub use types::*;
