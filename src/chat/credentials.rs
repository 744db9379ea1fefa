//! Opportunistic bearer-token lookup.
//!
//! Authentication is never required by the analyze endpoint; a signed-in user's
//! token only unlocks per-user memory. Providers are injected into the
//! lifecycle so tests can hand it a fixed token.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::AppResult;

/// Tokens at or below this length are treated as absent.
pub const MIN_TOKEN_LEN: usize = 20;

/// Source of an optional bearer token.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialProvider: Send + Sync {
    /// Return the current token, if any.
    fn bearer_token(&self) -> Option<String>;
}

/// Whether a token is long enough to be worth sending.
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() > MIN_TOKEN_LEN
}

/// Provider that never authenticates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// Provider holding a fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Provider backed by a snapshot of browser-style session storage.
///
/// Entries are scanned for keys shaped like `sb-<ref>-auth-token` whose value
/// is JSON carrying `access_token` at the top level or under `currentSession`.
#[derive(Debug, Clone, Default)]
pub struct SessionStoreCredentials {
    entries: HashMap<String, String>,
}

impl SessionStoreCredentials {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Load entries from a JSON object file of string keys to string values.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: HashMap<String, String> = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), entries = entries.len(), "Loaded session store");
        Ok(Self::new(entries))
    }
}

impl CredentialProvider for SessionStoreCredentials {
    fn bearer_token(&self) -> Option<String> {
        // Sorted so the pick is stable when several projects are signed in.
        let mut keys: Vec<&String> = self
            .entries
            .keys()
            .filter(|k| k.starts_with("sb-") && k.ends_with("-auth-token"))
            .collect();
        keys.sort();

        keys.into_iter().find_map(|key| {
            let parsed: serde_json::Value = serde_json::from_str(&self.entries[key]).ok()?;
            let token = parsed
                .get("access_token")
                .and_then(|v| v.as_str())
                .or_else(|| {
                    parsed
                        .get("currentSession")
                        .and_then(|s| s.get("access_token"))
                        .and_then(|v| v.as_str())
                })?;
            is_well_formed_token(token).then(|| token.to_string())
        })
    }
}
