use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Default backend base URL.
pub const DEFAULT_API_BASE: &str = "https://api.usecami.com";
/// Demo key sent on every analyze request.
pub const DEFAULT_DEMO_API_KEY: &str = "demo_key_123";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub widget: WidgetSettings,
    pub rail: RailSettings,
}

/// Cami backend configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub demo_api_key: String,
    /// Bearer token used when no session store is supplied.
    pub auth_token: Option<String>,
    /// Value of `context.source` on analyze requests.
    pub source: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    /// Total HTTP attempts per submission, including the first.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub retry_delay_ms: u64,
}

/// Embeddable widget configuration
#[derive(Debug, Clone, Default)]
pub struct WidgetSettings {
    pub api_key: String,
    pub business_id: Option<String>,
}

/// Cami Money rail console configuration
#[derive(Debug, Clone)]
pub struct RailSettings {
    /// Origin serving the `/api/cami_money` proxy.
    pub base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = env::var("CAMI_API_BASE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let api = ApiConfig {
            base_url: normalize_base_url(&base_url)?,
            demo_api_key: env::var("CAMI_DEMO_API_KEY")
                .unwrap_or_else(|_| DEFAULT_DEMO_API_KEY.to_string()),
            auth_token: env::var("CAMI_AUTH_TOKEN").ok().filter(|s| !s.is_empty()),
            source: env::var("CAMI_SOURCE").unwrap_or_else(|_| "web_chat".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/cami.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = RequestConfig::default();
        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_ms),
            max_attempts: env::var("MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_delay_ms),
        };

        let widget = WidgetSettings {
            api_key: env::var("CAMI_WIDGET_KEY").unwrap_or_default(),
            business_id: env::var("CAMI_WIDGET_BUSINESS_ID")
                .ok()
                .filter(|s| !s.is_empty()),
        };

        let rail = RailSettings {
            base_url: match env::var("CAMI_MONEY_BASE")
                .ok()
                .filter(|s| !s.trim().is_empty())
            {
                Some(raw) => normalize_base_url(&raw)?,
                None => api.base_url.clone(),
            },
        };

        Ok(Config {
            api,
            database,
            logging,
            request,
            widget,
            rail,
        })
    }
}

/// Trim trailing slashes and reject anything that is not an http(s) URL.
pub fn normalize_base_url(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| AppError::Config {
        message: format!("CAMI_API_BASE is not a valid URL ({}): {}", trimmed, e),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(AppError::Config {
            message: format!("CAMI_API_BASE must use http or https, got {}", other),
        }),
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            demo_api_key: DEFAULT_DEMO_API_KEY.to_string(),
            auth_token: None,
            source: "web_chat".to_string(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_attempts: 3,
            retry_delay_ms: 4000,
        }
    }
}
