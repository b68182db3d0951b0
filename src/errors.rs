use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Missing domain argument")]
    MissingArgument,

    #[error("Rate limit exceeded: {limit} checks per window")]
    RateLimitExceeded { limit: u32, resets_at: DateTime<Utc> },

    #[error("All API keys exhausted or invalid")]
    ApiKeysExhausted,

    #[error("Unexpected API status: {0}")]
    UnexpectedApiStatus(u16),

    #[error("Network timeout")]
    Timeout,

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid JSON in response: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckerError {
    /// Failures of the transport itself, as opposed to answers from the API.
    pub fn is_network(&self) -> bool {
        match self {
            CheckerError::Timeout => true,
            CheckerError::HttpError(e) => !e.is_status(),
            _ => false,
        }
    }

    /// Short label used for the `errors_total` metric.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckerError::InvalidDomain(_) => "invalid_domain",
            CheckerError::MissingArgument => "missing_argument",
            CheckerError::RateLimitExceeded { .. } => "rate_limited",
            CheckerError::ApiKeysExhausted => "keys_exhausted",
            CheckerError::UnexpectedApiStatus(_) => "unexpected_status",
            CheckerError::Timeout => "timeout",
            CheckerError::HttpError(_) => "http",
            CheckerError::JsonError(_) => "invalid_json",
            CheckerError::ConfigError(_) => "config",
            CheckerError::Telegram(_) => "telegram",
            CheckerError::Internal(_) => "internal",
        }
    }

    /// Text sent back to the chat user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            CheckerError::InvalidDomain(_) => {
                "❌ Invalid domain format.\nPlease provide a correct domain, e.g., example.com".to_string()
            }
            CheckerError::MissingArgument => {
                "Please provide a domain. Example:\n/check example.com".to_string()
            }
            CheckerError::RateLimitExceeded { limit, resets_at } => format!(
                "⚠️ You reached your limit of {} checks.\nPlease try again after {} UTC.",
                limit,
                resets_at.format("%Y-%m-%d %H:%M")
            ),
            CheckerError::ApiKeysExhausted => "Error: All API keys exhausted or invalid.".to_string(),
            CheckerError::UnexpectedApiStatus(code) => format!("Error: Unexpected error: {}", code),
            e if e.is_network() => {
                "Error: Could not reach the domain service. Please try again later.".to_string()
            }
            _ => "Error: Something went wrong while checking this domain.".to_string(),
        }
    }
}
