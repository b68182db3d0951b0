use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_API_BASE_URL: &str = "https://api.securitytrails.com/v1/";
pub const DEFAULT_MAX_REQUESTS_PER_WINDOW: u32 = 2;
pub const DEFAULT_WINDOW_SECONDS: u64 = 86400;

pub const DEFAULT_CONTACT_TEXT: &str = "> *Contact*\n\n\
    > Questions or abuse reports: reply here and the operator will get back to you.";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_keys: Vec<String>,
    pub api_base_url: String,
    pub admin_chat_id: Option<i64>,
    pub max_requests_per_window: u32,
    pub window_seconds: u64,
    pub request_timeout_seconds: u64,
    pub poll_timeout_seconds: u64,
    pub cache_ttl_seconds: u64,       // 0 disables the lookup cache
    pub cache_max_entries: u64,
    pub key_reset_interval_seconds: u64, // 0 keeps exhaustion sticky
    pub contact_text: String,
    pub port: u16,
    pub start_time: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigData {
    pub bot_token: String,
    pub api_keys: Vec<String>,
    pub api_base_url: String,
    pub admin_chat_id: Option<i64>,
    pub max_requests_per_window: u32,
    pub window_seconds: u64,
    pub request_timeout_seconds: u64,
    pub poll_timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    pub key_reset_interval_seconds: u64,
    pub contact_text: String,
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let is_production = Self::is_production_environment();

        let mut settings = config::Config::builder()
            .set_default("bot_token", "")?
            .set_default("api_keys", Vec::<String>::new())?
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("max_requests_per_window", DEFAULT_MAX_REQUESTS_PER_WINDOW as i64)?
            .set_default("window_seconds", DEFAULT_WINDOW_SECONDS)?
            .set_default("request_timeout_seconds", if is_production { 30 } else { 15 })?
            .set_default("poll_timeout_seconds", 30)?
            .set_default("cache_ttl_seconds", if is_production { 3600 } else { 1800 })?
            .set_default("cache_max_entries", 1000)?
            .set_default("key_reset_interval_seconds", 0)?
            .set_default("contact_text", DEFAULT_CONTACT_TEXT)?
            .set_default("port", Self::get_default_port())?;

        // Override with environment variables if present
        settings = Self::apply_env_overrides(settings)?;

        let config_data: ConfigData = settings.build()?.try_deserialize()?;

        let config = Config {
            bot_token: config_data.bot_token,
            api_keys: config_data.api_keys,
            api_base_url: config_data.api_base_url,
            admin_chat_id: config_data.admin_chat_id,
            max_requests_per_window: config_data.max_requests_per_window,
            window_seconds: config_data.window_seconds,
            request_timeout_seconds: config_data.request_timeout_seconds,
            poll_timeout_seconds: config_data.poll_timeout_seconds,
            cache_ttl_seconds: config_data.cache_ttl_seconds,
            cache_max_entries: config_data.cache_max_entries,
            key_reset_interval_seconds: config_data.key_reset_interval_seconds,
            contact_text: config_data.contact_text,
            port: config_data.port,
            start_time: Instant::now(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bot_token is required (set BOT_TOKEN)".to_string(),
            ));
        }
        if self.api_keys.is_empty() {
            return Err(config::ConfigError::Message(
                "at least one API key is required (set API_KEYS)".to_string(),
            ));
        }
        if self.max_requests_per_window == 0 {
            return Err(config::ConfigError::Message(
                "max_requests_per_window must be greater than zero".to_string(),
            ));
        }
        if self.window_seconds == 0 {
            return Err(config::ConfigError::Message(
                "window_seconds must be greater than zero".to_string(),
            ));
        }
        url::Url::parse(&self.api_base_url)
            .map_err(|e| config::ConfigError::Message(format!("invalid api_base_url: {}", e)))?;
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn is_production_environment() -> bool {
        std::env::var("ENVIRONMENT")
            .or_else(|_| std::env::var("ENV"))
            .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
            .unwrap_or(false)
    }

    fn get_default_port() -> u16 {
        std::env::var("PORT")
            .or_else(|_| std::env::var("HTTP_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000)
    }

    /// Splits a comma separated key list, dropping blanks.
    pub fn parse_key_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|k| k.to_string())
            .collect()
    }

    fn apply_env_overrides(mut settings: config::ConfigBuilder<config::builder::DefaultState>) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let env_mappings = [
            ("TELEGRAM_BOT_TOKEN", "bot_token"),
            ("BOT_TOKEN", "bot_token"),
            ("API_BASE_URL", "api_base_url"),
            ("ADMIN_CHAT_ID", "admin_chat_id"),
            ("MAX_REQUESTS_PER_WINDOW", "max_requests_per_window"),
            ("WINDOW_SECONDS", "window_seconds"),
            ("REQUEST_TIMEOUT_SECONDS", "request_timeout_seconds"),
            ("POLL_TIMEOUT_SECONDS", "poll_timeout_seconds"),
            ("CACHE_TTL_SECONDS", "cache_ttl_seconds"),
            ("CACHE_TTL", "cache_ttl_seconds"),
            ("CACHE_MAX_ENTRIES", "cache_max_entries"),
            ("KEY_RESET_INTERVAL_SECONDS", "key_reset_interval_seconds"),
            ("CONTACT_TEXT", "contact_text"),
            ("PORT", "port"),
        ];

        for (env_var, config_key) in env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                settings = settings.set_override(config_key, value)?;
            }
        }

        // Later entries win, same as the scalar mappings above
        for env_var in ["SECURITYTRAILS_API_KEYS", "API_KEYS"] {
            if let Ok(value) = std::env::var(env_var) {
                settings = settings.set_override("api_keys", Self::parse_key_list(&value))?;
            }
        }

        Ok(settings)
    }
}
