//! In-memory stand-ins for the network seams, shared by unit tests.

use crate::{
    api::{ApiResponse, DomainApi},
    config::{Config, DEFAULT_CONTACT_TEXT},
    errors::CheckerError,
    formatter::MAX_MESSAGE_LEN,
    telegram::{Messenger, ParseMode},
};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Mutex, time::Instant};

pub fn test_config() -> Config {
    Config {
        bot_token: "test-token".to_string(),
        api_keys: vec!["key-1".to_string(), "key-2".to_string()],
        api_base_url: "http://127.0.0.1:9/v1/".to_string(),
        admin_chat_id: Some(1000),
        max_requests_per_window: 2,
        window_seconds: 86400,
        request_timeout_seconds: 5,
        poll_timeout_seconds: 1,
        cache_ttl_seconds: 60,
        cache_max_entries: 100,
        key_reset_interval_seconds: 0,
        contact_text: DEFAULT_CONTACT_TEXT.to_string(),
        port: 0,
        start_time: Instant::now(),
    }
}

pub fn sample_body() -> String {
    r#"{
        "hostname": "example.com",
        "apex_domain": "example.com",
        "current_dns": {"a": {"values": [{"ip": "93.184.216.34"}]}},
        "subdomain_count": 5
    }"#
    .to_string()
}

enum Scripted {
    Respond(u16, String),
    Timeout,
}

/// Answers per API key; records the key used by every call.
#[derive(Default)]
pub struct MockDomainApi {
    responses: HashMap<String, Scripted>,
    calls: Mutex<Vec<String>>,
}

impl MockDomainApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, api_key: &str, status: u16, body: &str) -> Self {
        self.responses
            .insert(api_key.to_string(), Scripted::Respond(status, body.to_string()));
        self
    }

    pub fn fail_with_timeout(mut self, api_key: &str) -> Self {
        self.responses.insert(api_key.to_string(), Scripted::Timeout);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DomainApi for MockDomainApi {
    async fn get_domain(&self, _domain: &str, api_key: &str) -> Result<ApiResponse, CheckerError> {
        self.calls.lock().unwrap().push(api_key.to_string());
        match self.responses.get(api_key) {
            Some(Scripted::Respond(status, body)) => Ok(ApiResponse {
                status: *status,
                body: body.clone(),
            }),
            Some(Scripted::Timeout) => Err(CheckerError::Timeout),
            None => Ok(ApiResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub parse_mode: Option<ParseMode>,
}

/// Collects outgoing messages. Like Telegram it refuses texts over the
/// message limit; chats listed in `failing_chats` always get an error.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    failing_chats: Vec<i64>,
    reject_markdown: bool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(chat_id: i64) -> Self {
        Self {
            failing_chats: vec![chat_id],
            ..Self::default()
        }
    }

    /// Fails every Markdown message, as if both the Markdown and the plain
    /// text attempt had been refused.
    pub fn rejecting_markdown(mut self) -> Self {
        self.reject_markdown = true;
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.text)
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, chat_id: i64, text: &str, parse_mode: Option<ParseMode>) -> Result<(), CheckerError> {
        if self.failing_chats.contains(&chat_id) {
            return Err(CheckerError::Telegram("chat not found (code 400)".to_string()));
        }
        if text.encode_utf16().count() > MAX_MESSAGE_LEN {
            return Err(CheckerError::Telegram("message is too long (code 400)".to_string()));
        }
        if self.reject_markdown && parse_mode.is_some() {
            return Err(CheckerError::Telegram("can't parse entities (code 400)".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            parse_mode,
        });
        Ok(())
    }
}
