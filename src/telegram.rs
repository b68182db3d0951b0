//! Minimal Telegram Bot API client.
//!
//! Only the calls the bot needs: `getMe`, long polling with `getUpdates`,
//! `sendMessage` and `setMyCommands`. Requests go to
//! `https://api.telegram.org/bot<token>/<method>` as JSON.

use crate::{config::Config, errors::CheckerError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: &str, description: &str) -> Self {
        Self {
            command: command.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Serialize)]
struct SendMessageParams<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
}

#[derive(Serialize)]
struct GetUpdatesParams {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Serialize)]
struct SetMyCommandsParams<'a> {
    commands: &'a [BotCommand],
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, parse_mode: Option<ParseMode>) -> Result<(), CheckerError>;
}

pub struct TelegramBot {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl TelegramBot {
    pub fn new(config: &Config) -> Result<Self, CheckerError> {
        Self::with_api_url(config, TELEGRAM_API_URL)
    }

    pub fn with_api_url(config: &Config, api_url: &str) -> Result<Self, CheckerError> {
        // No client-wide timeout: long polls set their own per request
        let client = reqwest::Client::builder()
            .user_agent(concat!("domain-checker-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}/", api_url.trim_end_matches('/'), config.bot_token),
            request_timeout: config.request_timeout(),
        })
    }

    /// The bot's own account; its username tells which `/cmd@name` suffixes are ours.
    pub async fn get_me(&self) -> Result<User, CheckerError> {
        let envelope = self
            .raw_call("getMe", &serde_json::json!({}), self.request_timeout)
            .await?;
        into_result(envelope)
    }

    /// Long-polls for new messages starting at `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_seconds: u64) -> Result<Vec<Update>, CheckerError> {
        let params = GetUpdatesParams {
            offset,
            timeout: timeout_seconds,
            allowed_updates: ["message"],
        };
        let timeout = Duration::from_secs(timeout_seconds) + self.request_timeout;
        let envelope = self.raw_call("getUpdates", &params, timeout).await?;
        into_result(envelope)
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), CheckerError> {
        let envelope: ApiEnvelope<bool> = self
            .raw_call("setMyCommands", &SetMyCommandsParams { commands }, self.request_timeout)
            .await?;
        into_result(envelope).map(|_| ())
    }

    async fn raw_call<P, T>(&self, method: &str, params: &P, timeout: Duration) -> Result<ApiEnvelope<T>, CheckerError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // The URL carries the bot token, so it is stripped from errors
        let response = self
            .client
            .post(format!("{}{}", self.base_url, method))
            .json(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(redact)?;

        let body = response.text().await.map_err(redact)?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn send_message(&self, chat_id: i64, text: &str, parse_mode: Option<ParseMode>) -> Result<(), CheckerError> {
        let params = SendMessageParams { chat_id, text, parse_mode };
        let envelope: ApiEnvelope<serde_json::Value> =
            self.raw_call("sendMessage", &params, self.request_timeout).await?;

        // Telegram rejects Markdown it cannot parse with a 400; retry as plain text
        if !envelope.ok && envelope.error_code == Some(400) && parse_mode.is_some() {
            warn!(
                "Markdown rejected for chat {} ({}), resending as plain text",
                chat_id,
                envelope.description.as_deref().unwrap_or("no description")
            );
            let plain = SendMessageParams { chat_id, text, parse_mode: None };
            let envelope: ApiEnvelope<serde_json::Value> =
                self.raw_call("sendMessage", &plain, self.request_timeout).await?;
            return into_result(envelope).map(|_| ());
        }

        debug!("Sent message to chat {}", chat_id);
        into_result(envelope).map(|_| ())
    }
}

fn into_result<T>(envelope: ApiEnvelope<T>) -> Result<T, CheckerError> {
    if !envelope.ok {
        return Err(CheckerError::Telegram(format!(
            "{} (code {})",
            envelope.description.unwrap_or_else(|| "unknown error".to_string()),
            envelope.error_code.unwrap_or_default()
        )));
    }
    envelope
        .result
        .ok_or_else(|| CheckerError::Telegram("response without result".to_string()))
}

fn redact(error: reqwest::Error) -> CheckerError {
    if error.is_timeout() {
        CheckerError::Timeout
    } else {
        CheckerError::HttpError(error.without_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mocks::test_config;

    #[test]
    fn test_decodes_updates() {
        let envelope: ApiEnvelope<Vec<Update>> = serde_json::from_str(
            r#"{"ok":true,"result":[
                {"update_id":10,"message":{"message_id":1,"date":0,"chat":{"id":99,"type":"private"},
                 "from":{"id":5,"is_bot":false,"first_name":"Ada","username":"ada"},"text":"/check example.com"}},
                {"update_id":11,"edited_message":{"message_id":1}}
            ]}"#,
        )
        .unwrap();

        let updates = into_result(envelope).unwrap();
        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 99);
        assert_eq!(message.from.as_ref().unwrap().username.as_deref(), Some("ada"));
        assert_eq!(message.text.as_deref(), Some("/check example.com"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_decodes_get_me() {
        let envelope: ApiEnvelope<User> = serde_json::from_str(
            r#"{"ok":true,"result":{"id":123,"is_bot":true,"first_name":"Checker","username":"DomainBot","can_join_groups":true}}"#,
        )
        .unwrap();

        let me = into_result(envelope).unwrap();
        assert!(me.is_bot);
        assert_eq!(me.username.as_deref(), Some("DomainBot"));
    }

    #[test]
    fn test_error_envelope() {
        let envelope: ApiEnvelope<bool> = serde_json::from_str(
            r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
        )
        .unwrap();

        match into_result(envelope) {
            Err(CheckerError::Telegram(msg)) => assert_eq!(msg, "Unauthorized (code 401)"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_send_params_omit_missing_parse_mode() {
        let plain = serde_json::to_value(SendMessageParams { chat_id: 1, text: "hi", parse_mode: None }).unwrap();
        assert!(plain.get("parse_mode").is_none());

        let markdown = serde_json::to_value(SendMessageParams {
            chat_id: 1,
            text: "hi",
            parse_mode: Some(ParseMode::Markdown),
        })
        .unwrap();
        assert_eq!(markdown["parse_mode"], "Markdown");
    }

    #[test]
    fn test_base_url_embeds_token() {
        let bot = TelegramBot::with_api_url(&test_config(), "http://localhost:8081/").unwrap();
        assert_eq!(bot.base_url, "http://localhost:8081/bottest-token/");
    }
}
