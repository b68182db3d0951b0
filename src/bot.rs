//! Command dispatch for the Telegram front-end.
//!
//! `/check` runs: quota peek → argument → syntax → quota increment → admin
//! notification → lookup → report. Invalid requests are answered before the
//! quota is touched, so they never cost the user a check.

use crate::{
    config::Config,
    errors::CheckerError,
    formatter::format_report_messages,
    metrics,
    rate_limit::{RateDecision, RateLimiter},
    telegram::{BotCommand, Message, Messenger, ParseMode, TelegramBot, User},
    validator::validate_domain,
    DomainChecker,
};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub const WELCOME_TEXT: &str = "> *Welcome to the Domain Checker Bot!*\n\n\
    > Check DNS, IP, MX, and more details for any domain.\n\
    > Usage:\n   '/check example.com' to check a domain\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Check(Option<String>),
    Contact,
    ResetKeys,
    Unknown(String),
}

impl Command {
    /// Parses `/name[@bot] args...`. Returns `None` when the text is not a
    /// command, or when it is addressed to a bot other than `bot_username`.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let (name, addressee) = match head.split_once('@') {
            Some((name, addressee)) => (name, Some(addressee)),
            None => (head, None),
        };
        if let (Some(addressee), Some(own)) = (addressee, bot_username) {
            if !addressee.eq_ignore_ascii_case(own) {
                return None;
            }
        }
        let name = name.to_lowercase();

        let command = match name.as_str() {
            "start" => Command::Start,
            "check" => Command::Check(parts.next().map(|arg| arg.to_string())),
            "contact" => Command::Contact,
            "resetkeys" => Command::ResetKeys,
            _ => Command::Unknown(name),
        };
        Some(command)
    }

    /// Commands advertised through `setMyCommands`.
    pub fn menu() -> Vec<BotCommand> {
        vec![
            BotCommand::new("start", "Welcome and usage info"),
            BotCommand::new("check", "Check a domain (/check domain.com)"),
            BotCommand::new("contact", "Contact info"),
        ]
    }
}

pub struct BotService {
    checker: DomainChecker,
    limiter: Arc<RateLimiter>,
    messenger: Arc<dyn Messenger>,
    admin_chat_id: Option<i64>,
    contact_text: String,
    bot_username: Option<String>,
}

impl BotService {
    pub fn new(
        config: &Config,
        checker: DomainChecker,
        limiter: Arc<RateLimiter>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            checker,
            limiter,
            messenger,
            admin_chat_id: config.admin_chat_id,
            contact_text: config.contact_text.clone(),
            bot_username: None,
        }
    }

    /// Commands suffixed with any other bot's name are ignored once this is set.
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    pub fn checker(&self) -> &DomainChecker {
        &self.checker
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub async fn handle_message(&self, message: &Message) {
        let bot_username = self.bot_username.as_deref();
        let Some(command) = message
            .text
            .as_deref()
            .and_then(|text| Command::parse(text, bot_username))
        else {
            return;
        };
        debug!("Chat {} sent {:?}", message.chat.id, command);

        match command {
            Command::Start => self.reply(message.chat.id, WELCOME_TEXT, Some(ParseMode::Markdown)).await,
            Command::Contact => {
                self.reply(message.chat.id, &self.contact_text, Some(ParseMode::Markdown))
                    .await
            }
            Command::Check(arg) => self.handle_check(message, arg).await,
            Command::ResetKeys => self.handle_reset_keys(message).await,
            Command::Unknown(name) => debug!("Ignoring unknown command /{}", name),
        }
    }

    async fn handle_check(&self, message: &Message, arg: Option<String>) {
        let chat_id = message.chat.id;
        let Some(user) = message.from.as_ref() else {
            debug!("Ignoring /check without sender in chat {}", chat_id);
            return;
        };
        let now = Utc::now();

        if let RateDecision::Denied { resets_at } = self.limiter.peek(user.id, now).await {
            self.reply_rate_limited(chat_id, user, resets_at).await;
            return;
        }

        let Some(raw_domain) = arg else {
            self.reply_error(chat_id, &CheckerError::MissingArgument).await;
            return;
        };

        let domain = match validate_domain(&raw_domain) {
            Ok(domain) => domain,
            Err(e) => {
                debug!("User {} sent invalid domain {:?}", user.id, raw_domain);
                self.reply_error(chat_id, &e).await;
                return;
            }
        };

        // A concurrent request may have used the last check since the peek
        if let RateDecision::Denied { resets_at } = self.limiter.check_and_increment(user.id, now).await {
            self.reply_rate_limited(chat_id, user, resets_at).await;
            return;
        }

        info!("User {} checking {}", user.id, domain);
        metrics::increment_checks(&domain);
        self.notify_admin(user, &domain);

        self.reply(chat_id, &format!("Checking {}...", domain), None).await;

        match self.checker.lookup(&domain).await {
            Ok(result) => {
                for chunk in format_report_messages(&result) {
                    if let Err(e) = self
                        .messenger
                        .send_message(chat_id, &chunk, Some(ParseMode::Markdown))
                        .await
                    {
                        warn!("Failed to deliver report for {} to chat {}: {}", domain, chat_id, e);
                        self.reply_error(chat_id, &e).await;
                        break;
                    }
                }
            }
            Err(e) => {
                if matches!(e, CheckerError::ApiKeysExhausted) {
                    error!("Lookup for {} failed: API key pool exhausted", domain);
                } else {
                    warn!("Lookup for {} failed: {}", domain, e);
                }
                self.reply_error(chat_id, &e).await;
            }
        }
        metrics::set_remaining_keys(self.checker.rotator().remaining_keys());
    }

    async fn handle_reset_keys(&self, message: &Message) {
        if self.admin_chat_id != Some(message.chat.id) {
            debug!("Ignoring /resetkeys from non-admin chat {}", message.chat.id);
            return;
        }

        let rotator = self.checker.rotator();
        rotator.reset();
        metrics::set_remaining_keys(rotator.remaining_keys());
        self.reply(
            message.chat.id,
            &format!("🔄 API key rotation reset. {} keys available.", rotator.pool_size()),
            None,
        )
        .await;
    }

    /// Fire-and-forget audit message to the admin chat. Failures are logged
    /// and never reach the user.
    pub fn notify_admin(&self, user: &User, domain: &str) -> Option<JoinHandle<()>> {
        let admin_chat_id = self.admin_chat_id?;
        let messenger = self.messenger.clone();
        let text = format!(
            "📝 *New Check Request*\n• User: `{}` ({})\n• ID: `{}`\n• Domain: `{}`",
            user.username.as_deref().unwrap_or("NoUsername"),
            user.first_name,
            user.id,
            domain
        );

        Some(tokio::spawn(async move {
            if let Err(e) = messenger
                .send_message(admin_chat_id, &text, Some(ParseMode::Markdown))
                .await
            {
                warn!("Failed to notify admin chat {}: {}", admin_chat_id, e);
            }
        }))
    }

    async fn reply_rate_limited(&self, chat_id: i64, user: &User, resets_at: chrono::DateTime<Utc>) {
        debug!("User {} is over quota until {}", user.id, resets_at);
        metrics::increment_rate_limited();
        let e = CheckerError::RateLimitExceeded {
            limit: self.limiter.max_requests(),
            resets_at,
        };
        self.reply(chat_id, &e.user_message(), None).await;
    }

    async fn reply_error(&self, chat_id: i64, e: &CheckerError) {
        metrics::increment_errors(e.kind());
        self.reply(chat_id, &e.user_message(), None).await;
    }

    async fn reply(&self, chat_id: i64, text: &str, parse_mode: Option<ParseMode>) {
        if let Err(e) = self.messenger.send_message(chat_id, text, parse_mode).await {
            warn!("Failed to reply to chat {}: {}", chat_id, e);
        }
    }

    /// Long-polls Telegram forever, handling each message on its own task.
    pub async fn run(self: Arc<Self>, bot: Arc<TelegramBot>, poll_timeout_seconds: u64) {
        if let Err(e) = bot.set_my_commands(&Command::menu()).await {
            warn!("Failed to register bot commands: {}", e);
        }

        info!("Polling Telegram for updates");
        let mut offset = 0;
        loop {
            match bot.get_updates(offset, poll_timeout_seconds).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(message) = update.message {
                            let service = self.clone();
                            tokio::spawn(async move {
                                service.handle_message(&message).await;
                            });
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to fetch updates: {}", e);
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                }
            }
        }
    }
}
