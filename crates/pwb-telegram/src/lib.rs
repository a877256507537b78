//! Telegram adapter (teloxide).
//!
//! This crate implements the `pwb-core` MessagingPort over the Telegram Bot API and
//! routes incoming Telegram messages to the core command processor.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode, ApiError, RequestError};

use tokio::time::sleep;
use tracing::debug;

pub mod handlers;
pub mod router;

use pwb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

/// Bot API limit for a message body, in characters.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Flood-control waits honoured per send before giving up.
const MAX_FLOOD_WAITS: usize = 1;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn send_once(
        &self,
        chat_id: ChatId,
        html: &str,
    ) -> std::result::Result<Message, RequestError> {
        self.bot
            .send_message(teloxide::types::ChatId(chat_id.0), html.to_string())
            .parse_mode(ParseMode::Html)
            .await
    }
}

/// Rejects bodies Telegram would refuse, without a round trip.
fn check_len(html: &str) -> Result<()> {
    let len = html.chars().count();
    if len > TELEGRAM_MAX_MESSAGE_LEN {
        return Err(Error::Validation(format!(
            "message is {len} characters, limit is {TELEGRAM_MAX_MESSAGE_LEN}"
        )));
    }
    Ok(())
}

/// Map a send failure for `chat_id` into a transport error. Recipients that blocked
/// the bot or no longer exist are called out so the log explains missed deliveries.
fn delivery_error(chat_id: ChatId, e: RequestError) -> Error {
    match e {
        RequestError::Api(ApiError::BotBlocked) => {
            Error::Transport(format!("chat {} blocked the bot", chat_id.0))
        }
        RequestError::Api(ApiError::ChatNotFound) => {
            Error::Transport(format!("chat {} not found", chat_id.0))
        }
        other => Error::Transport(format!("telegram error: {other}")),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: TELEGRAM_MAX_MESSAGE_LEN,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        check_len(html)?;

        let mut waits = 0usize;
        let msg = loop {
            match self.send_once(chat_id, html).await {
                Ok(msg) => break msg,
                Err(RequestError::RetryAfter(wait)) if waits < MAX_FLOOD_WAITS => {
                    waits += 1;
                    debug!(
                        chat_id = chat_id.0,
                        wait_secs = wait.as_secs(),
                        "flood control, waiting"
                    );
                    sleep(wait).await;
                }
                Err(e) => return Err(delivery_error(chat_id, e)),
            }
        };

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }
}
