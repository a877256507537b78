//! Inbound command handling.
//!
//! Maps one incoming message to store mutations and replies. Nothing here keeps state
//! between messages.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::{
    dispatcher::Notifier,
    domain::ChatId,
    formatting::{render, Notice},
    messaging::types::IncomingMessage,
    store::SubscriberStore,
    watcher::PriceWatcher,
};

const COMMAND_PREFIX: char = '/';

/// Split `/cmd@botname rest of text` into (`cmd`, `rest of text`).
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    if !text.starts_with(COMMAND_PREFIX) {
        return None;
    }

    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches(COMMAND_PREFIX)
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    Some((cmd, rest))
}

pub struct CommandProcessor {
    subscribers: Arc<dyn SubscriberStore>,
    notifier: Notifier,
    watcher: Arc<PriceWatcher>,
    admin: ChatId,
}

impl CommandProcessor {
    pub fn new(
        subscribers: Arc<dyn SubscriberStore>,
        notifier: Notifier,
        watcher: Arc<PriceWatcher>,
        admin: ChatId,
    ) -> Self {
        Self {
            subscribers,
            notifier,
            watcher,
            admin,
        }
    }

    fn is_admin(&self, msg: &IncomingMessage) -> bool {
        msg.user_id.0 == self.admin.0
    }

    async fn reply(&self, msg: &IncomingMessage, notice: Notice<'_>) {
        self.notifier.send_one(msg.chat_id, &render(&notice)).await;
    }

    #[instrument(
        name = "handle_message",
        skip(self, msg),
        fields(chat_id = msg.chat_id.0, user_id = msg.user_id.0)
    )]
    pub async fn handle(&self, msg: &IncomingMessage) {
        let is_admin = self.is_admin(msg);

        let Some((cmd, arg)) = parse_command(&msg.text) else {
            // Admin free text is not an error; anyone else gets a hint.
            if !is_admin {
                self.reply(msg, Notice::FreeTextHint).await;
            }
            return;
        };

        info!(command = %cmd, "command received");

        match cmd.as_str() {
            "start" | "help" => self.reply(msg, Notice::Help { is_admin }).await,
            "subscribe" => self.subscribe(msg).await,
            "unsubscribe" => self.unsubscribe(msg).await,
            "price" => self.price(msg).await,
            "broadcast" => self.broadcast(msg, is_admin, &arg).await,
            "check" => self.check(msg, is_admin).await,
            "stats" => self.stats(msg, is_admin).await,
            other => {
                self.reply(msg, Notice::UnknownCommand { command: other })
                    .await
            }
        }
    }

    async fn subscribe(&self, msg: &IncomingMessage) {
        match self.subscribers.add(msg.chat_id, &msg.display_name).await {
            Ok(true) => {
                info!(name = %msg.display_name, "subscriber added");
                self.reply(
                    msg,
                    Notice::Welcome {
                        name: &msg.display_name,
                    },
                )
                .await;

                match self.watcher.current().await {
                    Ok(Some(snapshot)) => self.reply(msg, Notice::PriceList(&snapshot)).await,
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "cannot load snapshot for new subscriber"),
                }
            }
            Ok(false) => self.reply(msg, Notice::AlreadySubscribed).await,
            Err(e) => {
                error!(error = %e, "subscribe failed");
                self.reply(msg, Notice::TryLater).await;
            }
        }
    }

    async fn unsubscribe(&self, msg: &IncomingMessage) {
        match self.subscribers.remove(msg.chat_id).await {
            Ok(true) => {
                info!("subscriber removed");
                self.reply(msg, Notice::Unsubscribed).await;
            }
            Ok(false) => self.reply(msg, Notice::NotSubscribed).await,
            Err(e) => {
                error!(error = %e, "unsubscribe failed");
                self.reply(msg, Notice::TryLater).await;
            }
        }
    }

    async fn price(&self, msg: &IncomingMessage) {
        match self.watcher.current().await {
            Ok(Some(snapshot)) => self.reply(msg, Notice::PriceList(&snapshot)).await,
            Ok(None) => self.reply(msg, Notice::NoPriceYet).await,
            Err(e) => {
                error!(error = %e, "cannot load snapshot");
                self.reply(msg, Notice::TryLater).await;
            }
        }
    }

    async fn broadcast(&self, msg: &IncomingMessage, is_admin: bool, text: &str) {
        if !is_admin {
            info!("broadcast rejected: not admin");
            self.reply(msg, Notice::Unauthorized).await;
            return;
        }
        if text.is_empty() {
            self.reply(msg, Notice::BroadcastUsage).await;
            return;
        }

        let body = render(&Notice::BroadcastBody { text });
        let max = self.notifier.messenger().capabilities().max_message_len;
        if body.chars().count() > max {
            self.reply(msg, Notice::BroadcastTooLong { max }).await;
            return;
        }

        let report = self.notifier.broadcast(&body).await;
        self.reply(
            msg,
            Notice::BroadcastSent {
                delivered: report.delivered,
                total: report.total,
            },
        )
        .await;
    }

    async fn check(&self, msg: &IncomingMessage, is_admin: bool) {
        if !is_admin {
            self.reply(msg, Notice::Unauthorized).await;
            return;
        }
        let outcome = self.watcher.check().await;
        self.reply(msg, Notice::CheckDone(&outcome)).await;
    }

    async fn stats(&self, msg: &IncomingMessage, is_admin: bool) {
        if !is_admin {
            self.reply(msg, Notice::Unauthorized).await;
            return;
        }
        match self.subscribers.list().await {
            Ok(all) => {
                self.reply(msg, Notice::SubscriberCount { count: all.len() })
                    .await
            }
            Err(e) => {
                error!(error = %e, "cannot list subscribers");
                self.reply(msg, Notice::TryLater).await;
            }
        }
    }
}
