//! Telegram update handlers.
//!
//! Converts a Telegram message into a core [`IncomingMessage`] and hands it to the
//! command processor. Non-text messages are ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::debug;

use pwb_core::{
    domain::{ChatId, UserId},
    messaging::types::IncomingMessage,
};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
        return Ok(());
    };

    let incoming = IncomingMessage {
        chat_id: ChatId(msg.chat.id.0),
        user_id: UserId(user.id.0 as i64),
        display_name: display_name(
            &user.first_name,
            user.last_name.as_deref(),
            user.username.as_deref(),
        ),
        text: text.to_string(),
    };

    // Failures are handled (logged / replied) inside the processor.
    state.processor.handle(&incoming).await;
    Ok(())
}

/// Best-effort human name: "First Last", else "@username", else "unknown".
fn display_name(first: &str, last: Option<&str>, username: Option<&str>) -> String {
    let full = match last.map(str::trim).filter(|l| !l.is_empty()) {
        Some(last) => format!("{} {}", first.trim(), last),
        None => first.trim().to_string(),
    };
    let full = full.trim().to_string();
    if !full.is_empty() {
        return full;
    }
    match username.map(str::trim).filter(|u| !u.is_empty()) {
        Some(u) => format!("@{u}"),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(display_name("Ana", Some("Putri"), Some("ana")), "Ana Putri");
        assert_eq!(display_name("Ana", None, Some("ana")), "Ana");
        assert_eq!(display_name(" ", Some(" "), Some("ana")), "@ana");
        assert_eq!(display_name("", None, None), "unknown");
    }
}
