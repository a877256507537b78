//! Message templates rendered to Telegram HTML.
//!
//! Every user-facing text is produced by [`render`] from a [`Notice`]; nothing here
//! performs I/O.

use chrono::{DateTime, FixedOffset};
use num_format::{Locale, ToFormattedString};
use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::{price::Snapshot, watcher::CheckOutcome};

const CURRENCY_PREFIX: &str = "Rp";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render a price in the subscriber-facing currency format, e.g. `Rp 100.000`.
pub fn format_price(value: Decimal) -> String {
    let rounded = value.round_dp(0);
    match rounded.to_i64() {
        Some(n) if n < 0 => format!(
            "-{CURRENCY_PREFIX} {}",
            n.unsigned_abs().to_formatted_string(&Locale::id)
        ),
        Some(n) => format!("{CURRENCY_PREFIX} {}", n.to_formatted_string(&Locale::id)),
        None => format!("{CURRENCY_PREFIX} {rounded}"),
    }
}

/// Render the calendar date of an upstream timestamp, e.g. `01 May 2024`.
pub fn format_date(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%d %b %Y").to_string()
}

/// A message template together with its parameters.
#[derive(Clone, Debug)]
pub enum Notice<'a> {
    PriceList(&'a Snapshot),
    BuyDropped { old: Decimal, new: &'a Snapshot },
    SellIncreased { old: Decimal, new: &'a Snapshot },
    FetchFailed { error: &'a str },

    Welcome { name: &'a str },
    AlreadySubscribed,
    Unsubscribed,
    NotSubscribed,
    Help { is_admin: bool },
    FreeTextHint,
    UnknownCommand { command: &'a str },
    NoPriceYet,
    TryLater,

    Unauthorized,
    BroadcastUsage,
    BroadcastTooLong { max: usize },
    BroadcastBody { text: &'a str },
    BroadcastSent { delivered: usize, total: usize },
    SubscriberCount { count: usize },
    CheckDone(&'a CheckOutcome),
}

pub fn render(notice: &Notice<'_>) -> String {
    match notice {
        Notice::PriceList(s) => format!(
            "📊 <b>Gold price list</b>\n\n\
Buy: <b>{}</b>\n\
Sell: <b>{}</b>\n\n\
<i>Last update: {}</i>",
            format_price(s.buy),
            format_price(s.sell),
            format_date(&s.updated_at)
        ),

        Notice::BuyDropped { old, new } => format!(
            "📉 <b>Buy price dropped</b>\n\n\
{} → <b>{}</b>\n\n\
<i>Last update: {}</i>",
            format_price(*old),
            format_price(new.buy),
            format_date(&new.updated_at)
        ),

        Notice::SellIncreased { old, new } => format!(
            "📈 <b>Sell price increased</b>\n\n\
{} → <b>{}</b>\n\n\
<i>Last update: {}</i>",
            format_price(*old),
            format_price(new.sell),
            format_date(&new.updated_at)
        ),

        Notice::FetchFailed { error } => format!(
            "⚠️ <b>Price check failed</b>\n\n<code>{}</code>",
            escape_html(error)
        ),

        Notice::Welcome { name } => format!(
            "👋 Welcome, <b>{}</b>!\n\n\
You are now subscribed to gold price updates.\n\
Send /unsubscribe to stop receiving them.",
            escape_html(name)
        ),

        Notice::AlreadySubscribed => "ℹ️ You are already subscribed.".to_string(),

        Notice::Unsubscribed => {
            "👋 You have been unsubscribed. Send /subscribe to come back anytime.".to_string()
        }

        Notice::NotSubscribed => "ℹ️ You are not subscribed.".to_string(),

        Notice::Help { is_admin } => {
            let mut body = "🤖 <b>Gold Price Bot</b>\n\n\
<b>📋 Commands:</b>\n\
/subscribe - Receive price change notifications\n\
/unsubscribe - Stop receiving notifications\n\
/price - Show the current price list\n\
/help - Show this help message"
                .to_string();
            if *is_admin {
                body.push_str(
                    "\n\n<b>🔐 Admin commands:</b>\n\
/broadcast &lt;text&gt; - Send a message to all subscribers\n\
/check - Run a price check now\n\
/stats - Show subscriber count",
                );
            }
            body
        }

        Notice::FreeTextHint => "Send /help to see what I can do.".to_string(),

        Notice::UnknownCommand { command } => format!(
            "❓ Unknown command <code>/{}</code>. Send /help for the command list.",
            escape_html(command)
        ),

        Notice::NoPriceYet => "⏳ No price has been recorded yet. Try again shortly.".to_string(),

        Notice::TryLater => "⚠️ Something went wrong. Please try again later.".to_string(),

        Notice::Unauthorized => "⛔ You are not authorized to use this command.".to_string(),

        Notice::BroadcastUsage => {
            "✏️ Please provide a message: <code>/broadcast &lt;text&gt;</code>".to_string()
        }

        Notice::BroadcastTooLong { max } => {
            format!("✏️ Message is too long (max {max} characters).")
        }

        Notice::BroadcastBody { text } => format!("📢 {}", escape_html(text)),

        Notice::BroadcastSent { delivered, total } => {
            format!("✅ Broadcast delivered to {delivered} of {total} subscribers.")
        }

        Notice::SubscriberCount { count } => format!("👥 Subscribers: <b>{count}</b>"),

        Notice::CheckDone(outcome) => {
            format!("🔎 Price check: {}", escape_html(&outcome.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::parse_upstream_time;

    fn snapshot(buy: i64, sell: i64) -> Snapshot {
        Snapshot {
            buy: Decimal::from(buy),
            sell: Decimal::from(sell),
            updated_at: parse_upstream_time("2024-05-01T23:30:00+07:00").unwrap(),
        }
    }

    #[test]
    fn prices_use_dot_grouping_and_whole_units() {
        assert_eq!(format_price(Decimal::from(100_000)), "Rp 100.000");
        assert_eq!(format_price(Decimal::from(1_234_567)), "Rp 1.234.567");
        assert_eq!(format_price(Decimal::new(999_996, 1)), "Rp 100.000");
        assert_eq!(format_price(Decimal::from(950)), "Rp 950");
    }

    #[test]
    fn date_keeps_upstream_calendar_day() {
        let s = snapshot(1, 1);
        assert_eq!(format_date(&s.updated_at), "01 May 2024");
    }

    #[test]
    fn price_change_notices_show_old_and_new() {
        let new = snapshot(99_000, 96_000);
        let buy = render(&Notice::BuyDropped {
            old: Decimal::from(100_000),
            new: &new,
        });
        assert!(buy.contains("Rp 100.000 → <b>Rp 99.000</b>"));

        let sell = render(&Notice::SellIncreased {
            old: Decimal::from(95_000),
            new: &new,
        });
        assert!(sell.contains("Rp 95.000 → <b>Rp 96.000</b>"));
    }

    #[test]
    fn help_lists_admin_commands_only_for_admin() {
        let user = render(&Notice::Help { is_admin: false });
        let admin = render(&Notice::Help { is_admin: true });
        assert!(!user.contains("/broadcast"));
        assert!(admin.contains("/broadcast"));
        assert!(admin.starts_with(&user));
    }

    #[test]
    fn user_supplied_text_is_escaped() {
        let out = render(&Notice::BroadcastBody { text: "<3 & bye" });
        assert_eq!(out, "📢 &lt;3 &amp; bye");
        let out = render(&Notice::FetchFailed { error: "bad <json>" });
        assert!(out.contains("bad &lt;json&gt;"));
    }
}
