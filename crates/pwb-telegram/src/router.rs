use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use pwb_core::commands::CommandProcessor;

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<CommandProcessor>,
}

/// Long-poll Telegram updates and hand each message to the command processor.
pub async fn run_polling(bot: Bot, processor: Arc<CommandProcessor>) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "bot started"),
        Err(e) => warn!(error = %e, "get_me failed; continuing"),
    }

    let state = Arc::new(AppState { processor });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    info!("dispatcher stopped");
    Ok(())
}
