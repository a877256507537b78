use std::sync::Arc;

use pwb_core::{
    commands::CommandProcessor,
    config::Config,
    dispatcher::Notifier,
    messaging::port::MessagingPort,
    price::{PriceQuery, PriceSource},
    scheduler::spawn_price_loop,
    store::{
        apply_startup_policy, JsonSnapshotStore, JsonSubscriberStore, SnapshotStore,
        SubscriberStore,
    },
    watcher::PriceWatcher,
};
use pwb_price::HttpPriceSource;
use pwb_telegram::TelegramMessenger;
use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), pwb_core::Error> {
    pwb_core::logging::init("pwb")?;

    let cfg = Arc::new(Config::load()?);
    info!(
        data_dir = %cfg.data_dir.display(),
        poll_secs = cfg.poll_interval.as_secs(),
        margin = %cfg.price_margin,
        "configuration loaded"
    );

    let subscribers: Arc<dyn SubscriberStore> =
        Arc::new(JsonSubscriberStore::new(cfg.subscribers_file.clone()));
    let snapshots: Arc<dyn SnapshotStore> =
        Arc::new(JsonSnapshotStore::new(cfg.snapshot_file.clone()));

    match apply_startup_policy(snapshots.as_ref(), cfg.reset_snapshot_on_start).await {
        Ok(true) => info!("stored snapshot discarded on startup"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "cannot discard stored snapshot"),
    }

    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let source: Arc<dyn PriceSource> =
        Arc::new(HttpPriceSource::new(cfg.price_api_url.clone(), cfg.http_timeout)?);

    let notifier = Notifier::new(messenger, subscribers.clone());
    let watcher = Arc::new(PriceWatcher::new(
        source,
        snapshots,
        notifier.clone(),
        PriceQuery {
            interval: cfg.price_interval.clone(),
            direction: cfg.price_direction.clone(),
        },
        cfg.price_margin,
        cfg.admin_chat_id,
    ));
    let processor = Arc::new(CommandProcessor::new(
        subscribers,
        notifier,
        watcher.clone(),
        cfg.admin_chat_id,
    ));

    let cancel = CancellationToken::new();
    let price_loop = spawn_price_loop(watcher, cfg.poll_interval, cancel.clone());

    tokio::select! {
        res = pwb_telegram::router::run_polling(bot, processor) => {
            if let Err(e) = res {
                error!(error = %e, "telegram bot failed");
            }
        }
        _ = shutdown_signal() => info!("shutdown requested"),
    }

    cancel.cancel();
    if let Err(e) = price_loop.await {
        error!(error = %e, "price loop task failed");
    }

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (Ok(mut sigterm), Ok(mut sigint)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
