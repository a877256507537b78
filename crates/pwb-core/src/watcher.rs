//! Price change detection.
//!
//! One [`PriceWatcher::check`] call is one detection cycle: fetch, compare against the
//! stored snapshot, notify subscribers, persist. With no stored snapshot the cycle
//! records the raw upstream prices and announces the price list; afterwards the
//! margin-adjusted prices are compared and stored.

use std::{fmt, sync::Arc};

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    dispatcher::Notifier,
    domain::ChatId,
    errors::Error,
    formatting::{render, Notice},
    price::{PriceQuery, PriceSource, Snapshot},
    store::SnapshotStore,
    Result,
};

/// What a detection cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No previous snapshot: stored the upstream prices and announced them.
    Initialized { delivered: usize },
    /// Compared against the previous snapshot and stored the quoted prices.
    Compared {
        buy_dropped: bool,
        sell_increased: bool,
        delivered: usize,
    },
    /// Nothing was persisted.
    Failed { error: String },
    /// Another check was still running.
    Skipped,
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::Initialized { delivered } => {
                write!(f, "price list recorded, announced to {delivered} subscribers")
            }
            CheckOutcome::Compared {
                buy_dropped: false,
                sell_increased: false,
                ..
            } => write!(f, "no price change"),
            CheckOutcome::Compared {
                buy_dropped,
                sell_increased,
                delivered,
            } => {
                let mut changes = Vec::new();
                if *buy_dropped {
                    changes.push("buy dropped");
                }
                if *sell_increased {
                    changes.push("sell increased");
                }
                write!(f, "{} ({delivered} deliveries)", changes.join(", "))
            }
            CheckOutcome::Failed { error } => write!(f, "failed: {error}"),
            CheckOutcome::Skipped => write!(f, "skipped, a check is already running"),
        }
    }
}

pub struct PriceWatcher {
    source: Arc<dyn PriceSource>,
    snapshots: Arc<dyn SnapshotStore>,
    notifier: Notifier,
    query: PriceQuery,
    margin: Decimal,
    admin: ChatId,
    in_flight: Mutex<()>,
}

impl PriceWatcher {
    pub fn new(
        source: Arc<dyn PriceSource>,
        snapshots: Arc<dyn SnapshotStore>,
        notifier: Notifier,
        query: PriceQuery,
        margin: Decimal,
        admin: ChatId,
    ) -> Self {
        Self {
            source,
            snapshots,
            notifier,
            query,
            margin,
            admin,
            in_flight: Mutex::new(()),
        }
    }

    /// Run one detection cycle. Never panics on upstream or storage errors; overlapping
    /// calls return [`CheckOutcome::Skipped`].
    #[instrument(name = "price_check", skip(self))]
    pub async fn check(&self) -> CheckOutcome {
        let Ok(_running) = self.in_flight.try_lock() else {
            debug!("previous check still running");
            return CheckOutcome::Skipped;
        };

        let candidate = match self.fetch_candidate().await {
            Ok(c) => c,
            Err(e) => return self.fetch_failed(e).await,
        };

        let previous = match self.snapshots.load().await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "cannot load previous snapshot");
                return CheckOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let outcome = match previous {
            None => self.initialize(candidate).await,
            Some(prev) => match candidate.with_margin(self.margin) {
                Ok(quoted) => self.compare(&prev, quoted).await,
                Err(e) => return self.fetch_failed(e).await,
            },
        };
        info!(outcome = %outcome, "price check finished");
        outcome
    }

    /// The stored snapshot, if any.
    pub async fn current(&self) -> Result<Option<Snapshot>> {
        self.snapshots.load().await
    }

    async fn fetch_candidate(&self) -> Result<Snapshot> {
        let res = self.source.fetch(&self.query).await?;
        Snapshot::from_response(&res)
    }

    /// Upstream trouble goes to the admin only; subscribers never see it.
    async fn fetch_failed(&self, e: Error) -> CheckOutcome {
        let error = e.to_string();
        warn!(error = %error, "price fetch failed");
        self.notifier
            .send_one(self.admin, &render(&Notice::FetchFailed { error: &error }))
            .await;
        CheckOutcome::Failed { error }
    }

    async fn initialize(&self, candidate: Snapshot) -> CheckOutcome {
        if let Err(e) = self.snapshots.save(&candidate).await {
            error!(error = %e, "cannot store first snapshot");
            return CheckOutcome::Failed {
                error: e.to_string(),
            };
        }

        let report = self
            .notifier
            .broadcast(&render(&Notice::PriceList(&candidate)))
            .await;
        CheckOutcome::Initialized {
            delivered: report.delivered,
        }
    }

    async fn compare(&self, prev: &Snapshot, quoted: Snapshot) -> CheckOutcome {
        let buy_dropped = quoted.buy < prev.buy;
        let sell_increased = quoted.sell > prev.sell;

        let mut notices = Vec::new();
        if buy_dropped {
            notices.push(render(&Notice::BuyDropped {
                old: prev.buy,
                new: &quoted,
            }));
        }
        if sell_increased {
            notices.push(render(&Notice::SellIncreased {
                old: prev.sell,
                new: &quoted,
            }));
        }

        let mut delivered = 0;
        for html in &notices {
            delivered += self.notifier.broadcast(html).await.delivered;
        }

        if let Err(e) = self.snapshots.save(&quoted).await {
            error!(error = %e, "cannot store quoted snapshot");
            return CheckOutcome::Failed {
                error: e.to_string(),
            };
        }

        CheckOutcome::Compared {
            buy_dropped,
            sell_increased,
            delivered,
        }
    }
}
