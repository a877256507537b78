//! Persistent state: the subscriber registry and the current price snapshot.
//!
//! Both stores replace their whole value on every write and never cache reads, so
//! each call observes the latest persisted state.

use async_trait::async_trait;

use crate::{
    domain::{ChatId, Subscriber},
    price::Snapshot,
    Result,
};

pub mod file;
pub mod memory;

pub use file::{JsonSnapshotStore, JsonSubscriberStore};
pub use memory::{MemorySnapshotStore, MemorySubscriberStore};

#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// All subscribers in insertion order.
    async fn list(&self) -> Result<Vec<Subscriber>>;

    async fn contains(&self, chat_id: ChatId) -> Result<bool>;

    /// Returns false without writing if `chat_id` is already subscribed.
    async fn add(&self, chat_id: ChatId, name: &str) -> Result<bool>;

    /// Returns false without writing if `chat_id` is not subscribed.
    async fn remove(&self, chat_id: ChatId) -> Result<bool>;
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<Snapshot>>;

    async fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Idempotent: clearing an absent snapshot is not an error.
    async fn clear(&self) -> Result<()>;
}

/// Startup reset policy. With `reset` set the stored snapshot is discarded, so the
/// first check after startup records fresh prices and announces the full price list.
///
/// Returns whether the snapshot was cleared.
pub async fn apply_startup_policy(snapshots: &dyn SnapshotStore, reset: bool) -> Result<bool> {
    if !reset {
        return Ok(false);
    }
    snapshots.clear().await?;
    Ok(true)
}
