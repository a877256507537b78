use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, Subscriber},
    price::Snapshot,
    store::{SnapshotStore, SubscriberStore},
    Result,
};

/// In-process subscriber registry (tests, embedding).
#[derive(Default)]
pub struct MemorySubscriberStore {
    inner: Mutex<Vec<Subscriber>>,
}

impl MemorySubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn list(&self) -> Result<Vec<Subscriber>> {
        Ok(self.inner.lock().await.clone())
    }

    async fn contains(&self, chat_id: ChatId) -> Result<bool> {
        Ok(self.inner.lock().await.iter().any(|s| s.chat_id == chat_id))
    }

    async fn add(&self, chat_id: ChatId, name: &str) -> Result<bool> {
        let mut all = self.inner.lock().await;
        if all.iter().any(|s| s.chat_id == chat_id) {
            return Ok(false);
        }
        all.push(Subscriber::new(chat_id, name));
        Ok(true)
    }

    async fn remove(&self, chat_id: ChatId) -> Result<bool> {
        let mut all = self.inner.lock().await;
        let before = all.len();
        all.retain(|s| s.chat_id != chat_id);
        Ok(all.len() != before)
    }
}

/// In-process snapshot holder (tests, embedding).
#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Mutex::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.inner.lock().await = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.lock().await = None;
        Ok(())
    }
}
