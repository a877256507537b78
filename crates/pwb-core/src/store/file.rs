use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, Subscriber},
    errors::Error,
    price::Snapshot,
    store::{SnapshotStore, SubscriberStore},
    Result,
};

/// Subscriber registry persisted as a JSON array.
pub struct JsonSubscriberStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    write_lock: Mutex<()>,
}

impl JsonSubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<Subscriber>> {
        Ok(read_json::<Vec<Subscriber>>(&self.path)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl SubscriberStore for JsonSubscriberStore {
    async fn list(&self) -> Result<Vec<Subscriber>> {
        self.read_all().await
    }

    async fn contains(&self, chat_id: ChatId) -> Result<bool> {
        Ok(self.read_all().await?.iter().any(|s| s.chat_id == chat_id))
    }

    async fn add(&self, chat_id: ChatId, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut all = self.read_all().await?;
        if all.iter().any(|s| s.chat_id == chat_id) {
            return Ok(false);
        }
        all.push(Subscriber::new(chat_id, name));
        write_json(&self.path, &all).await?;
        Ok(true)
    }

    async fn remove(&self, chat_id: ChatId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut all = self.read_all().await?;
        let before = all.len();
        all.retain(|s| s.chat_id != chat_id);
        if all.len() == before {
            return Ok(false);
        }
        write_json(&self.path, &all).await?;
        Ok(true)
    }
}

/// Current price snapshot persisted as a single JSON object.
pub struct JsonSnapshotStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        read_json::<Snapshot>(&self.path).await
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_json(&self.path, snapshot).await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::persistence(&self.path, e)),
        }
    }
}

/// Read a JSON value; a missing or blank file reads as `None`.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let txt = match tokio::fs::read_to_string(path).await {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::persistence(path, e)),
    };
    if txt.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&txt)
        .map(Some)
        .map_err(|e| Error::persistence(path, e))
}

/// Replace the file contents as a whole: write a sibling temp file, then rename it
/// over the target. A failed write leaves the previous file untouched.
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let txt = serde_json::to_string_pretty(value)?;

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::persistence(path, e))?;
    }

    tokio::fs::write(&tmp, txt)
        .await
        .map_err(|e| Error::persistence(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::persistence(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::parse_upstream_time;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.json"))
    }

    #[tokio::test]
    async fn add_is_idempotent_and_survives_reopen() {
        let path = tmp_file("pwb-subs");
        let store = JsonSubscriberStore::new(&path);

        assert!(store.add(ChatId(1), "alice").await.unwrap());
        assert!(!store.add(ChatId(1), "alice again").await.unwrap());
        assert!(store.add(ChatId(2), "").await.unwrap());

        let reopened = JsonSubscriberStore::new(&path);
        let all = reopened.list().await.unwrap();
        assert_eq!(
            all.iter().map(|s| s.chat_id).collect::<Vec<_>>(),
            vec![ChatId(1), ChatId(2)]
        );
        assert_eq!(all[0].name, "alice");
        assert_eq!(all[1].name, "unknown");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn remove_unknown_leaves_file_untouched() {
        let path = tmp_file("pwb-subs-rm");
        let store = JsonSubscriberStore::new(&path);
        store.add(ChatId(7), "bob").await.unwrap();
        let before = std::fs::read(&path).unwrap();

        assert!(!store.remove(ChatId(8)).await.unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), before);

        assert!(store.remove(ChatId(7)).await.unwrap());
        assert!(!store.contains(ChatId(7)).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn concurrent_adds_are_not_lost() {
        let path = tmp_file("pwb-subs-race");
        let store = Arc::new(JsonSubscriberStore::new(&path));

        let mut handles = Vec::new();
        for id in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.add(ChatId(id), "x").await.unwrap()
            }));
        }
        for h in handles {
            assert!(h.await.unwrap());
        }
        assert_eq!(store.list().await.unwrap().len(), 20);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_persistence_error() {
        let path = tmp_file("pwb-subs-bad");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonSubscriberStore::new(&path);
        assert!(matches!(
            store.list().await,
            Err(Error::Persistence { .. })
        ));
        assert!(store.add(ChatId(1), "x").await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn snapshot_save_load_clear() {
        let path = tmp_file("pwb-snap");
        let store = JsonSnapshotStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();

        let snap = Snapshot {
            buy: Decimal::from(100_000),
            sell: Decimal::from(95_000),
            updated_at: parse_upstream_time("2024-05-01T10:00:00+07:00").unwrap(),
        };
        store.save(&snap).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(snap));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }
}
