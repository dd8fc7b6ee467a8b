//! Persistence boundary for engine state

use crate::error::{EngineError, EngineResult};
use crate::paper_trading::EngineSnapshot;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex as AsyncMutex;

/// Durable home for engine snapshots
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> EngineResult<Option<EngineSnapshot>>;
    async fn save(&self, snapshot: &EngineSnapshot) -> EngineResult<()>;
}

/// Keeps the latest snapshot in memory
#[derive(Default)]
pub struct MemoryStore {
    latest: Mutex<Option<EngineSnapshot>>,
    saves: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<EngineSnapshot> {
        self.latest.lock().clone()
    }

    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> EngineResult<Option<EngineSnapshot>> {
        Ok(self.latest())
    }

    async fn save(&self, snapshot: &EngineSnapshot) -> EngineResult<()> {
        *self.latest.lock() = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Writes snapshots as pretty JSON, replacing the file atomically.
///
/// Saves through one store are serialized; they share the temp file.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: AsyncMutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> EngineResult<Option<EngineSnapshot>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EngineError::Persistence(format!("{}: {}", self.path.display(), e))),
        }
    }

    async fn save(&self, snapshot: &EngineSnapshot) -> EngineResult<()> {
        let body = serde_json::to_vec_pretty(snapshot)?;
        let _guard = self.write_lock.lock().await;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::paper_trading::EngineState;
    use chrono::Utc;

    fn snapshot() -> EngineSnapshot {
        EngineState::new(EngineConfig::default()).snapshot(Utc::now())
    }

    #[tokio::test]
    async fn test_memory_store_keeps_latest() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());

        let snap = snapshot();
        store.save(&snap).await.unwrap();
        store.save(&snap).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(snap));
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let snap = snapshot();
        JsonFileStore::new(&path).save(&snap).await.unwrap();
        assert!(!dir.path().join("engine.json.tmp").exists());

        let loaded = JsonFileStore::new(&path).load().await.unwrap();
        assert_eq!(loaded, Some(snap));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(JsonFileStore::new(dir.path().join("engine.json")));
        let snap = snapshot();

        let writers: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let snap = snap.clone();
                tokio::spawn(async move {
                    for _ in 0..20 {
                        store.save(&snap).await?;
                    }
                    Ok::<_, EngineError>(())
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.unwrap(), Some(snap));
    }

    #[tokio::test]
    async fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, EngineError::Serialization(_)));
    }
}
