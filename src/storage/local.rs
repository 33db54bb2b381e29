//! Local filesystem baseline store.
//!
//! One file per item, named `<id><suffix>`. Writes go to a temporary sibling
//! first and are renamed over the old file, so an interrupted write never
//! leaves a truncated baseline.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::ItemId;
use crate::storage::BaselineStore;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalBaselineStore {
    root_dir: PathBuf,
    suffix: String,
}

impl LocalBaselineStore {
    /// Open a store rooted at `root_dir`, creating the directory if needed.
    ///
    /// Failing here is fatal for the process: no item can be tracked.
    pub async fn open(root_dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Result<Self> {
        let root_dir = root_dir.into();
        tokio::fs::create_dir_all(&root_dir)
            .await
            .map_err(|e| AppError::storage(&root_dir, e))?;

        Ok(Self {
            root_dir,
            suffix: suffix.into(),
        })
    }

    /// Get the baseline path for an item.
    pub fn path(&self, id: &ItemId) -> PathBuf {
        self.root_dir.join(format!("{}{}", id, self.suffix))
    }

    /// Write bytes atomically (write to temp, then rename).
    ///
    /// The temp file is removed if any step fails.
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let result = Self::replace_with(&tmp, path, bytes).await;
        if result.is_err() {
            match tokio::fs::remove_file(&tmp).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {}", tmp.display(), e),
            }
        }
        result
    }

    async fn replace_with(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(tmp, path).await
    }
}

#[async_trait]
impl BaselineStore for LocalBaselineStore {
    async fn read(&self, id: &ItemId) -> Result<Option<Vec<u8>>> {
        let path = self.path(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::storage(&path, e)),
        }
    }

    async fn write(&self, id: &ItemId, bytes: &[u8]) -> Result<()> {
        let path = self.path(id);
        self.write_bytes(&path, bytes)
            .await
            .map_err(|e| AppError::storage(&path, e))?;
        log::debug!("Baseline for {} written to {}", id, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(raw: &str) -> ItemId {
        ItemId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("nested/baselines");
        let store = LocalBaselineStore::open(&root, ".html").await.unwrap();
        assert!(root.is_dir());
        assert_eq!(store.path(&id("5")), root.join("5.html"));
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBaselineStore::open(tmp.path(), ".html").await.unwrap();

        store.write(&id("1"), b"hello").await.unwrap();
        assert_eq!(store.read(&id("1")).await.unwrap(), Some(b"hello".to_vec()));

        store.write(&id("1"), b"hi").await.unwrap();
        assert_eq!(store.read(&id("1")).await.unwrap(), Some(b"hi".to_vec()));
        assert!(!tmp.path().join("1.html.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBaselineStore::open(tmp.path(), ".html").await.unwrap();
        assert!(store.read(&id("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_content_is_not_absence() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBaselineStore::open(tmp.path(), ".html").await.unwrap();
        store.write(&id("0"), b"").await.unwrap();
        assert_eq!(store.read(&id("0")).await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_ids_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBaselineStore::open(tmp.path(), ".sha256").await.unwrap();

        let writes = (0..16u64).map(|n| {
            let store = store.clone();
            tokio::spawn(async move {
                let id = ItemId::from(n);
                store.write(&id, n.to_string().as_bytes()).await
            })
        });
        for handle in writes.collect::<Vec<_>>() {
            handle.await.unwrap().unwrap();
        }

        for n in 0..16u64 {
            let got = store.read(&ItemId::from(n)).await.unwrap().unwrap();
            assert_eq!(got, n.to_string().into_bytes());
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBaselineStore::open(tmp.path(), ".html").await.unwrap();

        // A non-empty directory at the target makes the rename fail.
        let blocked = tmp.path().join("1.html");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("inner"), b"x").unwrap();

        let err = store.write(&id("1"), b"new").await.unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }));
        assert!(!tmp.path().join("1.html.tmp").exists());
        assert!(blocked.join("inner").exists());
    }

    #[tokio::test]
    async fn test_open_fails_when_root_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        let err = LocalBaselineStore::open(&file, ".html").await.unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }));
    }
}
