use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{Relation, SnapshotCache};
use crate::error::CacheError;

/// Distinguishes concurrent writers of the same key.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Snapshot cache keeping one `<relation>.snap` file per key in a directory.
#[derive(Debug, Clone)]
pub struct DirSnapshotCache {
    cache_dir: PathBuf,
}

impl DirSnapshotCache {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, key: Relation) -> PathBuf {
        self.cache_dir.join(format!("{}.snap", key.key()))
    }
}

#[async_trait]
impl SnapshotCache for DirSnapshotCache {
    async fn get(&self, key: Relation) -> Result<Option<Vec<u8>>, CacheError> {
        match tokio::fs::read(self.cache_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: Relation, value: Vec<u8>) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        // Readers only ever see a complete file
        let path = self.cache_path(key);
        let partial = self.cache_dir.join(format!(
            "{}.{}.{}.partial",
            key.key(),
            std::process::id(),
            WRITE_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let written = match tokio::fs::write(&partial, value).await {
            Ok(()) => tokio::fs::rename(&partial, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                debug!(path = ?partial, error = %cleanup, "Partial snapshot not removed");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn available(&self) -> bool {
        if let Err(e) = tokio::fs::create_dir_all(&self.cache_dir).await {
            debug!(cache_dir = ?self.cache_dir, error = %e, "Cache directory unavailable");
            return false;
        }
        match tokio::fs::metadata(&self.cache_dir).await {
            Ok(metadata) => metadata.is_dir() && !metadata.permissions().readonly(),
            Err(e) => {
                debug!(cache_dir = ?self.cache_dir, error = %e, "Cache directory unavailable");
                false
            }
        }
    }

    fn backend_type(&self) -> &'static str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let dir = tempdir().unwrap();
        let cache = DirSnapshotCache::new(dir.path());
        assert!(cache.get(Relation::Serves).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempdir().unwrap();
        let cache = DirSnapshotCache::new(dir.path().join("nested"));
        assert!(cache.available().await);

        cache.put(Relation::Serves, vec![1, 2, 3]).await.unwrap();
        cache.put(Relation::Serves, vec![4, 5]).await.unwrap();
        assert_eq!(cache.get(Relation::Serves).await.unwrap(), Some(vec![4, 5]));
        let files: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("serves.snap")]);
    }

    #[tokio::test]
    async fn test_failed_put_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        // A non-empty directory in place of the snapshot file makes the rename fail
        let blocker = dir.path().join("serves.snap");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        let cache = DirSnapshotCache::new(dir.path());
        let err = cache.put(Relation::Serves, vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, CacheError::Io(_)));

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("serves.snap")]);
    }

    #[tokio::test]
    async fn test_unavailable_when_path_is_a_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, b"x").unwrap();
        let cache = DirSnapshotCache::new(&file);
        assert!(!cache.available().await);
    }
}
