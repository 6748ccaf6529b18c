//! Local persistent cache of fetched resource payloads.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::LoaderResult;

/// Storage for the last successfully fetched payload of each resource.
///
/// Implementations do not lock; the loader serialises access per resource.
#[async_trait]
pub trait ResourceCache: Send + Sync {
    /// Read the cached payload, `None` if nothing is cached.
    async fn read(&self, resource_id: &str) -> LoaderResult<Option<Vec<u8>>>;

    /// Replace the cached payload.
    async fn write(&self, resource_id: &str, data: &[u8]) -> LoaderResult<()>;

    /// Drop the cached payload, if any.
    async fn remove(&self, resource_id: &str) -> LoaderResult<()>;
}

/// Cache storing one file per resource in a directory.
#[derive(Debug, Clone)]
pub struct FileResourceCache {
    root: PathBuf,
}

impl FileResourceCache {
    /// Create a cache rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> LoaderResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Cache directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, resource_id: &str) -> PathBuf {
        let file_name: String = resource_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{file_name}.dat"))
    }
}

#[async_trait]
impl ResourceCache for FileResourceCache {
    async fn read(&self, resource_id: &str) -> LoaderResult<Option<Vec<u8>>> {
        let path = self.path_for(resource_id);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                debug!(resource_id, path = %path.display(), bytes = data.len(), "Cache hit");
                Ok(Some(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(resource_id, "Cache miss");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, resource_id: &str, data: &[u8]) -> LoaderResult<()> {
        let path = self.path_for(resource_id);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(resource_id, path = %path.display(), bytes = data.len(), "Cache updated");
        Ok(())
    }

    async fn remove(&self, resource_id: &str) -> LoaderResult<()> {
        match tokio::fs::remove_file(self.path_for(resource_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory cache, for offline use and tests.
#[derive(Debug, Default)]
pub struct MemoryResourceCache {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResourceCache for MemoryResourceCache {
    async fn read(&self, resource_id: &str) -> LoaderResult<Option<Vec<u8>>> {
        Ok(self.entries.get(resource_id).map(|e| e.value().clone()))
    }

    async fn write(&self, resource_id: &str, data: &[u8]) -> LoaderResult<()> {
        self.entries.insert(resource_id.to_string(), data.to_vec());
        Ok(())
    }

    async fn remove(&self, resource_id: &str) -> LoaderResult<()> {
        self.entries.remove(resource_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileResourceCache::new(dir.path().join("nested")).unwrap();

        assert!(cache.read("ECB").await.unwrap().is_none());

        cache.write("ECB", b"<xml/>").await.unwrap();
        assert_eq!(cache.read("ECB").await.unwrap().unwrap(), b"<xml/>".to_vec());

        cache.write("ECB", b"<newer/>").await.unwrap();
        assert_eq!(cache.read("ECB").await.unwrap().unwrap(), b"<newer/>".to_vec());

        cache.remove("ECB").await.unwrap();
        assert!(cache.read("ECB").await.unwrap().is_none());
        cache.remove("ECB").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_cache_sanitizes_ids() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileResourceCache::new(dir.path()).unwrap();

        cache.write("../escape/ECB-HIST", b"data").await.unwrap();

        let expected = dir.path().join("___escape_ECB-HIST.dat");
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_memory_cache() {
        let cache = MemoryResourceCache::new();
        assert!(cache.is_empty());

        cache.write("IMF", b"tsv").await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.read("IMF").await.unwrap().unwrap(), b"tsv".to_vec());

        cache.remove("IMF").await.unwrap();
        assert!(cache.read("IMF").await.unwrap().is_none());
    }
}
