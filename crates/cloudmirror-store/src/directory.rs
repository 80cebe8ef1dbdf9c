//! Directory-backed blob store
//!
//! One regular file per object, directly under the store root. Lookups are
//! case-insensitive: an exact match wins, otherwise the directory is scanned
//! for a case-folded match. Writing a key replaces any object whose key
//! differs only in case, so the store never holds two such objects.

use std::io::ErrorKind;
use std::path::PathBuf;

use cloudmirror_core::domain::newtypes::{ContentHash, Locator};
use cloudmirror_core::ports::blob_store::{BlobObject, IBlobStore};
use sha1::{Digest, Sha1};
use tracing::{debug, instrument};

use crate::StoreError;

/// Suffix of in-progress writes, never listed as objects
const PARTIAL_SUFFIX: &str = ".cloudmirror-partial";

/// Stable publication handle for a key
///
/// First 8 bytes of the SHA-1 of the lower-cased key, big-endian.
#[must_use]
pub fn handle_for(key: &str) -> u64 {
    let digest = Sha1::digest(key.to_lowercase().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Flat blob store kept in a single directory
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
    locator_base_url: String,
}

impl DirectoryBlobStore {
    /// Use an existing directory as the store
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, locator_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            locator_base_url: locator_base_url.into(),
        }
    }

    /// Create the store directory if needed
    pub async fn open(
        root: impl Into<PathBuf>,
        locator_base_url: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let store = Self::new(root, locator_base_url);
        tokio::fs::create_dir_all(&store.root).await?;
        Ok(store)
    }

    fn validate_key(key: &str) -> Result<(), StoreError> {
        let invalid = key.is_empty()
            || key == "."
            || key == ".."
            || key.contains('/')
            || key.contains('\\')
            || key.ends_with(PARTIAL_SUFFIX);
        if invalid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    /// Path of the object matching `key`, if any
    async fn resolve(&self, key: &str) -> anyhow::Result<Option<PathBuf>> {
        Self::validate_key(key)?;

        let exact = self.root.join(key);
        if tokio::fs::metadata(&exact)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Ok(Some(exact));
        }

        let folded = key.to_lowercase();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.to_lowercase() == folded && entry.file_type().await?.is_file() {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl IBlobStore for DirectoryBlobStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn list_objects(&self) -> anyhow::Result<Vec<BlobObject>> {
        let mut objects = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let key = entry.file_name().to_string_lossy().into_owned();
            if key.ends_with(PARTIAL_SUFFIX) || !entry.file_type().await?.is_file() {
                continue;
            }
            let data = tokio::fs::read(entry.path()).await?;
            objects.push(BlobObject {
                key,
                size: data.len() as u64,
                data,
            });
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(objects = objects.len(), "listing complete");
        Ok(objects)
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.resolve(key).await?.is_some())
    }

    #[instrument(skip(self))]
    async fn read_object(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        let path = self
            .resolve(key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let data = tokio::fs::read(&path).await?;
        debug!(bytes = data.len(), "object read");
        Ok(data)
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn write_object(&self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        if let Some(existing) = self.resolve(key).await? {
            if existing.file_name().map(|n| n.to_string_lossy() != key).unwrap_or(true) {
                debug!(replaced = %existing.display(), "replacing object with differently cased key");
                tokio::fs::remove_file(&existing).await?;
            }
        }

        let target = self.root.join(key);
        let partial = self.root.join(format!("{key}{PARTIAL_SUFFIX}"));
        tokio::fs::write(&partial, data).await?;
        tokio::fs::rename(&partial, &target).await?;
        debug!("object written");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, key: &str) -> anyhow::Result<bool> {
        let Some(path) = self.resolve(key).await? else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("object deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn publish_object(&self, key: &str, hash: &ContentHash) -> anyhow::Result<Locator> {
        if self.resolve(key).await?.is_none() {
            return Err(StoreError::NotFound(key.to_string()).into());
        }
        Ok(Locator::published(
            &self.locator_base_url,
            handle_for(key),
            hash,
        ))
    }
}
