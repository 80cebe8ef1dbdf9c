//! Blob store port (driven/secondary port)
//!
//! The remote side is a flat keyed object store with no folder concept.
//! Key lookup is case-insensitive. Objects are normally stored under
//! `"{hash}_{name}"`; a few bookkeeping objects live under their bare name.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because backend errors are adapter-specific.
//! - Every method is a single request; timeouts and cancellation are
//!   applied by the caller around each awaited call.

use crate::domain::newtypes::{ContentHash, Locator, ObjectKey};

/// An object as enumerated from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobObject {
    /// Literal storage key
    pub key: String,
    /// Size in bytes as reported by the store
    pub size: u64,
    /// Full object contents
    pub data: Vec<u8>,
}

/// Port trait for the flat blob store
#[async_trait::async_trait]
pub trait IBlobStore: Send + Sync {
    /// Enumerates every object with its contents
    async fn list_objects(&self) -> anyhow::Result<Vec<BlobObject>>;

    /// Whether an object exists under `key`
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    /// Reads an object's bytes
    ///
    /// # Errors
    /// Returns an error if no object matches `key`
    async fn read_object(&self, key: &str) -> anyhow::Result<Vec<u8>>;

    /// Writes an object, replacing any object with the same key
    async fn write_object(&self, key: &str, data: &[u8]) -> anyhow::Result<()>;

    /// Deletes an object
    ///
    /// # Returns
    /// `true` if an object existed and was deleted
    async fn delete_object(&self, key: &str) -> anyhow::Result<bool>;

    /// Shares an object and returns its retrieval locator
    ///
    /// The locator embeds an opaque handle plus the content hash.
    async fn publish_object(&self, key: &str, hash: &ContentHash) -> anyhow::Result<Locator>;

    /// Deletes an object under either historical naming convention
    ///
    /// Tries `"{hash}_{name}"` first, then the bare `name`.
    ///
    /// # Returns
    /// `true` if either variant existed
    async fn delete_variants(&self, name: &str, hash: &ContentHash) -> anyhow::Result<bool> {
        let combined = ObjectKey::new(name, hash.clone()).to_string();
        let deleted_combined = self.delete_object(&combined).await?;
        let deleted_bare = self.delete_object(name).await?;
        Ok(deleted_combined || deleted_bare)
    }
}
