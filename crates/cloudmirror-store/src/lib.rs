//! Cloudmirror Store - Blob store and hierarchical index adapters
//!
//! ## Architecture
//!
//! This crate implements the `IBlobStore` and `IIndexStore` ports from
//! `cloudmirror-core`. It is a driven (secondary) adapter in the hexagonal
//! architecture.
//!
//! ## Key Components
//!
//! - [`DirectoryBlobStore`] - Flat, case-insensitive store backed by one directory
//! - [`InMemoryBlobStore`] - Same contract in memory, with failure injection
//! - [`BlobIndexStore`] - Index record and folder list kept inside a blob store
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use cloudmirror_store::{BlobIndexStore, DirectoryBlobStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let blobs = Arc::new(
//!     DirectoryBlobStore::open("/srv/cloudmirror/store", "https://steamusercontent-a.akamaihd.net")
//!         .await?,
//! );
//! let index = BlobIndexStore::new(blobs.clone(), "CloudInfo.json", "CloudFolder.json");
//! # Ok(())
//! # }
//! ```

pub mod directory;
pub mod index;
pub mod memory;

pub use directory::DirectoryBlobStore;
pub use index::{folder_list, BlobIndexStore};
pub use memory::InMemoryBlobStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object matches the key
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The key cannot name a flat object
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// The persisted index record exists but cannot be parsed
    #[error("Malformed index '{name}': {reason}")]
    MalformedIndex { name: String, reason: String },

    /// The backend refused the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Filesystem error in a directory-backed store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_index_display() {
        let err = StoreError::MalformedIndex {
            name: "CloudInfo.json".into(),
            reason: "expected value at line 1 column 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed index 'CloudInfo.json': expected value at line 1 column 1"
        );
    }
}
