//! Port definitions (hexagonal architecture interfaces)
//!
//! The reconciliation engine depends only on these traits. Implementations
//! live in adapter crates: `cloudmirror-store` for the blob store and the
//! hierarchical index, `cloudmirror-sync` for the local filesystem.
//!
//! ## Ports Overview
//!
//! - [`IBlobStore`] - Flat, case-insensitive remote object store
//! - [`IIndexStore`] - Persisted hierarchical index over the blob store
//! - [`ILocalFileSystem`] - Local file I/O used while applying actions

pub mod blob_store;
pub mod index_store;
pub mod local_filesystem;

pub use blob_store::{BlobObject, IBlobStore};
pub use index_store::{IIndexStore, IndexSnapshot};
pub use local_filesystem::ILocalFileSystem;
