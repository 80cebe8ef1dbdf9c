//! Cloudmirror Sync - Three-way reconciliation engine
//!
//! Provides:
//! - Local tree scanning into content-addressed items
//! - Per-request timeout and cancellation for store calls
//! - Two-pass reconciliation of the local tree, blob store and index
//!
//! ## Modules
//!
//! - [`engine`] - Reconciliation engine (presence triple, action table, passes)
//! - [`filesystem`] - Local filesystem adapter (atomic writes, empty-dir cleanup)
//! - [`scanner`] - Recursive local tree scanner
//! - [`transport`] - Timeout + cancellation discipline for store requests

pub mod engine;
pub mod filesystem;
pub mod scanner;
pub mod transport;

use std::path::PathBuf;

use thiserror::Error;

pub use engine::{Action, Presence, SyncEngine, SyncOptions, SyncReport};
pub use filesystem::LocalFileSystemAdapter;
pub use scanner::LocalTreeScanner;
pub use transport::{Transport, TransportError};

/// Errors that abort a synchronization run
///
/// Per-key failures are not errors at this level: they are logged and
/// counted in the [`SyncReport`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local root could not be enumerated
    #[error("Scan failure at {path}: {source}")]
    ScanFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled before it completed; nothing was persisted
    #[error("Synchronization cancelled")]
    Cancelled,

    /// The persisted index could not be loaded (missing is fine, malformed is not)
    #[error("Failed to load index: {0}")]
    IndexLoad(TransportError),

    /// The blob store could not be enumerated
    #[error("Failed to list blob store: {0}")]
    BlobListing(TransportError),

    /// The updated index could not be written back
    #[error("Failed to persist index: {0}")]
    IndexSave(TransportError),

    /// A domain-level error propagated from cloudmirror-core
    #[error("Domain error: {0}")]
    DomainError(#[from] cloudmirror_core::domain::errors::DomainError),
}
