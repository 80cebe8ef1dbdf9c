//! Local filesystem port (driven/secondary port)
//!
//! File I/O performed by the engine while applying actions. Scanning is
//! done separately by the local tree scanner.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - All paths are native paths below the local root.

use std::path::Path;

/// Port trait for local filesystem operations
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Reads the entire contents of a file
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be read
    async fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    /// Writes data to a file, replacing it atomically
    ///
    /// Parent directories are created as needed.
    async fn write_file(&self, path: &Path, data: &[u8]) -> anyhow::Result<()>;

    /// Deletes a file
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be deleted
    async fn delete_file(&self, path: &Path) -> anyhow::Result<()>;

    /// Moves a file, creating the destination directory if needed
    async fn move_file(&self, from: &Path, to: &Path) -> anyhow::Result<()>;

    /// Removes a directory only if it has no entries
    ///
    /// # Returns
    /// `true` if the directory was empty and has been removed
    async fn remove_dir_if_empty(&self, path: &Path) -> anyhow::Result<bool>;
}
