//! Local tree scanner
//!
//! Walks the local root recursively and produces one [`LocalItem`] per
//! regular file. Each item's folder is the file's directory relativized
//! against the scanned root, combined onto the scope root. Entries are
//! visited in name order so repeated scans of the same tree agree.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use cloudmirror_core::domain::errors::DomainError;
use cloudmirror_core::domain::items::LocalItem;
use cloudmirror_core::domain::newtypes::{ContentHash, ObjectKey};
use cloudmirror_core::domain::path::LogicalPath;

use crate::SyncError;

/// Local view keyed by identity
pub type LocalSnapshot = BTreeMap<ObjectKey, LocalItem>;

/// Scanner for one local root mapped onto one scope root
#[derive(Debug, Clone)]
pub struct LocalTreeScanner {
    root: PathBuf,
    scope: LogicalPath,
}

impl LocalTreeScanner {
    /// `root` should be absolute; `scope` is the relative index folder it maps to
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, scope: LogicalPath) -> Self {
        Self {
            root: root.into(),
            scope,
        }
    }

    /// Enumerate every regular file below the root
    ///
    /// # Errors
    /// `SyncError::ScanFailure` if a directory or file cannot be read
    #[instrument(skip(self), fields(root = %self.root.display(), scope = %self.scope))]
    pub async fn scan(&self) -> Result<LocalSnapshot, SyncError> {
        let root_path = LogicalPath::from_native(&self.root);
        if root_path.is_relative() {
            return Err(DomainError::NotAbsolute(self.root.display().to_string()).into());
        }

        let mut items = LocalSnapshot::new();
        self.walk_directory(&self.root, &root_path, &mut items)
            .await?;

        debug!(files = items.len(), "local scan complete");
        Ok(items)
    }

    /// Folder of `directory` in the index convention
    fn logical_folder(&self, directory: &Path, root_path: &LogicalPath) -> Result<LogicalPath, SyncError> {
        let remainder = LogicalPath::from_native(directory)
            .relativize(root_path)?
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!(
                    "{} is not below {}",
                    directory.display(),
                    self.root.display()
                ))
            })?;
        Ok(self.scope.combine(&remainder)?)
    }

    fn walk_directory<'a>(
        &'a self,
        dir: &'a Path,
        root_path: &'a LogicalPath,
        items: &'a mut LocalSnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send + 'a>> {
        Box::pin(async move {
            let scan_failure = |source| SyncError::ScanFailure {
                path: dir.to_path_buf(),
                source,
            };

            let mut entries = tokio::fs::read_dir(dir).await.map_err(scan_failure)?;
            let mut children = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(scan_failure)? {
                children.push(entry);
            }
            children.sort_by_key(|entry| entry.file_name());

            let folder = self.logical_folder(dir, root_path)?;

            for entry in children {
                let path = entry.path();
                let metadata = entry.metadata().await.map_err(|source| SyncError::ScanFailure {
                    path: path.clone(),
                    source,
                })?;

                if metadata.is_dir() {
                    self.walk_directory(&path, root_path, items).await?;
                    continue;
                }
                if !metadata.is_file() {
                    debug!(path = %path.display(), "skipping non-regular file");
                    continue;
                }

                let data = tokio::fs::read(&path).await.map_err(|source| SyncError::ScanFailure {
                    path: path.clone(),
                    source,
                })?;

                let created: DateTime<Utc> = metadata
                    .created()
                    .or_else(|_| metadata.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());

                let item = LocalItem {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    size: metadata.len(),
                    hash: ContentHash::of(&data),
                    created,
                    directory: dir.to_path_buf(),
                    folder: folder.clone(),
                };

                let key = item.key();
                if let Some(previous) = items.get(&key) {
                    warn!(
                        %key,
                        from = %previous.folder,
                        to = %item.folder,
                        "Relocating duplicate object, the store cannot hold two copies under one key"
                    );
                }
                items.insert(key, item);
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, relative: &str, data: &[u8]) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    #[tokio::test]
    async fn test_scan_maps_directories_onto_scope() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "top.txt", b"top");
        write(dir.path(), "Decks/Red/deck.json", b"red deck");

        let scanner = LocalTreeScanner::new(dir.path(), LogicalPath::from_folder("Game"));
        let items = scanner.scan().await.unwrap();

        assert_eq!(items.len(), 2);

        let top = &items[&ObjectKey::new("top.txt", ContentHash::of(b"top"))];
        assert_eq!(top.folder.to_folder(), "Game");
        assert_eq!(top.directory, dir.path());
        assert_eq!(top.size, 3);

        let deck = &items[&ObjectKey::new("deck.json", ContentHash::of(b"red deck"))];
        assert_eq!(deck.folder.to_folder(), "Game/Decks/Red");
        assert_eq!(deck.path(), dir.path().join("Decks/Red/deck.json"));
    }

    #[tokio::test]
    async fn test_scan_with_empty_scope() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/b.txt", b"b");

        let scanner = LocalTreeScanner::new(dir.path(), LogicalPath::from_folder("."));
        let items = scanner.scan().await.unwrap();

        let item = items.values().next().unwrap();
        assert_eq!(item.folder.to_folder(), "a");
        assert!(item.folder.is_relative());
    }

    #[tokio::test]
    async fn test_duplicate_key_last_one_wins() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/same.txt", b"same");
        write(dir.path(), "b/same.txt", b"same");

        let scanner = LocalTreeScanner::new(dir.path(), LogicalPath::empty());
        let items = scanner.scan().await.unwrap();

        assert_eq!(items.len(), 1);
        let item = items.values().next().unwrap();
        assert_eq!(item.folder.to_folder(), "b");
    }

    #[tokio::test]
    async fn test_same_content_different_names_are_distinct() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "one.txt", b"same");
        write(dir.path(), "two.txt", b"same");

        let scanner = LocalTreeScanner::new(dir.path(), LogicalPath::empty());
        assert_eq!(scanner.scan().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_root_is_scan_failure() {
        let dir = TempDir::new().unwrap();
        let scanner = LocalTreeScanner::new(dir.path().join("missing"), LogicalPath::empty());
        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, SyncError::ScanFailure { .. }));
    }

    #[tokio::test]
    async fn test_relative_root_is_rejected() {
        let scanner = LocalTreeScanner::new("relative/root", LogicalPath::empty());
        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, SyncError::DomainError(DomainError::NotAbsolute(_))));
    }
}
