//! The three per-source views of an object
//!
//! - [`LocalItem`] - a file found under the local root
//! - [`BlobItem`] - an object in the flat blob store
//! - [`IndexItem`] - an entry of the hierarchical index, the only view that
//!   records folders
//!
//! All three are keyed by [`ObjectKey`] in the engine's snapshots.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ContentHash, Locator, ObjectKey};
use super::path::LogicalPath;

/// chrono format of the index `Date` field (`d/M/yyyy H:mm:ss AM|PM`)
pub const INDEX_DATE_FORMAT: &str = "%-d/%-m/%Y %-H:%M:%S %p";

/// Render a timestamp in the index's textual date format
pub fn format_index_date<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.format(INDEX_DATE_FORMAT).to_string()
}

// ============================================================================
// LocalItem
// ============================================================================

/// A regular file discovered by the local tree scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalItem {
    /// File name without directory
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// SHA-1 of the full file contents
    pub hash: ContentHash,
    /// Creation time, or modification time where the platform has none
    pub created: DateTime<Utc>,
    /// Native directory containing the file
    pub directory: PathBuf,
    /// Folder in the index convention (scope root + relative directory)
    pub folder: LogicalPath,
}

impl LocalItem {
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.name.clone(), self.hash.clone())
    }

    /// Full native path of the file
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.name)
    }

    /// Same item relocated to another directory and folder
    #[must_use]
    pub fn relocated(&self, directory: &Path, folder: LogicalPath) -> Self {
        Self {
            directory: directory.to_path_buf(),
            folder,
            ..self.clone()
        }
    }
}

// ============================================================================
// BlobItem
// ============================================================================

/// An object of the flat blob store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    /// Identity name (storage key minus the hash prefix)
    pub name: String,
    /// Literal key the object is stored under
    pub storage_key: String,
    pub size: u64,
    pub hash: ContentHash,
}

impl BlobItem {
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.name.clone(), self.hash.clone())
    }
}

// ============================================================================
// IndexItem
// ============================================================================

/// One record of the hierarchical index
///
/// This is also the persisted shape, hence the field renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexItem {
    pub name: String,
    #[serde(rename = "URL")]
    pub locator: Locator,
    pub size: u64,
    /// Creation date in [`INDEX_DATE_FORMAT`]
    pub date: String,
    pub folder: LogicalPath,
}

impl IndexItem {
    /// Whether the locator is still the dry-run placeholder
    #[must_use]
    pub fn has_undefined_locator(&self) -> bool {
        self.locator.is_undefined()
    }
}
