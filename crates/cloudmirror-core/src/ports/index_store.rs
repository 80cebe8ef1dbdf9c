//! Hierarchical index port (driven/secondary port)
//!
//! The index is a single record mapping `"{hash}_{name}"` to an
//! [`IndexItem`]. It is the only view that records folders and is
//! rewritten wholesale on every non-dry-run sync.

use std::collections::BTreeMap;

use crate::domain::items::IndexItem;
use crate::domain::newtypes::ObjectKey;

/// In-memory form of the index record
pub type IndexSnapshot = BTreeMap<ObjectKey, IndexItem>;

/// Port trait for the persisted index
#[async_trait::async_trait]
pub trait IIndexStore: Send + Sync {
    /// Loads the index
    ///
    /// A missing index record yields an empty snapshot.
    ///
    /// # Errors
    /// Fails if the record exists but cannot be parsed. Callers treat this
    /// as fatal and must not reconcile against a partial index.
    async fn load(&self) -> anyhow::Result<IndexSnapshot>;

    /// Rewrites the index record and the folder-list aid from `index`
    async fn save(&self, index: &IndexSnapshot) -> anyhow::Result<()>;
}
