//! Hierarchical index kept inside the blob store
//!
//! The index record maps `"{hash}_{name}"` to an [`IndexItem`]. It is stored
//! as a JSON object under a protected name, next to a second protected
//! object holding the sorted list of every folder the index references
//! together with all of their ancestors.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Context;
use cloudmirror_core::config::StoreConfig;
use cloudmirror_core::domain::items::IndexItem;
use cloudmirror_core::domain::newtypes::ObjectKey;
use cloudmirror_core::ports::blob_store::IBlobStore;
use cloudmirror_core::ports::index_store::{IIndexStore, IndexSnapshot};
use tracing::{debug, info, instrument};

use crate::StoreError;

/// Every folder referenced by `index` plus all of its ancestors, sorted
#[must_use]
pub fn folder_list(index: &IndexSnapshot) -> Vec<String> {
    let mut folders = BTreeSet::new();
    for item in index.values() {
        let mut current = Some(item.folder.clone());
        while let Some(folder) = current.filter(|f| !f.is_empty()) {
            folders.insert(folder.to_folder());
            current = folder.parent();
        }
    }
    folders.into_iter().collect()
}

/// [`IIndexStore`] on top of any [`IBlobStore`]
pub struct BlobIndexStore {
    store: Arc<dyn IBlobStore>,
    index_name: String,
    folder_list_name: String,
}

impl BlobIndexStore {
    pub fn new(
        store: Arc<dyn IBlobStore>,
        index_name: impl Into<String>,
        folder_list_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            index_name: index_name.into(),
            folder_list_name: folder_list_name.into(),
        }
    }

    pub fn from_config(store: Arc<dyn IBlobStore>, config: &StoreConfig) -> Self {
        Self::new(store, &config.index_name, &config.folder_list_name)
    }

    fn malformed(&self, name: &str, reason: impl ToString) -> StoreError {
        StoreError::MalformedIndex {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Read back the folder-list aid; missing means empty
    pub async fn load_folders(&self) -> anyhow::Result<Vec<String>> {
        if !self.store.exists(&self.folder_list_name).await? {
            return Ok(Vec::new());
        }
        let data = self.store.read_object(&self.folder_list_name).await?;
        let folders = serde_json::from_slice(&data)
            .map_err(|e| self.malformed(&self.folder_list_name, e))?;
        Ok(folders)
    }
}

#[async_trait::async_trait]
impl IIndexStore for BlobIndexStore {
    #[instrument(skip(self), fields(index = %self.index_name))]
    async fn load(&self) -> anyhow::Result<IndexSnapshot> {
        if !self.store.exists(&self.index_name).await? {
            info!("No index record yet, starting empty");
            return Ok(IndexSnapshot::new());
        }

        let data = self
            .store
            .read_object(&self.index_name)
            .await
            .context("Failed to read index record")?;

        let raw: BTreeMap<String, IndexItem> =
            serde_json::from_slice(&data).map_err(|e| self.malformed(&self.index_name, e))?;

        let mut index = IndexSnapshot::new();
        for (combined, item) in raw {
            let key =
                ObjectKey::parse(&combined).map_err(|e| self.malformed(&self.index_name, e))?;
            index.insert(key, item);
        }

        debug!(entries = index.len(), "index loaded");
        Ok(index)
    }

    #[instrument(skip(self, index), fields(index = %self.index_name, entries = index.len()))]
    async fn save(&self, index: &IndexSnapshot) -> anyhow::Result<()> {
        let raw: BTreeMap<String, &IndexItem> = index
            .iter()
            .map(|(key, item)| (key.to_string(), item))
            .collect();
        let data = serde_json::to_vec_pretty(&raw)?;
        self.store
            .write_object(&self.index_name, &data)
            .await
            .context("Failed to write index record")?;

        let folders = folder_list(index);
        let data = serde_json::to_vec_pretty(&folders)?;
        self.store
            .write_object(&self.folder_list_name, &data)
            .await
            .context("Failed to write folder list")?;

        debug!(folders = folders.len(), "index saved");
        Ok(())
    }
}
