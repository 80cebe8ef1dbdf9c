//! In-memory blob store
//!
//! Same contract as the directory store, held in a map. Requests can be made
//! to fail or to hang per key, which is how the engine's handling of
//! abandoned actions is exercised.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use cloudmirror_core::config::DEFAULT_LOCATOR_BASE_URL;
use cloudmirror_core::domain::newtypes::{ContentHash, Locator};
use cloudmirror_core::ports::blob_store::{BlobObject, IBlobStore};

use crate::directory::handle_for;
use crate::StoreError;

/// Blob store held in memory
#[derive(Debug)]
pub struct InMemoryBlobStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failing: Mutex<BTreeSet<String>>,
    hanging: Mutex<BTreeSet<String>>,
    writes: AtomicUsize,
    locator_base_url: String,
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATOR_BASE_URL)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn find_key(objects: &BTreeMap<String, Vec<u8>>, key: &str) -> Option<String> {
    if objects.contains_key(key) {
        return Some(key.to_string());
    }
    let folded = key.to_lowercase();
    objects.keys().find(|k| k.to_lowercase() == folded).cloned()
}

fn matches_any(set: &BTreeSet<String>, key: &str) -> bool {
    let folded = key.to_lowercase();
    set.iter().any(|k| k.to_lowercase() == folded)
}

impl InMemoryBlobStore {
    #[must_use]
    pub fn new(locator_base_url: impl Into<String>) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(BTreeSet::new()),
            hanging: Mutex::new(BTreeSet::new()),
            writes: AtomicUsize::new(0),
            locator_base_url: locator_base_url.into(),
        }
    }

    /// Seed an object without counting it as a write
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        lock(&self.objects).insert(key.into(), data.into());
    }

    /// Contents of an object, by exact or case-folded key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let objects = lock(&self.objects);
        find_key(&objects, key).and_then(|k| objects.get(&k).cloned())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        find_key(&lock(&self.objects), key).is_some()
    }

    /// All stored keys in order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    /// Number of `write_object` calls that succeeded
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every request touching `key` fail
    pub fn fail_on(&self, key: impl Into<String>) {
        lock(&self.failing).insert(key.into());
    }

    /// Make every request touching `key` never complete
    pub fn hang_on(&self, key: impl Into<String>) {
        lock(&self.hanging).insert(key.into());
    }

    async fn check(&self, key: &str) -> Result<(), StoreError> {
        let hangs = matches_any(&lock(&self.hanging), key);
        if hangs {
            std::future::pending::<()>().await;
        }
        if matches_any(&lock(&self.failing), key) {
            return Err(StoreError::Unavailable(format!("injected failure for {key}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IBlobStore for InMemoryBlobStore {
    async fn list_objects(&self) -> anyhow::Result<Vec<BlobObject>> {
        Ok(lock(&self.objects)
            .iter()
            .map(|(key, data)| BlobObject {
                key: key.clone(),
                size: data.len() as u64,
                data: data.clone(),
            })
            .collect())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        self.check(key).await?;
        Ok(self.contains(key))
    }

    async fn read_object(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.check(key).await?;
        self.get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()).into())
    }

    async fn write_object(&self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        self.check(key).await?;
        {
            let mut objects = lock(&self.objects);
            if let Some(existing) = find_key(&objects, key) {
                objects.remove(&existing);
            }
            objects.insert(key.to_string(), data.to_vec());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<bool> {
        self.check(key).await?;
        let mut objects = lock(&self.objects);
        Ok(match find_key(&objects, key) {
            Some(existing) => objects.remove(&existing).is_some(),
            None => false,
        })
    }

    async fn publish_object(&self, key: &str, hash: &ContentHash) -> anyhow::Result<Locator> {
        self.check(key).await?;
        if !self.contains(key) {
            return Err(StoreError::NotFound(key.to_string()).into());
        }
        Ok(Locator::published(
            &self.locator_base_url,
            handle_for(key),
            hash,
        ))
    }
}
