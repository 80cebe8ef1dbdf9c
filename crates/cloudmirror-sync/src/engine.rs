//! Three-way reconciliation engine
//!
//! The [`SyncEngine`] reconciles the local tree, the flat blob store and the
//! hierarchical index into one consistent state, in either direction.
//!
//! ## Sync Flow
//!
//! 1. **Snapshot**: load the index, list the blob store, scan the local tree
//! 2. **Destructive pass**: plan against the snapshot, then apply every
//!    remove action
//! 3. **Constructive pass**: re-plan against the state left by pass 1, then
//!    apply uploads, downloads and moves
//! 4. **Finalize**: persist the index (unless dry run) and report the
//!    key to locator mapping
//!
//! Every destructive action completes before any constructive action
//! begins. Within a pass each action touches only its own key.
//!
//! ## Failure Model
//!
//! A failed store request or local file operation abandons that key's
//! action and is recorded in the report; the run continues. Cancellation
//! stops the run before persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use tracing::{debug, error, info, instrument, warn};

use cloudmirror_core::config::{Config, Direction};
use cloudmirror_core::domain::errors::DomainError;
use cloudmirror_core::domain::items::{format_index_date, BlobItem, IndexItem, LocalItem};
use cloudmirror_core::domain::newtypes::{ContentHash, Locator, ObjectKey};
use cloudmirror_core::domain::path::LogicalPath;
use cloudmirror_core::domain::protected::ProtectedNames;
use cloudmirror_core::ports::blob_store::{BlobObject, IBlobStore};
use cloudmirror_core::ports::index_store::{IIndexStore, IndexSnapshot};
use cloudmirror_core::ports::local_filesystem::ILocalFileSystem;

use crate::scanner::{LocalSnapshot, LocalTreeScanner};
use crate::transport::{Transport, TransportError};
use crate::SyncError;

/// Blob store view keyed by identity
pub type RemoteSnapshot = BTreeMap<ObjectKey, BlobItem>;

// ============================================================================
// SyncReport
// ============================================================================

/// Summary of a completed reconciliation run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Every index entry's key and locator, sorted by rendered key
    pub mapping: Vec<(ObjectKey, Locator)>,
    /// Objects written to the blob store (or that would be, in a dry run)
    pub uploaded: u32,
    /// Objects fetched into the local tree
    pub downloaded: u32,
    /// Objects removed from the store, the index or the local tree
    pub removed: u32,
    /// Index folders updated (push) or local files relocated (pull)
    pub moved: u32,
    /// Planned actions not carried out: out of scope, protected or duplicate
    pub skipped: u32,
    /// Abandoned actions and index entries left without a locator (non-fatal)
    pub errors: Vec<String>,
    pub dry_run: bool,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Number of actions that changed something
    #[must_use]
    pub fn actions(&self) -> u32 {
        self.uploaded + self.downloaded + self.removed + self.moved
    }

    fn record(&mut self, action: Action, outcome: Outcome) {
        match (outcome, action) {
            (Outcome::Unchanged, _) | (_, Action::None) => {}
            (Outcome::Skipped, _) => self.skipped += 1,
            (Outcome::Applied, Action::Upload) => self.uploaded += 1,
            (Outcome::Applied, Action::Download) => self.downloaded += 1,
            (Outcome::Applied, Action::MoveIfNeeded) => self.moved += 1,
            (Outcome::Applied, Action::Remove)
            | (Outcome::Applied, Action::RemoveIfNotElsewhere)
            | (Outcome::Applied, Action::RemoveLocal) => self.removed += 1,
        }
    }
}

// ============================================================================
// Presence triple and action table
// ============================================================================

/// What reconciliation does for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Write the local file to the store and index it
    Upload,
    /// Delete the local file (pull only)
    RemoveLocal,
    /// Delete the blob and forget the index entry
    Remove,
    /// Like `Remove`, unless the index entry belongs to another scope
    RemoveIfNotElsewhere,
    /// Fetch the blob into the folder recorded by the index
    Download,
    /// Reconcile a folder mismatch between the local tree and the index
    MoveIfNeeded,
}

impl Action {
    /// Whether the action belongs to the first pass
    #[must_use]
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            Self::Remove | Self::RemoveIfNotElsewhere | Self::RemoveLocal
        )
    }
}

/// Which sources hold a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    pub remote: bool,
    pub index: bool,
    pub local: bool,
}

impl Presence {
    /// Look up the action for this triple
    #[must_use]
    pub fn action(self, direction: Direction) -> Action {
        let Self {
            remote,
            index,
            local,
        } = self;
        match (direction, remote, index, local) {
            (_, false, false, false) => Action::None,
            (_, true, true, true) => Action::MoveIfNeeded,

            (Direction::Push, false, false, true) => Action::Upload,
            (Direction::Push, false, true, false) => Action::Remove,
            (Direction::Push, false, true, true) => Action::Upload,
            (Direction::Push, true, false, false) => Action::Remove,
            (Direction::Push, true, false, true) => Action::Upload,
            (Direction::Push, true, true, false) => Action::RemoveIfNotElsewhere,

            (Direction::Pull, false, false, true) => Action::RemoveLocal,
            (Direction::Pull, true, true, false) => Action::Download,
            (Direction::Pull, _, _, _) => Action::None,
        }
    }
}

/// The two application passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Destructive,
    Constructive,
}

/// Result of a single applied action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Unchanged,
    Skipped,
}

// ============================================================================
// SyncState
// ============================================================================

/// The three views, mutated in memory during a run
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub local: LocalSnapshot,
    pub remote: RemoteSnapshot,
    pub index: IndexSnapshot,
}

impl SyncState {
    /// Union of the keys of all three views
    #[must_use]
    pub fn keys(&self) -> BTreeSet<ObjectKey> {
        self.local
            .keys()
            .chain(self.remote.keys())
            .chain(self.index.keys())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn presence(&self, key: &ObjectKey) -> Presence {
        Presence {
            remote: self.remote.contains_key(key),
            index: self.index.contains_key(key),
            local: self.local.contains_key(key),
        }
    }

    /// Actions of one pass, computed against the current state
    #[must_use]
    pub fn plan(&self, direction: Direction, pass: Pass) -> Vec<(ObjectKey, Action)> {
        self.keys()
            .into_iter()
            .filter_map(|key| {
                let action = self.presence(&key).action(direction);
                let wanted = match pass {
                    Pass::Destructive => action.is_destructive(),
                    Pass::Constructive => action != Action::None && !action.is_destructive(),
                };
                wanted.then_some((key, action))
            })
            .collect()
    }
}

/// Build the remote view from a store listing
///
/// Objects stored as `"{hash}_{name}"` yield `name`; any other key is used
/// literally and logged unless it is a protected name.
#[must_use]
pub fn remote_snapshot(objects: Vec<BlobObject>, protected: &ProtectedNames) -> RemoteSnapshot {
    let mut remote = RemoteSnapshot::new();

    for object in objects {
        let hash = ContentHash::of(&object.data);
        let prefix = format!("{hash}{}", ObjectKey::SEPARATOR);

        let name = match object.key.get(..prefix.len()) {
            Some(head) if head.eq_ignore_ascii_case(&prefix) && object.key.len() > prefix.len() => {
                object.key[prefix.len()..].to_string()
            }
            _ => {
                if !protected.contains(&object.key) {
                    warn!(
                        storage_key = %object.key,
                        %hash,
                        "Object lacks the hash prefix, using its literal name"
                    );
                }
                object.key.clone()
            }
        };

        let item = BlobItem {
            name,
            storage_key: object.key,
            size: object.size,
            hash,
        };
        let key = item.key();
        if let Some(previous) = remote.get(&key) {
            warn!(
                %key,
                replaced = %previous.storage_key,
                by = %item.storage_key,
                "Two objects share one identity, keeping the last"
            );
        }
        remote.insert(key, item);
    }

    remote
}

// ============================================================================
// SyncOptions
// ============================================================================

/// Per-run settings
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Absolute local directory
    pub local_root: PathBuf,
    /// Relative index folder the local root maps to
    pub scope_root: LogicalPath,
    pub direction: Direction,
    pub dry_run: bool,
    pub protected: ProtectedNames,
}

impl SyncOptions {
    /// Options from configuration, for an already resolved local root
    #[must_use]
    pub fn from_config(config: &Config, local_root: PathBuf) -> Self {
        Self {
            local_root,
            scope_root: config.scope_path(),
            direction: config.sync.direction,
            dry_run: config.sync.dry_run,
            protected: config.protected_names(),
        }
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Reconciliation engine
///
/// ## Dependencies
///
/// - `blob_store`: flat object store (list, read, write, delete, publish)
/// - `index_store`: persisted hierarchical index
/// - `local_filesystem`: local file I/O for downloads, moves and deletes
/// - `transport`: timeout and cancellation applied to every store request
pub struct SyncEngine {
    blob_store: Arc<dyn IBlobStore>,
    index_store: Arc<dyn IIndexStore>,
    local_filesystem: Arc<dyn ILocalFileSystem>,
    transport: Transport,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(
        blob_store: Arc<dyn IBlobStore>,
        index_store: Arc<dyn IIndexStore>,
        local_filesystem: Arc<dyn ILocalFileSystem>,
        transport: Transport,
        options: SyncOptions,
    ) -> Self {
        Self {
            blob_store,
            index_store,
            local_filesystem,
            transport,
            options,
        }
    }

    /// Run one full reconciliation
    ///
    /// # Errors
    /// Fails on scan failure, an unreadable index or store listing, a failed
    /// index write, or cancellation. Per-key failures are only reported.
    #[instrument(
        skip(self),
        fields(
            direction = %self.options.direction,
            dry_run = self.options.dry_run,
            scope = %self.options.scope_root,
        )
    )]
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();

        if self.options.scope_root.is_absolute() {
            return Err(DomainError::NotRelative(self.options.scope_root.to_string()).into());
        }

        let mut state = self.snapshot().await?;
        info!(
            local = state.local.len(),
            remote = state.remote.len(),
            index = state.index.len(),
            "Snapshots loaded"
        );

        let mut report = SyncReport::new(self.options.dry_run);

        for pass in [Pass::Destructive, Pass::Constructive] {
            let plan = state.plan(self.options.direction, pass);
            debug!(?pass, actions = plan.len(), "Pass planned");

            for (key, action) in plan {
                if self.transport.is_cancelled() {
                    warn!("Cancelled, stopping before persistence");
                    return Err(SyncError::Cancelled);
                }
                self.apply(&mut state, &mut report, &key, action).await?;
            }
        }

        if !self.options.dry_run {
            self.transport
                .call("save index", self.index_store.save(&state.index))
                .await
                .map_err(|e| fatal(e, SyncError::IndexSave))?;
        }

        self.finalize(&state, &mut report);
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            uploaded = report.uploaded,
            downloaded = report.downloaded,
            removed = report.removed,
            moved = report.moved,
            skipped = report.skipped,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "Synchronization complete"
        );

        Ok(report)
    }

    /// Load all three views
    async fn snapshot(&self) -> Result<SyncState, SyncError> {
        let index = self
            .transport
            .call("load index", self.index_store.load())
            .await
            .map_err(|e| fatal(e, SyncError::IndexLoad))?;

        let objects = self
            .transport
            .call("list objects", self.blob_store.list_objects())
            .await
            .map_err(|e| fatal(e, SyncError::BlobListing))?;
        let remote = remote_snapshot(objects, &self.options.protected);

        let scanner = LocalTreeScanner::new(
            self.options.local_root.clone(),
            self.options.scope_root.clone(),
        );
        let local = scanner.scan().await?;

        Ok(SyncState {
            local,
            remote,
            index,
        })
    }

    fn finalize(&self, state: &SyncState, report: &mut SyncReport) {
        if !self.options.dry_run {
            for (key, item) in &state.index {
                if item.has_undefined_locator() {
                    warn!(%key, "Index entry still carries the undefined locator");
                    report
                        .errors
                        .push(format!("{key}: index entry still carries the undefined locator"));
                }
            }
        }

        report.mapping = state
            .index
            .iter()
            .map(|(key, item)| (key.clone(), item.locator.clone()))
            .collect();
        report.mapping.sort_by_cached_key(|(key, _)| key.to_string());
    }

    async fn apply(
        &self,
        state: &mut SyncState,
        report: &mut SyncReport,
        key: &ObjectKey,
        action: Action,
    ) -> Result<(), SyncError> {
        let outcome = match action {
            Action::None => return Ok(()),
            Action::Upload => self.upload(state, key).await,
            Action::Download => self.download(state, key).await,
            Action::MoveIfNeeded => self.move_if_needed(state, key).await,
            Action::Remove => self.remove(state, key).await,
            Action::RemoveIfNotElsewhere => self.remove_if_not_elsewhere(state, key).await,
            Action::RemoveLocal => self.remove_local(state, key).await,
        };

        match outcome {
            Ok(outcome) => report.record(action, outcome),
            Err(err) => {
                let cancelled = err
                    .downcast_ref::<TransportError>()
                    .is_some_and(TransportError::is_cancelled);
                if cancelled {
                    warn!(%key, ?action, "Cancelled during action");
                    return Err(SyncError::Cancelled);
                }
                error!(%key, ?action, error = %format!("{err:#}"), "Action abandoned");
                report.errors.push(format!("{key}: {err:#}"));
            }
        }
        Ok(())
    }

    /// Remainder of `folder` below the scope root, `None` when out of scope
    ///
    /// A remainder that could climb out of the local root (`..`) is out of
    /// scope.
    fn scope_remainder(&self, folder: &LogicalPath) -> Option<LogicalPath> {
        if folder.is_absolute() {
            return None;
        }
        let remainder = folder.prune(&self.options.scope_root).ok().flatten()?;
        if !remainder.is_normal() {
            warn!(%folder, "Folder escapes the scope root, treating as out of scope");
            return None;
        }
        Some(remainder)
    }

    /// Native directory for an in-scope remainder
    fn local_directory(&self, remainder: &LogicalPath) -> Result<PathBuf> {
        Ok(LogicalPath::from_native(&self.options.local_root)
            .combine(remainder)?
            .to_native())
    }

    // ========================================================================
    // Constructive actions
    // ========================================================================

    async fn upload(&self, state: &mut SyncState, key: &ObjectKey) -> Result<Outcome> {
        let Some(local) = state.local.get(key).cloned() else {
            return Ok(Outcome::Unchanged);
        };

        let data = self
            .local_filesystem
            .read_file(&local.path())
            .await
            .with_context(|| format!("Failed to read {}", local.path().display()))?;

        let hash = ContentHash::of(&data);
        let upload_key = ObjectKey::new(local.name.clone(), hash.clone());

        if state.index.contains_key(&upload_key) {
            info!(key = %upload_key, "Duplicate content already indexed, skipping upload");
            if !state.remote.contains_key(&upload_key) {
                info!(key = %upload_key, "Forgetting stale index entry");
                state.index.remove(&upload_key);
            }
            return Ok(Outcome::Skipped);
        }

        let storage_key = upload_key.to_string();
        info!(key = %upload_key, folder = %local.folder, "Add, share and remember");

        let locator = if self.options.dry_run {
            Locator::undefined()
        } else {
            self.transport
                .call(
                    &format!("write {storage_key}"),
                    self.blob_store.write_object(&storage_key, &data),
                )
                .await?;

            let locator = self
                .transport
                .call(
                    &format!("publish {storage_key}"),
                    self.blob_store.publish_object(&storage_key, &hash),
                )
                .await?;
            if locator.content_hash().is_some_and(|published| published != hash) {
                warn!(key = %upload_key, %locator, "Published locator carries a different hash");
            }
            locator
        };

        state.remote.insert(
            upload_key.clone(),
            blob_item(&local.name, &storage_key, data.len() as u64, &hash),
        );
        state.index.insert(
            upload_key,
            IndexItem {
                name: local.name.clone(),
                locator,
                size: data.len() as u64,
                date: format_index_date(&local.created.with_timezone(&Local)),
                folder: local.folder.clone(),
            },
        );
        Ok(Outcome::Applied)
    }

    async fn download(&self, state: &mut SyncState, key: &ObjectKey) -> Result<Outcome> {
        let (Some(entry), Some(blob)) = (state.index.get(key).cloned(), state.remote.get(key).cloned())
        else {
            return Ok(Outcome::Unchanged);
        };

        let Some(remainder) = self.scope_remainder(&entry.folder) else {
            debug!(%key, folder = %entry.folder, "Out of scope, not downloading");
            return Ok(Outcome::Skipped);
        };

        let directory = self.local_directory(&remainder)?;
        let target = directory.join(&entry.name);
        info!(%key, target = %target.display(), "Download");

        if !self.options.dry_run {
            let data = self
                .transport
                .call(
                    &format!("read {}", blob.storage_key),
                    self.blob_store.read_object(&blob.storage_key),
                )
                .await?;
            if ContentHash::of(&data) != *key.hash() {
                warn!(%key, "Downloaded bytes do not match the key's hash");
            }
            self.local_filesystem
                .write_file(&target, &data)
                .await
                .with_context(|| format!("Failed to write {}", target.display()))?;
        }

        state.local.insert(
            key.clone(),
            LocalItem {
                name: entry.name.clone(),
                size: entry.size,
                hash: key.hash().clone(),
                created: Utc::now(),
                directory,
                folder: entry.folder.clone(),
            },
        );
        Ok(Outcome::Applied)
    }

    async fn move_if_needed(&self, state: &mut SyncState, key: &ObjectKey) -> Result<Outcome> {
        let (Some(local), Some(entry)) = (state.local.get(key).cloned(), state.index.get(key).cloned())
        else {
            return Ok(Outcome::Unchanged);
        };

        if local.folder == entry.folder {
            return Ok(Outcome::Unchanged);
        }

        let Some(new_remainder) = self.scope_remainder(&entry.folder) else {
            info!(%key, folder = %entry.folder, "Ignore relocation outside scope");
            return Ok(Outcome::Skipped);
        };

        match self.options.direction {
            Direction::Push => {
                info!(%key, from = %entry.folder, to = %local.folder, "Move index entry");
                if let Some(indexed) = state.index.get_mut(key) {
                    indexed.folder = local.folder.clone();
                }
            }
            Direction::Pull => {
                let Some(old_remainder) = self.scope_remainder(&local.folder) else {
                    warn!(%key, folder = %local.folder, "Local folder outside scope, not moving");
                    return Ok(Outcome::Skipped);
                };

                let new_directory = self.local_directory(&new_remainder)?;
                info!(
                    %key,
                    from = %local.directory.display(),
                    to = %new_directory.display(),
                    "Move local file"
                );

                if !self.options.dry_run {
                    let from = local.path();
                    let to = new_directory.join(&local.name);
                    self.local_filesystem
                        .move_file(&from, &to)
                        .await
                        .with_context(|| {
                            format!("Failed to move {} to {}", from.display(), to.display())
                        })?;
                    self.clean_up_tree(&local.directory, old_remainder.len()).await;
                }

                state.local.insert(
                    key.clone(),
                    local.relocated(&new_directory, entry.folder.clone()),
                );
            }
        }

        Ok(Outcome::Applied)
    }

    /// Remove now-empty directories upward from `directory`, at most `depth` levels
    async fn clean_up_tree(&self, directory: &Path, depth: usize) {
        let mut current = LogicalPath::from_native(directory);
        for _ in 0..depth {
            let native = current.to_native();
            match self.local_filesystem.remove_dir_if_empty(&native).await {
                Ok(true) => debug!(directory = %native.display(), "Removed empty directory"),
                Ok(false) => break,
                Err(err) => {
                    warn!(directory = %native.display(), error = %err, "Directory cleanup failed");
                    break;
                }
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }

    // ========================================================================
    // Destructive actions
    // ========================================================================

    async fn remove(&self, state: &mut SyncState, key: &ObjectKey) -> Result<Outcome> {
        if let Some(entry) = state.index.get(key) {
            if self.scope_remainder(&entry.folder).is_none() {
                debug!(%key, folder = %entry.folder, "Out of scope, not removing");
                return Ok(Outcome::Skipped);
            }
        }

        let remote_name = state.remote.get(key).map(|blob| blob.name.clone());
        let name = remote_name
            .clone()
            .or_else(|| state.index.get(key).map(|entry| entry.name.clone()))
            .unwrap_or_else(|| key.name().to_string());

        if self.options.protected.contains(&name) {
            debug!(%key, "Protected object, not removing");
            return Ok(Outcome::Skipped);
        }

        match (&remote_name, state.index.contains_key(key)) {
            (Some(_), false) => info!(%key, "Delete unknown shared file"),
            (Some(_), true) => info!(%key, "Delete and forget"),
            (None, _) => info!(%key, "Forget unshared known file"),
        }

        if remote_name.is_some() && !self.options.dry_run {
            let deleted = self
                .transport
                .call(
                    &format!("delete {key}"),
                    self.blob_store.delete_variants(&name, key.hash()),
                )
                .await?;
            if !deleted {
                debug!(%key, "Object was already gone from the store");
            }
        }

        state.remote.remove(key);
        state.index.remove(key);
        Ok(Outcome::Applied)
    }

    async fn remove_if_not_elsewhere(
        &self,
        state: &mut SyncState,
        key: &ObjectKey,
    ) -> Result<Outcome> {
        let in_scope = state
            .index
            .get(key)
            .is_some_and(|entry| self.scope_remainder(&entry.folder).is_some());
        if !in_scope {
            debug!(%key, "Indexed by another scope, keeping it");
            return Ok(Outcome::Skipped);
        }
        self.remove(state, key).await
    }

    async fn remove_local(&self, state: &mut SyncState, key: &ObjectKey) -> Result<Outcome> {
        let Some(local) = state.local.get(key).cloned() else {
            return Ok(Outcome::Unchanged);
        };

        info!(%key, path = %local.path().display(), "Delete local file");
        if !self.options.dry_run {
            self.local_filesystem
                .delete_file(&local.path())
                .await
                .with_context(|| format!("Failed to delete {}", local.path().display()))?;
        }

        state.local.remove(key);
        Ok(Outcome::Applied)
    }
}

fn blob_item(name: &str, storage_key: &str, size: u64, hash: &ContentHash) -> BlobItem {
    BlobItem {
        name: name.to_string(),
        storage_key: storage_key.to_string(),
        size,
        hash: hash.clone(),
    }
}

/// Map a failed run-level request, keeping cancellation distinct
fn fatal(err: TransportError, wrap: fn(TransportError) -> SyncError) -> SyncError {
    if err.is_cancelled() {
        SyncError::Cancelled
    } else {
        wrap(err)
    }
}

// ============================================================================
// Unit tests
// ============================================================================
