//! Integration tests: SyncEngine → in-memory blob store + blob-backed index
//!
//! Each test builds a real local tree in a temp directory, seeds the blob
//! store and the index, runs one or more reconciliations and inspects all
//! three sources afterwards.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cloudmirror_core::config::{Direction, DEFAULT_LOCATOR_BASE_URL};
use cloudmirror_core::domain::{
    ContentHash, IndexItem, Locator, LogicalPath, ObjectKey, ProtectedNames,
};
use cloudmirror_core::ports::index_store::{IIndexStore, IndexSnapshot};
use cloudmirror_store::{BlobIndexStore, InMemoryBlobStore};
use cloudmirror_sync::{
    LocalFileSystemAdapter, SyncEngine, SyncError, SyncOptions, SyncReport, Transport,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const SCOPE: &str = "Game";
const INDEX_NAME: &str = "CloudInfo.json";
const FOLDER_LIST_NAME: &str = "CloudFolder.json";
/// Index record and folder list, skipped by every push once they exist
const PROTECTED_IN_STORE: u32 = 2;

struct Harness {
    dir: TempDir,
    blobs: Arc<InMemoryBlobStore>,
    index: Arc<BlobIndexStore>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("local")).unwrap();
        let blobs = Arc::new(InMemoryBlobStore::default());
        let index = Arc::new(BlobIndexStore::new(
            blobs.clone(),
            INDEX_NAME,
            FOLDER_LIST_NAME,
        ));
        Self { dir, blobs, index }
    }

    fn local_root(&self) -> PathBuf {
        self.dir.path().join("local")
    }

    fn write_local(&self, relative: &str, data: &[u8]) {
        let path = self.local_root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn local_exists(&self, relative: &str) -> bool {
        self.local_root().join(relative).exists()
    }

    fn seed_remote(&self, name: &str, data: &[u8]) -> ObjectKey {
        let key = ObjectKey::new(name, ContentHash::of(data));
        self.blobs.insert(key.to_string(), data.to_vec());
        key
    }

    async fn seed_index(&self, entries: &[(&str, &[u8], &str)]) {
        let snapshot: IndexSnapshot = entries
            .iter()
            .map(|(name, data, folder)| {
                let hash = ContentHash::of(data);
                (
                    ObjectKey::new(*name, hash.clone()),
                    IndexItem {
                        name: (*name).to_string(),
                        locator: Locator::published(DEFAULT_LOCATOR_BASE_URL, 1, &hash),
                        size: data.len() as u64,
                        date: "1/1/2024 0:00:00 AM".to_string(),
                        folder: LogicalPath::from_folder(folder),
                    },
                )
            })
            .collect();
        self.index.save(&snapshot).await.unwrap();
    }

    async fn stored_index(&self) -> IndexSnapshot {
        self.index.load().await.unwrap()
    }

    fn transport(&self) -> Transport {
        Transport::new(Duration::from_secs(5), CancellationToken::new())
    }

    fn engine(&self, direction: Direction, dry_run: bool) -> SyncEngine {
        self.engine_with(direction, dry_run, self.transport())
    }

    fn engine_with(&self, direction: Direction, dry_run: bool, transport: Transport) -> SyncEngine {
        let options = SyncOptions {
            local_root: self.local_root(),
            scope_root: LogicalPath::from_folder(SCOPE),
            direction,
            dry_run,
            protected: ProtectedNames::new(INDEX_NAME, FOLDER_LIST_NAME, Vec::<String>::new()),
        };
        SyncEngine::new(
            self.blobs.clone(),
            self.index.clone(),
            Arc::new(LocalFileSystemAdapter::new()),
            transport,
            options,
        )
    }

    async fn push(&self) -> SyncReport {
        self.engine(Direction::Push, false).run().await.unwrap()
    }

    async fn pull(&self) -> SyncReport {
        self.engine(Direction::Pull, false).run().await.unwrap()
    }
}

fn key(name: &str, data: &[u8]) -> ObjectKey {
    ObjectKey::new(name, ContentHash::of(data))
}

// ============================================================================
// Push
// ============================================================================

mod push_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_push_adds_new_file() {
        let h = Harness::new();
        h.write_local("Decks/deck.json", b"red deck");

        let report = h.push().await;
        assert_eq!(report.uploaded, 1);
        assert!(report.errors.is_empty());

        let k = key("deck.json", b"red deck");
        assert!(h.blobs.contains(&k.to_string()));

        let index = h.stored_index().await;
        let entry = &index[&k];
        assert_eq!(entry.name, "deck.json");
        assert_eq!(entry.folder.to_folder(), "Game/Decks");
        assert_eq!(entry.size, 8);
        assert_eq!(entry.locator.content_hash(), Some(ContentHash::of(b"red deck")));

        assert_eq!(report.mapping, vec![(k, entry.locator.clone())]);
        assert_eq!(
            h.index.load_folders().await.unwrap(),
            vec!["Game", "Game/Decks"]
        );
    }

    #[tokio::test]
    async fn test_second_push_is_idempotent() {
        let h = Harness::new();
        h.write_local("a.txt", b"a");
        h.write_local("Decks/b.txt", b"b");

        let first = h.push().await;
        assert_eq!(first.uploaded, 2);
        let writes_after_first = h.blobs.write_count();

        let second = h.push().await;
        assert_eq!(second.actions(), 0);
        assert!(second.errors.is_empty());
        assert_eq!(second.mapping, first.mapping);
        // Only the index record and the folder list are rewritten.
        assert_eq!(h.blobs.write_count(), writes_after_first + 2);
    }

    #[tokio::test]
    async fn test_push_removes_orphan_blobs() {
        let h = Harness::new();
        let orphan = h.seed_remote("orphan.txt", b"orphan");
        h.blobs.insert("legacy.png", b"legacy".to_vec());
        h.blobs.insert("WorkshopUpload", b"vendor".to_vec());

        let report = h.push().await;
        assert_eq!(report.removed, 2);

        assert!(!h.blobs.contains(&orphan.to_string()));
        assert!(!h.blobs.contains("legacy.png"));
        assert!(h.blobs.contains("WorkshopUpload"));
        assert!(!h.stored_index().await.contains_key(&orphan));
    }

    #[tokio::test]
    async fn test_push_forgets_index_entry_without_blob() {
        let h = Harness::new();
        h.seed_index(&[("gone.txt", b"gone", "Game/Old")]).await;

        let report = h.push().await;
        assert_eq!(report.removed, 1);
        assert!(h.stored_index().await.is_empty());
    }

    #[tokio::test]
    async fn test_push_deletes_blob_missing_locally() {
        let h = Harness::new();
        let k = h.seed_remote("deleted.txt", b"deleted");
        h.seed_index(&[("deleted.txt", b"deleted", "Game")]).await;

        let report = h.push().await;
        assert_eq!(report.removed, 1);
        assert!(!h.blobs.contains(&k.to_string()));
        assert!(!h.stored_index().await.contains_key(&k));
    }

    #[tokio::test]
    async fn test_push_move_only_touches_index() {
        let h = Harness::new();
        h.write_local("B/x.txt", b"x");
        let k = h.seed_remote("x.txt", b"x");
        h.seed_index(&[("x.txt", b"x", "Game/A")]).await;
        let writes_before = h.blobs.write_count();

        let report = h.push().await;
        assert_eq!(report.moved, 1);
        assert_eq!(report.uploaded, 0);

        assert_eq!(h.stored_index().await[&k].folder.to_folder(), "Game/B");
        assert!(h.blobs.contains(&k.to_string()));
        assert!(h.local_exists("B/x.txt"));
        // Index record and folder list only, no object write.
        assert_eq!(h.blobs.write_count(), writes_before + 2);
    }

    #[tokio::test]
    async fn test_duplicate_content_drops_stale_index_entry() {
        let h = Harness::new();
        h.write_local("dup.txt", b"dup");
        h.seed_index(&[("DUP.txt", b"dup", "Game")]).await;
        let writes_before = h.blobs.write_count();

        let report = h.push().await;
        assert_eq!(report.uploaded, 0);
        assert_eq!(report.skipped, 1 + PROTECTED_IN_STORE);

        let k = key("dup.txt", b"dup");
        assert!(!h.blobs.contains(&k.to_string()));
        assert!(!h.stored_index().await.contains_key(&k));
        assert_eq!(h.blobs.write_count(), writes_before + 2);

        // The next run uploads it for real.
        let next = h.push().await;
        assert_eq!(next.uploaded, 1);
        assert!(h.blobs.contains(&k.to_string()));
    }

    #[tokio::test]
    async fn test_reupload_when_blob_exists_but_index_lost() {
        let h = Harness::new();
        h.write_local("x.txt", b"x");
        let k = h.seed_remote("x.txt", b"x");

        let report = h.push().await;
        assert_eq!(report.uploaded, 1);
        assert!(h.stored_index().await.contains_key(&k));
    }
}

// ============================================================================
// Scope
// ============================================================================

mod scope_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_out_of_scope_entries_are_never_removed() {
        let h = Harness::new();
        let extra = h.seed_remote("extra.txt", b"extra");
        h.seed_index(&[
            ("extra.txt", b"extra", "GameExtra"),
            ("other.txt", b"other", "Other/Deep"),
        ])
        .await;

        let report = h.push().await;
        assert_eq!(report.removed, 0);
        assert_eq!(report.skipped, 2 + PROTECTED_IN_STORE);

        let index = h.stored_index().await;
        assert!(index.contains_key(&extra));
        assert!(index.contains_key(&key("other.txt", b"other")));
        assert!(h.blobs.contains(&extra.to_string()));
    }

    #[tokio::test]
    async fn test_out_of_scope_relocation_is_ignored() {
        let h = Harness::new();
        h.write_local("x.txt", b"x");
        let k = h.seed_remote("x.txt", b"x");
        h.seed_index(&[("x.txt", b"x", "Elsewhere")]).await;

        let report = h.push().await;
        assert_eq!(report.moved, 0);
        assert_eq!(h.stored_index().await[&k].folder.to_folder(), "Elsewhere");
    }

    #[tokio::test]
    async fn test_pull_skips_out_of_scope_download() {
        let h = Harness::new();
        h.seed_remote("far.txt", b"far");
        h.seed_index(&[("far.txt", b"far", "GameExtra/Far")]).await;

        let report = h.pull().await;
        assert_eq!(report.downloaded, 0);
        assert!(!h.local_exists("Far/far.txt"));
        assert!(!h.local_exists("Extra/Far/far.txt"));
    }

    #[tokio::test]
    async fn test_pull_download_cannot_escape_local_root() {
        let h = Harness::new();
        h.seed_remote("evil.txt", b"evil");
        h.seed_index(&[("evil.txt", b"evil", "Game/../outside")]).await;

        let report = h.pull().await;
        assert_eq!(report.downloaded, 0);
        assert_eq!(report.skipped, 1);
        assert!(!h.dir.path().join("outside").exists());
        assert!(!h.local_exists("outside/evil.txt"));
    }

    #[tokio::test]
    async fn test_pull_move_cannot_escape_local_root() {
        let h = Harness::new();
        h.write_local("x.txt", b"x");
        h.seed_remote("x.txt", b"x");
        h.seed_index(&[("x.txt", b"x", "Game/../outside")]).await;

        let report = h.pull().await;
        assert_eq!(report.moved, 0);
        assert_eq!(report.skipped, 1);
        assert!(h.local_exists("x.txt"));
        assert!(!h.dir.path().join("outside").exists());
    }

    #[tokio::test]
    async fn test_pull_out_of_scope_relocation_keeps_local_file() {
        let h = Harness::new();
        h.write_local("A/x.txt", b"x");
        let k = h.seed_remote("x.txt", b"x");
        h.seed_index(&[("x.txt", b"x", "Elsewhere")]).await;

        let report = h.pull().await;
        assert_eq!(report.moved, 0);
        assert!(h.local_exists("A/x.txt"));
        assert!(!h.local_exists("x.txt"));
        assert_eq!(h.stored_index().await[&k].folder.to_folder(), "Elsewhere");
    }
}

// ============================================================================
// Pull
// ============================================================================

mod pull_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_pull_downloads_into_indexed_folder() {
        let h = Harness::new();
        h.seed_remote("d.txt", b"download me");
        h.seed_index(&[("d.txt", b"download me", "Game/Decks")]).await;

        let report = h.pull().await;
        assert_eq!(report.downloaded, 1);

        let path = h.local_root().join("Decks/d.txt");
        assert_eq!(std::fs::read(path).unwrap(), b"download me");

        let again = h.pull().await;
        assert_eq!(again.actions(), 0);
    }

    #[tokio::test]
    async fn test_pull_removes_unindexed_local_file() {
        let h = Harness::new();
        h.write_local("stray.txt", b"stray");

        let report = h.pull().await;
        assert_eq!(report.removed, 1);
        assert!(!h.local_exists("stray.txt"));
    }

    #[tokio::test]
    async fn test_pull_move_cleans_up_empty_directories() {
        let h = Harness::new();
        h.write_local("A/Deep/x.txt", b"x");
        h.seed_remote("x.txt", b"x");
        h.seed_index(&[("x.txt", b"x", "Game/B")]).await;

        let report = h.pull().await;
        assert_eq!(report.moved, 1);

        assert!(h.local_exists("B/x.txt"));
        assert!(!h.local_exists("A/Deep"));
        assert!(!h.local_exists("A"));
        assert!(h.local_root().exists());
    }

    #[tokio::test]
    async fn test_pull_move_cleanup_stops_at_non_empty_directory() {
        let h = Harness::new();
        h.write_local("A/Deep/x.txt", b"x");
        h.write_local("A/y.txt", b"y");
        h.seed_remote("x.txt", b"x");
        h.seed_remote("y.txt", b"y");
        h.seed_index(&[("x.txt", b"x", "Game/B"), ("y.txt", b"y", "Game/A")])
            .await;

        let report = h.pull().await;
        assert_eq!(report.moved, 1);

        assert!(h.local_exists("B/x.txt"));
        assert!(!h.local_exists("A/Deep"));
        assert!(h.local_exists("A/y.txt"));
    }

    #[tokio::test]
    async fn test_pull_leaves_store_untouched() {
        let h = Harness::new();
        h.seed_remote("unindexed.txt", b"unindexed");
        h.seed_index(&[("lost.txt", b"lost", "Game")]).await;
        let keys_before = h.blobs.keys();

        let report = h.pull().await;
        assert_eq!(report.actions(), 0);
        assert!(h.stored_index().await.contains_key(&key("lost.txt", b"lost")));
        assert_eq!(h.blobs.keys(), keys_before);
    }
}

// ============================================================================
// Dry run
// ============================================================================

mod dry_run_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_dry_run_push_has_no_side_effects() {
        let h = Harness::new();
        h.write_local("new.txt", b"new");
        let orphan = h.seed_remote("orphan.txt", b"orphan");

        let report = h.engine(Direction::Push, true).run().await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.removed, 1);

        assert_eq!(h.blobs.write_count(), 0);
        assert!(h.blobs.contains(&orphan.to_string()));
        assert!(!h.blobs.contains(INDEX_NAME));

        assert_eq!(
            report.mapping,
            vec![(key("new.txt", b"new"), Locator::undefined())]
        );
    }

    #[tokio::test]
    async fn test_dry_run_pull_has_no_side_effects() {
        let h = Harness::new();
        h.write_local("stray.txt", b"stray");
        h.seed_remote("d.txt", b"d");
        h.seed_index(&[("d.txt", b"d", "Game/Decks")]).await;

        let report = h.engine(Direction::Pull, true).run().await.unwrap();
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.removed, 1);

        assert!(h.local_exists("stray.txt"));
        assert!(!h.local_exists("Decks/d.txt"));
    }
}

// ============================================================================
// Failures
// ============================================================================

mod failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_transport_failure_abandons_one_key() {
        let h = Harness::new();
        h.write_local("bad.txt", b"bad");
        h.write_local("good.txt", b"good");
        h.blobs.fail_on(key("bad.txt", b"bad").to_string());

        let report = h.push().await;
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.errors.len(), 1);

        let index = h.stored_index().await;
        assert!(index.contains_key(&key("good.txt", b"good")));
        assert!(!index.contains_key(&key("bad.txt", b"bad")));
    }

    #[tokio::test]
    async fn test_timeout_abandons_one_key() {
        let h = Harness::new();
        h.write_local("slow.txt", b"slow");
        h.write_local("fast.txt", b"fast");
        h.blobs.hang_on(key("slow.txt", b"slow").to_string());

        let transport = Transport::new(Duration::from_millis(200), CancellationToken::new());
        let report = h
            .engine_with(Direction::Push, false, transport)
            .run()
            .await
            .unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancellation_skips_persistence() {
        let h = Harness::new();
        h.write_local("slow.txt", b"slow");
        h.blobs.hang_on(key("slow.txt", b"slow").to_string());

        let token = CancellationToken::new();
        let transport = Transport::new(Duration::from_secs(60), token.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let result = h.engine_with(Direction::Push, false, transport).run().await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert!(!h.blobs.contains(INDEX_NAME));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let h = Harness::new();
        h.write_local("a.txt", b"a");
        let token = CancellationToken::new();
        token.cancel();

        let result = h
            .engine_with(Direction::Push, false, Transport::new(Duration::from_secs(5), token))
            .run()
            .await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert_eq!(h.blobs.write_count(), 0);
    }

    #[tokio::test]
    async fn test_undefined_locator_is_reported_after_real_run() {
        let h = Harness::new();
        h.write_local("x.txt", b"x");
        let k = h.seed_remote("x.txt", b"x");
        let snapshot: IndexSnapshot = [(
            k.clone(),
            IndexItem {
                name: "x.txt".to_string(),
                locator: Locator::undefined(),
                size: 1,
                date: "1/1/2024 0:00:00 AM".to_string(),
                folder: LogicalPath::from_folder(SCOPE),
            },
        )]
        .into_iter()
        .collect();
        h.index.save(&snapshot).await.unwrap();

        let report = h.push().await;
        assert_eq!(report.actions(), 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with(&k.to_string()));
        assert!(report.errors[0].contains("undefined locator"));

        let dry = h.engine(Direction::Push, true).run().await.unwrap();
        assert!(dry.errors.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_index_aborts_before_reconciliation() {
        let h = Harness::new();
        h.write_local("a.txt", b"a");
        h.blobs.insert(INDEX_NAME, b"{ not json".to_vec());

        let result = h.engine(Direction::Push, false).run().await;
        assert!(matches!(result, Err(SyncError::IndexLoad(_))));
        assert_eq!(h.blobs.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_local_root_is_scan_failure() {
        let h = Harness::new();
        std::fs::remove_dir(h.local_root()).unwrap();

        let result = h.engine(Direction::Push, false).run().await;
        assert!(matches!(result, Err(SyncError::ScanFailure { .. })));
    }

    #[tokio::test]
    async fn test_absolute_scope_is_rejected() {
        let h = Harness::new();
        let options = SyncOptions {
            local_root: h.local_root(),
            scope_root: LogicalPath::from_folder("/Game"),
            direction: Direction::Push,
            dry_run: true,
            protected: ProtectedNames::default(),
        };
        let engine = SyncEngine::new(
            h.blobs.clone(),
            h.index.clone(),
            Arc::new(LocalFileSystemAdapter::new()),
            h.transport(),
            options,
        );

        let result = engine.run().await;
        assert!(matches!(result, Err(SyncError::DomainError(_))));
    }
}
