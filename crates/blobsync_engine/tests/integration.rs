//! Integration tests for the orchestrator over real stores.

use async_trait::async_trait;
use blobsync_engine::{
    CompareMode, EngineError, Orchestrator, PairState, ProgressFile, RetryConfig, RunOptions,
    Selection, StatSnapshot,
};
use blobsync_storage::{
    BlobStore, Capabilities, ListOptions, ListPage, ObjectHeader, StorageError, StorageResult,
    StoreRegistry, StoreRequest,
};
use blobsync_testkit::prelude::*;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Head requests in flight, shared between the stores of a pair.
#[derive(Default)]
struct InFlight {
    current: AtomicU32,
    peak: AtomicU32,
    listed_while_busy: AtomicBool,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wraps a store, counting body fetches and injecting failures.
struct Instrumented {
    inner: Arc<dyn BlobStore>,
    fetches: AtomicU32,
    failing_stores: AtomicU32,
    fail_list: AtomicBool,
    in_flight: Arc<InFlight>,
    head_latency: Duration,
    hold_next_page: AtomicBool,
    release: Notify,
}

impl Instrumented {
    fn new(inner: impl BlobStore + 'static) -> Arc<Self> {
        Self::build(inner, Arc::default(), Duration::ZERO, false)
    }

    /// Slows head requests down and reports them to `in_flight`.
    fn gauged(inner: impl BlobStore + 'static, in_flight: Arc<InFlight>) -> Arc<Self> {
        Self::build(inner, in_flight, Duration::from_millis(5), false)
    }

    /// Blocks the first continuation page until `release` is notified.
    fn holding(inner: impl BlobStore + 'static) -> Arc<Self> {
        Self::build(inner, Arc::default(), Duration::ZERO, true)
    }

    fn build(
        inner: impl BlobStore + 'static,
        in_flight: Arc<InFlight>,
        head_latency: Duration,
        hold_next_page: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(inner),
            fetches: AtomicU32::new(0),
            failing_stores: AtomicU32::new(0),
            fail_list: AtomicBool::new(false),
            in_flight,
            head_latency,
            hold_next_page: AtomicBool::new(hold_next_page),
            release: Notify::new(),
        })
    }

    fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    fn fail_next_stores(&self, n: u32) {
        self.failing_stores.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for Instrumented {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn list(&self, dir: &str, options: &ListOptions) -> StorageResult<ListPage> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("listing unavailable".into()));
        }
        if self.in_flight.current.load(Ordering::SeqCst) > 0 {
            self.in_flight.listed_while_busy.store(true, Ordering::SeqCst);
        }
        if options.cursor.is_some() && self.hold_next_page.swap(false, Ordering::SeqCst) {
            self.release.notified().await;
        }
        self.inner.list(dir, options).await
    }

    async fn fetch_info(&self, key: &str) -> StorageResult<ObjectHeader> {
        if self.head_latency.is_zero() {
            return self.inner.fetch_info(key).await;
        }
        self.in_flight.enter();
        tokio::time::sleep(self.head_latency).await;
        let result = self.inner.fetch_info(key).await;
        self.in_flight.leave();
        result
    }

    async fn fetch(&self, key: &str) -> StorageResult<(ObjectHeader, Bytes)> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(key).await
    }

    async fn store(&self, key: &str, request: StoreRequest) -> StorageResult<ObjectHeader> {
        let failing = self.failing_stores.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_stores.store(failing - 1, Ordering::SeqCst);
            return Err(StorageError::Backend("503 slow down".into()));
        }
        self.inner.store(key, request).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(key).await
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn set_acl(&self, key: &str, acl: &str) -> StorageResult<()> {
        self.inner.set_acl(key, acl).await
    }
}

fn selection(stores: Vec<Arc<dyn BlobStore>>) -> Selection {
    let ids: Vec<String> = stores.iter().map(|s| s.id().to_string()).collect();
    let mut registry = StoreRegistry::new();
    for store in stores {
        registry.insert(store);
    }
    Selection::new(ids).with_config("local", registry)
}

fn fast_retry() -> RetryConfig {
    RetryConfig::new(3).with_min(Duration::from_millis(1))
}

fn stats(orchestrator: &Orchestrator, pair: &str) -> StatSnapshot {
    orchestrator
        .stats()
        .find(pair)
        .map(|info| info.snapshot())
        .expect("pair not registered")
}

#[tokio::test]
async fn repair_copies_missing_files() {
    let src = TempTree::with_files(&[("a.txt", b"hello".as_slice()), ("dir/b.txt", b"abc".as_slice())]);
    let dst = TempTree::new();

    let options = RunOptions::new().with_concurrency(1).with_one_way(true);
    let orchestrator = Orchestrator::new(options.clone());
    let sel = selection(vec![Arc::new(src.store("src")), Arc::new(dst.store("dst"))]);

    let report = orchestrator.run_repair(&sel).await.unwrap();
    assert!(!report.failed());
    assert_eq!(report.pairs.len(), 1);

    let snap = stats(&orchestrator, "local.src.local.dst");
    assert_eq!(snap.repairs, 2);
    assert_eq!(snap.matches, 0);
    assert_eq!(snap.diffs, 2);
    assert_eq!(snap.diff_size, 8);
    assert_eq!(snap.state, PairState::Complete);
    assert_eq!(dst.read("a.txt"), b"hello");
    assert_eq!(dst.read("dir/b.txt"), b"abc");

    // a second pass finds nothing to do
    let again = Orchestrator::new(options.with_mode(CompareMode::Deep));
    again.run_compare(&sel).await.unwrap();
    let snap = stats(&again, "local.src.local.dst");
    assert_eq!(snap.matches, 2);
    assert_eq!(snap.diffs, 0);
    assert_eq!(snap.to_string(), "All 2 match (8 B)");
}

#[tokio::test]
async fn headers_compare_fetches_no_content() {
    let src = Instrumented::new(memory_store("src", None, &[("a.txt", b"hello".as_slice())]).await);
    let dst = Instrumented::new(memory_store("dst", None, &[("a.txt", b"hello".as_slice())]).await);

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_mode(CompareMode::Headers)
            .with_one_way(true),
    );
    orchestrator
        .run_compare(&selection(vec![src.clone(), dst.clone()]))
        .await
        .unwrap();

    let snap = stats(&orchestrator, "local.src.local.dst");
    assert_eq!(snap.matches, 1);
    assert_eq!(snap.diffs, 0);
    assert_eq!(src.fetches() + dst.fetches(), 0);
}

#[tokio::test]
async fn deep_compare_skips_content_on_size_mismatch() {
    let src_tree = TempTree::with_files(&[("a.txt", b"hello".as_slice())]);
    let dst_tree = TempTree::with_files(&[("a.txt", b"hi".as_slice())]);
    let src = Instrumented::new(src_tree.store("src"));
    let dst = Instrumented::new(dst_tree.store("dst"));

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_mode(CompareMode::Deep)
            .with_one_way(true),
    );
    orchestrator
        .run_compare(&selection(vec![src.clone(), dst.clone()]))
        .await
        .unwrap();

    let snap = stats(&orchestrator, "local.src.local.dst");
    assert_eq!(snap.diffs, 1);
    assert_eq!(src.fetches() + dst.fetches(), 0);
}

#[tokio::test]
async fn deep_compare_hashes_when_headers_disagree() {
    let src_tree = TempTree::with_files(&[("a.txt", b"hello".as_slice())]);
    let dst_tree = TempTree::with_files(&[("a.txt", b"hello".as_slice())]);
    src_tree.set_mtime("a.txt", Utc::now() - ChronoDuration::days(2));
    dst_tree.set_mtime("a.txt", Utc::now() - ChronoDuration::days(1));
    let src = Instrumented::new(src_tree.store("src"));
    let dst = Instrumented::new(dst_tree.store("dst"));

    let deep = Orchestrator::new(
        RunOptions::new()
            .with_mode(CompareMode::Deep)
            .with_one_way(true),
    );
    deep.run_compare(&selection(vec![src.clone(), dst.clone()]))
        .await
        .unwrap();
    assert_eq!(stats(&deep, "local.src.local.dst").matches, 1);
    assert_eq!(src.fetches(), 1);
    assert_eq!(dst.fetches(), 1);

    // the same pair is a mismatch by headers alone
    let headers = Orchestrator::new(
        RunOptions::new()
            .with_mode(CompareMode::Headers)
            .with_one_way(true),
    );
    headers
        .run_compare(&selection(vec![src, dst]))
        .await
        .unwrap();
    assert_eq!(stats(&headers, "local.src.local.dst").diffs, 1);
}

#[tokio::test]
async fn force_mode_repairs_everything() {
    let src = TempTree::with_files(&[("a.txt", b"same".as_slice())]);
    let dst = TempTree::with_files(&[("a.txt", b"same".as_slice())]);

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_mode(CompareMode::Force)
            .with_one_way(true),
    );
    orchestrator
        .run_repair(&selection(vec![Arc::new(src.store("src")), Arc::new(dst.store("dst"))]))
        .await
        .unwrap();

    let snap = stats(&orchestrator, "local.src.local.dst");
    assert_eq!(snap.diffs, 1);
    assert_eq!(snap.repairs, 1);
}

#[tokio::test]
async fn ghost_removal_respects_safety_window() {
    let src = memory_store("src", None, &[]).await;
    put(&src, "young.txt", b"new", Some(Utc::now() - ChronoDuration::minutes(30))).await;
    put(&src, "old.txt", b"old", Some(Utc::now() - ChronoDuration::hours(2))).await;
    let src: Arc<dyn BlobStore> = Arc::new(src);
    let dst: Arc<dyn BlobStore> = Arc::new(memory_store("dst", None, &[]).await);

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_remove_ghosts(true)
            .with_one_way(true)
            .with_retry(fast_retry()),
    );
    let report = orchestrator
        .run_repair(&selection(vec![src.clone(), dst.clone()]))
        .await
        .unwrap();
    assert!(!report.failed());

    assert!(src.fetch_info("young.txt").await.is_ok());
    assert!(src.fetch_info("old.txt").await.unwrap_err().is_not_found());
    assert!(dst.fetch_info("young.txt").await.unwrap_err().is_not_found());

    let snap = stats(&orchestrator, "local.src.local.dst");
    assert_eq!(snap.repairs, 1);
    assert_eq!(snap.errors, 1);
    assert!(snap.recent_errors[0].contains("cannot remove young.txt"));
}

#[tokio::test]
async fn transient_store_failures_are_retried() {
    let src = Instrumented::new(memory_store("src", None, &[("k", b"v".as_slice())]).await);
    let dst = Instrumented::new(memory_store("dst", None, &[]).await);
    dst.fail_next_stores(2);

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_one_way(true)
            .with_retry(fast_retry()),
    );
    orchestrator
        .run_repair(&selection(vec![src, dst.clone()]))
        .await
        .unwrap();

    let snap = stats(&orchestrator, "local.src.local.dst");
    assert_eq!(snap.repairs, 1);
    assert_eq!(snap.errors, 0);
    assert!(dst.fetch_info("k").await.is_ok());
}

#[tokio::test]
async fn exhausted_retries_are_recorded_not_fatal() {
    let src = Instrumented::new(
        memory_store("src", None, &[("k1", b"1".as_slice()), ("k2", b"2".as_slice())]).await,
    );
    let dst = Instrumented::new(memory_store("dst", None, &[]).await);
    dst.fail_next_stores(2);

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_one_way(true)
            .with_concurrency(1)
            .with_retry(RetryConfig::new(1).with_min(Duration::from_millis(1))),
    );
    let report = orchestrator
        .run_repair(&selection(vec![src, dst]))
        .await
        .unwrap();
    assert!(!report.failed());

    let snap = stats(&orchestrator, "local.src.local.dst");
    assert_eq!(snap.errors, 1);
    assert_eq!(snap.repairs, 1);
    assert!(snap.recent_errors[0].starts_with("k1: backend error"));
}

#[tokio::test]
async fn default_acl_applied_to_repairs() {
    let src: Arc<dyn BlobStore> = Arc::new(memory_store("src", None, &[("k", b"v".as_slice())]).await);
    let dst: Arc<dyn BlobStore> = Arc::new(memory_store("dst", None, &[]).await);

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_one_way(true)
            .with_acl("public-read"),
    );
    orchestrator
        .run_repair(&selection(vec![src, dst.clone()]))
        .await
        .unwrap();

    let head = dst.fetch_info("k").await.unwrap();
    assert_eq!(head.access_control.as_deref(), Some("public-read"));
}

#[tokio::test]
async fn listing_failure_ends_only_its_pair() {
    let a = Instrumented::new(memory_store("a", None, &[("x", b"1".as_slice())]).await);
    let b = Instrumented::new(memory_store("b", None, &[("y", b"2".as_slice())]).await);
    a.fail_list.store(true, Ordering::SeqCst);

    let orchestrator = Orchestrator::new(RunOptions::new());
    let report = orchestrator
        .run_compare(&selection(vec![a, b]))
        .await
        .unwrap();

    assert!(report.failed());
    assert_eq!(report.pairs.len(), 2);
    let failed = &report.pairs[0];
    assert_eq!(failed.key.to_string(), "local.a.local.b");
    assert!(failed.error.as_deref().unwrap().contains("listing unavailable"));
    assert!(report.pairs[1].error.is_none());

    assert_eq!(stats(&orchestrator, "local.a.local.b").state, PairState::Complete);
    assert_eq!(stats(&orchestrator, "local.b.local.a").diffs, 1);
}

#[tokio::test]
async fn resumes_from_progress_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.json");
    ProgressFile {
        last_key: ":b".into(),
        pair: "local.src.local.dst".into(),
        pairs: vec![StatSnapshot {
            pair: "local.src.local.dst".into(),
            src_files: 2,
            diffs: 2,
            diff_size: 2,
            repairs: 2,
            ..StatSnapshot::default()
        }],
    }
    .save(&path)
    .await
    .unwrap();

    let files: [(&str, &[u8]); 4] = [("a", b"1"), ("b", b"2"), ("c", b"3"), ("d", b"4")];
    let src: Arc<dyn BlobStore> = Arc::new(memory_store("src", None, &files).await);
    let dst: Arc<dyn BlobStore> = Arc::new(memory_store("dst", None, &[]).await);

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_one_way(true)
            .with_max_keys(2)
            .with_progress_file(&path),
    );
    orchestrator
        .run_repair(&selection(vec![src, dst.clone()]))
        .await
        .unwrap();

    assert!(dst.fetch_info("a").await.unwrap_err().is_not_found());
    assert!(dst.fetch_info("c").await.is_ok());
    assert!(dst.fetch_info("d").await.is_ok());

    let snap = stats(&orchestrator, "local.src.local.dst");
    assert_eq!(snap.repairs, 4);
    assert_eq!(snap.src_files, 4);

    let saved = ProgressFile::load(&path).await;
    assert!(saved.last_key.is_empty());
    assert_eq!(saved.pairs[0].repairs, 4);
}

#[tokio::test(start_paused = true)]
async fn periodic_snapshot_holds_the_live_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.json");
    let files: [(&str, &[u8]); 4] = [("a", b"1"), ("b", b"2"), ("c", b"3"), ("d", b"4")];
    let src = Instrumented::holding(memory_store("src", None, &files).await);
    let dst: Arc<dyn BlobStore> = Arc::new(memory_store("dst", None, &[]).await);

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_one_way(true)
            .with_max_keys(2)
            .with_progress_interval(Duration::from_secs(1))
            .with_progress_file(&path),
    );
    let sel = selection(vec![src.clone(), dst]);

    // the second page stays blocked until a snapshot has been written
    let watch_file = async {
        let saved = loop {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let saved = ProgressFile::load(&path).await;
            if !saved.pair.is_empty() {
                break saved;
            }
        };
        src.release.notify_one();
        saved
    };
    let (report, saved) = tokio::join!(orchestrator.run_repair(&sel), watch_file);
    assert!(!report.unwrap().failed());

    assert_eq!(saved.pair, "local.src.local.dst");
    assert!(!saved.last_key.is_empty());
    assert_eq!(saved.pairs[0].repairs, 2);
    assert_eq!(saved.pairs[0].state, PairState::Running);

    // a later run picks up from the snapshot
    let resume_path = dir.path().join("resume.json");
    saved.save(&resume_path).await.unwrap();
    let fresh: Arc<dyn BlobStore> = Arc::new(memory_store("dst", None, &[]).await);
    let resumed = Orchestrator::new(
        RunOptions::new()
            .with_one_way(true)
            .with_max_keys(2)
            .with_progress_file(&resume_path),
    );
    resumed
        .run_repair(&selection(vec![src.clone(), fresh.clone()]))
        .await
        .unwrap();

    assert!(fresh.fetch_info("a").await.unwrap_err().is_not_found());
    assert!(fresh.fetch_info("b").await.unwrap_err().is_not_found());
    assert!(fresh.fetch_info("c").await.is_ok());
    assert!(fresh.fetch_info("d").await.is_ok());
    assert_eq!(stats(&resumed, "local.src.local.dst").repairs, 4);
}

#[tokio::test]
async fn final_save_failure_keeps_the_report() {
    let src = TempTree::with_files(&[("a.txt", b"same".as_slice())]);
    let dst = TempTree::with_files(&[("a.txt", b"same".as_slice())]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("stats.json");

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_one_way(true)
            .with_progress_file(&path),
    );
    let report = orchestrator
        .run_compare(&selection(vec![Arc::new(src.store("src")), Arc::new(dst.store("dst"))]))
        .await
        .unwrap();

    assert!(!report.failed());
    assert_eq!(report.stats_for("local.src.local.dst").unwrap().matches, 1);
    assert!(!path.exists());
}

#[tokio::test]
async fn pages_drain_within_the_concurrency_bound() {
    let in_flight = Arc::new(InFlight::default());
    let names: Vec<String> = (0..10).map(|i| format!("k{i:02}")).collect();
    let files: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), b"x".as_slice())).collect();
    let src = Instrumented::gauged(memory_store("src", None, &files).await, in_flight.clone());
    let dst = Instrumented::gauged(memory_store("dst", None, &[]).await, in_flight.clone());

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_one_way(true)
            .with_concurrency(3)
            .with_max_keys(4),
    );
    orchestrator
        .run_compare(&selection(vec![src, dst]))
        .await
        .unwrap();

    assert_eq!(stats(&orchestrator, "local.src.local.dst").diffs, 10);
    assert_eq!(in_flight.peak.load(Ordering::SeqCst), 3);
    assert!(!in_flight.listed_while_busy.load(Ordering::SeqCst));
}

#[tokio::test]
async fn explicit_resume_key_wins() {
    let files: [(&str, &[u8]); 3] = [("a", b"1"), ("b", b"2"), ("c", b"3")];
    let src: Arc<dyn BlobStore> = Arc::new(memory_store("src", None, &files).await);
    let dst: Arc<dyn BlobStore> = Arc::new(memory_store("dst", None, &[]).await);

    let orchestrator = Orchestrator::new(
        RunOptions::new()
            .with_one_way(true)
            .with_resume_key(":a"),
    );
    orchestrator
        .run_repair(&selection(vec![src, dst.clone()]))
        .await
        .unwrap();

    assert!(dst.fetch_info("a").await.unwrap_err().is_not_found());
    assert_eq!(stats(&orchestrator, "local.src.local.dst").repairs, 2);
}

#[tokio::test]
async fn resume_skips_finished_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.json");
    ProgressFile {
        last_key: String::new(),
        pair: "local.b.local.a".into(),
        pairs: Vec::new(),
    }
    .save(&path)
    .await
    .unwrap();

    let a: Arc<dyn BlobStore> = Arc::new(memory_store("a", None, &[("x", b"1".as_slice())]).await);
    let b: Arc<dyn BlobStore> = Arc::new(memory_store("b", None, &[("y", b"2".as_slice())]).await);

    let orchestrator = Orchestrator::new(RunOptions::new().with_progress_file(&path));
    let report = orchestrator
        .run_repair(&selection(vec![a.clone(), b]))
        .await
        .unwrap();

    assert!(report.pairs[0].skipped);
    assert!(!report.pairs[1].skipped);
    assert!(a.fetch_info("y").await.is_ok());
    assert_eq!(stats(&orchestrator, "local.a.local.b").src_files, 0);
}

#[tokio::test]
async fn set_acl_requires_support() {
    let tree = TempTree::with_files(&[("a.txt", b"x".as_slice())]);
    let mem: Arc<dyn BlobStore> = Arc::new(memory_store("mem", None, &[("k", b"v".as_slice())]).await);

    let orchestrator = Orchestrator::new(RunOptions::new().with_acl("private"));
    let report = orchestrator
        .run_set_acl(&selection(vec![Arc::new(tree.store("disk")), mem.clone()]))
        .await
        .unwrap();

    assert!(report.failed());
    let disk = &report.pairs[0];
    assert_eq!(disk.key.to_string(), "local.disk.local.disk");
    assert!(disk.error.as_deref().unwrap().contains("setACL"));
    assert!(report.pairs[1].error.is_none());

    assert_eq!(stats(&orchestrator, "local.disk.local.disk").src_files, 0);
    assert_eq!(stats(&orchestrator, "local.mem.local.mem").repairs, 1);
    let head = mem.fetch_info("k").await.unwrap();
    assert_eq!(head.access_control.as_deref(), Some("private"));
}

#[tokio::test]
async fn remove_dir_only_touches_the_directory() {
    let tree = TempTree::with_files(&[
        ("logs/1.log", b"a".as_slice()),
        ("logs/old/2.log", b"b".as_slice()),
        ("keep.txt", b"c".as_slice()),
    ]);

    let orchestrator = Orchestrator::new(RunOptions::new().with_dir("logs"));
    let report = orchestrator
        .run_remove_dir(&selection(vec![Arc::new(tree.store("disk"))]))
        .await
        .unwrap();
    assert!(!report.failed());

    assert!(!tree.exists("logs/1.log"));
    assert!(!tree.exists("logs/old/2.log"));
    assert!(tree.exists("keep.txt"));
    assert_eq!(stats(&orchestrator, "local.disk.local.disk").repairs, 2);
}

#[tokio::test]
async fn stats_run_counts_files_in_date_range() {
    let tree = TempTree::with_files(&[
        ("a", b"12345".as_slice()),
        ("b/c", b"123".as_slice()),
        ("old", b"1".as_slice()),
    ]);
    tree.set_mtime("old", Utc::now() - ChronoDuration::days(400));

    let all = Orchestrator::new(RunOptions::new());
    let sel = selection(vec![Arc::new(tree.store("disk"))]);
    all.run_stats(&sel).await.unwrap();
    let snap = stats(&all, "local.disk.local.disk");
    assert_eq!(snap.matches, 3);
    assert_eq!(snap.match_size, 9);

    let recent = Orchestrator::new(
        RunOptions::new().with_date_range(Some(Utc::now() - ChronoDuration::days(30)), None),
    );
    recent.run_stats(&sel).await.unwrap();
    let snap = stats(&recent, "local.disk.local.disk");
    assert_eq!(snap.matches, 2);
    assert_eq!(snap.match_size, 8);
}

#[tokio::test]
async fn initialize_every_capable_storage() {
    let tree = TempTree::new();
    let mem = memory_store("mem", Some((0, 3)), &[]).await;

    let orchestrator = Orchestrator::new(RunOptions::new());
    let done = orchestrator
        .run_initialize(&selection(vec![Arc::new(tree.store("disk")), Arc::new(mem)]))
        .await
        .unwrap();
    let names: Vec<String> = done.iter().map(ToString::to_string).collect();
    assert_eq!(names, ["local.disk", "local.mem"]);
}

#[tokio::test]
async fn empty_selection_has_no_pairs() {
    let tree = TempTree::new();
    let orchestrator = Orchestrator::new(RunOptions::new());
    let err = orchestrator
        .run_compare(&selection(vec![Arc::new(tree.store("only"))]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoPairs));
}
