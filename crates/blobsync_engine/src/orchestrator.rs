//! Run driver for compare, repair, rmdir, acl and stats.
//!
//! Pairs execute one at a time. Within a pair the source is listed a page at
//! a time; every file on the page is processed with at most
//! `RunOptions::concurrency` tasks in flight, and the next page is requested
//! only once the current one has drained.
//!
//! Per-file failures are absorbed into the pair's [`StatInfo`]. Only listing
//! and capability failures end a pair, and neither stops the next pair.

use crate::compare::{compare, Verdict};
use crate::config::RunOptions;
use crate::error::{EngineError, EngineResult};
use crate::pairs::{Binding, Pair, PairKey, Selection};
use crate::progress::{Progress, ProgressFile};
use crate::retry::with_retry;
use crate::stats::{StatInfo, StatSnapshot, StatsRegistry};
use blobsync_storage::{ListOptions, ObjectHeader, StoreRequest};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What a run does with every enumerated file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Compare,
    Repair,
    RemoveDir,
    SetAcl(String),
    Stats,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Compare => "compare",
            Action::Repair => "repair",
            Action::RemoveDir => "rmdir",
            Action::SetAcl(_) => "acl",
            Action::Stats => "stats",
        }
    }

    fn is_pairwise(&self) -> bool {
        matches!(self, Action::Compare | Action::Repair)
    }
}

/// Result of one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOutcome {
    /// The pair.
    pub key: PairKey,
    /// Listing or capability failure that ended the pair.
    pub error: Option<String>,
    /// The pair was completed by an earlier run and not executed again.
    pub skipped: bool,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One outcome per pair, in execution order.
    pub pairs: Vec<PairOutcome>,
    /// Final counters of every pair.
    pub stats: Vec<StatSnapshot>,
}

impl RunReport {
    /// True if any pair ended with a listing or capability failure.
    ///
    /// Residual diffs and per-file errors do not fail a run.
    pub fn failed(&self) -> bool {
        self.pairs.iter().any(|p| p.error.is_some())
    }

    /// Stats of `pair`, by displayed key.
    pub fn stats_for(&self, pair: &str) -> Option<&StatSnapshot> {
        self.stats.iter().find(|s| s.pair == pair)
    }
}

/// Where a run starts.
#[derive(Debug, Default)]
struct ResumePoint {
    index: usize,
    cursor: Option<String>,
}

/// The periodic progress writer of a running [`Orchestrator`].
struct Snapshots {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Snapshots {
    /// Stops the writer once any save in flight has finished.
    async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            warn!(error = %e, "progress writer ended abnormally");
        }
    }
}

/// Drives runs over a [`Selection`].
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::new(RunOptions::new().with_concurrency(4));
/// let report = orchestrator.run_repair(&selection).await?;
/// println!("{}", orchestrator.stats());
/// ```
#[derive(Debug)]
pub struct Orchestrator {
    options: RunOptions,
    stats: Arc<StatsRegistry>,
    progress: watch::Sender<Progress>,
}

impl Orchestrator {
    /// Creates an orchestrator with its own stats registry.
    pub fn new(options: RunOptions) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            options,
            stats: Arc::new(StatsRegistry::new()),
            progress,
        }
    }

    /// Run options.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Stats of every pair seen so far.
    pub fn stats(&self) -> &Arc<StatsRegistry> {
        &self.stats
    }

    /// Subscribes to cursor updates.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Compares every pair without modifying either side.
    pub async fn run_compare(&self, selection: &Selection) -> EngineResult<RunReport> {
        self.run(selection, Action::Compare).await
    }

    /// Compares every pair and repairs the destination, or removes ghosts
    /// from the source when `remove_ghosts` is set.
    pub async fn run_repair(&self, selection: &Selection) -> EngineResult<RunReport> {
        self.run(selection, Action::Repair).await
    }

    /// Removes every file under `dir` from each selected storage.
    pub async fn run_remove_dir(&self, selection: &Selection) -> EngineResult<RunReport> {
        self.run(selection, Action::RemoveDir).await
    }

    /// Applies the configured access control to every file.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::InvalidOption`] when no ACL is configured.
    /// Storages without ACL support fail their pair before any work starts.
    pub async fn run_set_acl(&self, selection: &Selection) -> EngineResult<RunReport> {
        let acl = self
            .options
            .acl
            .clone()
            .ok_or_else(|| EngineError::InvalidOption("acl run requires an access control".into()))?;
        self.run(selection, Action::SetAcl(acl)).await
    }

    /// Counts every file of each selected storage.
    pub async fn run_stats(&self, selection: &Selection) -> EngineResult<RunReport> {
        self.run(selection, Action::Stats).await
    }

    /// Initializes every selected storage that supports it.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::NoPairs`] when no storage supports
    /// initialization, or with the first initialization error.
    pub async fn run_initialize(&self, selection: &Selection) -> EngineResult<Vec<Binding>> {
        let mut initialized = Vec::new();
        for binding in selection.bindings()? {
            if !binding.store.capabilities().initialize {
                warn!(storage = %binding.binding, "storage does not support initialize, skipping");
                continue;
            }
            with_retry(&self.options.retry, "initialize", || binding.store.initialize()).await?;
            info!(storage = %binding.binding, "initialized");
            initialized.push(binding.binding);
        }
        if initialized.is_empty() {
            return Err(EngineError::NoPairs);
        }
        Ok(initialized)
    }

    async fn run(&self, selection: &Selection, action: Action) -> EngineResult<RunReport> {
        let pairs = if action.is_pairwise() {
            selection.pairs(self.options.one_way)?
        } else {
            selection.singles()?
        };
        for pair in &pairs {
            self.stats.get(&pair.key);
        }

        let resume = self.resume_point(&pairs).await;
        let snapshots = self
            .options
            .progress_file
            .clone()
            .and_then(|path| self.spawn_snapshots(path));

        let mut report = RunReport::default();
        let mut cursor = resume.cursor;
        for (index, pair) in pairs.iter().enumerate() {
            if index < resume.index {
                info!(pair = %pair.key, "completed by a previous run, skipping");
                self.stats.get(&pair.key).complete();
                report.pairs.push(PairOutcome {
                    key: pair.key.clone(),
                    error: None,
                    skipped: true,
                });
                continue;
            }

            let error = match self.run_pair(pair, &action, cursor.take()).await {
                Ok(()) => None,
                Err(e) => {
                    error!(pair = %pair.key, error = %e, "pair failed");
                    self.stats.get(&pair.key).complete();
                    Some(e.to_string())
                }
            };
            report.pairs.push(PairOutcome {
                key: pair.key.clone(),
                error,
                skipped: false,
            });
        }

        if let Some(snapshots) = snapshots {
            snapshots.stop().await;
        }
        self.progress.send_replace(Progress::default());
        report.stats = self.stats.snapshots();

        if let Some(path) = &self.options.progress_file {
            let file = ProgressFile {
                last_key: String::new(),
                pair: String::new(),
                pairs: report.stats.clone(),
            };
            if let Err(e) = file.save(path).await {
                warn!(path = %path.display(), error = %e, "cannot save final progress");
            }
        }
        Ok(report)
    }

    /// An explicit resume key wins; otherwise the progress file decides.
    async fn resume_point(&self, pairs: &[Pair]) -> ResumePoint {
        if let Some(key) = &self.options.resume_key {
            return ResumePoint {
                index: 0,
                cursor: Some(key.clone()),
            };
        }
        let Some(path) = &self.options.progress_file else {
            return ResumePoint::default();
        };

        let saved = ProgressFile::load(path).await;
        if saved.pair.is_empty() {
            // a bare `{ lastKey }` applies to the first pair
            return ResumePoint {
                index: 0,
                cursor: (!saved.last_key.is_empty()).then_some(saved.last_key),
            };
        }
        let Some(index) = pairs.iter().position(|p| p.key.to_string() == saved.pair) else {
            warn!(pair = %saved.pair, "progress file names a pair outside this run, starting over");
            return ResumePoint::default();
        };

        self.stats.restore(&saved.pairs);
        info!(pair = %saved.pair, last_key = %saved.last_key, "resuming");
        ResumePoint {
            index,
            cursor: saved.cursor_for(&saved.pair).map(str::to_string),
        }
    }

    async fn run_pair(
        &self,
        pair: &Pair,
        action: &Action,
        mut cursor: Option<String>,
    ) -> EngineResult<()> {
        let info = self.stats.get(&pair.key);
        if let Action::SetAcl(_) = action {
            if !pair.src.store.capabilities().set_acl {
                return Err(pair.src.store.unsupported("setACL").into());
            }
        }

        info.running();
        info!(pair = %pair.key, action = action.name(), dir = %self.options.dir, "pair started");
        self.publish(&pair.key, cursor.clone());

        loop {
            let options = ListOptions {
                deep: self.options.recursive,
                ..ListOptions::default()
            }
            .with_max_keys(self.options.max_keys)
            .with_cursor(cursor.clone());

            let page = pair
                .src
                .store
                .list(&self.options.dir, &options)
                .await
                .map_err(|e| EngineError::enumeration(&pair.key, e))?;

            let files = page
                .files
                .into_iter()
                .filter(|f| self.options.accepts_date(f.last_modified));
            stream::iter(files)
                .for_each_concurrent(self.options.concurrency, |file| {
                    self.process_file(pair, &info, action, file)
                })
                .await;

            cursor = page.cursor;
            self.publish(&pair.key, cursor.clone());
            if cursor.is_none() {
                break;
            }
        }

        info.complete();
        info!(pair = %pair.key, summary = %info.snapshot(), "pair complete");
        Ok(())
    }

    async fn process_file(&self, pair: &Pair, info: &StatInfo, action: &Action, file: ObjectHeader) {
        let key = file.key.clone();
        let result = match action {
            Action::Compare => self.compare_file(pair, info, file).await.map(|_| ()),
            Action::Repair => self.repair_file(pair, info, file).await,
            Action::RemoveDir => {
                info.record_diff(&file);
                with_retry(&self.options.retry, "remove", || pair.src.store.remove(&key))
                    .await
                    .map(|()| info.record_repair())
                    .map_err(EngineError::from)
            }
            Action::SetAcl(acl) => {
                info.record_diff(&file);
                with_retry(&self.options.retry, "set_acl", || pair.src.store.set_acl(&key, acl))
                    .await
                    .map(|()| info.record_repair())
                    .map_err(EngineError::from)
            }
            Action::Stats => {
                info.record_match(&file);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(pair = %pair.key, key = %key, error = %e, "file failed");
            match e {
                EngineError::SafetyWindow { .. } => info.record_error(e),
                e => info.record_error(format!("{key}: {e}")),
            }
        }
    }

    /// Records the comparison; an unreadable destination counts as a diff.
    async fn compare_file(
        &self,
        pair: &Pair,
        info: &StatInfo,
        file: ObjectHeader,
    ) -> EngineResult<(Verdict, ObjectHeader)> {
        let comparison = match compare(
            self.options.mode,
            &self.options.retry,
            pair.src.store.as_ref(),
            pair.dst.store.as_ref(),
            file.clone(),
        )
        .await
        {
            Ok(comparison) => comparison,
            Err(e) => {
                info.record_diff(&file);
                return Err(e.into());
            }
        };

        if comparison.is_match() {
            info.record_match(&comparison.src);
        } else {
            debug!(pair = %pair.key, key = %comparison.src.key, verdict = ?comparison.verdict, "diff");
            info.record_diff(&comparison.src);
        }
        Ok((comparison.verdict, comparison.src))
    }

    async fn repair_file(&self, pair: &Pair, info: &StatInfo, file: ObjectHeader) -> EngineResult<()> {
        let (verdict, src) = self.compare_file(pair, info, file).await?;
        match verdict {
            Verdict::Match => Ok(()),
            Verdict::Missing if self.options.remove_ghosts => self.remove_ghost(pair, info, &src).await,
            Verdict::Missing | Verdict::Mismatch => self.copy_file(pair, info, &src.key).await,
        }
    }

    /// Removes a source that never reached the destination, once it is
    /// older than the ghost window.
    async fn remove_ghost(&self, pair: &Pair, info: &StatInfo, src: &ObjectHeader) -> EngineResult<()> {
        let window = self.options.ghost_window;
        let old_enough = src.last_modified.is_some_and(|at| {
            Utc::now()
                .signed_duration_since(at)
                .to_std()
                .is_ok_and(|age| age > window)
        });
        if !old_enough {
            return Err(EngineError::SafetyWindow {
                key: src.key.clone(),
                window_secs: window.as_secs(),
            });
        }

        with_retry(&self.options.retry, "remove", || pair.src.store.remove(&src.key)).await?;
        info!(pair = %pair.key, key = %src.key, "removed ghost");
        info.record_repair();
        Ok(())
    }

    async fn copy_file(&self, pair: &Pair, info: &StatInfo, key: &str) -> EngineResult<()> {
        let retry = &self.options.retry;
        let (mut headers, buffer) = with_retry(retry, "fetch", || pair.src.store.fetch(key)).await?;
        if headers.access_control.is_none() {
            headers.access_control = self.options.acl.clone();
        }

        with_retry(retry, "store", || {
            pair.dst.store.store(
                key,
                StoreRequest {
                    buffer: buffer.clone(),
                    headers: headers.clone(),
                },
            )
        })
        .await?;
        debug!(pair = %pair.key, key, size = buffer.len(), "repaired");
        info.record_repair();
        Ok(())
    }

    fn publish(&self, pair: &PairKey, cursor: Option<String>) {
        self.progress.send_replace(Progress {
            pair: pair.to_string(),
            cursor,
        });
    }

    /// Saves `{ lastKey, pair, pairs }` every `progress_interval` until
    /// stopped.
    fn spawn_snapshots(&self, path: PathBuf) -> Option<Snapshots> {
        let period = self.options.progress_interval;
        if period.is_zero() {
            return None;
        }
        let stats = Arc::clone(&self.stats);
        let progress = self.progress.subscribe();
        let (stop, mut stopped) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = &mut stopped => break,
                }
                let current = progress.borrow().clone();
                info!(pair = %current.pair, last_key = current.cursor.as_deref().unwrap_or(""), "progress");
                let file = ProgressFile {
                    last_key: current.cursor.unwrap_or_default(),
                    pair: current.pair,
                    pairs: stats.snapshots(),
                };
                if let Err(e) = file.save(&path).await {
                    warn!(path = %path.display(), error = %e, "cannot save progress");
                }
            }
        });
        Some(Snapshots { stop, handle })
    }
}
