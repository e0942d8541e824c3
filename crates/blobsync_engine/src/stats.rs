//! Per-pair run statistics.
//!
//! Counters are atomic and monotonically increasing for the run. The recent
//! diff and error rings are bounded and only used for display; snapshots
//! carry the full counters so a paused run can be resumed.

use crate::pairs::PairKey;
use blobsync_storage::ObjectHeader;
use humansize::{format_size, BINARY};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Number of recent diff keys and errors retained per pair.
pub const RECENT_LIMIT: usize = 10;

/// Lifecycle of a pair. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairState {
    /// Registered, not started.
    #[default]
    Initialized,
    /// Enumeration in progress.
    Running,
    /// Enumeration finished or failed.
    Complete,
}

#[derive(Debug, Default)]
struct Recent {
    diffs: VecDeque<String>,
    errors: VecDeque<String>,
}

fn push_bounded(ring: &mut VecDeque<String>, item: String) {
    if ring.len() == RECENT_LIMIT {
        ring.pop_front();
    }
    ring.push_back(item);
}

/// Statistics for one pair.
///
/// All counters can be read while file tasks are updating them.
#[derive(Debug)]
pub struct StatInfo {
    key: PairKey,
    state: Mutex<PairState>,
    src_files: AtomicU64,
    matches: AtomicU64,
    match_size: AtomicU64,
    diffs: AtomicU64,
    diff_size: AtomicU64,
    repairs: AtomicU64,
    errors: AtomicU64,
    recent: Mutex<Recent>,
}

impl StatInfo {
    /// Creates empty statistics for `key`.
    pub fn new(key: PairKey) -> Self {
        Self {
            key,
            state: Mutex::new(PairState::Initialized),
            src_files: AtomicU64::new(0),
            matches: AtomicU64::new(0),
            match_size: AtomicU64::new(0),
            diffs: AtomicU64::new(0),
            diff_size: AtomicU64::new(0),
            repairs: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            recent: Mutex::new(Recent::default()),
        }
    }

    /// The pair these statistics belong to.
    pub fn key(&self) -> &PairKey {
        &self.key
    }

    /// Current state.
    pub fn state(&self) -> PairState {
        *self.state.lock()
    }

    /// Marks the pair running. No effect once complete.
    pub fn running(&self) {
        self.advance(PairState::Running);
    }

    /// Marks the pair complete.
    pub fn complete(&self) {
        self.advance(PairState::Complete);
    }

    fn advance(&self, to: PairState) {
        let mut state = self.state.lock();
        if to > *state {
            *state = to;
        }
    }

    /// Records a source file equivalent at the destination.
    pub fn record_match(&self, file: &ObjectHeader) {
        self.src_files.fetch_add(1, Ordering::Relaxed);
        self.matches.fetch_add(1, Ordering::Relaxed);
        self.match_size
            .fetch_add(file.size.unwrap_or(0), Ordering::Relaxed);
    }

    /// Records a source file that differs from or is missing at the
    /// destination.
    pub fn record_diff(&self, file: &ObjectHeader) {
        self.src_files.fetch_add(1, Ordering::Relaxed);
        self.diffs.fetch_add(1, Ordering::Relaxed);
        self.diff_size
            .fetch_add(file.size.unwrap_or(0), Ordering::Relaxed);
        push_bounded(&mut self.recent.lock().diffs, file.key.clone());
    }

    /// Records a per-file failure.
    pub fn record_error(&self, error: impl fmt::Display) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        push_bounded(&mut self.recent.lock().errors, error.to_string());
    }

    /// Records a successful repair.
    pub fn record_repair(&self) {
        self.repairs.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of source files seen.
    pub fn src_files(&self) -> u64 {
        self.src_files.load(Ordering::Relaxed)
    }

    /// Returns the number of matches.
    pub fn matches(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }

    /// Returns the number of diffs.
    pub fn diffs(&self) -> u64 {
        self.diffs.load(Ordering::Relaxed)
    }

    /// Returns the number of repairs.
    pub fn repairs(&self) -> u64 {
        self.repairs.load(Ordering::Relaxed)
    }

    /// Returns the total number of errors, including those no longer retained.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatSnapshot {
        let recent = self.recent.lock();
        StatSnapshot {
            pair: self.key.to_string(),
            state: self.state(),
            src_files: self.src_files(),
            matches: self.matches(),
            match_size: self.match_size.load(Ordering::Relaxed),
            diffs: self.diffs(),
            diff_size: self.diff_size.load(Ordering::Relaxed),
            repairs: self.repairs(),
            errors: self.errors(),
            recent_diffs: recent.diffs.iter().cloned().collect(),
            recent_errors: recent.errors.iter().cloned().collect(),
        }
    }

    /// Seeds the counters from a persisted snapshot.
    ///
    /// The state is left alone; the resuming run drives it.
    pub fn restore(&self, snapshot: &StatSnapshot) {
        self.src_files.store(snapshot.src_files, Ordering::Relaxed);
        self.matches.store(snapshot.matches, Ordering::Relaxed);
        self.match_size.store(snapshot.match_size, Ordering::Relaxed);
        self.diffs.store(snapshot.diffs, Ordering::Relaxed);
        self.diff_size.store(snapshot.diff_size, Ordering::Relaxed);
        self.repairs.store(snapshot.repairs, Ordering::Relaxed);
        self.errors.store(snapshot.errors, Ordering::Relaxed);

        let mut recent = self.recent.lock();
        recent.diffs = newest(&snapshot.recent_diffs);
        recent.errors = newest(&snapshot.recent_errors);
    }
}

fn newest(items: &[String]) -> VecDeque<String> {
    items[items.len().saturating_sub(RECENT_LIMIT)..].iter().cloned().collect()
}

/// A point-in-time copy of [`StatInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatSnapshot {
    /// Pair key, `srcConfig.srcStorage.dstConfig.dstStorage`.
    pub pair: String,
    /// Pair state.
    #[serde(default)]
    pub state: PairState,
    /// Source files seen.
    #[serde(default)]
    pub src_files: u64,
    /// Files equivalent at the destination.
    #[serde(default)]
    pub matches: u64,
    /// Bytes of matching files.
    #[serde(default)]
    pub match_size: u64,
    /// Files differing or missing at the destination.
    #[serde(default)]
    pub diffs: u64,
    /// Bytes of differing files.
    #[serde(default)]
    pub diff_size: u64,
    /// Successful repairs.
    #[serde(default)]
    pub repairs: u64,
    /// Total errors.
    #[serde(default)]
    pub errors: u64,
    /// Most recent diff keys.
    #[serde(default)]
    pub recent_diffs: Vec<String>,
    /// Most recent error messages.
    #[serde(default)]
    pub recent_errors: Vec<String>,
}

impl fmt::Display for StatSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = |n: u64| format_size(n, BINARY);
        if self.state == PairState::Initialized {
            return f.write_str("waiting...");
        }
        if self.src_files == 0 {
            return f.write_str("empty source");
        }
        if self.src_files == self.matches {
            return write!(f, "All {} match ({})", self.src_files, bytes(self.match_size));
        }
        write!(f, "{} diffs ({})", self.diffs, bytes(self.diff_size))?;
        if self.repairs > 0 {
            write!(f, ", {} repairs", self.repairs)?;
        }
        write!(
            f,
            ", {} matches ({}), {} files",
            self.matches,
            bytes(self.match_size),
            self.src_files
        )
    }
}

/// Statistics of every pair in a run, in registration order.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    pairs: Mutex<Vec<Arc<StatInfo>>>,
}

impl StatsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the statistics for `key`, creating them on first use.
    pub fn get(&self, key: &PairKey) -> Arc<StatInfo> {
        let mut pairs = self.pairs.lock();
        if let Some(info) = pairs.iter().find(|info| info.key() == key) {
            return Arc::clone(info);
        }
        let info = Arc::new(StatInfo::new(key.clone()));
        pairs.push(Arc::clone(&info));
        info
    }

    /// Looks up statistics by the displayed pair key.
    pub fn find(&self, pair: &str) -> Option<Arc<StatInfo>> {
        self.pairs
            .lock()
            .iter()
            .find(|info| info.key().to_string() == pair)
            .cloned()
    }

    /// Snapshots of every pair.
    pub fn snapshots(&self) -> Vec<StatSnapshot> {
        self.pairs.lock().iter().map(|info| info.snapshot()).collect()
    }

    /// Seeds already-registered pairs from persisted snapshots.
    ///
    /// Snapshots for pairs not in this run are ignored.
    pub fn restore(&self, snapshots: &[StatSnapshot]) {
        for snapshot in snapshots {
            if let Some(info) = self.find(&snapshot.pair) {
                info.restore(snapshot);
            }
        }
    }
}

impl fmt::Display for StatsRegistry {
    /// One line per pair followed by the most recent errors.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshots = self.snapshots();
        for snapshot in &snapshots {
            writeln!(f, "{}: {}", snapshot.pair, snapshot)?;
        }
        let errors: Vec<(&str, &str)> = snapshots
            .iter()
            .flat_map(|s| s.recent_errors.iter().map(move |e| (s.pair.as_str(), e.as_str())))
            .take(5)
            .collect();
        if !errors.is_empty() {
            writeln!(f, "Top errors:")?;
            for (pair, error) in errors {
                writeln!(f, "  {pair}: {error}")?;
            }
        }
        Ok(())
    }
}
