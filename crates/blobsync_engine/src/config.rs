//! Configuration for engine runs.

use crate::compare::CompareMode;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of files processed concurrently within a page.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default page size requested from the source listing.
pub const DEFAULT_MAX_KEYS: usize = 5000;

/// Default interval between progress snapshots.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Sources newer than this are never removed as ghosts.
pub const DEFAULT_GHOST_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Configuration for retry behavior.
///
/// Attempt `a` (1-indexed) waits `max(min, (a - 1) * factor * min)` before
/// running; the first attempt runs immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Minimum delay between attempts.
    pub min: Duration,
    /// Backoff multiplier.
    pub factor: f64,
    /// Maximum number of attempts beyond the first.
    pub retries: u32,
}

impl RetryConfig {
    /// Creates a configuration allowing `retries` additional attempts.
    pub fn new(retries: u32) -> Self {
        Self {
            min: Duration::from_millis(1000),
            factor: 2.0,
            retries,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Sets the minimum delay.
    pub fn with_min(mut self, min: Duration) -> Self {
        self.min = min;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Calculates the delay before a given attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let nanos = self.min.as_nanos() as f64 * f64::from(attempt - 1) * self.factor.max(0.0);
        Duration::from_nanos(nanos.round() as u64).max(self.min)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Options shared by every orchestrator entry point.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Files processed concurrently within one page.
    pub concurrency: usize,
    /// Page size requested from the source.
    pub max_keys: usize,
    /// Comparison strategy.
    pub mode: CompareMode,
    /// Walk the whole subtree instead of a single directory.
    pub recursive: bool,
    /// Directory to enumerate; empty for the store root.
    pub dir: String,
    /// Skip files last modified before this instant.
    pub date_min: Option<DateTime<Utc>>,
    /// Skip files last modified after this instant.
    pub date_max: Option<DateTime<Utc>>,
    /// Cursor the first executed pair resumes from.
    pub resume_key: Option<String>,
    /// Retry policy for per-file I/O.
    pub retry: RetryConfig,
    /// Remove sources missing at the destination instead of copying them.
    pub remove_ghosts: bool,
    /// Access control applied to repaired objects that carry none.
    pub acl: Option<String>,
    /// Keep only pairs whose source is the first named storage and config.
    pub one_way: bool,
    /// Where progress snapshots are persisted.
    pub progress_file: Option<PathBuf>,
    /// Interval between progress snapshots.
    pub progress_interval: Duration,
    /// Minimum source age before a ghost may be removed.
    pub ghost_window: Duration,
}

impl RunOptions {
    /// Creates options with defaults.
    pub fn new() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_keys: DEFAULT_MAX_KEYS,
            mode: CompareMode::default(),
            recursive: true,
            dir: String::new(),
            date_min: None,
            date_max: None,
            resume_key: None,
            retry: RetryConfig::default(),
            remove_ghosts: false,
            acl: None,
            one_way: false,
            progress_file: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            ghost_window: DEFAULT_GHOST_WINDOW,
        }
    }

    /// Sets the per-page concurrency. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the source page size.
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.max(1);
        self
    }

    /// Sets the comparison strategy.
    pub fn with_mode(mut self, mode: CompareMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables or disables subtree traversal.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Restricts the run to `dir`.
    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Sets the last-modified window. Either bound may be open.
    pub fn with_date_range(
        mut self,
        date_min: Option<DateTime<Utc>>,
        date_max: Option<DateTime<Utc>>,
    ) -> Self {
        self.date_min = date_min;
        self.date_max = date_max;
        self
    }

    /// Sets an explicit resume cursor.
    pub fn with_resume_key(mut self, resume_key: impl Into<String>) -> Self {
        let resume_key = resume_key.into();
        self.resume_key = (!resume_key.is_empty()).then_some(resume_key);
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enables ghost removal.
    pub fn with_remove_ghosts(mut self, remove_ghosts: bool) -> Self {
        self.remove_ghosts = remove_ghosts;
        self
    }

    /// Sets the access control for repairs and the `acl` run.
    pub fn with_acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = Some(acl.into());
        self
    }

    /// Enables one-way pair selection.
    pub fn with_one_way(mut self, one_way: bool) -> Self {
        self.one_way = one_way;
        self
    }

    /// Persists progress to `path`.
    pub fn with_progress_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.progress_file = Some(path.into());
        self
    }

    /// Sets the snapshot interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Sets the ghost safety window.
    pub fn with_ghost_window(mut self, window: Duration) -> Self {
        self.ghost_window = window;
        self
    }

    /// Returns true if `last_modified` passes the date filter.
    ///
    /// Files without a modification time pass only an open filter.
    pub fn accepts_date(&self, last_modified: Option<DateTime<Utc>>) -> bool {
        if self.date_min.is_none() && self.date_max.is_none() {
            return true;
        }
        let Some(at) = last_modified else {
            return false;
        };
        self.date_min.map_or(true, |min| at >= min) && self.date_max.map_or(true, |max| at <= max)
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new()
    }
}
