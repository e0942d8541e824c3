//! CLI command implementations.

pub mod config;
pub mod maintenance;
pub mod sync;

use blobsync_engine::{CompareMode, Orchestrator, RetryConfig, RunOptions, RunReport, Selection};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{ArgAction, Args};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory holding `<config>.json` files
    #[arg(global = true, long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Configurations to load; the first is the one-way source
    #[arg(global = true, long = "config", num_args = 1.., default_value = "local")]
    pub configs: Vec<String>,

    /// Comparison mode (fast, headers, deep, force)
    #[arg(global = true, short, long, default_value = "fast")]
    pub mode: CompareMode,

    /// Files processed concurrently per page
    #[arg(global = true, short, long, default_value_t = blobsync_engine::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Page size requested from sources
    #[arg(global = true, long, default_value_t = blobsync_engine::DEFAULT_MAX_KEYS)]
    pub max_keys: usize,

    /// Walk subdirectories
    #[arg(global = true, long, default_value_t = true, action = ArgAction::Set)]
    pub recursive: bool,

    /// Directory to restrict compare, repair and stats to
    #[arg(global = true, long, default_value = "")]
    pub prefix: String,

    /// Skip files modified before this date (RFC 3339 or YYYY-MM-DD)
    #[arg(global = true, long, value_parser = parse_date)]
    pub date_min: Option<DateTime<Utc>>,

    /// Skip files modified after this date (RFC 3339 or YYYY-MM-DD)
    #[arg(global = true, long, value_parser = parse_date)]
    pub date_max: Option<DateTime<Utc>>,

    /// Cursor to resume the first pair from
    #[arg(global = true, long)]
    pub resume_key: Option<String>,

    /// Minimum retry delay in milliseconds
    #[arg(global = true, long, default_value_t = 1000)]
    pub retry_min: u64,

    /// Retry backoff factor
    #[arg(global = true, long, default_value_t = 2.0)]
    pub retry_factor: f64,

    /// Retries after the first attempt
    #[arg(global = true, long, default_value_t = 3)]
    pub retry_attempts: u32,

    /// Remove sources missing at the destination instead of copying them
    #[arg(global = true, long)]
    pub remove_ghosts: bool,

    /// Access control for repaired objects and the acl command
    #[arg(global = true, long)]
    pub acl: Option<String>,

    /// Progress file to resume from and save to
    #[arg(global = true, long)]
    pub stats_file: Option<PathBuf>,

    /// Seconds between progress snapshots
    #[arg(global = true, long, default_value_t = 5)]
    pub progress_interval: u64,
}

impl RunArgs {
    /// Engine options for these arguments.
    pub fn options(&self) -> RunOptions {
        let retry = RetryConfig::new(self.retry_attempts)
            .with_min(Duration::from_millis(self.retry_min))
            .with_factor(self.retry_factor);

        let mut options = RunOptions::new()
            .with_mode(self.mode)
            .with_concurrency(self.concurrency)
            .with_max_keys(self.max_keys)
            .with_recursive(self.recursive)
            .with_dir(self.prefix.clone())
            .with_date_range(self.date_min, self.date_max)
            .with_retry(retry)
            .with_remove_ghosts(self.remove_ghosts)
            .with_progress_interval(Duration::from_secs(self.progress_interval));
        if let Some(key) = &self.resume_key {
            options = options.with_resume_key(key.clone());
        }
        if let Some(acl) = &self.acl {
            options = options.with_acl(acl.clone());
        }
        if let Some(path) = &self.stats_file {
            options = options.with_progress_file(path.clone());
        }
        options
    }

    /// Loads the named configurations and binds `storages` in each.
    pub fn selection(&self, storages: &[String]) -> Result<Selection, Box<dyn Error>> {
        config::load_selection(&self.config_dir, &self.configs, storages)
    }
}

/// Parses an RFC 3339 timestamp or a plain date at midnight UTC.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| format!("invalid date: {s}"))
}

/// Logs cursor updates until the run ends.
pub fn watch_progress(orchestrator: &Orchestrator) -> JoinHandle<()> {
    let mut progress = orchestrator.subscribe();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = progress.borrow_and_update().clone();
            if !current.pair.is_empty() {
                debug!(pair = %current.pair, last_key = current.cursor.as_deref().unwrap_or(""), "page done");
            }
        }
    })
}

/// Prints the stats table and fails if any pair could not be enumerated.
pub fn finish(orchestrator: &Orchestrator, report: &RunReport) -> Result<(), Box<dyn Error>> {
    print!("{}", orchestrator.stats());
    let failures: Vec<String> = report
        .pairs
        .iter()
        .filter_map(|p| p.error.as_ref().map(|e| format!("{}: {e}", p.key)))
        .collect();
    if failures.is_empty() {
        return Ok(());
    }
    for failure in &failures {
        eprintln!("{failure}");
    }
    Err(format!("{} of {} pairs failed", failures.len(), report.pairs.len()).into())
}
