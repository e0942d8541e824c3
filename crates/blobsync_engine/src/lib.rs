//! # blobsync engine
//!
//! Compares and repairs blob stores pairwise.
//!
//! A run builds a matrix of directed pairs from the named configurations and
//! storages, then enumerates each pair's source page by page. Every file is
//! compared against the destination and, for repair runs, copied over (or
//! removed from the source when it is a ghost). Progress is a resumable
//! cursor plus the per-pair counters in [`StatsRegistry`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use blobsync_engine::{CompareMode, Orchestrator, RunOptions, Selection};
//! use blobsync_storage::{StorageConfig, StoreRegistry};
//!
//! # async fn repair(config: StorageConfig) -> blobsync_engine::EngineResult<()> {
//! let registry = StoreRegistry::from_config(&config)?;
//! let selection = Selection::new(["primary", "replica"]).with_config("local", registry);
//!
//! let options = RunOptions::new()
//!     .with_mode(CompareMode::Headers)
//!     .with_one_way(true)
//!     .with_progress_file("stats.json");
//! let orchestrator = Orchestrator::new(options);
//! let report = orchestrator.run_repair(&selection).await?;
//! print!("{}", orchestrator.stats());
//! assert!(!report.failed());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compare;
mod config;
mod error;
mod orchestrator;
mod pairs;
mod progress;
mod retry;
mod stats;

pub use compare::{
    compare, deep_precheck, fast_match, headers_match, sizes_differ, CompareMode, Comparison,
    Verdict,
};
pub use config::{
    RetryConfig, RunOptions, DEFAULT_CONCURRENCY, DEFAULT_GHOST_WINDOW, DEFAULT_MAX_KEYS,
    DEFAULT_PROGRESS_INTERVAL,
};
pub use error::{EngineError, EngineResult};
pub use orchestrator::{Orchestrator, PairOutcome, RunReport};
pub use pairs::{Binding, Pair, PairKey, Selection, StoreBinding};
pub use progress::{Progress, ProgressFile};
pub use retry::{with_retry, Retryable};
pub use stats::{PairState, StatInfo, StatSnapshot, StatsRegistry, RECENT_LIMIT};
