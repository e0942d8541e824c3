//! Compare and repair commands.

use super::{finish, watch_progress, RunArgs};
use blobsync_engine::{Orchestrator, RunOptions};
use std::error::Error;
use tracing::info;

/// Options for a compare or repair run.
///
/// A directory argument restricts the run to that directory alone, without
/// descending into subdirectories.
fn pair_options(args: &RunArgs, one_way: bool, dir: Option<String>) -> RunOptions {
    let options = args.options().with_one_way(one_way);
    match dir {
        Some(dir) => options.with_dir(dir).with_recursive(false),
        None => options,
    }
}

/// Runs `compare`, `check` or `checkdir`.
pub async fn compare(
    args: &RunArgs,
    storages: &[String],
    one_way: bool,
    dir: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let selection = args.selection(storages)?;
    let orchestrator = Orchestrator::new(pair_options(args, one_way, dir));
    info!(mode = %orchestrator.options().mode, one_way, "comparing");

    let watcher = watch_progress(&orchestrator);
    let report = orchestrator.run_compare(&selection).await;
    watcher.abort();
    finish(&orchestrator, &report?)
}

/// Runs `repair`, `copy` or `copydir`.
pub async fn repair(
    args: &RunArgs,
    storages: &[String],
    one_way: bool,
    dir: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let selection = args.selection(storages)?;
    let orchestrator = Orchestrator::new(pair_options(args, one_way, dir));
    info!(
        mode = %orchestrator.options().mode,
        one_way,
        remove_ghosts = orchestrator.options().remove_ghosts,
        "repairing"
    );

    let watcher = watch_progress(&orchestrator);
    let report = orchestrator.run_repair(&selection).await;
    watcher.abort();
    finish(&orchestrator, &report?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn directory_runs_are_shallow() {
        let cli = TestCli::parse_from(["blobsync", "--mode", "deep", "--retry-attempts", "1"]);
        let options = pair_options(&cli.run, true, Some("photos".into()));
        assert_eq!(options.dir, "photos");
        assert!(!options.recursive);
        assert!(options.one_way);
        assert_eq!(options.mode.as_str(), "deep");
        assert_eq!(options.retry.max_attempts(), 2);

        let options = pair_options(&cli.run, false, None);
        assert!(options.recursive);
        assert!(options.dir.is_empty());
    }

    #[test]
    fn defaults_match_engine() {
        let cli = TestCli::parse_from(["blobsync"]);
        assert_eq!(cli.run.configs, ["local"]);
        let options = cli.run.options();
        assert_eq!(options.concurrency, blobsync_engine::DEFAULT_CONCURRENCY);
        assert_eq!(options.retry.min.as_millis(), 1000);
        assert!(options.progress_file.is_none());
    }
}
