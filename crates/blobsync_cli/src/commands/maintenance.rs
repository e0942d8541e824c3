//! Single-storage commands: rmdir, acl, stats, initialize and shard.

use super::{config, finish, watch_progress, RunArgs};
use blobsync_engine::{Orchestrator, RunOptions};
use std::error::Error;
use tracing::{info, warn};

fn dir_options(args: &RunArgs, dir: String) -> RunOptions {
    args.options().with_dir(dir)
}

/// Removes every file below `dir` in each storage.
pub async fn remove_dir(args: &RunArgs, storages: &[String], dir: String) -> Result<(), Box<dyn Error>> {
    let selection = args.selection(storages)?;
    let orchestrator = Orchestrator::new(dir_options(args, dir));
    warn!(dir = %orchestrator.options().dir, "removing directory");

    let watcher = watch_progress(&orchestrator);
    let report = orchestrator.run_remove_dir(&selection).await;
    watcher.abort();
    finish(&orchestrator, &report?)
}

/// Applies `--acl` to every file below `dir` in each storage.
pub async fn set_acl(args: &RunArgs, storages: &[String], dir: String) -> Result<(), Box<dyn Error>> {
    if args.acl.is_none() {
        return Err("acl requires --acl".into());
    }
    let selection = args.selection(storages)?;
    let orchestrator = Orchestrator::new(dir_options(args, dir));

    let watcher = watch_progress(&orchestrator);
    let report = orchestrator.run_set_acl(&selection).await;
    watcher.abort();
    finish(&orchestrator, &report?)
}

/// Counts files and bytes of each storage.
pub async fn stats(args: &RunArgs, storages: &[String]) -> Result<(), Box<dyn Error>> {
    let selection = args.selection(storages)?;
    let orchestrator = Orchestrator::new(args.options());

    let watcher = watch_progress(&orchestrator);
    let report = orchestrator.run_stats(&selection).await;
    watcher.abort();
    finish(&orchestrator, &report?)
}

/// Initializes each storage that supports it.
pub async fn initialize(args: &RunArgs, storages: &[String]) -> Result<(), Box<dyn Error>> {
    let selection = args.selection(storages)?;
    let orchestrator = Orchestrator::new(args.options());
    for binding in orchestrator.run_initialize(&selection).await? {
        println!("Initialized {binding}");
    }
    Ok(())
}

/// Prints the shard `dir` maps to in `storage` of the first configuration.
pub fn shard(args: &RunArgs, storage: &str, dir: &str) -> Result<(), Box<dyn Error>> {
    let id = args
        .configs
        .first()
        .ok_or("at least one --config is required")?;
    let store = config::load_registry(&args.config_dir, id)?.get(storage)?;
    let shard = store.shard_for(dir)?;
    info!(storage, dir, shard = %shard, "shard lookup");
    println!("Shard: {shard}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::tempdir;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    fn args(config_dir: &std::path::Path) -> RunArgs {
        TestCli::parse_from(["blobsync", "--config-dir", &config_dir.display().to_string()]).run
    }

    #[test]
    fn shard_lookup() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("local.json"),
            r#"{ "storage": {
                "mem": { "driver": "memory", "bucketPrefix": "b", "bucketStart": 0, "bucketEnd": 3 },
                "disk": { "driver": "fs", "path": "/tmp/blobsync-shard" }
            } }"#,
        )
        .unwrap();

        let run = args(dir.path());
        assert!(shard(&run, "mem", "photos").is_ok());
        let err = shard(&run, "disk", "photos").unwrap_err();
        assert!(err.to_string().contains("getShard"));
    }

    #[tokio::test]
    async fn acl_needs_a_value() {
        let dir = tempdir().unwrap();
        let err = set_acl(&args(dir.path()), &["disk".to_string()], "x".into())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--acl"));
    }
}
