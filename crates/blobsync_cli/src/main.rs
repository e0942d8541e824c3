//! blobsync CLI
//!
//! Command-line tools for comparing, repairing and maintaining blob storage.
//!
//! # Commands
//!
//! - `compare` / `check` - Compare storages (check is one-way)
//! - `checkdir` - One-way shallow compare of a single directory
//! - `repair` / `copy` - Repair destinations (copy is one-way)
//! - `copydir` - One-way shallow copy of a single directory
//! - `rmdir` - Remove a directory from every storage
//! - `acl` - Apply `--acl` to every file in a directory
//! - `stats` - Count files and bytes
//! - `initialize` - Create buckets or root directories
//! - `shard` - Show which shard a directory maps to

mod commands;

use clap::{Parser, Subcommand};
use commands::RunArgs;
use tracing_subscriber::EnvFilter;

/// Blob storage compare and repair tools.
#[derive(Parser)]
#[command(name = "blobsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare files between storage bindings and/or environments
    Compare {
        /// Storage bindings to compare
        #[arg(required = true)]
        storage: Vec<String>,
    },

    /// One-way compare from the first storage and config
    Check {
        /// Storage bindings to compare
        #[arg(required = true)]
        storage: Vec<String>,
    },

    /// One-way shallow compare of a single directory
    Checkdir {
        /// Directory to compare
        dir: String,

        /// Storage bindings to compare
        #[arg(required = true)]
        storage: Vec<String>,
    },

    /// Repair differences between storage bindings and/or environments
    Repair {
        /// Storage bindings to synchronize
        #[arg(required = true)]
        storage: Vec<String>,
    },

    /// One-way repair from the first storage and config
    Copy {
        /// Storage bindings to synchronize
        #[arg(required = true)]
        storage: Vec<String>,
    },

    /// One-way shallow copy of a single directory
    Copydir {
        /// Directory to copy
        dir: String,

        /// Storage bindings to synchronize
        #[arg(required = true)]
        storage: Vec<String>,
    },

    /// Remove every file below a directory
    Rmdir {
        /// Directory to remove
        dir: String,

        /// Storage bindings to remove from
        #[arg(required = true)]
        storage: Vec<String>,
    },

    /// Apply --acl to every file below a directory
    Acl {
        /// Directory to apply the access control to
        dir: String,

        /// Storage bindings to update
        #[arg(required = true)]
        storage: Vec<String>,
    },

    /// Count files and bytes per storage binding
    Stats {
        /// Storage bindings to count
        #[arg(required = true)]
        storage: Vec<String>,
    },

    /// Create buckets or root directories
    Initialize {
        /// Storage bindings to initialize
        #[arg(required = true)]
        storage: Vec<String>,
    },

    /// Look up the shard a directory maps to
    Shard {
        /// Storage to look up
        storage: String,

        /// Directory to look up
        dir: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let run = &cli.run;
    match cli.command {
        Commands::Compare { storage } => commands::sync::compare(run, &storage, false, None).await?,
        Commands::Check { storage } => commands::sync::compare(run, &storage, true, None).await?,
        Commands::Checkdir { dir, storage } => {
            commands::sync::compare(run, &storage, true, Some(dir)).await?
        }
        Commands::Repair { storage } => commands::sync::repair(run, &storage, false, None).await?,
        Commands::Copy { storage } => commands::sync::repair(run, &storage, true, None).await?,
        Commands::Copydir { dir, storage } => {
            commands::sync::repair(run, &storage, true, Some(dir)).await?
        }
        Commands::Rmdir { dir, storage } => {
            commands::maintenance::remove_dir(run, &storage, dir).await?
        }
        Commands::Acl { dir, storage } => commands::maintenance::set_acl(run, &storage, dir).await?,
        Commands::Stats { storage } => commands::maintenance::stats(run, &storage).await?,
        Commands::Initialize { storage } => {
            commands::maintenance::initialize(run, &storage).await?
        }
        Commands::Shard { storage, dir } => commands::maintenance::shard(run, &storage, &dir)?,
        Commands::Version => {
            println!("blobsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
