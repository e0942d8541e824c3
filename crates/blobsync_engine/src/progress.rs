//! Run progress: the live cursor and its persisted snapshot.

use crate::error::EngineResult;
use crate::stats::StatSnapshot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// The position of the pair currently being enumerated.
///
/// `cursor` is the one that produces the next unprocessed page; it only
/// advances after a page has fully drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Displayed pair key, empty before the first pair starts.
    pub pair: String,
    /// Resume cursor, `None` at the start of the pair.
    pub cursor: Option<String>,
}

/// Persisted progress, `{ lastKey, pair, pairs }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressFile {
    /// Cursor to resume `pair` from.
    #[serde(default)]
    pub last_key: String,
    /// Pair the cursor belongs to.
    #[serde(default)]
    pub pair: String,
    /// Counters of every pair at save time.
    #[serde(default)]
    pub pairs: Vec<StatSnapshot>,
}

impl ProgressFile {
    /// Reads `path`.
    ///
    /// A missing or unreadable file yields an empty snapshot; a stale progress
    /// file must never prevent a run from starting.
    pub async fn load(path: &Path) -> Self {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read progress file");
                return Self::default();
            }
        };
        match serde_json::from_slice(&data) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed progress file");
                Self::default()
            }
        }
    }

    /// Writes the snapshot atomically: temp file, sync, rename.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> EngineResult<()> {
        let temp_path = temp_path(path);
        let data = serde_json::to_vec_pretty(self)?;

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    /// The cursor to resume `pair` from, if this snapshot belongs to it.
    pub fn cursor_for(&self, pair: &str) -> Option<&str> {
        (self.pair == pair && !self.last_key.is_empty()).then_some(self.last_key.as_str())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
