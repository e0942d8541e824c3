//! Test fixtures and store helpers.
//!
//! Provides temporary directory trees, seeded in-memory stores and a helper
//! that drains a paged listing.

use blobsync_storage::{
    BlobStore, FsStore, ListOptions, MemoryBuckets, ObjectHeader, ShardedStore, StoreRequest,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

/// A temporary directory tree that is removed on drop.
pub struct TempTree {
    dir: TempDir,
}

impl TempTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Creates a tree containing `files`, given as `(key, contents)`.
    pub fn with_files(files: &[(&str, &[u8])]) -> Self {
        let tree = Self::new();
        for (key, data) in files {
            tree.write(key, data);
        }
        tree
    }

    /// Root directory of the tree.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `key` inside the tree.
    pub fn file_path(&self, key: &str) -> PathBuf {
        self.dir.path().join(key)
    }

    /// Writes `data` to `key`, creating parent directories.
    pub fn write(&self, key: &str, data: &[u8]) {
        let path = self.file_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&path, data).expect("Failed to write fixture file");
    }

    /// Sets the modification time of `key`.
    pub fn set_mtime(&self, key: &str, mtime: DateTime<Utc>) {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(self.file_path(key))
            .expect("Failed to open fixture file");
        file.set_modified(SystemTime::from(mtime))
            .expect("Failed to set modification time");
    }

    /// Creates an empty directory.
    pub fn mkdir(&self, dir: &str) {
        std::fs::create_dir_all(self.file_path(dir)).expect("Failed to create directory");
    }

    /// Returns true if `key` exists.
    pub fn exists(&self, key: &str) -> bool {
        self.file_path(key).exists()
    }

    /// Reads `key`.
    pub fn read(&self, key: &str) -> Vec<u8> {
        std::fs::read(self.file_path(key)).expect("Failed to read fixture file")
    }

    /// An [`FsStore`] rooted at this tree.
    pub fn store(&self, id: &str) -> FsStore {
        FsStore::new(id, self.path())
    }
}

impl Default for TempTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates an initialized in-memory store over `shards` (inclusive), or a
/// single bucket when `None`, seeded with `files`.
pub async fn memory_store(
    id: &str,
    shards: Option<(u32, u32)>,
    files: &[(&str, &[u8])],
) -> ShardedStore<MemoryBuckets> {
    let mut store = ShardedStore::new(id, MemoryBuckets::new(), format!("{id}-bucket"));
    if let Some((start, end)) = shards {
        store = store
            .with_shards(start, end)
            .expect("Failed to configure shards");
    }
    store.initialize().await.expect("Failed to create buckets");
    for (key, data) in files {
        put(&store, key, data, None).await;
    }
    store
}

/// Stores `data` under `key`, optionally stamping a modification time.
pub async fn put(store: &dyn BlobStore, key: &str, data: &[u8], mtime: Option<DateTime<Utc>>) {
    let mut headers = ObjectHeader::new(key);
    headers.last_modified = mtime;
    store
        .store(
            key,
            StoreRequest {
                buffer: Bytes::copy_from_slice(data),
                headers,
            },
        )
        .await
        .expect("Failed to store fixture object");
}

/// Every page of a drained listing.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Keys in emission order.
    pub keys: Vec<String>,
    /// Cursor returned after each non-final page.
    pub cursors: Vec<String>,
    /// Number of pages fetched.
    pub pages: usize,
}

/// Lists `dir` deeply until the cursor is exhausted.
pub async fn drain_listing(store: &dyn BlobStore, dir: &str, max_keys: usize) -> Listing {
    drain_listing_from(store, dir, max_keys, None).await
}

/// Lists `dir` deeply starting at `cursor` until the cursor is exhausted.
pub async fn drain_listing_from(
    store: &dyn BlobStore,
    dir: &str,
    max_keys: usize,
    mut cursor: Option<String>,
) -> Listing {
    let mut listing = Listing::default();
    loop {
        let options = ListOptions::deep()
            .with_max_keys(max_keys)
            .with_cursor(cursor.take());
        let page = store.list(dir, &options).await.expect("Failed to list page");
        listing.pages += 1;
        listing.keys.extend(page.files.into_iter().map(|h| h.key));
        match page.cursor {
            Some(next) => {
                listing.cursors.push(next.clone());
                cursor = Some(next);
            }
            None => return listing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn temp_tree_drains() {
        let tree = TempTree::with_files(&[("a/1", b"x".as_slice()), ("b", b"yy".as_slice())]);
        let listing = drain_listing(&tree.store("t"), "", 10).await;
        assert_eq!(listing.keys, ["b", "a/1"]);
        assert!(tree.exists("a/1"));
    }

    #[tokio::test]
    async fn memory_store_drains() {
        let store = memory_store("m", Some((0, 2)), &[("a/1", b"x".as_slice()), ("b", b"yy".as_slice())]).await;
        let mut listing = drain_listing(&store, "", 10).await;
        listing.keys.sort();
        assert_eq!(listing.keys, ["a/1", "b"]);
        assert_eq!(listing.pages, 3);
    }
}
