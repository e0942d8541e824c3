//! Blob store trait definition.

use crate::error::{StorageError, StorageResult};
use crate::header::ObjectHeader;
use async_trait::async_trait;
use bytes::Bytes;

/// Options for a single [`BlobStore::list`] page request.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Traverse the whole subtree instead of a single directory.
    pub deep: bool,
    /// Upper bound on keys per page, where the backend honors it.
    pub max_keys: Option<usize>,
    /// Cursor returned by the previous page.
    pub cursor: Option<String>,
}

impl ListOptions {
    /// Options for a deep (recursive) listing.
    pub fn deep() -> Self {
        Self {
            deep: true,
            ..Self::default()
        }
    }

    /// Sets the page size cap.
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    /// Sets the resume cursor. Empty strings are treated as no cursor.
    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor.filter(|c| !c.is_empty());
        self
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Files on this page, ascending by key.
    pub files: Vec<ObjectHeader>,
    /// Direct subdirectories (shallow listings only), ascending.
    pub dirs: Vec<String>,
    /// Cursor for the next page; `None` once enumeration is exhausted.
    pub cursor: Option<String>,
}

/// Payload for [`BlobStore::store`].
#[derive(Debug, Clone)]
pub struct StoreRequest {
    /// Object body.
    pub buffer: Bytes,
    /// Headers to persist with the object.
    pub headers: ObjectHeader,
}

/// Optional operations a store implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Server-side copy.
    pub copy: bool,
    /// Access control updates.
    pub set_acl: bool,
    /// One-time initialization (e.g. bucket creation).
    pub initialize: bool,
    /// Shard lookup for a directory.
    pub shards: bool,
}

/// A blob storage backend.
///
/// Stores expose a flat key namespace with `/` as a directory delimiter.
/// Listing is paged through an opaque cursor that only the producing store
/// interprets.
///
/// # Invariants
///
/// - Re-submitting the last returned cursor resumes at the next unvisited
///   position; a `None` cursor means enumeration is exhausted
/// - `fetch_info` and `fetch` fail with [`StorageError::NotFound`] for
///   missing keys
/// - Stores must be `Send + Sync`; the engine shares them across tasks
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Storage id this instance was registered under.
    fn id(&self) -> &str;

    /// Lists one page under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or the cursor is
    /// malformed.
    async fn list(&self, dir: &str, options: &ListOptions) -> StorageResult<ListPage>;

    /// Returns the metadata of `key` without its body.
    async fn fetch_info(&self, key: &str) -> StorageResult<ObjectHeader>;

    /// Returns the metadata and body of `key`.
    async fn fetch(&self, key: &str) -> StorageResult<(ObjectHeader, Bytes)>;

    /// Writes `request` under `key`, returning the stored metadata.
    async fn store(&self, key: &str, request: StoreRequest) -> StorageResult<ObjectHeader>;

    /// Deletes `key`.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Optional operations supported by this store.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Copies `src_key` to `dst_key` within this store.
    async fn copy(
        &self,
        _src_key: &str,
        _dst_key: &str,
        _headers: Option<ObjectHeader>,
    ) -> StorageResult<()> {
        Err(self.unsupported("copy"))
    }

    /// Applies a canned access control to `key`.
    async fn set_acl(&self, _key: &str, _acl: &str) -> StorageResult<()> {
        Err(self.unsupported("setACL"))
    }

    /// Performs one-time setup such as creating buckets.
    async fn initialize(&self) -> StorageResult<()> {
        Err(self.unsupported("initialize"))
    }

    /// Names the shard `dir` maps to.
    fn shard_for(&self, _dir: &str) -> StorageResult<String> {
        Err(self.unsupported("getShard"))
    }

    /// Builds the error returned for a missing capability.
    fn unsupported(&self, capability: &'static str) -> StorageError {
        StorageError::Unsupported {
            storage: self.id().to_string(),
            capability,
        }
    }
}
