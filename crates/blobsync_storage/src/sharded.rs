//! Flat object store spread over a range of buckets.
//!
//! Every object lands in the bucket its directory hashes to. Listing walks
//! the buckets in index order and pages inside each one with the native
//! marker, so the cursor is `<bucketIndex>:<nativeMarker>`.

use crate::backend::{BlobStore, Capabilities, ListOptions, ListPage, StoreRequest};
use crate::cursor::FlatCursor;
use crate::error::{StorageError, StorageResult};
use crate::header::ObjectHeader;
use crate::key;
use crate::memory::{BucketClient, ListObjectsRequest};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// Page size used when the caller does not cap it.
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// Inclusive range of shard indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRange {
    /// First bucket index.
    pub start: u32,
    /// Last bucket index.
    pub end: u32,
}

impl ShardRange {
    /// Number of buckets in the range.
    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    /// Always false; a range holds at least one bucket.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Maps a directory prefix onto a bucket index.
    ///
    /// The first four bytes of the MD5 of the prefix, read little-endian,
    /// select the bucket. The mapping only depends on the prefix and the
    /// range, so it is stable across processes.
    pub fn index_for(&self, dir_prefix: &str) -> u32 {
        let digest = md5::compute(dir_prefix.as_bytes());
        let word = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        let offset = u64::from(word) % self.len();
        // offset <= end - start, so it fits
        self.start + offset as u32
    }
}

/// A [`BlobStore`] over a [`BucketClient`], optionally sharded.
///
/// # Example
///
/// ```ignore
/// let store = ShardedStore::new("s3", MemoryBuckets::new(), "media-")
///     .with_shards(0, 15)?;
/// store.initialize().await?;
/// ```
pub struct ShardedStore<C> {
    id: String,
    client: C,
    bucket_prefix: String,
    shards: Option<ShardRange>,
}

impl<C: BucketClient> ShardedStore<C> {
    /// Creates an unsharded store using a single bucket named `bucket_prefix`.
    pub fn new(id: impl Into<String>, client: C, bucket_prefix: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client,
            bucket_prefix: bucket_prefix.into(),
            shards: None,
        }
    }

    /// Spreads objects over buckets `start..=end`.
    ///
    /// A single-bucket range keeps the store unsharded.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if `end < start`.
    pub fn with_shards(mut self, start: u32, end: u32) -> StorageResult<Self> {
        if end < start {
            return Err(StorageError::Config(format!(
                "bucket range {start}..{end} is empty"
            )));
        }
        self.shards = (end > start).then_some(ShardRange { start, end });
        Ok(self)
    }

    /// The underlying bucket client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The shard range, if sharded.
    pub fn shards(&self) -> Option<ShardRange> {
        self.shards
    }

    /// Name of the bucket at `index`; `None` names the unsharded bucket.
    pub fn bucket_name(&self, index: Option<u32>) -> String {
        match index {
            Some(idx) => format!("{}{idx}", self.bucket_prefix),
            None => self.bucket_prefix.clone(),
        }
    }

    fn dir_prefix(dir: &str) -> String {
        let dir = key::normalize_dir(dir);
        if dir.is_empty() {
            dir
        } else {
            format!("{dir}/")
        }
    }

    fn bucket_for_dir(&self, dir: &str) -> String {
        let index = self
            .shards
            .map(|range| range.index_for(&Self::dir_prefix(dir)));
        self.bucket_name(index)
    }

    fn bucket_for_key(&self, key: &str) -> StorageResult<String> {
        key::validate_key(key)?;
        Ok(self.bucket_for_dir(key::parent(key).unwrap_or("")))
    }

    fn parse_cursor(&self, raw: Option<&str>) -> StorageResult<FlatCursor> {
        let Some(raw) = raw else {
            return Ok(FlatCursor {
                bucket: self.shards.map(|range| range.start),
                marker: String::new(),
            });
        };
        let cursor: FlatCursor = raw.parse()?;
        match (self.shards, cursor.bucket) {
            (None, None) => Ok(cursor),
            (Some(range), Some(idx)) if (range.start..=range.end).contains(&idx) => Ok(cursor),
            _ => Err(StorageError::InvalidCursor(format!(
                "{raw} does not address a bucket of {}",
                self.id
            ))),
        }
    }
}

#[async_trait]
impl<C: BucketClient> BlobStore for ShardedStore<C> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list(&self, dir: &str, options: &ListOptions) -> StorageResult<ListPage> {
        let cursor = self.parse_cursor(options.cursor.as_deref())?;
        let bucket = self.bucket_name(cursor.bucket);
        let request = ListObjectsRequest {
            prefix: Self::dir_prefix(dir),
            delimiter: (!options.deep).then_some('/'),
            marker: (!cursor.marker.is_empty()).then(|| cursor.marker.clone()),
            max_keys: options.max_keys.unwrap_or(DEFAULT_MAX_KEYS),
        };

        let response = self.client.list_objects(&bucket, &request).await?;
        debug!(
            store = %self.id,
            bucket = %bucket,
            files = response.contents.len(),
            truncated = response.is_truncated,
            "listed bucket page"
        );

        let next = if response.is_truncated {
            let marker = response
                .next_marker
                .clone()
                .or_else(|| response.contents.last().map(|h| h.key.clone()))
                .or_else(|| response.common_prefixes.last().cloned())
                .ok_or_else(|| {
                    StorageError::Backend(format!("truncated listing of {bucket} without marker"))
                })?;
            Some(FlatCursor {
                bucket: cursor.bucket,
                marker,
            })
        } else {
            match (self.shards, cursor.bucket) {
                (Some(range), Some(idx)) if idx < range.end => Some(FlatCursor::start_of(idx + 1)),
                _ => None,
            }
        };

        Ok(ListPage {
            files: response.contents,
            dirs: response
                .common_prefixes
                .into_iter()
                .map(|p| p.trim_end_matches('/').to_string())
                .collect(),
            cursor: next.map(|c| c.to_string()),
        })
    }

    async fn fetch_info(&self, key: &str) -> StorageResult<ObjectHeader> {
        let bucket = self.bucket_for_key(key)?;
        self.client.head_object(&bucket, key).await
    }

    async fn fetch(&self, key: &str) -> StorageResult<(ObjectHeader, Bytes)> {
        let bucket = self.bucket_for_key(key)?;
        self.client.get_object(&bucket, key).await
    }

    async fn store(&self, key: &str, request: StoreRequest) -> StorageResult<ObjectHeader> {
        let bucket = self.bucket_for_key(key)?;
        self.client
            .put_object(&bucket, key, request.buffer, request.headers)
            .await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let bucket = self.bucket_for_key(key)?;
        self.client.delete_object(&bucket, key).await
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            copy: true,
            set_acl: true,
            initialize: true,
            shards: true,
        }
    }

    async fn copy(
        &self,
        src_key: &str,
        dst_key: &str,
        headers: Option<ObjectHeader>,
    ) -> StorageResult<()> {
        let src_bucket = self.bucket_for_key(src_key)?;
        let dst_bucket = self.bucket_for_key(dst_key)?;
        self.client
            .copy_object(&src_bucket, src_key, &dst_bucket, dst_key, headers)
            .await
    }

    async fn set_acl(&self, key: &str, acl: &str) -> StorageResult<()> {
        let bucket = self.bucket_for_key(key)?;
        self.client.put_object_acl(&bucket, key, acl).await
    }

    async fn initialize(&self) -> StorageResult<()> {
        match self.shards {
            Some(range) => {
                for idx in range.start..=range.end {
                    self.client.create_bucket(&self.bucket_name(Some(idx))).await?;
                }
            }
            None => self.client.create_bucket(&self.bucket_prefix).await?,
        }
        Ok(())
    }

    fn shard_for(&self, dir: &str) -> StorageResult<String> {
        Ok(self.bucket_for_dir(dir))
    }
}
