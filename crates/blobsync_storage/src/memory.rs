//! Native bucket API and an in-memory implementation.
//!
//! [`BucketClient`] is the S3-shaped surface a flat object store exposes.
//! [`MemoryBuckets`] implements it with ordered maps so listings are
//! deterministic.

use crate::error::{StorageError, StorageResult};
use crate::header::{content_digest, ObjectHeader};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A native list-objects request against one bucket.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsRequest {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// Roll keys up to common prefixes at this delimiter.
    pub delimiter: Option<char>,
    /// Return keys strictly after this marker.
    pub marker: Option<String>,
    /// Maximum keys plus common prefixes per response.
    pub max_keys: usize,
}

/// A native list-objects response.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsResponse {
    /// Matching objects.
    pub contents: Vec<ObjectHeader>,
    /// Rolled-up prefixes, each ending with the delimiter.
    pub common_prefixes: Vec<String>,
    /// More results are available.
    pub is_truncated: bool,
    /// Marker to pass for the next request when truncated.
    pub next_marker: Option<String>,
}

/// Bucket-level operations of a flat object store.
#[async_trait]
pub trait BucketClient: Send + Sync {
    /// Creates `bucket` if it does not exist.
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Lists one page of `bucket`.
    async fn list_objects(
        &self,
        bucket: &str,
        request: &ListObjectsRequest,
    ) -> StorageResult<ListObjectsResponse>;

    /// Returns object metadata.
    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHeader>;

    /// Returns object metadata and body.
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<(ObjectHeader, Bytes)>;

    /// Writes an object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        headers: ObjectHeader,
    ) -> StorageResult<ObjectHeader>;

    /// Deletes an object.
    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Replaces the canned ACL of an object.
    async fn put_object_acl(&self, bucket: &str, key: &str, acl: &str) -> StorageResult<()>;

    /// Server-side copy between buckets.
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        headers: Option<ObjectHeader>,
    ) -> StorageResult<()> {
        let (mut header, body) = self.get_object(src_bucket, src_key).await?;
        if let Some(overrides) = headers {
            header = overrides;
        }
        header.key = dst_key.to_string();
        self.put_object(dst_bucket, dst_key, body, header).await?;
        Ok(())
    }
}

type Bucket = BTreeMap<String, (ObjectHeader, Bytes)>;

/// In-memory buckets for tests and dry runs.
///
/// # Thread Safety
///
/// All buckets share one lock; this client is cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryBuckets {
    buckets: RwLock<BTreeMap<String, Bucket>>,
}

impl MemoryBuckets {
    /// Creates an empty client with no buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all buckets.
    pub fn bucket_names(&self) -> Vec<String> {
        self.buckets.read().keys().cloned().collect()
    }

    /// Keys stored in `bucket`, ascending.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn no_bucket(bucket: &str) -> StorageError {
        StorageError::Backend(format!("NoSuchBucket: {bucket}"))
    }
}

#[async_trait]
impl BucketClient for MemoryBuckets {
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.buckets.write().entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        request: &ListObjectsRequest,
    ) -> StorageResult<ListObjectsResponse> {
        let buckets = self.buckets.read();
        let objects = buckets.get(bucket).ok_or_else(|| Self::no_bucket(bucket))?;
        let max_keys = request.max_keys.max(1);
        let marker = request.marker.as_deref().unwrap_or("");
        // a marker naming a rolled-up prefix skips that whole group
        let marker_is_prefix = request
            .delimiter
            .is_some_and(|d| !marker.is_empty() && marker.ends_with(d));

        let mut response = ListObjectsResponse::default();
        let mut last_entry: Option<String> = None;
        let mut count = 0usize;

        for (key, (header, _)) in objects.range(request.prefix.clone()..) {
            if !key.starts_with(&request.prefix) {
                break;
            }
            if key.as_str() <= marker || (marker_is_prefix && key.starts_with(marker)) {
                continue;
            }

            let rolled = request.delimiter.and_then(|d| {
                let rest = &key[request.prefix.len()..];
                rest.find(d)
                    .map(|idx| key[..request.prefix.len() + idx + d.len_utf8()].to_string())
            });
            if let (Some(prefix), Some(last)) = (&rolled, &last_entry) {
                if prefix == last {
                    continue;
                }
            }

            if count == max_keys {
                response.is_truncated = true;
                response.next_marker = last_entry.clone();
                break;
            }
            count += 1;

            match rolled {
                Some(prefix) => {
                    response.common_prefixes.push(prefix.clone());
                    last_entry = Some(prefix);
                }
                None => {
                    response.contents.push(header.clone());
                    last_entry = Some(key.clone());
                }
            }
        }

        Ok(response)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHeader> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|(header, _)| header.clone())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<(ObjectHeader, Bytes)> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        headers: ObjectHeader,
    ) -> StorageResult<ObjectHeader> {
        let header = ObjectHeader {
            key: key.to_string(),
            etag: Some(content_digest(&body)),
            size: Some(body.len() as u64),
            last_modified: headers.last_modified.or_else(|| Some(Utc::now())),
            ..headers
        };

        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::no_bucket(bucket))?;
        objects.insert(key.to_string(), (header.clone(), body));
        Ok(header)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::no_bucket(bucket))?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn put_object_acl(&self, bucket: &str, key: &str, acl: &str) -> StorageResult<()> {
        let mut buckets = self.buckets.write();
        let (header, _) = buckets
            .get_mut(bucket)
            .and_then(|b| b.get_mut(key))
            .ok_or_else(|| StorageError::not_found(key))?;
        header.access_control = Some(acl.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn client_with(keys: &[&str]) -> MemoryBuckets {
        let client = MemoryBuckets::new();
        client.create_bucket("b").await.unwrap();
        for key in keys {
            client
                .put_object("b", key, Bytes::from_static(b"x"), ObjectHeader::new(*key))
                .await
                .unwrap();
        }
        client
    }

    fn request(
        prefix: &str,
        delimiter: Option<char>,
        marker: Option<&str>,
        max_keys: usize,
    ) -> ListObjectsRequest {
        ListObjectsRequest {
            prefix: prefix.into(),
            delimiter,
            marker: marker.map(String::from),
            max_keys,
        }
    }

    #[tokio::test]
    async fn list_with_delimiter_rolls_up_prefixes() {
        let client = client_with(&["a.txt", "d/1", "d/2", "e/f/3", "z.txt"]).await;

        let res = client
            .list_objects("b", &request("", Some('/'), None, 100))
            .await
            .unwrap();
        let keys: Vec<_> = res.contents.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, ["a.txt", "z.txt"]);
        assert_eq!(res.common_prefixes, ["d/", "e/"]);
        assert!(!res.is_truncated);
    }

    #[tokio::test]
    async fn truncation_and_marker() {
        let client = client_with(&["a", "b", "c"]).await;

        let first = client
            .list_objects("b", &request("", None, None, 2))
            .await
            .unwrap();
        assert!(first.is_truncated);
        assert_eq!(first.next_marker.as_deref(), Some("b"));

        let second = client
            .list_objects("b", &request("", None, Some("b"), 2))
            .await
            .unwrap();
        assert_eq!(second.contents.len(), 1);
        assert_eq!(second.contents[0].key, "c");
        assert!(!second.is_truncated);
    }

    #[tokio::test]
    async fn prefix_marker_skips_group() {
        let client = client_with(&["d/1", "d/2", "e"]).await;
        let res = client
            .list_objects("b", &request("", Some('/'), Some("d/"), 10))
            .await
            .unwrap();
        assert!(res.common_prefixes.is_empty());
        assert_eq!(res.contents[0].key, "e");
    }

    #[tokio::test]
    async fn put_sets_digest_and_acl() {
        let client = client_with(&[]).await;
        let header = client
            .put_object("b", "k", Bytes::from_static(b"hello"), ObjectHeader::new("k"))
            .await
            .unwrap();
        assert_eq!(header.etag.as_deref(), Some("5d41402abc4b2a76b9719d911017c592"));
        assert_eq!(header.size, Some(5));

        client.put_object_acl("b", "k", "private").await.unwrap();
        let head = client.head_object("b", "k").await.unwrap();
        assert_eq!(head.access_control.as_deref(), Some("private"));
    }

    #[tokio::test]
    async fn missing_bucket_and_key() {
        let client = MemoryBuckets::new();
        assert!(client
            .list_objects("nope", &ListObjectsRequest::default())
            .await
            .is_err());
        client.create_bucket("b").await.unwrap();
        assert!(client.head_object("b", "k").await.unwrap_err().is_not_found());
        assert!(client.delete_object("b", "k").await.unwrap_err().is_not_found());
    }
}
