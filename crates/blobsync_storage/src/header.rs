//! Object metadata shared by every backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata describing a single stored object.
///
/// `etag` and `last_modified` are supplied by the backend and may be absent.
/// `size` is authoritative when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectHeader {
    /// Store-relative key, `/` delimited.
    pub key: String,
    /// Entity tag (usually a content digest).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Object size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// MIME content type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Additional backend headers carried along on copy.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_headers: BTreeMap<String, String>,
    /// Canned access control (e.g. `public-read`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_control: Option<String>,
}

impl ObjectHeader {
    /// Creates a header carrying only a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Sets the size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the ETag.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Sets the last modification time.
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Sets the access control.
    pub fn with_access_control(mut self, acl: impl Into<String>) -> Self {
        self.access_control = Some(acl.into());
        self
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Hex MD5 digest of `data`, the canonical content hash used for ETags.
pub fn content_digest(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}
