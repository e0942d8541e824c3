//! Object equivalence strategies.
//!
//! Every strategy first looks the key up at the destination. A missing
//! destination is reported as [`Verdict::Missing`], not as an error.
//!
//! | Mode      | Decision                                                        |
//! |-----------|-----------------------------------------------------------------|
//! | `fast`    | match unless both sizes are known and differ                    |
//! | `headers` | ETag equality, else LastModified equality, else mismatch        |
//! | `deep`    | headers when they prove a match, else MD5 of both bodies        |
//! | `force`   | always a mismatch                                               |
//!
//! Differing known sizes are a mismatch in every mode, before any body is
//! fetched.

use crate::config::RetryConfig;
use crate::retry::with_retry;
use blobsync_storage::{content_digest, BlobStore, ObjectHeader, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Comparison strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Size only; intended for immutable, content-addressed stores.
    #[default]
    Fast,
    /// ETag or LastModified equality.
    Headers,
    /// Headers, falling back to a content digest.
    Deep,
    /// Always treat as different.
    Force,
}

impl CompareMode {
    /// All modes, in CLI order.
    pub const ALL: [CompareMode; 4] = [
        CompareMode::Fast,
        CompareMode::Headers,
        CompareMode::Deep,
        CompareMode::Force,
    ];

    /// The mode's CLI name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareMode::Fast => "fast",
            CompareMode::Headers => "headers",
            CompareMode::Deep => "deep",
            CompareMode::Force => "force",
        }
    }
}

impl fmt::Display for CompareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompareMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("compare mode {s} is not supported"))
    }
}

/// Outcome of comparing one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Both sides are equivalent.
    Match,
    /// Both sides exist but differ.
    Mismatch,
    /// The destination does not exist.
    Missing,
}

/// A comparison with the headers it was decided on.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// The decision.
    pub verdict: Verdict,
    /// Source headers, with a computed ETag after a deep digest.
    pub src: ObjectHeader,
    /// Destination headers, absent when missing.
    pub dst: Option<ObjectHeader>,
}

impl Comparison {
    /// Returns true for [`Verdict::Match`].
    pub fn is_match(&self) -> bool {
        self.verdict == Verdict::Match
    }
}

/// Returns true if both sizes are known and differ.
pub fn sizes_differ(src: &ObjectHeader, dst: &ObjectHeader) -> bool {
    matches!((src.size, dst.size), (Some(a), Some(b)) if a != b)
}

/// Fast decision: unknown sizes count as equal.
pub fn fast_match(src: &ObjectHeader, dst: &ObjectHeader) -> bool {
    !sizes_differ(src, dst)
}

/// Headers decision: unknown counts as different.
pub fn headers_match(src: &ObjectHeader, dst: &ObjectHeader) -> bool {
    if sizes_differ(src, dst) {
        return false;
    }
    if let (Some(a), Some(b)) = (&src.etag, &dst.etag) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (src.last_modified, dst.last_modified) {
        return a == b;
    }
    false
}

/// Deep pre-check without bodies: `Some` when headers settle the question.
///
/// Only a positive header match or a size difference is conclusive. ETags
/// are not always content digests, so differing ETags still fall through to
/// a body comparison.
pub fn deep_precheck(src: &ObjectHeader, dst: &ObjectHeader) -> Option<bool> {
    if sizes_differ(src, dst) {
        return Some(false);
    }
    let etag_match = matches!((&src.etag, &dst.etag), (Some(a), Some(b)) if a == b);
    let modified_match =
        matches!((src.last_modified, dst.last_modified), (Some(a), Some(b)) if a == b);
    (etag_match || modified_match).then_some(true)
}

/// Compares `src` against the same key in `dst_store`.
///
/// # Errors
///
/// Returns the storage error of the destination lookup (other than
/// not-found) or of a deep body fetch after retries.
pub async fn compare(
    mode: CompareMode,
    retry: &RetryConfig,
    src_store: &dyn BlobStore,
    dst_store: &dyn BlobStore,
    mut src: ObjectHeader,
) -> StorageResult<Comparison> {
    let key = src.key.clone();
    let mut dst = match with_retry(retry, "fetch_info", || dst_store.fetch_info(&key)).await {
        Ok(dst) => dst,
        Err(e) if e.is_not_found() => {
            debug!(key = %key, "missing at destination");
            return Ok(Comparison {
                verdict: Verdict::Missing,
                src,
                dst: None,
            });
        }
        Err(e) => return Err(e),
    };

    let equal = match mode {
        CompareMode::Fast => fast_match(&src, &dst),
        CompareMode::Headers => headers_match(&src, &dst),
        CompareMode::Force => false,
        CompareMode::Deep => match deep_precheck(&src, &dst) {
            Some(decided) => decided,
            None => {
                let (src_digest, dst_digest) =
                    digest_both(retry, src_store, dst_store, &key).await?;
                let equal = src_digest == dst_digest;
                src.etag = Some(src_digest);
                dst.etag = Some(dst_digest);
                equal
            }
        },
    };

    debug!(key = %key, mode = %mode, equal, "compared");
    Ok(Comparison {
        verdict: if equal { Verdict::Match } else { Verdict::Mismatch },
        src,
        dst: Some(dst),
    })
}

async fn digest_both(
    retry: &RetryConfig,
    src_store: &dyn BlobStore,
    dst_store: &dyn BlobStore,
    key: &str,
) -> Result<(String, String), StorageError> {
    let (src, dst) = futures::try_join!(
        with_retry(retry, "fetch", || src_store.fetch(key)),
        with_retry(retry, "fetch", || dst_store.fetch(key)),
    )?;
    Ok((content_digest(&src.1), content_digest(&dst.1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn header(size: Option<u64>) -> ObjectHeader {
        let mut h = ObjectHeader::new("k");
        h.size = size;
        h
    }

    #[test]
    fn fast_mode() {
        assert!(fast_match(&header(Some(10)), &header(Some(10))));
        assert!(!fast_match(&header(Some(10)), &header(Some(9))));
        assert!(fast_match(&header(None), &header(None)));
        assert!(fast_match(&header(Some(10)), &header(None)));
    }

    #[test]
    fn headers_mode() {
        let a = header(None).with_etag("x");
        let b = header(None).with_etag("x");
        let c = header(None).with_etag("y");
        assert!(headers_match(&a, &b));
        assert!(!headers_match(&a, &c));
        assert!(!headers_match(&header(None), &header(None)));

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let m1 = header(None).with_last_modified(at);
        let m2 = header(None).with_last_modified(at);
        assert!(headers_match(&m1, &m2));

        // equal ETags lose to differing sizes
        let s1 = header(Some(1)).with_etag("x");
        let s2 = header(Some(2)).with_etag("x");
        assert!(!headers_match(&s1, &s2));
    }

    #[test]
    fn deep_precheck_rules() {
        assert_eq!(deep_precheck(&header(Some(1)), &header(Some(2))), Some(false));
        let a = header(None).with_etag("x");
        assert_eq!(deep_precheck(&a, &a.clone()), Some(true));
        assert_eq!(deep_precheck(&a, &header(None).with_etag("y")), None);
        assert_eq!(deep_precheck(&header(None), &header(None)), None);
    }

    #[test]
    fn mode_names() {
        for mode in CompareMode::ALL {
            assert_eq!(mode.to_string().parse::<CompareMode>().unwrap(), mode);
        }
        assert!("quick".parse::<CompareMode>().is_err());
        assert_eq!(CompareMode::default(), CompareMode::Fast);
    }
}
