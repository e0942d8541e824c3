//! Helpers for `/`-delimited object keys.
//!
//! Keys and directory paths are store-relative. The empty string names the
//! store root.

use crate::error::{StorageError, StorageResult};

/// Joins a directory and a child name.
pub fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Returns the parent directory of `path`, or `None` for the root itself.
pub fn parent(path: &str) -> Option<&str> {
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return None;
    }
    Some(path.rfind('/').map_or("", |idx| &path[..idx]))
}

/// Returns the last segment of `path`.
pub fn basename(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    path.rfind('/').map_or(path, |idx| &path[idx + 1..])
}

/// Normalizes a directory argument: strips `.`, leading and trailing `/`.
pub fn normalize_dir(dir: &str) -> String {
    let trimmed = dir.trim_matches('/');
    if trimmed == "." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Returns true if `path` equals `dir` or lies beneath it.
pub fn is_within(path: &str, dir: &str) -> bool {
    dir.is_empty() || path == dir || (path.starts_with(dir) && path[dir.len()..].starts_with('/'))
}

/// Rejects keys that are empty, absolute or contain `..`/`.` segments.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must be non-empty".into()));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!("key must be relative: {key}")));
    }
    if key.split('/').any(|seg| seg == ".." || seg == "." || seg.is_empty()) {
        return Err(StorageError::InvalidKey(format!("invalid path segment in {key}")));
    }
    Ok(())
}
