//! Resumable listing cursors.
//!
//! Two grammars exist, one per traversal strategy:
//!
//! - [`TreeCursor`] drives an iterative pre-order walk of a directory tree:
//!   `+<listed>:<next>` descends into `next`, `-<exhausted>:<parent>` climbs
//!   back to `parent` and resumes after `exhausted`.
//! - [`FlatCursor`] addresses a sharded flat namespace:
//!   `<bucketIndex>:<nativeMarker>`.
//!
//! Walk over the directories `a`, `a/b`, `a/b/c` and `a/e`, rooted at the
//! store root:
//!
//! ```text
//! +:a
//! +a:a/b
//! +a/b:a/b/c
//! -a/b/c:a/b
//! -a/b:a
//! +a:a/e
//! -a/e:a
//! -a:
//! (end)
//! ```

use crate::error::{StorageError, StorageResult};
use crate::key;
use std::fmt;
use std::str::FromStr;

/// Position within a hierarchical traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeCursor {
    /// `listed` was just listed; `next` is its first child still to visit.
    Descend {
        /// Directory that produced the cursor.
        listed: String,
        /// Child directory to list next.
        next: String,
    },
    /// `exhausted` has no unvisited subdirectories; resume in `parent`.
    Ascend {
        /// Directory that was fully visited.
        exhausted: String,
        /// Its parent, listed next with `exhausted` as skip boundary.
        parent: String,
    },
}

/// What the next page request must list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPlan {
    /// Directory to list.
    pub dir: String,
    /// Children named `<=` this are skipped.
    pub skip_through: Option<String>,
    /// Whether files of `dir` are emitted.
    pub include_files: bool,
}

impl ListPlan {
    /// Plan for the first page: the traversal root with files.
    pub fn initial(root: &str) -> Self {
        Self {
            dir: root.to_string(),
            skip_through: None,
            include_files: true,
        }
    }
}

impl TreeCursor {
    /// Computes the cursor emitted after listing `dir`.
    ///
    /// `first_subdir` is the smallest remaining subdirectory of `dir`, if any.
    /// Returns `None` when the traversal rooted at `root` is complete.
    pub fn after_listing(root: &str, dir: &str, first_subdir: Option<&str>) -> Option<Self> {
        if let Some(child) = first_subdir {
            return Some(TreeCursor::Descend {
                listed: dir.to_string(),
                next: child.to_string(),
            });
        }
        if dir == root {
            return None;
        }
        let parent = key::parent(dir)?;
        Some(TreeCursor::Ascend {
            exhausted: dir.to_string(),
            parent: parent.to_string(),
        })
    }

    /// Translates the cursor into the page request that resumes it.
    pub fn plan(&self) -> ListPlan {
        match self {
            TreeCursor::Descend { next, .. } => ListPlan {
                dir: next.clone(),
                skip_through: None,
                include_files: true,
            },
            // files of the parent were emitted on the way down
            TreeCursor::Ascend { exhausted, parent } => ListPlan {
                dir: parent.clone(),
                skip_through: Some(key::basename(exhausted).to_string()),
                include_files: false,
            },
        }
    }

    /// Fails unless every directory named by the cursor lies under `root`.
    pub fn ensure_within(&self, root: &str) -> StorageResult<()> {
        let (a, b) = match self {
            TreeCursor::Descend { listed, next } => (listed, next),
            TreeCursor::Ascend { exhausted, parent } => (exhausted, parent),
        };
        if key::is_within(a, root) && key::is_within(b, root) {
            Ok(())
        } else {
            Err(StorageError::InvalidCursor(format!(
                "cursor {self} lies outside traversal root '{root}'"
            )))
        }
    }
}

impl fmt::Display for TreeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeCursor::Descend { listed, next } => write!(f, "+{listed}:{next}"),
            TreeCursor::Ascend { exhausted, parent } => write!(f, "-{exhausted}:{parent}"),
        }
    }
}

impl FromStr for TreeCursor {
    type Err = StorageError;

    /// Directory names may contain `:`, so the split point is the one where
    /// the two paths stand in the parent/child relation the sign demands.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidCursor(s.to_string());
        let mut chars = s.chars();
        let sign = chars.next().ok_or_else(invalid)?;
        let body = chars.as_str();
        if sign != '+' && sign != '-' {
            return Err(invalid());
        }

        for (idx, _) in body.match_indices(':') {
            let (left, right) = (&body[..idx], &body[idx + 1..]);
            if sign == '+' && key::parent(right) == Some(left) {
                return Ok(TreeCursor::Descend {
                    listed: left.to_string(),
                    next: right.to_string(),
                });
            }
            if sign == '-' && key::parent(left) == Some(right) {
                return Ok(TreeCursor::Ascend {
                    exhausted: left.to_string(),
                    parent: right.to_string(),
                });
            }
        }
        Err(invalid())
    }
}

/// Position within a sharded flat namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatCursor {
    /// Shard index, or `None` for an unsharded store.
    pub bucket: Option<u32>,
    /// Backend-native marker; empty starts the shard from the beginning.
    pub marker: String,
}

impl FlatCursor {
    /// Cursor positioned at the start of `bucket`.
    pub fn start_of(bucket: u32) -> Self {
        Self {
            bucket: Some(bucket),
            marker: String::new(),
        }
    }
}

impl fmt::Display for FlatCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bucket {
            Some(idx) => write!(f, "{idx}:{}", self.marker),
            None => write!(f, ":{}", self.marker),
        }
    }
}

impl FromStr for FlatCursor {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (idx, marker) = s.split_once(':').unwrap_or((s, ""));
        let bucket = if idx.is_empty() {
            None
        } else {
            Some(
                idx.parse::<u32>()
                    .map_err(|_| StorageError::InvalidCursor(s.to_string()))?,
            )
        };
        Ok(Self {
            bucket,
            marker: marker.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_cursor_round_trip() {
        let cursors = [
            "+:a",
            "+a:a/b",
            "-a/b/c:a/b",
            "-a:",
            "+a:b:a:b/c",
            "-x/y:z/w:x/y:z",
        ];
        for s in cursors {
            let cursor: TreeCursor = s.parse().unwrap();
            assert_eq!(cursor.to_string(), s);
        }
    }

    #[test]
    fn tree_cursor_colon_in_names() {
        let cursor: TreeCursor = "+a:b:a:b/c".parse().unwrap();
        assert_eq!(
            cursor,
            TreeCursor::Descend {
                listed: "a:b".into(),
                next: "a:b/c".into()
            }
        );
    }

    #[test]
    fn tree_cursor_rejects_garbage() {
        assert!("".parse::<TreeCursor>().is_err());
        assert!("a:b".parse::<TreeCursor>().is_err());
        assert!("+a:b".parse::<TreeCursor>().is_err());
        assert!("-a/b:c".parse::<TreeCursor>().is_err());
    }

    #[test]
    fn transitions() {
        assert_eq!(
            TreeCursor::after_listing("", "", Some("a")),
            Some(TreeCursor::Descend {
                listed: "".into(),
                next: "a".into()
            })
        );
        assert_eq!(
            TreeCursor::after_listing("", "a/b", None),
            Some(TreeCursor::Ascend {
                exhausted: "a/b".into(),
                parent: "a".into()
            })
        );
        assert_eq!(TreeCursor::after_listing("", "", None), None);
        assert_eq!(TreeCursor::after_listing("a", "a", None), None);
    }

    #[test]
    fn ascend_plan_skips_and_suppresses_files() {
        let plan = TreeCursor::Ascend {
            exhausted: "a/b".into(),
            parent: "a".into(),
        }
        .plan();
        assert_eq!(plan.dir, "a");
        assert_eq!(plan.skip_through.as_deref(), Some("b"));
        assert!(!plan.include_files);
    }

    #[test]
    fn cursor_outside_root() {
        let cursor: TreeCursor = "+b:b/c".parse().unwrap();
        assert!(cursor.ensure_within("a").is_err());
        assert!(cursor.ensure_within("b").is_ok());
        assert!(cursor.ensure_within("").is_ok());
    }

    #[test]
    fn flat_cursor_grammar() {
        let c: FlatCursor = "3:photos/a.jpg".parse().unwrap();
        assert_eq!(c.bucket, Some(3));
        assert_eq!(c.marker, "photos/a.jpg");

        let c: FlatCursor = ":x:y".parse().unwrap();
        assert_eq!(c.bucket, None);
        assert_eq!(c.marker, "x:y");
        assert_eq!(c.to_string(), ":x:y");

        assert_eq!(FlatCursor::start_of(4).to_string(), "4:");
        assert!("q:".parse::<FlatCursor>().is_err());
    }
}
