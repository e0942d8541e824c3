//! # blobsync testkit
//!
//! Test utilities for blobsync.
//!
//! This crate provides:
//! - Temporary directory trees and seeded stores
//! - Listing helpers that drain a cursor to exhaustion
//! - Property-based generators for key trees using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blobsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn walk_everything() {
//!     let tree = TempTree::with_files(&[("a/1", b"x".as_slice())]);
//!     let listing = drain_listing(&tree.store("local"), "", 100).await;
//!     assert_eq!(listing.keys, ["a/1"]);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
