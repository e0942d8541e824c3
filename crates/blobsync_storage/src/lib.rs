//! # blobsync storage
//!
//! Blob store abstraction and drivers for blobsync.
//!
//! Stores expose a flat key namespace where `/` delimits directories. The
//! engine only ever talks to [`BlobStore`]; it never interprets a cursor.
//!
//! ## Traversal strategies
//!
//! - Hierarchical stores ([`FsStore`]) walk their tree iteratively. Each
//!   page is one directory and the cursor ([`TreeCursor`]) records where the
//!   walk stands, so a stopped walk resumes without revisiting files.
//! - Flat stores ([`ShardedStore`]) page through each shard bucket in turn
//!   with the backend's native marker ([`FlatCursor`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use blobsync_storage::{BlobStore, FsStore, ListOptions};
//!
//! # async fn walk() -> blobsync_storage::StorageResult<()> {
//! let store = FsStore::new("local", "/srv/blobs");
//! let mut cursor = None;
//! loop {
//!     let page = store.list("", &ListOptions::deep().with_cursor(cursor)).await?;
//!     for file in &page.files {
//!         println!("{}", file.key);
//!     }
//!     match page.cursor {
//!         Some(next) => cursor = Some(next),
//!         None => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod cursor;
mod error;
mod fs;
mod header;
pub mod key;
mod memory;
mod registry;
mod sharded;

pub use backend::{BlobStore, Capabilities, ListOptions, ListPage, StoreRequest};
pub use cursor::{FlatCursor, ListPlan, TreeCursor};
pub use error::{StorageError, StorageResult};
pub use fs::FsStore;
pub use header::{content_digest, ObjectHeader};
pub use memory::{BucketClient, ListObjectsRequest, ListObjectsResponse, MemoryBuckets};
pub use registry::{DriverConfig, StorageConfig, StoreRegistry};
pub use sharded::{ShardRange, ShardedStore, DEFAULT_MAX_KEYS};
