//! Filesystem-backed blob store with hierarchical cursor traversal.

use crate::backend::{BlobStore, Capabilities, ListOptions, ListPage, StoreRequest};
use crate::cursor::{ListPlan, TreeCursor};
use crate::error::{StorageError, StorageResult};
use crate::header::{content_digest, ObjectHeader};
use crate::key;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

/// A blob store rooted at a local directory.
///
/// Keys map to files below the root. Deep listings walk the tree one
/// directory per page using [`TreeCursor`], so only the current directory's
/// entries are ever held in memory.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> blobsync_storage::StorageResult<()> {
/// use blobsync_storage::{BlobStore, FsStore, ListOptions};
///
/// let store = FsStore::new("local", "/srv/blobs");
/// let mut options = ListOptions::deep();
/// loop {
///     let page = store.list("", &options).await?;
///     for file in &page.files {
///         println!("{}", file.key);
///     }
///     match page.cursor {
///         Some(cursor) => options.cursor = Some(cursor),
///         None => break,
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FsStore {
    id: String,
    root: PathBuf,
}

impl FsStore {
    /// Creates a store with the given id rooted at `root`.
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        key::validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn resolve_dir(&self, dir: &str) -> StorageResult<PathBuf> {
        if dir.is_empty() {
            Ok(self.root.clone())
        } else {
            self.resolve(dir)
        }
    }

    /// Reads the direct children of `plan.dir`, both lists sorted by key.
    async fn read_children(
        &self,
        plan: &ListPlan,
    ) -> StorageResult<(Vec<ObjectHeader>, Vec<String>)> {
        let abs = self.resolve_dir(&plan.dir)?;
        let mut entries = tokio::fs::read_dir(&abs).await?;
        let mut files = Vec::new();
        let mut dirs = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                warn!(dir = %abs.display(), "skipping entry with non UTF-8 name");
                continue;
            };
            // required to avoid emitting the same subtree twice
            if let Some(skip) = &plan.skip_through {
                if name.as_str() <= skip.as_str() {
                    continue;
                }
            }

            let child_key = key::join(&plan.dir, &name);
            let meta = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                // removed between readdir and stat
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            if meta.is_dir() {
                dirs.push(child_key);
            } else if meta.is_file() && plan.include_files {
                files.push(header_from_metadata(child_key, &meta));
            }
        }

        files.sort_by(|a, b| a.key.cmp(&b.key));
        dirs.sort();
        Ok((files, dirs))
    }

    async fn deep_page(&self, root: &str, cursor: Option<&str>) -> StorageResult<ListPage> {
        let plan = match cursor {
            None => ListPlan::initial(root),
            Some(raw) => {
                let cursor: TreeCursor = raw.parse()?;
                cursor.ensure_within(root)?;
                cursor.plan()
            }
        };

        let (files, dirs) = match self.read_children(&plan).await {
            Ok(children) => children,
            // a directory vanished mid-traversal; skip it and keep climbing
            Err(StorageError::Io(e)) if cursor.is_some() && e.kind() == io::ErrorKind::NotFound => {
                warn!(store = %self.id, dir = %plan.dir, "directory disappeared during traversal");
                (Vec::new(), Vec::new())
            }
            Err(e) => return Err(e),
        };

        let next = TreeCursor::after_listing(root, &plan.dir, dirs.first().map(String::as_str));
        Ok(ListPage {
            files,
            dirs: Vec::new(),
            cursor: next.map(|c| c.to_string()),
        })
    }
}

fn header_from_metadata(key: String, meta: &std::fs::Metadata) -> ObjectHeader {
    ObjectHeader {
        key,
        size: Some(meta.len()),
        last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
        ..ObjectHeader::default()
    }
}

fn map_not_found(key: &str) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::not_found(key)
        } else {
            StorageError::Io(e)
        }
    }
}

async fn apply_mtime(path: &Path, last_modified: Option<DateTime<Utc>>) -> StorageResult<()> {
    let Some(mtime) = last_modified else {
        return Ok(());
    };
    let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    let file = file.into_std().await;
    file.set_modified(SystemTime::from(mtime))?;
    Ok(())
}

async fn ensure_parent(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FsStore {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list(&self, dir: &str, options: &ListOptions) -> StorageResult<ListPage> {
        let root = key::normalize_dir(dir);
        if !root.is_empty() {
            key::validate_key(&root)?;
        }

        if options.deep {
            return self.deep_page(&root, options.cursor.as_deref()).await;
        }

        let (files, dirs) = self.read_children(&ListPlan::initial(&root)).await?;
        Ok(ListPage {
            files,
            dirs,
            cursor: None,
        })
    }

    async fn fetch_info(&self, key: &str) -> StorageResult<ObjectHeader> {
        let path = self.resolve(key)?;
        let meta = tokio::fs::metadata(&path).await.map_err(map_not_found(key))?;
        if !meta.is_file() {
            return Err(StorageError::NotAFile { key: key.into() });
        }
        Ok(header_from_metadata(key.to_string(), &meta))
    }

    async fn fetch(&self, key: &str) -> StorageResult<(ObjectHeader, Bytes)> {
        let path = self.resolve(key)?;
        let data = tokio::fs::read(&path).await.map_err(map_not_found(key))?;
        let meta = tokio::fs::metadata(&path).await.map_err(map_not_found(key))?;

        let mut header = header_from_metadata(key.to_string(), &meta);
        header.etag = Some(content_digest(&data));
        Ok((header, Bytes::from(data)))
    }

    async fn store(&self, key: &str, request: StoreRequest) -> StorageResult<ObjectHeader> {
        let path = self.resolve(key)?;
        ensure_parent(&path).await?;
        tokio::fs::write(&path, &request.buffer).await?;
        apply_mtime(&path, request.headers.last_modified).await?;

        let meta = tokio::fs::metadata(&path).await?;
        let mut header = header_from_metadata(key.to_string(), &meta);
        header.etag = Some(content_digest(&request.buffer));
        header.content_type = request.headers.content_type;
        Ok(header)
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.resolve(key)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(map_not_found(key))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            copy: true,
            initialize: true,
            ..Capabilities::default()
        }
    }

    async fn copy(
        &self,
        src_key: &str,
        dst_key: &str,
        headers: Option<ObjectHeader>,
    ) -> StorageResult<()> {
        let src = self.resolve(src_key)?;
        let dst = self.resolve(dst_key)?;
        ensure_parent(&dst).await?;
        tokio::fs::copy(&src, &dst)
            .await
            .map_err(map_not_found(src_key))?;
        apply_mtime(&dst, headers.and_then(|h| h.last_modified)).await
    }

    async fn initialize(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}
