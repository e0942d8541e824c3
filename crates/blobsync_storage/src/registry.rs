//! Storage configuration and the id-to-store registry.

use crate::backend::BlobStore;
use crate::error::{StorageError, StorageResult};
use crate::fs::FsStore;
use crate::memory::MemoryBuckets;
use crate::sharded::ShardedStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Driver selection and its parameters for one storage id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum DriverConfig {
    /// Local directory tree.
    Fs {
        /// Root directory.
        path: PathBuf,
    },
    /// In-process buckets, optionally sharded.
    Memory {
        /// Bucket name, or name prefix when sharded.
        #[serde(rename = "bucketPrefix", default)]
        bucket_prefix: String,
        /// First shard index.
        #[serde(rename = "bucketStart", default)]
        bucket_start: Option<u32>,
        /// Last shard index.
        #[serde(rename = "bucketEnd", default)]
        bucket_end: Option<u32>,
    },
}

/// A named set of storage definitions.
///
/// Deserializes from `{"storage": {"<id>": {"driver": ..., ...}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Driver configuration per storage id.
    #[serde(default)]
    pub storage: BTreeMap<String, DriverConfig>,
}

impl StorageConfig {
    /// Parses a configuration document.
    pub fn from_json_str(s: &str) -> StorageResult<Self> {
        serde_json::from_str(s).map_err(|e| StorageError::Config(e.to_string()))
    }

    /// Adds a storage definition.
    pub fn with_storage(mut self, id: impl Into<String>, driver: DriverConfig) -> Self {
        self.storage.insert(id.into(), driver);
        self
    }
}

/// Instantiated stores of one configuration, addressed by storage id.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: BTreeMap<String, Arc<dyn BlobStore>>,
}

impl StoreRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every store named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if a driver is misconfigured.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let mut registry = Self::new();
        for (id, driver) in &config.storage {
            let store: Arc<dyn BlobStore> = match driver {
                DriverConfig::Fs { path } => Arc::new(FsStore::new(id.clone(), path.clone())),
                DriverConfig::Memory {
                    bucket_prefix,
                    bucket_start,
                    bucket_end,
                } => {
                    let store = ShardedStore::new(id.clone(), MemoryBuckets::new(), bucket_prefix.clone());
                    match (bucket_start, bucket_end) {
                        (None, None) => Arc::new(store),
                        (start, end) => {
                            let start = start.unwrap_or(0);
                            let end = end.unwrap_or(start);
                            Arc::new(store.with_shards(start, end)?)
                        }
                    }
                }
            };
            debug!(storage = %id, "registered store");
            registry.insert(store);
        }
        Ok(registry)
    }

    /// Registers `store` under its own id, replacing any previous entry.
    pub fn insert(&mut self, store: Arc<dyn BlobStore>) {
        self.stores.insert(store.id().to_string(), store);
    }

    /// Looks up a store.
    pub fn get(&self, id: &str) -> StorageResult<Arc<dyn BlobStore>> {
        self.stores
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::Config(format!("unknown storage id: {id}")))
    }

    /// Registered ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    /// Number of registered stores.
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.stores.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_document() {
        let config = StorageConfig::from_json_str(
            r#"{"storage": {
                "disk": {"driver": "fs", "path": "/srv/blobs"},
                "s3": {"driver": "memory", "bucketPrefix": "media-", "bucketStart": 0, "bucketEnd": 3}
            }}"#,
        )
        .unwrap();

        assert_eq!(
            config.storage["disk"],
            DriverConfig::Fs {
                path: "/srv/blobs".into()
            }
        );
        assert_eq!(
            config.storage["s3"],
            DriverConfig::Memory {
                bucket_prefix: "media-".into(),
                bucket_start: Some(0),
                bucket_end: Some(3)
            }
        );
    }

    #[test]
    fn unknown_driver_rejected() {
        let err = StorageConfig::from_json_str(r#"{"storage": {"x": {"driver": "ftp"}}}"#);
        assert!(matches!(err, Err(StorageError::Config(_))));
    }

    #[test]
    fn registry_builds_stores() {
        let config = StorageConfig::default()
            .with_storage("disk", DriverConfig::Fs { path: "/tmp/x".into() })
            .with_storage(
                "mem",
                DriverConfig::Memory {
                    bucket_prefix: "b".into(),
                    bucket_start: Some(0),
                    bucket_end: Some(1),
                },
            );
        let registry = StoreRegistry::from_config(&config).unwrap();

        assert_eq!(registry.ids().collect::<Vec<_>>(), ["disk", "mem"]);
        assert!(registry.get("mem").unwrap().capabilities().shards);
        assert!(!registry.get("disk").unwrap().capabilities().set_acl);
        assert!(registry.get("nope").is_err());
    }

    #[test]
    fn inverted_shard_range_rejected() {
        let config = StorageConfig::default().with_storage(
            "mem",
            DriverConfig::Memory {
                bucket_prefix: "b".into(),
                bucket_start: Some(4),
                bucket_end: Some(1),
            },
        );
        assert!(StoreRegistry::from_config(&config).is_err());
    }
}
