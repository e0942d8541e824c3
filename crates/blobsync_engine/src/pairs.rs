//! Storage bindings and the pair matrix.

use crate::error::{EngineError, EngineResult};
use blobsync_storage::{BlobStore, StoreRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A storage id within a named configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binding {
    /// Configuration id.
    pub config: String,
    /// Storage id within the configuration.
    pub storage: String,
}

impl Binding {
    /// Creates a binding.
    pub fn new(config: impl Into<String>, storage: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            storage: storage.into(),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.config, self.storage)
    }
}

/// A directed source/destination relationship.
///
/// Single-storage runs (rmdir, acl, stats) use the source as destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    /// Source binding.
    pub src: Binding,
    /// Destination binding.
    pub dst: Binding,
}

impl PairKey {
    /// Creates a pair key.
    pub fn new(src: Binding, dst: Binding) -> Self {
        Self { src, dst }
    }

    /// Key for a run against one storage.
    pub fn single(binding: Binding) -> Self {
        Self {
            dst: binding.clone(),
            src: binding,
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.src, self.dst)
    }
}

/// A binding resolved to its store.
#[derive(Clone)]
pub struct StoreBinding {
    /// Identity of the binding.
    pub binding: Binding,
    /// The store it resolves to.
    pub store: Arc<dyn BlobStore>,
}

impl fmt::Debug for StoreBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBinding")
            .field("binding", &self.binding)
            .finish()
    }
}

/// One unit of work for the orchestrator.
#[derive(Clone, Debug)]
pub struct Pair {
    /// Identity used for stats and progress.
    pub key: PairKey,
    /// Enumerated side.
    pub src: StoreBinding,
    /// Compared or repaired side.
    pub dst: StoreBinding,
}

/// The configurations and storage ids named for a run.
///
/// Configurations and storages keep the order they were named in; the
/// first of each decides one-way selection.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    configs: Vec<(String, StoreRegistry)>,
    storages: Vec<String>,
}

impl Selection {
    /// Creates a selection over `storages`.
    pub fn new<I, S>(storages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            configs: Vec::new(),
            storages: storages.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds a configuration and the stores it defines.
    pub fn with_config(mut self, id: impl Into<String>, registry: StoreRegistry) -> Self {
        self.configs.push((id.into(), registry));
        self
    }

    /// Every (config, storage) combination, deduplicated, config-major.
    ///
    /// # Errors
    ///
    /// Fails if a configuration does not define one of the storages.
    pub fn bindings(&self) -> EngineResult<Vec<StoreBinding>> {
        let mut bindings: Vec<StoreBinding> = Vec::new();
        for (config, registry) in &self.configs {
            for storage in &self.storages {
                let binding = Binding::new(config.clone(), storage.clone());
                if bindings.iter().any(|b| b.binding == binding) {
                    continue;
                }
                let store = registry.get(storage)?;
                bindings.push(StoreBinding { binding, store });
            }
        }
        Ok(bindings)
    }

    /// Builds the directed pair matrix.
    ///
    /// Self pairs are excluded. With `one_way`, a pair is kept only if its
    /// source storage is the first named storage AND its source config is
    /// the first named config.
    pub fn pairs(&self, one_way: bool) -> EngineResult<Vec<Pair>> {
        let bindings = self.bindings()?;
        let mut pairs = Vec::new();
        for src in &bindings {
            for dst in &bindings {
                if self.should_pair(one_way, &src.binding, &dst.binding) {
                    pairs.push(Pair {
                        key: PairKey::new(src.binding.clone(), dst.binding.clone()),
                        src: src.clone(),
                        dst: dst.clone(),
                    });
                }
            }
        }
        if pairs.is_empty() {
            return Err(EngineError::NoPairs);
        }
        Ok(pairs)
    }

    /// Single-storage pairs for every binding.
    pub fn singles(&self) -> EngineResult<Vec<Pair>> {
        let pairs: Vec<Pair> = self
            .bindings()?
            .into_iter()
            .map(|b| Pair {
                key: PairKey::single(b.binding.clone()),
                src: b.clone(),
                dst: b,
            })
            .collect();
        if pairs.is_empty() {
            return Err(EngineError::NoPairs);
        }
        Ok(pairs)
    }

    fn should_pair(&self, one_way: bool, src: &Binding, dst: &Binding) -> bool {
        if src == dst {
            return false;
        }
        if one_way {
            let first_storage = self.storages.first().map(String::as_str);
            let first_config = self.configs.first().map(|(id, _)| id.as_str());
            if Some(src.storage.as_str()) != first_storage {
                return false;
            }
            if Some(src.config.as_str()) != first_config {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobsync_storage::{DriverConfig, StorageConfig};

    fn registry(ids: &[&str]) -> StoreRegistry {
        let config = ids.iter().fold(StorageConfig::default(), |c, id| {
            c.with_storage(
                *id,
                DriverConfig::Memory {
                    bucket_prefix: id.to_string(),
                    bucket_start: None,
                    bucket_end: None,
                },
            )
        });
        StoreRegistry::from_config(&config).unwrap()
    }

    fn keys(pairs: &[Pair]) -> Vec<String> {
        pairs.iter().map(|p| p.key.to_string()).collect()
    }

    #[test]
    fn two_way_cross_product() {
        let sel = Selection::new(["a", "b"]).with_config("x", registry(&["a", "b"]));
        assert_eq!(keys(&sel.pairs(false).unwrap()), ["x.a.x.b", "x.b.x.a"]);
    }

    #[test]
    fn one_way_extra_storage() {
        let sel = Selection::new(["a", "b"]).with_config("x", registry(&["a", "b"]));
        assert_eq!(keys(&sel.pairs(true).unwrap()), ["x.a.x.b"]);
    }

    #[test]
    fn one_way_extra_config() {
        let sel = Selection::new(["a"])
            .with_config("x", registry(&["a"]))
            .with_config("y", registry(&["a"]));
        assert_eq!(keys(&sel.pairs(true).unwrap()), ["x.a.y.a"]);
    }

    #[test]
    fn one_way_full_cross_product() {
        let sel = Selection::new(["a", "b"])
            .with_config("x", registry(&["a", "b"]))
            .with_config("y", registry(&["a", "b"]));
        assert_eq!(
            keys(&sel.pairs(true).unwrap()),
            ["x.a.x.b", "x.a.y.a", "x.a.y.b"]
        );
        assert_eq!(sel.pairs(false).unwrap().len(), 12);
    }

    #[test]
    fn duplicates_and_self_pairs() {
        let sel = Selection::new(["a", "a"]).with_config("x", registry(&["a"]));
        assert_eq!(sel.bindings().unwrap().len(), 1);
        assert!(matches!(sel.pairs(false), Err(EngineError::NoPairs)));
        assert_eq!(keys(&sel.singles().unwrap()), ["x.a.x.a"]);
    }

    #[test]
    fn unknown_storage_is_config_error() {
        let sel = Selection::new(["nope"]).with_config("x", registry(&["a"]));
        assert!(matches!(sel.bindings(), Err(EngineError::Storage(_))));
    }
}
