//! Configuration file loading.
//!
//! Each configuration id names `<config-dir>/<id>.json`:
//!
//! ```json
//! { "storage": { "local": { "driver": "fs", "path": "/srv/blobs" } } }
//! ```

use blobsync_engine::Selection;
use blobsync_storage::{StorageConfig, StoreRegistry};
use std::error::Error;
use std::path::Path;
use tracing::debug;

/// Loads `<dir>/<id>.json` and builds its stores.
pub fn load_registry(dir: &Path, id: &str) -> Result<StoreRegistry, Box<dyn Error>> {
    let path = dir.join(format!("{id}.json"));
    let text = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
    let config = StorageConfig::from_json_str(&text)?;
    debug!(config = id, storages = config.storage.len(), "loaded config");
    Ok(StoreRegistry::from_config(&config)?)
}

/// Loads every configuration in `configs` and binds `storages`.
pub fn load_selection(
    dir: &Path,
    configs: &[String],
    storages: &[String],
) -> Result<Selection, Box<dyn Error>> {
    let mut selection = Selection::new(storages.iter().cloned());
    for id in configs {
        selection = selection.with_config(id.clone(), load_registry(dir, id)?);
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_configs_by_id() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::write(
            dir.path().join("local.json"),
            format!(
                r#"{{ "storage": {{
                    "disk": {{ "driver": "fs", "path": {:?} }},
                    "mem": {{ "driver": "memory", "bucketPrefix": "blobs" }}
                }} }}"#,
                data.display().to_string()
            ),
        )
        .unwrap();

        let registry = load_registry(dir.path(), "local").unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["disk", "mem"]);

        let selection = load_selection(
            dir.path(),
            &["local".to_string()],
            &["disk".to_string(), "mem".to_string()],
        )
        .unwrap();
        let pairs = selection.pairs(true).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].key.to_string(), "local.disk.local.mem");
    }

    #[test]
    fn missing_config_names_the_file() {
        let dir = tempdir().unwrap();
        let err = load_registry(dir.path(), "prod").unwrap_err();
        assert!(err.to_string().contains("prod.json"));
    }
}
