use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

/// Durable key/value storage used by the settings, the cost ledger and the
/// window position.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Option<Value>;
    fn persist(&self, key: &str, value: Value) -> Result<()>;
}

/// All keys live in one pretty-printed JSON object on disk. The file is
/// rewritten on every `persist`.
pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<Map<String, Value>>,
}

impl JsonFileStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create storage directory {}", parent.display())
            })?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store from {}", path.display()))?;
            match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    log::warn!(
                        "Store at {} is not a JSON object; starting empty",
                        path.display()
                    );
                    Map::new()
                }
            }
        } else {
            Map::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a sibling file and renames it over the store, so a crash
    /// mid-write leaves the previous contents intact.
    fn write_file(&self, data: &Map<String, Value>) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        let staging = self.staging_path();
        fs::write(&staging, serialized)
            .with_context(|| format!("Failed to write store to {}", staging.display()))?;
        fs::rename(&staging, &self.path).with_context(|| {
            format!(
                "Failed to move {} over {}",
                staging.display(),
                self.path.display()
            )
        })
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self, key: &str) -> Option<Value> {
        let guard = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(key).cloned()
    }

    fn persist(&self, key: &str, value: Value) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key.to_string(), value);
        self.write_file(&guard)
    }
}

/// Non-durable store for headless runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Option<Value> {
        let guard = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(key).cloned()
    }

    fn persist(&self, key: &str, value: Value) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("luka.json");

        let store = JsonFileStore::open(path.clone()).unwrap();
        store.persist("window_pos", json!({"x": 10, "y": 20})).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(path).unwrap();
        assert_eq!(reopened.load("window_pos"), Some(json!({"x": 10, "y": 20})));
        assert_eq!(reopened.load("missing"), None);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("luka.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::open(path).unwrap();
        assert_eq!(store.load("settings"), None);
        store.persist("settings", json!({"showCost": false})).unwrap();
        assert_eq!(store.load("settings"), Some(json!({"showCost": false})));
    }

    #[test]
    fn interrupted_write_keeps_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("luka.json");

        let store = JsonFileStore::open(path.clone()).unwrap();
        store
            .persist("cost_ledger", json!({"cumulativeUSD": 1.25}))
            .unwrap();
        assert!(!store.staging_path().exists());

        // A half-written staging file from a crash must not be picked up.
        fs::write(store.staging_path(), "{\"cost_led").unwrap();
        drop(store);

        let reopened = JsonFileStore::open(path.clone()).unwrap();
        assert_eq!(
            reopened.load("cost_ledger"),
            Some(json!({"cumulativeUSD": 1.25}))
        );

        reopened.persist("window_pos", json!({"x": 1, "y": 2})).unwrap();
        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["cost_ledger"], json!({"cumulativeUSD": 1.25}));
        assert_eq!(on_disk["window_pos"], json!({"x": 1, "y": 2}));
    }
}
