use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// 視圖狀態存放區的錯誤。 / Errors raised by view-state stores.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("failed to read view state {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse view state {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize view state {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write view state {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 以字串為鍵的 JSON 值存放區。 / Key-value store holding JSON values under string keys.
pub trait KeyValueStore {
    fn value(&self, key: &str) -> Option<&Value>;

    /// Replaces whatever is stored under `key`; implementations persist immediately.
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), StateStoreError>;
}

/// 以 JSON 物件檔案保存的狀態存放區。 / State store persisted as one JSON object file.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl JsonStateStore {
    /// 從指定路徑載入；檔案不存在時回傳空的存放區。 / Loads the store, starting empty when the file is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                path,
                entries: BTreeMap::new(),
            });
        }

        let contents = fs::read_to_string(&path).map_err(|source| StateStoreError::Read {
            path: path.clone(),
            source,
        })?;
        let entries: BTreeMap<String, Value> =
            serde_json::from_str(&contents).map_err(|source| StateStoreError::Parse {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), keys = entries.len(), "loaded view state");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StateStoreError> {
        let payload =
            serde_json::to_vec_pretty(&self.entries).map_err(|source| StateStoreError::Serialize {
                path: self.path.clone(),
                source,
            })?;
        write_atomic(&self.path, &payload).map_err(|source| StateStoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for JsonStateStore {
    fn value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    fn set_value(&mut self, key: &str, value: Value) -> Result<(), StateStoreError> {
        self.entries.insert(key.to_string(), value);
        self.persist()
    }
}

/// 僅存在記憶體中的存放區，會記錄寫入次數。 / In-memory store that counts its writes.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStore {
    entries: BTreeMap<String, Value>,
    writes: usize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: impl Into<String>, value: Value) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(key.into(), value);
        Self { entries, writes: 0 }
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl KeyValueStore for MemoryStateStore {
    fn value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    fn set_value(&mut self, key: &str, value: Value) -> Result<(), StateStoreError> {
        self.entries.insert(key.to_string(), value);
        self.writes += 1;
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn json_state_store_persists_values() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("state").join("view.json");

        {
            let mut store = JsonStateStore::load(&store_path).unwrap();
            assert!(store.value("places.tree.expanded").is_none());
            store
                .set_value("places.tree.expanded", json!([3, 1, 2]))
                .unwrap();
            store.set_value("other", json!("kept")).unwrap();
        }

        let store = JsonStateStore::load(&store_path).unwrap();
        assert_eq!(store.value("places.tree.expanded"), Some(&json!([3, 1, 2])));
        assert_eq!(store.value("other"), Some(&json!("kept")));
        assert_eq!(store.path(), store_path.as_path());
    }

    #[test]
    fn set_value_overwrites_instead_of_merging() {
        let mut store = MemoryStateStore::with_value("key", json!([1, 2]));
        store.set_value("key", json!([5])).unwrap();
        assert_eq!(store.value("key"), Some(&json!([5])));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("view.json");
        fs::write(&store_path, "not json").unwrap();
        let err = JsonStateStore::load(&store_path).unwrap_err();
        assert!(matches!(err, StateStoreError::Parse { .. }));
    }
}
