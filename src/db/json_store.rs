use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::db::store::{RecordStore, StoreError};

const EXTENSION: &str = "json";

/// One pretty-printed JSON document per collection: `<dir>/<name>.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) the collections directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();

        if fs::metadata(&dir).await.is_err() {
            fs::create_dir_all(&dir).await.map_err(|e| StoreError::Io {
                collection: dir.display().to_string(),
                source: e,
            })?;
            info!("Created collections directory {}", dir.display());
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, EXTENSION))
    }

    fn temp_path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}.tmp", name, EXTENSION))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn read(&self, name: &str) -> Result<Option<Value>, StoreError> {
        let raw = match fs::read_to_string(self.path_for(name)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    collection: name.to_string(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Serialization {
                collection: name.to_string(),
                source: e,
            })
    }

    async fn write(&self, name: &str, value: &Value) -> Result<(), StoreError> {
        let io_err = |e| StoreError::Io {
            collection: name.to_string(),
            source: e,
        };

        let body = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization {
            collection: name.to_string(),
            source: e,
        })?;

        // Write the temp file fully before swapping it in
        let temp_path = self.temp_path_for(name);
        let mut file = fs::File::create(&temp_path).await.map_err(io_err)?;
        file.write_all(&body).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, self.path_for(name)).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_err(e));
        }

        debug!("Wrote collection {} ({} bytes)", name, body.len());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(name)).await {
            Ok(()) => {
                info!("Deleted collection {}", name);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io {
                collection: name.to_string(),
                source: e,
            }),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| StoreError::Io {
            collection: self.dir.display().to_string(),
            source: e,
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::Io {
            collection: self.dir.display().to_string(),
            source: e,
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }

        Ok(names)
    }

    fn backend_name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::db::store::Store;

    #[tokio::test]
    async fn test_documents_are_human_readable_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileStore::open(dir.path()).await.unwrap();
        let store = Store::new(Arc::new(backend));

        store
            .write_collection("warnings", &json!([{"id": "a", "active": true}]))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join("warnings.json")).unwrap();
        assert!(raw.contains('\n'), "expected pretty-printed JSON");
        assert_eq!(
            store.read_collection("warnings").await.unwrap(),
            json!([{"id": "a", "active": true}])
        );
        assert!(!dir.path().join("warnings.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_open_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data").join("collections");

        let backend = JsonFileStore::open(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(backend.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_ignores_temp_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileStore::open(dir.path()).await.unwrap();
        let store = Store::new(Arc::new(backend));

        store.create_collection("mod", json!([])).await.unwrap();
        std::fs::write(dir.path().join("mod.json.tmp"), "[]").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["mod"]);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileStore::open(dir.path()).await.unwrap();
        let store = Store::new(Arc::new(backend));

        store.write_collection("mod", &json!([1, 2])).await.unwrap();

        // A directory squatting on the temp path makes the temp write fail
        std::fs::create_dir(dir.path().join("mod.json.tmp")).unwrap();
        let result = store.write_collection("mod", &json!([3])).await;

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(store.read_collection("mod").await.unwrap(), json!([1, 2]));
    }

    #[tokio::test]
    async fn test_corrupt_document_reports_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let err = backend.read("broken").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }
}
