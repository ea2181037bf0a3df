use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Collection not found: {0}")]
    NotFound(String),

    #[error("I/O error on collection {collection}: {source}")]
    Io {
        collection: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in collection {collection}: {source}")]
    Serialization {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Collection {0} does not hold a sequence")]
    TypeMismatch(String),

    #[error("Invalid collection name: {0:?}")]
    InvalidName(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Storage backend for named collections of JSON values.
///
/// Backends only implement whole-document operations; sequence helpers and
/// per-collection locking live on [`Store`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read(&self, name: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the whole document. Implementations must leave the previous
    /// document intact when the write fails.
    async fn write(&self, name: &str, value: &Value) -> Result<(), StoreError>;

    async fn delete(&self, name: &str) -> Result<bool, StoreError>;

    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Short label for log lines
    fn backend_name(&self) -> &'static str;
}

/// Shared handle to a record store backend with per-collection write locks.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn RecordStore>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Store {
    pub fn new(backend: Arc<dyn RecordStore>) -> Self {
        Self {
            backend,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Acquire the read-modify-write lock for a collection.
    ///
    /// The lock is not re-entrant: while holding it, only call the unlocked
    /// operations (`read_collection`, `write_collection`, ...), never
    /// `append_record`.
    pub async fn lock(&self, name: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Create a collection with `default` unless it already exists.
    /// Returns true if it was created.
    pub async fn create_collection(&self, name: &str, default: Value) -> Result<bool, StoreError> {
        validate_name(name)?;
        let _guard = self.lock(name).await;

        if self.backend.read(name).await?.is_some() {
            return Ok(false);
        }

        self.backend.write(name, &default).await?;
        debug!("Created collection {} on {}", name, self.backend_name());
        Ok(true)
    }

    pub async fn read_collection(&self, name: &str) -> Result<Value, StoreError> {
        validate_name(name)?;
        self.backend
            .read(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    pub async fn write_collection(&self, name: &str, value: &Value) -> Result<(), StoreError> {
        validate_name(name)?;
        self.backend.write(name, value).await
    }

    /// Append a record to a sequence collection, creating `[record]` if the
    /// collection does not exist yet.
    pub async fn append_record(&self, name: &str, record: Value) -> Result<(), StoreError> {
        validate_name(name)?;
        let _guard = self.lock(name).await;

        let updated = match self.backend.read(name).await? {
            None => Value::Array(vec![record]),
            Some(Value::Array(mut records)) => {
                records.push(record);
                Value::Array(records)
            }
            Some(_) => {
                warn!("Refusing to append to non-sequence collection {}", name);
                return Err(StoreError::TypeMismatch(name.to_string()));
            }
        };

        self.backend.write(name, &updated).await
    }

    /// Read a sequence collection; absent collections read as empty.
    pub async fn read_records(&self, name: &str) -> Result<Vec<Value>, StoreError> {
        match self.read_collection(name).await {
            Ok(Value::Array(records)) => Ok(records),
            Ok(_) => Err(StoreError::TypeMismatch(name.to_string())),
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names = self.backend.list().await?;
        names.sort();
        Ok(names)
    }

    /// Number of records in a sequence collection (0 if absent or not a sequence)
    pub async fn count_records(&self, name: &str) -> Result<usize, StoreError> {
        match self.read_collection(name).await {
            Ok(Value::Array(records)) => Ok(records.len()),
            Ok(_) | Err(StoreError::NotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        validate_name(name)?;
        let _guard = self.lock(name).await;
        self.backend.delete(name).await
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend_name())
            .field("locked_collections", &self.locks.len())
            .finish()
    }
}

/// Collection names double as file names, so keep them to a safe alphabet
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::memory_store::MemoryStore;

    fn store() -> Store {
        Store::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_collection_never_overwrites() {
        let store = store();

        assert!(store.create_collection("mod", json!([1])).await.unwrap());
        assert!(!store.create_collection("mod", json!([2, 3])).await.unwrap());
        assert_eq!(store.read_collection("mod").await.unwrap(), json!([1]));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let store = store();

        let sequence = json!([{"a": 1}, {"b": [true, null]}]);
        store.write_collection("seq", &sequence).await.unwrap();
        assert_eq!(store.read_collection("seq").await.unwrap(), sequence);

        let object = json!({"users": [], "roles": [{"id": 5}], "version": "1.0.0"});
        store.write_collection("obj", &object).await.unwrap();
        assert_eq!(store.read_collection("obj").await.unwrap(), object);
    }

    #[tokio::test]
    async fn test_read_missing_collection_is_not_found() {
        let err = store().read_collection("nothing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_append_creates_and_extends() {
        let store = store();

        store.append_record("log", json!({"n": 1})).await.unwrap();
        store.append_record("log", json!({"n": 2})).await.unwrap();

        assert_eq!(
            store.read_collection("log").await.unwrap(),
            json!([{"n": 1}, {"n": 2}])
        );
        assert_eq!(store.count_records("log").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_append_to_object_is_type_mismatch() {
        let store = store();
        store.write_collection("registry", &json!({"users": []})).await.unwrap();

        let err = store.append_record("registry", json!(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch(_)));
        assert_eq!(store.count_records("registry").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_count_and_delete() {
        let store = store();
        store.create_collection("b", json!([])).await.unwrap();
        store.create_collection("a", json!([1, 2, 3])).await.unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.count_records("a").await.unwrap(), 3);
        assert_eq!(store.count_records("missing").await.unwrap(), 0);

        assert!(store.delete_collection("a").await.unwrap());
        assert!(!store.delete_collection("a").await.unwrap());
        assert_eq!(store.list_collections().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_serialized() {
        let store = store();

        let mut tasks = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.append_record("race", json!(i)).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.count_records("race").await.unwrap(), 32);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("databasereload").is_ok());
        assert!(validate_name("mod-logs_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../etc/passwd").is_err());
        assert!(validate_name("with space").is_err());
    }
}
