use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::db::store::{RecordStore, StoreError};

/// Volatile backend, used by tests and when running without a data directory
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self, name: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.collections.get(name).map(|v| v.value().clone()))
    }

    async fn write(&self, name: &str, value: &Value) -> Result<(), StoreError> {
        self.collections.insert(name.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.collections.remove(name).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.collections.iter().map(|e| e.key().clone()).collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_test::block_on;

    use super::*;

    #[test]
    fn test_write_read_delete() {
        let store = MemoryStore::new();

        block_on(store.write("warnings", &json!([]))).unwrap();
        assert_eq!(block_on(store.read("warnings")).unwrap(), Some(json!([])));
        assert_eq!(block_on(store.list()).unwrap(), vec!["warnings".to_string()]);

        assert!(block_on(store.delete("warnings")).unwrap());
        assert_eq!(block_on(store.read("warnings")).unwrap(), None);
    }
}
