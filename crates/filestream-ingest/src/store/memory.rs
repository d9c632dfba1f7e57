use super::{ObjectStore, StoreError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Object store held in memory, keyed by `(bucket, name)`.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: impl Into<String>, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .insert((bucket.into(), name.into()), data.into());
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let store = MemoryObjectStore::new();
        store.put("landing", "a.json", b"{}".to_vec());

        assert_eq!(store.fetch("landing", "a.json").await.unwrap(), b"{}");
        assert_eq!(
            store.fetch("other", "a.json").await.unwrap_err(),
            StoreError::NotFound {
                bucket: "other".to_string(),
                name: "a.json".to_string(),
            }
        );
    }
}
