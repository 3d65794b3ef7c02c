//! In-memory document store.
//!
//! Backed by DashMap so conditional writes are atomic per key without an
//! async lock. Used for local runs and by the test suites.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use super::{BatchWrite, Document, DocumentStore, FieldOp, StoreError, StoreResult};

type Key = (String, String);

#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<DashMap<Key, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.docs.iter().filter(|e| e.key().0 == collection).count()
    }

    fn key(collection: &str, id: &str) -> Key {
        (collection.to_string(), id.to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, body: Value) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        self.insert(collection, &id, body).await?;
        Ok(id)
    }

    async fn insert(&self, collection: &str, id: &str, body: Value) -> StoreResult<()> {
        match self.docs.entry(Self::key(collection, id)) {
            Entry::Occupied(_) => Err(StoreError::conflict(collection, id)),
            Entry::Vacant(slot) => {
                slot.insert(Document {
                    id: id.to_string(),
                    version: 1,
                    body,
                });
                Ok(())
            }
        }
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Document> {
        self.docs
            .get(&Self::key(collection, id))
            .map(|doc| doc.value().clone())
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        body: Value,
    ) -> StoreResult<u64> {
        let mut doc = self
            .docs
            .get_mut(&Self::key(collection, id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        if doc.version != expected_version {
            return Err(StoreError::conflict(collection, id));
        }

        doc.version += 1;
        doc.body = body;
        Ok(doc.version)
    }

    async fn delete(&self, collection: &str, id: &str, expected_version: u64) -> StoreResult<()> {
        let key = Self::key(collection, id);
        if self
            .docs
            .remove_if(&key, |_, doc| doc.version == expected_version)
            .is_some()
        {
            return Ok(());
        }

        if self.docs.contains_key(&key) {
            Err(StoreError::conflict(collection, id))
        } else {
            Err(StoreError::not_found(collection, id))
        }
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        op: FieldOp,
        value: Value,
    ) -> StoreResult<Vec<Document>> {
        Ok(self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .filter(|entry| op.matches(entry.value().body.get(field), &value))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn atomic_batch(&self, writes: Vec<BatchWrite>) -> StoreResult<Vec<StoreResult<u64>>> {
        let mut results = Vec::with_capacity(writes.len());
        for write in writes {
            results.push(
                self.update(&write.collection, &write.id, write.expected_version, write.body)
                    .await,
            );
        }
        Ok(results)
    }
}
