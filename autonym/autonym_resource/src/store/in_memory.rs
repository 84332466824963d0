//! In-memory store.
//!
//! This module provides an in-memory implementation of the store, useful
//! for tests and prototypes.

use async_trait::async_trait;
use autonym_core::{AutonymError, BoxError, Meta, Record};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::Store;

const NOT_FOUND: &str = "Record not found.";

/// An in-memory store.
///
/// Ids are sequential decimal strings starting at `"1"`. Every stored
/// record carries its id under `"id"`.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    /// The records, indexed by numeric id.
    records: Arc<DashMap<u64, Record>>,

    /// The last id handed out.
    counter: Arc<AtomicU64>,
}

impl InMemoryStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn key(id: &str) -> Result<u64, BoxError> {
        id.parse::<u64>()
            .map_err(|_| Box::new(AutonymError::not_found(NOT_FOUND)) as BoxError)
    }

    fn not_found() -> BoxError {
        Box::new(AutonymError::not_found(NOT_FOUND))
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("records", &self.records.len())
            .finish()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create(&self, mut data: Record, _meta: &Meta) -> Result<Record, BoxError> {
        let key = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        data.insert("id".to_string(), Value::String(key.to_string()));
        self.records.insert(key, data.clone());
        Ok(data)
    }

    async fn find(&self, query: &Record, _meta: &Meta) -> Result<Vec<Record>, BoxError> {
        let mut matches: Vec<(u64, Record)> = self
            .records
            .iter()
            .filter(|entry| {
                query
                    .iter()
                    .all(|(key, expected)| entry.value().get(key) == Some(expected))
            })
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        // Insertion order
        matches.sort_by_key(|(key, _)| *key);
        Ok(matches.into_iter().map(|(_, record)| record).collect())
    }

    async fn find_one(&self, id: &str, _meta: &Meta) -> Result<Record, BoxError> {
        let key = Self::key(id)?;
        self.records
            .get(&key)
            .map(|record| record.clone())
            .ok_or_else(Self::not_found)
    }

    async fn find_one_and_update(
        &self,
        id: &str,
        data: Record,
        _complete: Record,
        _meta: &Meta,
    ) -> Result<Record, BoxError> {
        let key = Self::key(id)?;
        let mut record = self.records.get_mut(&key).ok_or_else(Self::not_found)?;
        for (property, value) in data {
            if property != "id" {
                record.insert(property, value);
            }
        }
        Ok(record.clone())
    }

    async fn find_one_and_delete(&self, id: &str, _meta: &Meta) -> Result<(), BoxError> {
        let key = Self::key(id)?;
        self.records
            .remove(&key)
            .map(|_| ())
            .ok_or_else(Self::not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autonym_core::ErrorCode;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = InMemoryStore::new();
        let meta = Meta::new();

        let first = store.create(record(json!({ "name": "a" })), &meta).await.unwrap();
        let second = store.create(record(json!({ "name": "b" })), &meta).await.unwrap();
        assert_eq!(first["id"], json!("1"));
        assert_eq!(second["id"], json!("2"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_find_filters_and_keeps_insertion_order() {
        let store = InMemoryStore::new();
        let meta = Meta::new();
        for (name, team) in [("a", "red"), ("b", "blue"), ("c", "red")] {
            store
                .create(record(json!({ "name": name, "team": team })), &meta)
                .await
                .unwrap();
        }

        let reds = store.find(&record(json!({ "team": "red" })), &meta).await.unwrap();
        let names: Vec<_> = reds.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("a"), json!("c")]);

        let all = store.find(&Record::new(), &meta).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_update_assigns_delta() {
        let store = InMemoryStore::new();
        let meta = Meta::new();
        store
            .create(record(json!({ "firstName": "Dagny", "lastName": "Taggart" })), &meta)
            .await
            .unwrap();

        let updated = store
            .find_one_and_update("1", record(json!({ "lastName": "Galt" })), Record::new(), &meta)
            .await
            .unwrap();
        assert_eq!(
            Value::Object(updated),
            json!({ "firstName": "Dagny", "lastName": "Galt", "id": "1" })
        );
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let store = InMemoryStore::new();
        let meta = Meta::new();

        for err in [
            store.find_one("1", &meta).await.unwrap_err(),
            store.find_one("abc", &meta).await.unwrap_err(),
            store.find_one_and_delete("9", &meta).await.unwrap_err(),
            store
                .find_one_and_update("2", Record::new(), Record::new(), &meta)
                .await
                .unwrap_err(),
        ] {
            let err = AutonymError::from_error(err);
            assert_eq!(err.code(), &ErrorCode::NotFound);
            assert_eq!(err.message(), NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let store = InMemoryStore::new();
        let meta = Meta::new();
        store.create(Record::new(), &meta).await.unwrap();
        store.find_one_and_delete("1", &meta).await.unwrap();
        assert!(store.is_empty());
    }
}
