// src/db/memory_store.rs

// Process-local document store. Used when no DATABASE_URL is configured and by the tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{duplicate_key, DocumentStore, Filter, StoredDocument, Write},
};

#[derive(Debug, Clone)]
struct Entry {
    owner: Uuid,
    body: Value,
    // Insertion order, for newest-first listing
    position: u64,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, HashMap<Uuid, Entry>>,
    sequences: HashMap<String, u64>,
    inserted: u64,
}

impl State {
    fn check_unique(&self, document: &StoredDocument) -> Result<(), AppError> {
        let Some(entries) = self.collections.get(document.collection) else {
            return Ok(());
        };
        for (key, value) in document.unique_values() {
            let taken = entries.iter().any(|(id, entry)| {
                *id != document.id
                    && entry.body.get(key).map(|v| match v {
                        Value::String(s) => s == &value,
                        other => other.to_string() == value,
                    }) == Some(true)
            });
            if taken {
                return Err(duplicate_key(document.collection, key, &value));
            }
        }
        Ok(())
    }

    /// Applies one write and returns what reverses it.
    fn apply(&mut self, write: Write) -> Result<Undo, AppError> {
        match write {
            Write::Insert(document) => {
                self.check_unique(&document)?;
                let entries = self
                    .collections
                    .entry(document.collection.to_string())
                    .or_default();
                if entries.contains_key(&document.id) {
                    return Err(duplicate_key(document.collection, "id", &document.id.to_string()));
                }
                self.inserted += 1;
                entries.insert(
                    document.id,
                    Entry {
                        owner: document.owner,
                        body: document.body,
                        position: self.inserted,
                    },
                );
                Ok(Undo::Remove {
                    collection: document.collection,
                    id: document.id,
                })
            }
            Write::Update(document) => {
                self.check_unique(&document)?;
                let entry = self
                    .collections
                    .get_mut(document.collection)
                    .and_then(|entries| entries.get_mut(&document.id))
                    .filter(|entry| entry.owner == document.owner)
                    .ok_or(AppError::NotFound("Document"))?;
                let previous = entry.clone();
                entry.body = document.body;
                Ok(Undo::Restore {
                    collection: document.collection,
                    id: document.id,
                    entry: previous,
                })
            }
            Write::Delete { collection, id, owner } => {
                let entries = self
                    .collections
                    .get_mut(collection)
                    .ok_or(AppError::NotFound("Document"))?;
                match entries.get(&id) {
                    Some(entry) if entry.owner == owner => {
                        let previous = entries.remove(&id).ok_or(AppError::NotFound("Document"))?;
                        Ok(Undo::Restore {
                            collection,
                            id,
                            entry: previous,
                        })
                    }
                    _ => Err(AppError::NotFound("Document")),
                }
            }
        }
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::Remove { collection, id } => {
                if let Some(entries) = self.collections.get_mut(collection) {
                    entries.remove(&id);
                }
            }
            Undo::Restore { collection, id, entry } => {
                self.collections
                    .entry(collection.to_string())
                    .or_default()
                    .insert(id, entry);
            }
        }
    }
}

// Reverse of one applied write
enum Undo {
    Remove {
        collection: &'static str,
        id: Uuid,
    },
    Restore {
        collection: &'static str,
        id: Uuid,
        entry: Entry,
    },
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    state: RwLock<State>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_one(
        &self,
        collection: &str,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<Value>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|entries| entries.get(&id))
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.body.clone()))
    }

    async fn find(
        &self,
        collection: &str,
        owner: Uuid,
        filter: &Filter,
    ) -> Result<Vec<Value>, AppError> {
        let state = self.state.read().await;
        let mut found: Vec<&Entry> = state
            .collections
            .get(collection)
            .map(|entries| {
                entries
                    .values()
                    .filter(|entry| entry.owner == owner && filter.matches(&entry.body))
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by(|a, b| b.position.cmp(&a.position));
        Ok(found.into_iter().map(|entry| entry.body.clone()).collect())
    }

    async fn find_first(&self, collection: &str, filter: &Filter) -> Result<Option<Value>, AppError> {
        let state = self.state.read().await;
        Ok(state.collections.get(collection).and_then(|entries| {
            entries
                .values()
                .filter(|entry| filter.matches(&entry.body))
                .min_by_key(|entry| entry.position)
                .map(|entry| entry.body.clone())
        }))
    }

    async fn count(&self, collection: &str, owner: Uuid, filter: &Filter) -> Result<u64, AppError> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .map(|entries| {
                entries
                    .values()
                    .filter(|entry| entry.owner == owner && filter.matches(&entry.body))
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn next_sequence(&self, collection: &str) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        let sequence = state.sequences.entry(collection.to_string()).or_insert(0);
        *sequence += 1;
        Ok(*sequence)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError> {
        let mut state = self.state.write().await;

        let mut applied = Vec::with_capacity(writes.len());
        for write in writes {
            match state.apply(write) {
                Ok(undo) => applied.push(undo),
                Err(e) => {
                    // A failing write leaves nothing behind
                    for undo in applied.into_iter().rev() {
                        state.revert(undo);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEYS: &[&str] = &["code"];

    fn doc(id: Uuid, owner: Uuid, code: &str) -> StoredDocument {
        StoredDocument {
            collection: "things",
            id,
            owner,
            unique_keys: KEYS,
            body: json!({ "id": id, "code": code }),
        }
    }

    #[tokio::test]
    async fn lookups_are_scoped_to_owner() {
        let store = MemoryDocumentStore::new();
        let (owner, stranger, id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.commit(vec![Write::Insert(doc(id, owner, "A"))]).await.unwrap();

        assert!(store.find_one("things", owner, id).await.unwrap().is_some());
        assert!(store.find_one("things", stranger, id).await.unwrap().is_none());
        assert!(store.find("things", stranger, &Filter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_partial_writes() {
        let store = MemoryDocumentStore::new();
        let owner = Uuid::new_v4();
        store
            .commit(vec![Write::Insert(doc(Uuid::new_v4(), owner, "A"))])
            .await
            .unwrap();

        let result = store
            .commit(vec![
                Write::Insert(doc(Uuid::new_v4(), owner, "B")),
                Write::Insert(doc(Uuid::new_v4(), owner, "A")),
            ])
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(store.count("things", owner, &Filter::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_batch_restores_updated_and_deleted_documents() {
        let store = MemoryDocumentStore::new();
        let owner = Uuid::new_v4();
        let (first, second, third) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store
            .commit(vec![
                Write::Insert(doc(first, owner, "A")),
                Write::Insert(doc(second, owner, "B")),
                Write::Insert(doc(third, owner, "C")),
            ])
            .await
            .unwrap();

        let result = store
            .commit(vec![
                Write::Update(doc(first, owner, "Z")),
                Write::Delete {
                    collection: "things",
                    id: second,
                    owner,
                },
                Write::Insert(doc(Uuid::new_v4(), owner, "C")),
            ])
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        let body = store.find_one("things", owner, first).await.unwrap().unwrap();
        assert_eq!(body["code"], "A");
        assert!(store.find_one("things", owner, second).await.unwrap().is_some());
        assert_eq!(store.count("things", owner, &Filter::new()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn sequences_are_per_collection() {
        let store = MemoryDocumentStore::new();
        assert_eq!(store.next_sequence("a").await.unwrap(), 1);
        assert_eq!(store.next_sequence("a").await.unwrap(), 2);
        assert_eq!(store.next_sequence("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_by_other_owner_is_not_found() {
        let store = MemoryDocumentStore::new();
        let (owner, stranger, id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.commit(vec![Write::Insert(doc(id, owner, "A"))]).await.unwrap();

        let result = store.commit(vec![Write::Update(doc(id, stranger, "A"))]).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
