// src/db/repository.rs

use std::{marker::PhantomData, sync::Arc};

use serde_json::Value;
use uuid::Uuid;

use crate::{
    common::{error::AppError, identifiers::format_identifier},
    db::store::{Document, DocumentStore, Filter, StoredDocument, Write},
};

/// Typed, owner-scoped access to one collection.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

// Manual impl: a derive would require `T: Clone`
impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    fn decode(value: Value) -> Result<T, AppError> {
        serde_json::from_value(value).map_err(|e| {
            AppError::InternalServerError(anyhow::anyhow!("corrupt {} document: {}", T::LABEL, e))
        })
    }

    pub async fn find(&self, owner: Uuid, id: Uuid) -> Result<Option<T>, AppError> {
        self.store
            .find_one(T::COLLECTION, owner, id)
            .await?
            .map(Self::decode)
            .transpose()
    }

    /// Like `find`, but absence (or foreign ownership) is `NotFound`.
    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<T, AppError> {
        self.find(owner, id).await?.ok_or(AppError::NotFound(T::LABEL))
    }

    pub async fn list(&self, owner: Uuid, filter: &Filter) -> Result<Vec<T>, AppError> {
        self.store
            .find(T::COLLECTION, owner, filter)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    pub async fn find_first(&self, filter: &Filter) -> Result<Option<T>, AppError> {
        self.store
            .find_first(T::COLLECTION, filter)
            .await?
            .map(Self::decode)
            .transpose()
    }

    pub async fn count(&self, owner: Uuid, filter: &Filter) -> Result<u64, AppError> {
        self.store.count(T::COLLECTION, owner, filter).await
    }

    pub async fn next_identifier(&self, prefix: &str) -> Result<String, AppError> {
        let sequence = self.store.next_sequence(T::COLLECTION).await?;
        Ok(format_identifier(prefix, sequence))
    }

    // --- Batch builders ---

    pub fn insert_write(document: &T) -> Result<Write, AppError> {
        Ok(Write::Insert(StoredDocument::from_document(document)?))
    }

    pub fn update_write(document: &T) -> Result<Write, AppError> {
        Ok(Write::Update(StoredDocument::from_document(document)?))
    }

    pub fn delete_write(document: &T) -> Write {
        Write::Delete {
            collection: T::COLLECTION,
            id: document.id(),
            owner: document.owner(),
        }
    }

    // --- Single-record writes ---

    pub async fn insert(&self, document: &T) -> Result<(), AppError> {
        self.store.commit(vec![Self::insert_write(document)?]).await
    }

    pub async fn save(&self, document: &T) -> Result<(), AppError> {
        self.store.commit(vec![Self::update_write(document)?]).await
    }

    pub async fn delete(&self, document: &T) -> Result<(), AppError> {
        self.store.commit(vec![Self::delete_write(document)]).await
    }

    /// Commits writes spanning several collections as one unit.
    pub async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError> {
        self.store.commit(writes).await
    }
}
