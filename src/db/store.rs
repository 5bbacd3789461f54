// src/db/store.rs

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::common::{error::AppError, permissions::FieldPermissions};

/// A record kept in the document store, owned by the principal that created it.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Name used in NotFound errors and logs.
    const LABEL: &'static str;
    /// Fields that must be unique across the whole collection.
    const UNIQUE_KEYS: &'static [&'static str];
    const PERMISSIONS: FieldPermissions;

    fn id(&self) -> Uuid;
    fn owner(&self) -> Uuid;
}

/// Equality filter over top-level document fields.
#[derive(Debug, Clone, Default)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq<V: Serialize>(mut self, field: &str, value: V) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.0.insert(field.to_string(), value);
        self
    }

    /// Adds the condition only when a value is present.
    pub fn eq_opt<V: Serialize>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(field, v),
            None => self,
        }
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    pub fn as_json(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Serialized form of a document, as handed to the store.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub collection: &'static str,
    pub id: Uuid,
    pub owner: Uuid,
    pub unique_keys: &'static [&'static str],
    pub body: Value,
}

impl StoredDocument {
    pub fn from_document<T: Document>(document: &T) -> Result<Self, AppError> {
        let body = serde_json::to_value(document)
            .map_err(|e| anyhow::anyhow!("failed to serialize {}: {}", T::LABEL, e))?;
        Ok(Self {
            collection: T::COLLECTION,
            id: document.id(),
            owner: document.owner(),
            unique_keys: T::UNIQUE_KEYS,
            body,
        })
    }

    /// Unique key/value pairs present on this document. Null or missing keys are skipped.
    pub fn unique_values(&self) -> Vec<(&'static str, String)> {
        self.unique_keys
            .iter()
            .filter_map(|key| match self.body.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some((*key, s.clone())),
                Some(Value::Null) | None => None,
                Some(other) => Some((*key, other.to_string())),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum Write {
    Insert(StoredDocument),
    Update(StoredDocument),
    Delete {
        collection: &'static str,
        id: Uuid,
        owner: Uuid,
    },
}

/// Persistence contract. `commit` applies a batch all-or-nothing.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(
        &self,
        collection: &str,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<Value>, AppError>;

    /// Owner-scoped query, newest first.
    async fn find(&self, collection: &str, owner: Uuid, filter: &Filter)
        -> Result<Vec<Value>, AppError>;

    /// Unscoped lookup, for flows that run before a principal exists (login).
    async fn find_first(&self, collection: &str, filter: &Filter) -> Result<Option<Value>, AppError>;

    async fn count(&self, collection: &str, owner: Uuid, filter: &Filter) -> Result<u64, AppError>;

    /// Atomically increments and returns the collection's sequence (first value is 1).
    async fn next_sequence(&self, collection: &str) -> Result<u64, AppError>;

    async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError>;
}

pub(crate) fn duplicate_key(collection: &str, key: &str, value: &str) -> AppError {
    AppError::Conflict(format!("{collection}: {key} '{value}' is already in use"))
}
