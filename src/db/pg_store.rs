// src/db/pg_store.rs

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{duplicate_key, DocumentStore, Filter, StoredDocument, Write},
};

/// Documents live as JSONB rows; uniqueness is enforced through `document_keys`.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Replaces the document's unique keys. A primary-key clash means another
    // document already holds the value.
    async fn replace_keys(conn: &mut PgConnection, document: &StoredDocument) -> Result<(), AppError> {
        sqlx::query("DELETE FROM document_keys WHERE collection = $1 AND document_id = $2")
            .bind(document.collection)
            .bind(document.id)
            .execute(&mut *conn)
            .await?;

        for (key, value) in document.unique_values() {
            sqlx::query(
                r#"
                INSERT INTO document_keys (collection, key_name, key_value, document_id)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(document.collection)
            .bind(key)
            .bind(&value)
            .bind(document.id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_unique_violation() {
                        return duplicate_key(document.collection, key, &value);
                    }
                }
                AppError::DatabaseError(e)
            })?;
        }

        Ok(())
    }

    async fn apply(conn: &mut PgConnection, write: Write) -> Result<(), AppError> {
        match write {
            Write::Insert(document) => {
                sqlx::query(
                    r#"
                    INSERT INTO documents (collection, id, created_by, data)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(document.collection)
                .bind(document.id)
                .bind(document.owner)
                .bind(Json(&document.body))
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    if let Some(db_err) = e.as_database_error() {
                        if db_err.is_unique_violation() {
                            return duplicate_key(document.collection, "id", &document.id.to_string());
                        }
                    }
                    AppError::DatabaseError(e)
                })?;

                Self::replace_keys(conn, &document).await?;
            }
            Write::Update(document) => {
                let result = sqlx::query(
                    r#"
                    UPDATE documents
                    SET data = $4, updated_at = NOW()
                    WHERE collection = $1 AND id = $2 AND created_by = $3
                    "#,
                )
                .bind(document.collection)
                .bind(document.id)
                .bind(document.owner)
                .bind(Json(&document.body))
                .execute(&mut *conn)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(AppError::NotFound("Document"));
                }

                Self::replace_keys(conn, &document).await?;
            }
            Write::Delete { collection, id, owner } => {
                // document_keys rows go with it (ON DELETE CASCADE)
                let result = sqlx::query(
                    "DELETE FROM documents WHERE collection = $1 AND id = $2 AND created_by = $3",
                )
                .bind(collection)
                .bind(id)
                .bind(owner)
                .execute(&mut *conn)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(AppError::NotFound("Document"));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_one(
        &self,
        collection: &str,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<Value>, AppError> {
        let row = sqlx::query_scalar::<_, Json<Value>>(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2 AND created_by = $3",
        )
        .bind(collection)
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(data)| data))
    }

    async fn find(
        &self,
        collection: &str,
        owner: Uuid,
        filter: &Filter,
    ) -> Result<Vec<Value>, AppError> {
        // @> is JSONB containment; an empty filter ({}) matches every row
        let rows = sqlx::query_scalar::<_, Json<Value>>(
            r#"
            SELECT data FROM documents
            WHERE collection = $1 AND created_by = $2 AND data @> $3
            ORDER BY created_at DESC
            "#,
        )
        .bind(collection)
        .bind(owner)
        .bind(Json(filter.as_json()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|Json(data)| data).collect())
    }

    async fn find_first(&self, collection: &str, filter: &Filter) -> Result<Option<Value>, AppError> {
        let row = sqlx::query_scalar::<_, Json<Value>>(
            r#"
            SELECT data FROM documents
            WHERE collection = $1 AND data @> $2
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(collection)
        .bind(Json(filter.as_json()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(data)| data))
    }

    async fn count(&self, collection: &str, owner: Uuid, filter: &Filter) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM documents
            WHERE collection = $1 AND created_by = $2 AND data @> $3
            "#,
        )
        .bind(collection)
        .bind(owner)
        .bind(Json(filter.as_json()))
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn next_sequence(&self, collection: &str) -> Result<u64, AppError> {
        // Single statement, so concurrent creates never see the same value
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_sequences (collection, value)
            VALUES ($1, 1)
            ON CONFLICT (collection)
            DO UPDATE SET value = document_sequences.value + 1
            RETURNING value
            "#,
        )
        .bind(collection)
        .fetch_one(&self.pool)
        .await?;

        Ok(value.max(0) as u64)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for write in writes {
            // Any error drops `tx`, which rolls the whole batch back
            Self::apply(&mut *tx, write).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
