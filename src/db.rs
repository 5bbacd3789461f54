pub mod memory_store;
pub mod pg_store;
pub mod repository;
pub mod store;

pub use memory_store::MemoryDocumentStore;
pub use pg_store::PgDocumentStore;
pub use repository::Repository;
pub use store::{Document, DocumentStore, Filter};

use std::{sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;

use crate::config::Config;

/// Picks the backing store: Postgres when DATABASE_URL is set, memory otherwise.
pub async fn connect(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("⚠️ DATABASE_URL not set, using the in-memory document store (data is lost on restart)");
        return Ok(Arc::new(MemoryDocumentStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await?;

    tracing::info!("✅ Database connection established");

    sqlx::migrate!().run(&pool).await?;

    tracing::info!("✅ Database migrations applied");

    Ok(Arc::new(PgDocumentStore::new(pool)))
}
