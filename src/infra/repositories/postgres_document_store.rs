use crate::domain::ports::DocumentStore;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;

pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn read_all(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM collections WHERE name = $1")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        match body {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_all(&self, collection: &str, documents: &[Value]) -> Result<(), AppError> {
        let body = serde_json::to_string(documents)?;

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        sqlx::query(
            "INSERT INTO collections (name, body, updated_at) VALUES ($1, $2, $3)
             ON CONFLICT (name) DO UPDATE SET body = EXCLUDED.body, updated_at = EXCLUDED.updated_at",
        )
        .bind(collection)
        .bind(body)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;
        tx.commit().await.map_err(AppError::Database)?;

        Ok(())
    }
}
