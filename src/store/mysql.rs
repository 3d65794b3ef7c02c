//! MySQL-backed document store.
//!
//! All collections share one `documents` table: `(collection, id)` primary
//! key, a JSON body and an unsigned version column. Conditional writes are
//! plain `UPDATE ... WHERE version = ?` statements, so a lost race shows up as
//! zero affected rows.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::MySqlPool;
use uuid::Uuid;

use super::{BatchWrite, Document, DocumentStore, FieldOp, StoreError, StoreResult};

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to run migrations: {}", e)))
    }

    async fn exists(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let row: Option<(u64,)> =
            sqlx::query_as("SELECT version FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;
        Ok(row.is_some())
    }

    /// Zero affected rows means either a stale version or a missing row
    async fn lost_write(&self, collection: &str, id: &str) -> StoreError {
        match self.exists(collection, id).await {
            Ok(true) => StoreError::conflict(collection, id),
            Ok(false) => StoreError::not_found(collection, id),
            Err(e) => e,
        }
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn into_document((id, version, body): (String, u64, String)) -> StoreResult<Document> {
    let body = serde_json::from_str(&body)
        .map_err(|e| StoreError::Malformed(format!("document {}: {}", id, e)))?;
    Ok(Document { id, version, body })
}

/// Field names end up inside a JSON path, so only plain identifiers are allowed
fn json_path(field: &str) -> StoreResult<String> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::Malformed(format!("invalid field name '{}'", field)));
    }
    Ok(format!("$.{}", field))
}

#[async_trait]
impl DocumentStore for MySqlStore {
    async fn create(&self, collection: &str, body: Value) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        self.insert(collection, &id, body).await?;
        Ok(id)
    }

    async fn insert(&self, collection: &str, id: &str, body: Value) -> StoreResult<()> {
        sqlx::query("INSERT INTO documents (collection, id, version, body) VALUES (?, ?, 1, ?)")
            .bind(collection)
            .bind(id)
            .bind(body.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_unique_violation() {
                        return StoreError::conflict(collection, id);
                    }
                }
                unavailable(e)
            })?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Document> {
        let row: Option<(String, u64, String)> = sqlx::query_as(
            r#"
            SELECT id, version, CAST(body AS CHAR)
            FROM documents
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(into_document)
            .unwrap_or_else(|| Err(StoreError::not_found(collection, id)))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        body: Value,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET body = ?, version = version + 1
            WHERE collection = ? AND id = ? AND version = ?
            "#,
        )
        .bind(body.to_string())
        .bind(collection)
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(self.lost_write(collection, id).await);
        }
        Ok(expected_version + 1)
    }

    async fn delete(&self, collection: &str, id: &str, expected_version: u64) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ? AND version = ?")
                .bind(collection)
                .bind(id)
                .bind(expected_version)
                .execute(&self.pool)
                .await
                .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(self.lost_write(collection, id).await);
        }
        Ok(())
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        op: FieldOp,
        value: Value,
    ) -> StoreResult<Vec<Document>> {
        let path = json_path(field)?;

        let predicate = match op {
            FieldOp::In => "JSON_CONTAINS(CAST(? AS JSON), JSON_EXTRACT(body, ?))".to_string(),
            _ => format!("JSON_EXTRACT(body, ?) {} CAST(? AS JSON)", op.sql_operator()),
        };
        let sql = format!(
            "SELECT id, version, CAST(body AS CHAR) FROM documents WHERE collection = ? AND {}",
            predicate
        );

        let query = sqlx::query_as::<_, (String, u64, String)>(&sql).bind(collection);
        let query = match op {
            FieldOp::In => query.bind(value.to_string()).bind(path),
            _ => query.bind(path).bind(value.to_string()),
        };

        let rows = query.fetch_all(&self.pool).await.map_err(unavailable)?;
        rows.into_iter().map(into_document).collect()
    }

    async fn atomic_batch(&self, writes: Vec<BatchWrite>) -> StoreResult<Vec<StoreResult<u64>>> {
        let mut results = Vec::with_capacity(writes.len());
        for write in writes {
            let outcome = self
                .update(&write.collection, &write.id, write.expected_version, write.body)
                .await;
            if let Err(StoreError::Unavailable(reason)) = &outcome {
                tracing::warn!(id = %write.id, reason = %reason, "Batch item failed");
            }
            results.push(outcome);
        }
        Ok(results)
    }
}
