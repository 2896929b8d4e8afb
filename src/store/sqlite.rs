// src/store/sqlite.rs
use std::path::Path;
use std::str::FromStr;

use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{merge_document, DocumentBackend, StoreError};

/// SQLite document backend: one `documents` table keyed by
/// (collection, id) with a JSON body column.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: Option<SqlitePool>,
}

impl SqliteBackend {
    pub fn new() -> Self {
        Self { pool: None }
    }

    fn get_pool(&self) -> Result<&SqlitePool, StoreError> {
        self.pool
            .as_ref()
            .ok_or_else(|| StoreError::Backend("Database not initialized".into()))
    }

    pub async fn init(&mut self, connection_string: &str) -> Result<(), StoreError> {
        let db_path = connection_string
            .strip_prefix("sqlite:")
            .ok_or_else(|| StoreError::Backend("Invalid SQLite connection string".into()))?;

        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        log::info!("Initializing SQLite document store at: {}", db_path);

        let options = SqliteConnectOptions::from_str(connection_string)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        self.pool = Some(pool);
        Ok(())
    }

    fn parse_body(raw: &str) -> Result<Value, StoreError> {
        serde_json::from_str(raw).map_err(StoreError::from)
    }
}

impl Default for SqliteBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBackend for SqliteBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let pool = self.get_pool()?;
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::parse_body(&row.get::<String, _>("body"))?)),
            None => Ok(None),
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let pool = self.get_pool()?;
        let rows = sqlx::query("SELECT id, body FROM documents WHERE collection = ?")
            .bind(collection)
            .fetch_all(pool)
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push((
                row.get::<String, _>("id"),
                Self::parse_body(&row.get::<String, _>("body"))?,
            ));
        }
        Ok(documents)
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        // Collections here are small admin datasets; filter in memory rather
        // than depending on the JSON1 extension.
        let documents = self.list(collection).await?;
        Ok(documents
            .into_iter()
            .filter(|(_, body)| body.get(field) == Some(value))
            .collect())
    }

    async fn create(&self, collection: &str, id: &str, body: &Value) -> Result<(), StoreError> {
        let pool = self.get_pool()?;
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(id)
            .bind(body.to_string())
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<(), StoreError> {
        let pool = self.get_pool()?;
        let mut tx = pool.begin().await?;

        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;

        let mut body = Self::parse_body(&row.get::<String, _>("body"))?;
        merge_document(&mut body, patch);

        sqlx::query("UPDATE documents SET body = ? WHERE collection = ? AND id = ?")
            .bind(body.to_string())
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        patch: &Value,
        guard_field: &str,
        expected: &Value,
    ) -> Result<(), StoreError> {
        let pool = self.get_pool()?;
        let mut tx = pool.begin().await?;

        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;

        let mut body = Self::parse_body(&row.get::<String, _>("body"))?;

        let current = body.get(guard_field).cloned().unwrap_or(Value::Null);
        if &current != expected {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                status: current.as_str().unwrap_or("unknown").to_string(),
            });
        }

        merge_document(&mut body, patch);

        sqlx::query("UPDATE documents SET body = ? WHERE collection = ? AND id = ?")
            .bind(body.to_string())
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
