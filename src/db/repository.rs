//! Database repository for settings and stored documents.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;

/// A document as kept by the reference store.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub key: String,
    pub body: String,
    pub updated_at: String,
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== SETTINGS ====================

    /// Read a setting.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("value")))
    }

    /// Insert or replace a setting.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== DOCUMENTS ====================

    /// Get a stored document by key.
    pub async fn get_document(&self, key: &str) -> Result<Option<StoredDocument>, AppError> {
        let row = sqlx::query("SELECT key, body, updated_at FROM documents WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| StoredDocument {
            key: row.get("key"),
            body: row.get("body"),
            updated_at: row.get("updated_at"),
        }))
    }

    /// Replace the document at `key`. There is no merge and no version check.
    pub async fn put_document(&self, key: &str, body: &str) -> Result<StoredDocument, AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO documents (key, body, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(body)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(StoredDocument {
            key: key.to_string(),
            body: body.to_string(),
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        (Repository::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let (repo, _dir) = repo().await;

        assert_eq!(repo.get_setting("trainer_code").await.unwrap(), None);
        repo.set_setting("trainer_code", "ABC12345").await.unwrap();
        repo.set_setting("trainer_code", "XYZ").await.unwrap();
        assert_eq!(
            repo.get_setting("trainer_code").await.unwrap().as_deref(),
            Some("XYZ")
        );
    }

    #[tokio::test]
    async fn test_document_replace() {
        let (repo, _dir) = repo().await;

        assert!(repo.get_document("ABC").await.unwrap().is_none());
        repo.put_document("ABC", r#"{"students":[]}"#).await.unwrap();
        repo.put_document("ABC", r#"{"students":[1]}"#).await.unwrap();

        let doc = repo.get_document("ABC").await.unwrap().unwrap();
        assert_eq!(doc.body, r#"{"students":[1]}"#);
    }
}
